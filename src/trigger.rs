//! Trigger markup contract.
//!
//! A trigger is any element whose `href` contains one of the configured
//! markers, e.g. `<a href="#popup=/info#pricing-block?autoplay">`. The text
//! after the marker is an overlay reference:
//!
//! ```text
//! /info  #pricing-block  ?autoplay
//! ^----^ ^------------^  ^-------^
//! path   target          flags (may also precede the fragment)
//! ```
//!
//! The path is the overlay id. The optional target selects the node to
//! relocate into the overlay's single-item slot on open.
//!
//! Discovery stamps each trigger with `data-popup` attributes so later
//! passes (and the click handler) read the typed binding instead of
//! re-parsing links.

use crate::dom::NodeId;

/// Attribute carrying the overlay id on a discovered trigger.
pub const ATTR_ID: &str = "data-popup";
/// Attribute carrying the relocation target selector.
pub const ATTR_TARGET: &str = "data-popup-target";
/// Present when the trigger requests autoplay.
pub const ATTR_AUTOPLAY: &str = "data-popup-autoplay";

/// Parsed overlay reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayRef {
    pub path: String,
    pub target: Option<String>,
    pub autoplay: bool,
}

/// A discovered trigger, resolved once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerBinding {
    pub node: NodeId,
    pub id: String,
    pub target: Option<String>,
    pub autoplay: bool,
}

/// Return the reference text after the first matching marker in `href`.
pub fn reference_in<'a>(href: &'a str, prefixes: &[String]) -> Option<&'a str> {
    prefixes
        .iter()
        .filter(|p| !p.is_empty())
        .find_map(|p| href.find(p.as_str()).map(|pos| &href[pos + p.len()..]))
}

/// Parse `path[#target][?flags]` (or `path[?flags][#target]`).
///
/// Absolute URLs are reduced to their path. Returns `None` when no path
/// remains.
pub fn parse_reference(value: &str) -> Option<OverlayRef> {
    let value = strip_origin(value.trim());
    let (before_hash, hash) = match value.split_once('#') {
        Some((before, after)) => (before, Some(after)),
        None => (value, None),
    };

    let (path, query_a) = split_query(before_hash);
    let (target, query_b) = match hash {
        Some(hash) => split_query(hash),
        None => ("", None),
    };

    let path = urlencoding::decode(path)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| path.to_owned());
    if path.is_empty() {
        return None;
    }
    let path = if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    };

    let autoplay = [query_a, query_b]
        .into_iter()
        .flatten()
        .flat_map(|q| q.split('&'))
        .any(|pair| pair.split('=').next() == Some("autoplay"));

    Some(OverlayRef {
        path,
        target: (!target.is_empty()).then(|| format!("#{target}")),
        autoplay,
    })
}

fn split_query(s: &str) -> (&str, Option<&str>) {
    match s.split_once('?') {
        Some((head, query)) => (head, Some(query)),
        None => (s, None),
    }
}

/// `https://site.example/info` → `/info`.
fn strip_origin(value: &str) -> &str {
    let Some(scheme_end) = value.find("://") else {
        return value;
    };
    let rest = &value[scheme_end + 3..];
    match rest.find('/') {
        Some(pos) => &rest[pos..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes() -> Vec<String> {
        vec!["#popup=".into(), "#overlay=".into()]
    }

    #[test]
    fn test_reference_in_finds_marker() {
        assert_eq!(
            reference_in("/shop#popup=/info#pricing", &prefixes()),
            Some("/info#pricing")
        );
        assert_eq!(reference_in("#overlay=/about", &prefixes()), Some("/about"));
        assert_eq!(reference_in("/plain-link", &prefixes()), None);
    }

    #[test]
    fn test_parse_reference_full() {
        let r = parse_reference("/info#pricing-block?autoplay").unwrap();
        assert_eq!(r.path, "/info");
        assert_eq!(r.target.as_deref(), Some("#pricing-block"));
        assert!(r.autoplay);
    }

    #[test]
    fn test_parse_reference_query_before_fragment() {
        let r = parse_reference("/info?autoplay=1#video").unwrap();
        assert_eq!(r.path, "/info");
        assert_eq!(r.target.as_deref(), Some("#video"));
        assert!(r.autoplay);
    }

    #[test]
    fn test_parse_reference_path_only() {
        let r = parse_reference("/about").unwrap();
        assert_eq!(r.path, "/about");
        assert_eq!(r.target, None);
        assert!(!r.autoplay);
    }

    #[test]
    fn test_parse_reference_other_flags_are_not_autoplay() {
        let r = parse_reference("/about?autoplayer&x=autoplay").unwrap();
        assert!(!r.autoplay);
    }

    #[test]
    fn test_parse_reference_normalizes_path() {
        assert_eq!(parse_reference("about").unwrap().path, "/about");
        assert_eq!(
            parse_reference("/caf%C3%A9-menu").unwrap().path,
            "/café-menu"
        );
        assert_eq!(
            parse_reference("https://site.example/info#faq").unwrap().path,
            "/info"
        );
    }

    #[test]
    fn test_parse_reference_empty() {
        assert_eq!(parse_reference(""), None);
        assert_eq!(parse_reference("#only-target"), None);
        assert_eq!(parse_reference("https://site.example"), None);
    }
}
