//! Overlay builder.
//!
//! Turns acquired content into a hidden overlay container appended to the
//! shared mount point:
//!
//! ```text
//! div.popup-container[data-popup-id][aria-hidden=true]
//! ├── div.popup-background[data-popup-close]
//! └── div.popup-wrapper[role=dialog]
//!     ├── button.popup-close[data-popup-close]
//!     └── div.popup-content
//!         └── {content}
//!             └── div.popup-single-item    (inside .content-wrapper if any)
//! ```
//!
//! Mounting is synchronous. Callers must check `built` and mount without an
//! intervening suspension point so each id gets exactly one container.

use crate::dom::{Document, NodeId, ParseError, Selector};
use crate::log;
use std::str::FromStr;

pub const CLASS_CONTAINER: &str = "popup-container";
pub const CLASS_CONTENT: &str = "popup-content";
pub const CLASS_SLOT: &str = "popup-single-item";
/// Attribute on the container naming its overlay.
pub const ATTR_OVERLAY: &str = "data-popup-id";
/// Elements carrying this attribute close the active overlay when clicked.
pub const ATTR_CLOSE: &str = "data-popup-close";

/// Custom property read from inline styles to pick the close transition.
const ANIMATION_PROPERTY: &str = "--popup-animation";

const CONTAINER_TEMPLATE: &str = r#"<div class="popup-container" aria-hidden="true"><div class="popup-background" data-popup-close="" tabindex="-1"></div><div class="popup-wrapper" role="dialog" aria-modal="true"><button class="popup-close" data-popup-close="" aria-label="Close popup">&#215;</button><div class="popup-content"></div></div></div>"#;

/// Transition played when an overlay becomes hidden.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnimationMode {
    /// No transition: teardown completes immediately on close.
    #[default]
    None,
    Fade,
    Slide,
    Zoom,
}

impl AnimationMode {
    /// Whether closing waits for a transition-end signal.
    #[inline]
    pub fn has_transition(self) -> bool {
        self != Self::None
    }
}

impl FromStr for AnimationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "fade" => Ok(Self::Fade),
            "slide" => Ok(Self::Slide),
            "zoom" => Ok(Self::Zoom),
            other => Err(format!("unknown animation `{other}`")),
        }
    }
}

/// Nodes created by [`mount`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mounted {
    pub container: NodeId,
    pub slot: NodeId,
}

/// Last element matching `mount`, else `<body>`.
pub fn resolve_mount_point(doc: &Document, mount: &Selector) -> Option<NodeId> {
    doc.query_all(doc.root(), mount)
        .last()
        .copied()
        .or_else(|| doc.body())
}

/// Build the container for `id` around `content` and append it to `mount_point`.
pub fn mount(
    doc: &mut Document,
    mount_point: NodeId,
    id: &str,
    content: &str,
) -> Result<Mounted, ParseError> {
    let added = doc.append_html(mount_point, CONTAINER_TEMPLATE)?;
    let Some(&container) = added.first() else {
        return Err(ParseError {
            position: 0,
            message: "container template produced no element".into(),
        });
    };
    doc.set_attr(container, ATTR_OVERLAY, id);

    let content_node = doc
        .descendants(container)
        .find(|&n| doc.has_class(n, CLASS_CONTENT))
        .unwrap_or(container);
    doc.append_html(content_node, content)?;

    let slot_parent = doc
        .descendants(content_node)
        .find(|&n| doc.has_class(n, "content-wrapper"))
        .unwrap_or(content_node);
    let slot = doc.create_element("div");
    doc.add_class(slot, CLASS_SLOT);
    doc.append_child(slot_parent, slot);

    Ok(Mounted { container, slot })
}

/// Resolve the container's transition from the nearest inline
/// `--popup-animation` declaration on it or an ancestor.
pub fn resolve_animation(doc: &Document, container: NodeId) -> AnimationMode {
    let mut cur = Some(container);
    while let Some(node) = cur {
        if let Some(value) = doc.attr(node, "style").and_then(custom_property) {
            return value.parse().unwrap_or_else(|err| {
                log!("build"; "{err}, using none");
                AnimationMode::None
            });
        }
        cur = doc.parent(node);
    }
    AnimationMode::None
}

fn custom_property(style: &str) -> Option<&str> {
    style.split(';').find_map(|decl| {
        let (name, value) = decl.split_once(':')?;
        (name.trim() == ANIMATION_PROPERTY).then(|| value.trim())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<body><div id="sections"><section class="page-section">a</section><section class="page-section" id="last">b</section></div></body>"#;

    fn mount_selector() -> Selector {
        Selector::parse("#sections > .page-section:last-child").unwrap()
    }

    #[test]
    fn test_resolve_mount_point_last_match() {
        let doc = Document::parse(PAGE).unwrap();
        let point = resolve_mount_point(&doc, &mount_selector()).unwrap();
        assert_eq!(doc.attr(point, "id"), Some("last"));
    }

    #[test]
    fn test_resolve_mount_point_falls_back_to_body() {
        let doc = Document::parse("<body><p>x</p></body>").unwrap();
        let point = resolve_mount_point(&doc, &mount_selector()).unwrap();
        assert_eq!(Some(point), doc.body());

        let doc = Document::parse("<p>x</p>").unwrap();
        assert_eq!(resolve_mount_point(&doc, &mount_selector()), None);
    }

    #[test]
    fn test_mount_builds_container_structure() {
        let mut doc = Document::parse(PAGE).unwrap();
        let point = resolve_mount_point(&doc, &mount_selector()).unwrap();
        let mounted = mount(&mut doc, point, "/info", "<p>hello</p>").unwrap();

        assert_eq!(doc.parent(mounted.container), Some(point));
        assert_eq!(doc.attr(mounted.container, ATTR_OVERLAY), Some("/info"));
        assert_eq!(doc.attr(mounted.container, "aria-hidden"), Some("true"));

        let closes = doc.query_all(mounted.container, &Selector::parse("[data-popup-close]").unwrap());
        assert_eq!(closes.len(), 2);

        let dialog = doc.select(mounted.container, "[role=dialog]").unwrap();
        assert!(dialog.is_some());

        let content = doc.select(mounted.container, ".popup-content").unwrap().unwrap();
        assert_eq!(doc.parent(mounted.slot), Some(content));
        assert!(doc.text_content(content).contains("hello"));
    }

    #[test]
    fn test_mount_places_slot_in_content_wrapper() {
        let mut doc = Document::parse(PAGE).unwrap();
        let body = doc.body().unwrap();
        let mounted = mount(
            &mut doc,
            body,
            "/x",
            r#"<section><div class="content-wrapper"><p>a</p></div></section>"#,
        )
        .unwrap();

        let parent = doc.parent(mounted.slot).unwrap();
        assert!(doc.has_class(parent, "content-wrapper"));
        assert_eq!(doc.children(parent).last(), Some(&mounted.slot));
    }

    #[test]
    fn test_resolve_animation_inherits_and_defaults() {
        let mut doc =
            Document::parse(r#"<body style="color: red; --popup-animation: fade"></body>"#).unwrap();
        let body = doc.body().unwrap();
        let mounted = mount(&mut doc, body, "/x", "").unwrap();
        assert_eq!(resolve_animation(&doc, mounted.container), AnimationMode::Fade);

        doc.set_attr(mounted.container, "style", "--popup-animation: wobble");
        assert_eq!(resolve_animation(&doc, mounted.container), AnimationMode::None);

        let mut doc = Document::parse("<body></body>").unwrap();
        let body = doc.body().unwrap();
        let mounted = mount(&mut doc, body, "/x", "").unwrap();
        assert_eq!(resolve_animation(&doc, mounted.container), AnimationMode::None);
    }

    #[test]
    fn test_animation_mode_parse() {
        assert_eq!(" Zoom ".parse::<AnimationMode>(), Ok(AnimationMode::Zoom));
        assert!("".parse::<AnimationMode>().is_err());
        assert!(!AnimationMode::None.has_transition());
        assert!(AnimationMode::Slide.has_transition());
    }
}
