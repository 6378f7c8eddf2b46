//! Lenient HTML parsing on top of quick-xml.
//!
//! quick-xml is an XML reader, so HTML specifics are handled here:
//! void elements never open a scope, unmatched end tags are dropped, missing
//! end tags are closed implicitly, and `<script>`/`<style>` bodies are taken
//! verbatim instead of being tokenized.

use super::{Document, Element, NodeId, NodeKind, unescape_lossy};
use compact_str::CompactString;
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("HTML parse error at position {position}: {message}")]
pub struct ParseError {
    pub position: u64,
    pub message: String,
}

/// Elements that never have children.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[inline]
pub(super) fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Elements whose content is raw text.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

#[inline]
fn create_reader(content: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(content);
    reader.config_mut().trim_text(false);
    reader.config_mut().enable_all_checks(false);
    reader.config_mut().allow_dangling_amp = true;
    // The open-element stack lives in `parse_into`, not in the reader.
    reader.config_mut().allow_unmatched_ends = true;
    reader
}

pub(super) fn parse_into(
    doc: &mut Document,
    parent: NodeId,
    html: &str,
) -> Result<Vec<NodeId>, ParseError> {
    let mut reader = create_reader(html.as_bytes());
    // Offset of the reader's input within `html`.
    let mut base = 0usize;
    let mut stack = vec![parent];
    let mut top_level = Vec::new();

    loop {
        let current = *stack.last().unwrap_or(&parent);
        match reader.read_event() {
            Ok(Event::Start(elem)) => {
                let id = doc.push(NodeKind::Element(element_from(&elem)));
                attach(doc, current, id, parent, &mut top_level);

                let tag = doc.tag(id).unwrap_or_default().to_owned();
                if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
                    let from = base + reader.buffer_position() as usize;
                    let (body_end, resume) = raw_text_end(html, from, &tag);
                    if let Some(body) = html.get(from..body_end)
                        && !body.is_empty()
                    {
                        let text = doc.create_text(body);
                        doc.append_child(id, text);
                    }
                    // quick-xml would tokenize the body, so resume after it
                    // with a fresh reader.
                    base = resume;
                    reader = create_reader(&html.as_bytes()[resume..]);
                } else if !is_void(&tag) {
                    stack.push(id);
                }
            }
            Ok(Event::Empty(elem)) => {
                let id = doc.push(NodeKind::Element(element_from(&elem)));
                attach(doc, current, id, parent, &mut top_level);
            }
            Ok(Event::End(elem)) => {
                let name = String::from_utf8_lossy(elem.name().as_ref()).to_ascii_lowercase();
                // Pop to the nearest open element with this name; stray end
                // tags never close the insertion parent itself.
                if let Some(pos) = stack
                    .iter()
                    .skip(1)
                    .rposition(|&id| doc.tag(id) == Some(name.as_str()))
                {
                    stack.truncate(pos + 1);
                }
            }
            Ok(Event::Text(text)) => {
                push_text(doc, current, &String::from_utf8_lossy(&text), parent, &mut top_level);
            }
            Ok(Event::CData(data)) => {
                push_text(doc, current, &String::from_utf8_lossy(&data), parent, &mut top_level);
            }
            Ok(Event::GeneralRef(entity)) => {
                let raw = format!("&{};", String::from_utf8_lossy(&entity));
                push_text(doc, current, &raw, parent, &mut top_level);
            }
            Ok(Event::Comment(comment)) => {
                let raw = String::from_utf8_lossy(&comment).into_owned();
                let id = doc.push(NodeKind::Comment(raw));
                attach(doc, current, id, parent, &mut top_level);
            }
            Ok(Event::Eof) => break,
            // Declarations, processing instructions and doctypes carry no content.
            Ok(_) => {}
            Err(e) => {
                return Err(ParseError {
                    position: (base as u64) + reader.error_position(),
                    message: e.to_string(),
                });
            }
        }
    }

    Ok(top_level)
}

/// End of a raw text body starting at `from` and the offset just past its
/// closing tag. An unclosed body runs to the end of input.
fn raw_text_end(html: &str, from: usize, tag: &str) -> (usize, usize) {
    let rest = html[from..].to_ascii_lowercase();
    let Some(close) = rest.find(&format!("</{tag}")) else {
        return (html.len(), html.len());
    };
    let resume = rest[close..]
        .find('>')
        .map_or(html.len(), |gt| from + close + gt + 1);
    (from + close, resume)
}

fn attach(doc: &mut Document, current: NodeId, id: NodeId, parent: NodeId, top: &mut Vec<NodeId>) {
    doc.append_child(current, id);
    if current == parent {
        top.push(id);
    }
}

/// Append text, merging with a preceding text node. quick-xml splits text
/// around entity references.
fn push_text(doc: &mut Document, current: NodeId, raw: &str, parent: NodeId, top: &mut Vec<NodeId>) {
    if raw.is_empty() {
        return;
    }
    if let Some(&last) = doc.children(current).last()
        && let NodeKind::Text(existing) = &mut doc.nodes[last.index()].kind
    {
        existing.push_str(raw);
        return;
    }
    let id = doc.create_text(raw);
    attach(doc, current, id, parent, top);
}

fn element_from(elem: &BytesStart<'_>) -> Element {
    let tag = String::from_utf8_lossy(elem.name().as_ref()).to_ascii_lowercase();
    let mut element = Element::new(&tag);
    for attr in elem.html_attributes().with_checks(false).flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
        let raw = String::from_utf8_lossy(&attr.value);
        let value = unescape_lossy(&raw).into_owned();
        element.attrs.push((CompactString::from(key), value));
    }
    element
}

#[cfg(test)]
mod tests {
    use super::super::{Document, NodeKind};

    #[test]
    fn test_parse_nested_elements() {
        let doc = Document::parse(r#"<div id="a"><span class="x">hi</span></div>"#).unwrap();
        let div = doc.children(doc.root())[0];
        assert_eq!(doc.tag(div), Some("div"));
        assert_eq!(doc.attr(div, "id"), Some("a"));

        let span = doc.children(div)[0];
        assert_eq!(doc.text_content(span), "hi");
    }

    #[test]
    fn test_parse_void_elements_do_not_nest() {
        let doc = Document::parse("<p>a<br>b<img src=\"x.png\">c</p>").unwrap();
        let p = doc.children(doc.root())[0];
        let tags: Vec<_> = doc
            .children(p)
            .iter()
            .filter_map(|&c| doc.tag(c))
            .collect();
        assert_eq!(tags, vec!["br", "img"]);
        assert_eq!(doc.text_content(p), "abc");
    }

    #[test]
    fn test_parse_valueless_attributes() {
        let doc = Document::parse("<button data-popup-close disabled>x</button>").unwrap();
        let button = doc.children(doc.root())[0];
        assert!(doc.has_attr(button, "data-popup-close"));
        assert_eq!(doc.attr(button, "disabled"), Some(""));
    }

    #[test]
    fn test_parse_script_body_verbatim() {
        let doc = Document::parse("<script>if (a < b && c) { go(); }</script><p>after</p>").unwrap();
        let script = doc.children(doc.root())[0];
        assert_eq!(doc.inner_html(script), "if (a < b && c) { go(); }");
        assert_eq!(doc.tag(doc.children(doc.root())[1]), Some("p"));
    }

    #[test]
    fn test_parse_unclosed_elements_close_implicitly() {
        let doc = Document::parse("<div><p>one</div><p>two</p>").unwrap();
        let roots: Vec<_> = doc
            .children(doc.root())
            .iter()
            .filter_map(|&c| doc.tag(c))
            .collect();
        assert_eq!(roots, vec!["div", "p"]);
    }

    #[test]
    fn test_parse_stray_end_tag_ignored() {
        let doc = Document::parse("<div>a</span>b</div>").unwrap();
        let div = doc.children(doc.root())[0];
        assert_eq!(doc.text_content(div), "ab");
    }

    #[test]
    fn test_parse_page_with_head_and_body_scripts() {
        let html = concat!(
            "<html><head><script>window.x = 1;</script><style>p > a { color: red }</style></head>",
            r#"<body><div id="sections"><p>hi</p></div><script src="/b.js"></script></body></html>"#,
        );
        let doc = Document::parse(html).unwrap();
        let html_el = doc.children(doc.root())[0];
        let tags: Vec<_> = doc
            .children(html_el)
            .iter()
            .filter_map(|&c| doc.tag(c))
            .collect();
        assert_eq!(tags, vec!["head", "body"]);

        let body = doc.body().unwrap();
        let sections = doc.select(body, "#sections").unwrap().unwrap();
        assert_eq!(doc.parent(sections), Some(body));
        assert_eq!(doc.text_content(sections), "hi");
        assert_eq!(doc.children(body).len(), 2);
    }

    #[test]
    fn test_parse_stray_end_tag_after_script() {
        let doc = Document::parse("<div><script>go()</script>a</span>b</p></div><i>c</i>").unwrap();
        let roots: Vec<_> = doc
            .children(doc.root())
            .iter()
            .filter_map(|&c| doc.tag(c))
            .collect();
        assert_eq!(roots, vec!["div", "i"]);
        let div = doc.children(doc.root())[0];
        assert_eq!(doc.text_content(div), "go()ab");
    }

    #[test]
    fn test_entities_merge_into_one_text_node() {
        let doc = Document::parse("<p>fish &amp; chips</p>").unwrap();
        let p = doc.children(doc.root())[0];
        assert_eq!(doc.children(p).len(), 1);
        assert!(matches!(doc.kind(doc.children(p)[0]), NodeKind::Text(_)));
        assert_eq!(doc.text_content(p), "fish & chips");
    }

    #[test]
    fn test_append_html_returns_top_level_nodes() {
        let mut doc = Document::parse("<main></main>").unwrap();
        let main = doc.children(doc.root())[0];
        let added = doc.append_html(main, "<a>1</a>text<b>2</b>").unwrap();
        assert_eq!(added.len(), 3);
        assert_eq!(doc.children(main), added.as_slice());
    }

    #[test]
    fn test_doctype_and_comments() {
        let doc = Document::parse("<!DOCTYPE html><!-- note --><html></html>").unwrap();
        let kinds: Vec<_> = doc
            .children(doc.root())
            .iter()
            .map(|&c| matches!(doc.kind(c), NodeKind::Comment(_)))
            .collect();
        assert_eq!(kinds, vec![true, false]);
    }
}
