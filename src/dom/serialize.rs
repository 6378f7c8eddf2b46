//! Arena → HTML.

use super::{Document, NodeId, NodeKind, parse::is_void};
use anyhow::Result;
use quick_xml::{
    Writer,
    events::{BytesEnd, BytesStart, BytesText, Event},
};
use std::io::Cursor;

type HtmlWriter = Writer<Cursor<Vec<u8>>>;

/// Serialize `nodes` (and their subtrees) in order.
pub(super) fn to_html(doc: &Document, nodes: &[NodeId]) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    for &node in nodes {
        write_node(doc, node, &mut writer)?;
    }
    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

fn write_node(doc: &Document, id: NodeId, writer: &mut HtmlWriter) -> Result<()> {
    match doc.kind(id) {
        NodeKind::Document => {
            for &child in doc.children(id) {
                write_node(doc, child, writer)?;
            }
        }
        NodeKind::Text(raw) => {
            writer.write_event(Event::Text(BytesText::from_escaped(raw.as_str())))?;
        }
        NodeKind::Comment(raw) => {
            writer.write_event(Event::Comment(BytesText::from_escaped(raw.as_str())))?;
        }
        NodeKind::Element(el) => {
            let mut start = BytesStart::new(el.tag.as_str());
            for (key, value) in &el.attrs {
                start.push_attribute((key.as_str(), value.as_str()));
            }

            let children = doc.children(id);
            if children.is_empty() && is_void(&el.tag) {
                writer.write_event(Event::Empty(start))?;
                return Ok(());
            }

            writer.write_event(Event::Start(start))?;
            for &child in children {
                write_node(doc, child, writer)?;
            }
            writer.write_event(Event::End(BytesEnd::new(el.tag.as_str())))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::Document;

    #[test]
    fn test_roundtrip_keeps_structure() {
        let html = r#"<div class="a" data-x="1"><p>hi &amp; bye</p><br/><!-- c --></div>"#;
        let doc = Document::parse(html).unwrap();
        assert_eq!(doc.inner_html(doc.root()), html);
    }

    #[test]
    fn test_attribute_values_are_escaped() {
        let mut doc = Document::parse("<a></a>").unwrap();
        let a = doc.children(doc.root())[0];
        doc.set_attr(a, "title", "x\"y<z");
        let html = doc.outer_html(a);
        assert!(html.contains("&quot;"));
        assert!(html.contains("&lt;"));
    }

    #[test]
    fn test_empty_non_void_element_keeps_end_tag() {
        let doc = Document::parse("<div></div>").unwrap();
        assert_eq!(doc.inner_html(doc.root()), "<div></div>");
    }

    #[test]
    fn test_valueless_attribute_serializes_empty() {
        let doc = Document::parse("<button data-popup-close>x</button>").unwrap();
        assert_eq!(
            doc.inner_html(doc.root()),
            r#"<button data-popup-close="">x</button>"#
        );
    }
}
