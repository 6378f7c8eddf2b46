//! Arena document model.
//!
//! Pages and fetched fragments are parsed into a [`Document`]: a flat arena of
//! nodes addressed by [`NodeId`]. Ids are stable for the lifetime of the
//! document, so a node keeps its identity while it is detached and moved
//! around, which is what overlay relocation relies on.
//!
//! # Module Structure
//!
//! - [`parse`]: HTML → arena (quick-xml, lenient)
//! - [`serialize`]: arena → HTML
//! - [`selector`]: the CSS selector subset used by configuration and triggers

mod parse;
mod selector;
mod serialize;

pub use parse::ParseError;
pub use selector::{Selector, SelectorError};

use compact_str::CompactString;
use smallvec::SmallVec;
use std::borrow::Cow;

/// Handle of a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

pub type Attrs = SmallVec<[(CompactString, String); 4]>;

/// Element name plus attributes in source order.
///
/// Attribute values are stored unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: CompactString,
    pub attrs: Attrs,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: CompactString::from(tag.to_ascii_lowercase()),
            attrs: SmallVec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_ascii_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }
}

/// Node payload. Text and comment contents are kept in their escaped form
/// so fragments round-trip untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Mutable HTML tree.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document containing only the root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Parse a full page or fragment.
    pub fn parse(html: &str) -> Result<Self, ParseError> {
        let mut doc = Self::new();
        doc.append_html(doc.root(), html)?;
        Ok(doc)
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// First `<body>` element, if the document has one.
    pub fn body(&self) -> Option<NodeId> {
        self.descendants(self.root())
            .find(|&id| self.tag(id) == Some("body"))
    }

    // ------------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------------

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element(Element::new(tag)))
    }

    /// Create a detached text node from already-escaped text.
    pub fn create_text(&mut self, escaped: &str) -> NodeId {
        self.push(NodeKind::Text(escaped.to_owned()))
    }

    /// Parse `html` and append the resulting nodes to `parent`.
    ///
    /// Returns the top-level nodes that were appended, in order.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Result<Vec<NodeId>, ParseError> {
        parse::parse_into(self, parent, html)
    }

    // ------------------------------------------------------------------------
    // Tree Structure
    // ------------------------------------------------------------------------

    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        siblings.get(pos + 1).copied()
    }

    /// Element siblings only, used by `:first-child` / `:last-child`.
    fn element_siblings(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.parent(id)
            .map(|p| self.children(p))
            .unwrap_or_default()
            .iter()
            .copied()
            .filter(|&c| self.element(c).is_some())
    }

    pub fn is_first_element_child(&self, id: NodeId) -> bool {
        self.parent(id).is_some() && self.element_siblings(id).next() == Some(id)
    }

    pub fn is_last_element_child(&self, id: NodeId) -> bool {
        self.parent(id).is_some() && self.element_siblings(id).last() == Some(id)
    }

    /// Whether `ancestor` is `node` or contains it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.parent(id);
        }
        false
    }

    /// Whether the node is reachable from the document root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains(self.root(), id)
    }

    /// Pre-order traversal of everything below `root` (excluding `root`).
    pub fn descendants(&self, root: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(root).to_vec();
        stack.reverse();
        Descendants { doc: self, stack }
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// Remove a node from its parent. The subtree stays in the arena.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.index()].parent.take() {
            self.nodes[parent.index()].children.retain(|&c| c != id);
        }
    }

    /// Move `child` to the end of `parent`'s children.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Move `child` under `parent`, directly before `reference`.
    ///
    /// Appends when `reference` is `None` or no longer a child of `parent`.
    /// Inserting a node into its own subtree is ignored.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        if self.contains(child, parent) {
            return;
        }
        self.detach(child);
        let children = &mut self.nodes[parent.index()].children;
        let pos = reference
            .and_then(|r| children.iter().position(|&c| c == r))
            .unwrap_or(children.len());
        children.insert(pos, child);
        self.nodes[child.index()].parent = Some(parent);
    }

    // ------------------------------------------------------------------------
    // Elements & Attributes
    // ------------------------------------------------------------------------

    #[inline]
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.index()].kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    #[inline]
    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.index()].kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attr(name)
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        let Some(el) = self.element_mut(id) else {
            return;
        };
        match el.attrs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some((_, v)) => *v = value.to_owned(),
            None => el.attrs.push((CompactString::from(name), value.to_owned())),
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(el) = self.element_mut(id) {
            el.attrs.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id).is_some_and(|el| el.has_class(class))
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if self.element(id).is_none() || self.has_class(id, class) {
            return;
        }
        let value = match self.attr(id, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_owned(),
        };
        self.set_attr(id, "class", &value);
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        let Some(existing) = self.attr(id, "class") else {
            return;
        };
        let value: Vec<&str> = existing
            .split_ascii_whitespace()
            .filter(|c| *c != class)
            .collect();
        let value = value.join(" ");
        self.set_attr(id, "class", &value);
    }

    /// Concatenated, unescaped text of the subtree.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        let nodes = std::iter::once(id).chain(self.descendants(id));
        for node in nodes {
            if let NodeKind::Text(text) = self.kind(node) {
                out.push_str(&unescape_lossy(text));
            }
        }
        out
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        selector.matches(self, id)
    }

    /// First descendant of `root` matching `selector`, in document order.
    pub fn query(&self, root: NodeId, selector: &Selector) -> Option<NodeId> {
        self.descendants(root).find(|&id| selector.matches(self, id))
    }

    /// All descendants of `root` matching `selector`, in document order.
    pub fn query_all(&self, root: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(root)
            .filter(|&id| selector.matches(self, id))
            .collect()
    }

    /// Parse `selector` and run [`Document::query`].
    pub fn select(&self, root: NodeId, selector: &str) -> Result<Option<NodeId>, SelectorError> {
        Ok(self.query(root, &Selector::parse(selector)?))
    }

    /// Nearest inclusive ancestor of `id` matching `selector`.
    pub fn closest(&self, id: NodeId, selector: &Selector) -> Option<NodeId> {
        let mut cur = Some(id);
        while let Some(node) = cur {
            if selector.matches(self, node) {
                return Some(node);
            }
            cur = self.parent(node);
        }
        None
    }

    // ------------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------------

    /// HTML of the node itself and its subtree.
    pub fn outer_html(&self, id: NodeId) -> String {
        serialize::to_html(self, std::slice::from_ref(&id)).unwrap_or_default()
    }

    /// HTML of the node's children.
    pub fn inner_html(&self, id: NodeId) -> String {
        serialize::to_html(self, self.children(id)).unwrap_or_default()
    }
}

/// Iterator returned by [`Document::descendants`].
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.doc.children(id).iter().rev().copied());
        Some(id)
    }
}

/// Unescape entity references, keeping the raw text when an entity is unknown
/// to XML (`&nbsp;` and friends).
pub(crate) fn unescape_lossy(raw: &str) -> Cow<'_, str> {
    quick_xml::escape::unescape(raw).unwrap_or(Cow::Borrowed(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Document {
        Document::parse(
            r#"<html><body><main id="m"><p class="a">one</p><p class="b c">two</p><p>three</p></main></body></html>"#,
        )
        .unwrap()
    }

    fn by_sel(doc: &Document, sel: &str) -> NodeId {
        doc.select(doc.root(), sel).unwrap().unwrap()
    }

    #[test]
    fn test_body_lookup() {
        let doc = page();
        assert_eq!(doc.tag(doc.body().unwrap()), Some("body"));
    }

    #[test]
    fn test_descendants_document_order() {
        let doc = page();
        let main = by_sel(&doc, "#m");
        let tags: Vec<_> = doc
            .descendants(main)
            .filter_map(|id| doc.tag(id))
            .collect();
        assert_eq!(tags, vec!["p", "p", "p"]);
    }

    #[test]
    fn test_insert_before_and_append() {
        let mut doc = page();
        let main = by_sel(&doc, "#m");
        let first = by_sel(&doc, ".a");
        let third = doc.children(main)[2];

        doc.insert_before(main, third, Some(first));
        assert_eq!(doc.children(main)[0], third);

        doc.append_child(main, third);
        assert_eq!(doc.children(main).last(), Some(&third));
        assert_eq!(doc.children(main).len(), 3);
    }

    #[test]
    fn test_insert_before_stale_reference_appends() {
        let mut doc = page();
        let main = by_sel(&doc, "#m");
        let body = doc.body().unwrap();
        let first = by_sel(&doc, ".a");
        let second = by_sel(&doc, ".b");

        doc.append_child(body, second);
        doc.insert_before(main, first, Some(second));
        assert_eq!(doc.children(main).last(), Some(&first));
    }

    #[test]
    fn test_insert_into_own_subtree_is_ignored() {
        let mut doc = page();
        let main = by_sel(&doc, "#m");
        let first = by_sel(&doc, ".a");
        doc.append_child(first, main);
        assert_eq!(doc.parent(main), doc.body());
    }

    #[test]
    fn test_detached_node_keeps_identity() {
        let mut doc = page();
        let first = by_sel(&doc, ".a");
        doc.detach(first);
        assert!(!doc.is_connected(first));
        assert_eq!(doc.text_content(first), "one");
    }

    #[test]
    fn test_class_helpers() {
        let mut doc = page();
        let second = by_sel(&doc, ".b");

        doc.add_class(second, "open");
        doc.add_class(second, "open");
        assert_eq!(doc.attr(second, "class"), Some("b c open"));

        doc.remove_class(second, "c");
        assert_eq!(doc.attr(second, "class"), Some("b open"));
        assert!(doc.has_class(second, "open"));
    }

    #[test]
    fn test_set_and_remove_attr() {
        let mut doc = page();
        let main = by_sel(&doc, "#m");

        doc.set_attr(main, "aria-hidden", "true");
        doc.set_attr(main, "aria-hidden", "false");
        assert_eq!(doc.attr(main, "aria-hidden"), Some("false"));

        doc.remove_attr(main, "aria-hidden");
        assert!(!doc.has_attr(main, "aria-hidden"));
    }

    #[test]
    fn test_closest_includes_self() {
        let doc = page();
        let first = by_sel(&doc, ".a");
        let sel = Selector::parse("p").unwrap();
        assert_eq!(doc.closest(first, &sel), Some(first));

        let sel = Selector::parse("main").unwrap();
        assert_eq!(doc.closest(first, &sel), Some(by_sel(&doc, "#m")));
    }

    #[test]
    fn test_first_and_last_element_child() {
        let doc = page();
        let first = by_sel(&doc, ".a");
        let second = by_sel(&doc, ".b");
        assert!(doc.is_first_element_child(first));
        assert!(!doc.is_last_element_child(second));
    }

    #[test]
    fn test_text_content_unescapes() {
        let doc = Document::parse("<p>a &amp; b</p>").unwrap();
        assert_eq!(doc.text_content(doc.root()), "a & b");
    }
}
