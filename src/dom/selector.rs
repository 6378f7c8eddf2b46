//! CSS selector subset.
//!
//! Supported grammar:
//!
//! ```text
//! list      = complex ("," complex)*
//! complex   = compound ((" " | ">") compound)*
//! compound  = [tag | "*"] (#id | .class | [attr] | [attr=v] | [attr*=v]
//!             | [attr^=v] | :first-child | :last-child | :not(compound))*
//! ```
//!
//! Matching runs right-to-left like a browser engine, with ancestors of the
//! query root taking part in the match.

use super::{Document, NodeId};
use compact_str::CompactString;
use smallvec::SmallVec;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,

    #[error("unexpected `{found}` at offset {offset} in `{selector}`")]
    Unexpected {
        selector: String,
        found: char,
        offset: usize,
    },

    #[error("unexpected end of `{0}`")]
    UnexpectedEnd(String),

    #[error("unsupported pseudo-class `:{0}`")]
    UnknownPseudo(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals(String),
    Contains(String),
    Prefix(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Simple {
    Id(CompactString),
    Class(CompactString),
    Attr(CompactString, AttrOp),
    FirstChild,
    LastChild,
    Not(Box<Compound>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<CompactString>,
    simples: SmallVec<[Simple; 2]>,
}

/// One `a > b c` chain. `parts[i].0` links part `i` to part `i - 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    parts: Vec<(Combinator, Compound)>,
}

/// Parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Complex>,
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        if input.trim().is_empty() {
            return Err(SelectorError::Empty);
        }
        let mut parser = Parser {
            input,
            chars: input.char_indices().collect(),
            pos: 0,
        };
        let mut alternatives = vec![parser.complex()?];
        while parser.eat(',') {
            alternatives.push(parser.complex()?);
        }
        parser.skip_ws();
        match parser.peek() {
            None => Ok(Self {
                source: input.trim().to_owned(),
                alternatives,
            }),
            Some(c) => Err(parser.unexpected(c)),
        }
    }

    /// The selector text this was parsed from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        self.alternatives
            .iter()
            .any(|complex| match_from(doc, id, &complex.parts, complex.parts.len() - 1))
    }
}

fn match_from(doc: &Document, id: NodeId, parts: &[(Combinator, Compound)], idx: usize) -> bool {
    let (combinator, compound) = &parts[idx];
    if !compound.matches(doc, id) {
        return false;
    }
    if idx == 0 {
        return true;
    }
    match combinator {
        Combinator::Child => doc
            .parent(id)
            .is_some_and(|p| match_from(doc, p, parts, idx - 1)),
        Combinator::Descendant => {
            let mut cur = doc.parent(id);
            while let Some(p) = cur {
                if match_from(doc, p, parts, idx - 1) {
                    return true;
                }
                cur = doc.parent(p);
            }
            false
        }
    }
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.simples.is_empty()
    }

    fn matches(&self, doc: &Document, id: NodeId) -> bool {
        let Some(el) = doc.element(id) else {
            return false;
        };
        if let Some(tag) = &self.tag
            && tag.as_str() != "*"
            && !tag.eq_ignore_ascii_case(&el.tag)
        {
            return false;
        }
        self.simples.iter().all(|simple| match simple {
            Simple::Id(v) => el.attr("id") == Some(v.as_str()),
            Simple::Class(v) => el.has_class(v),
            Simple::Attr(name, op) => match (el.attr(name), op) {
                (None, _) => false,
                (Some(_), AttrOp::Exists) => true,
                (Some(a), AttrOp::Equals(v)) => a == v,
                (Some(a), AttrOp::Contains(v)) => a.contains(v.as_str()),
                (Some(a), AttrOp::Prefix(v)) => a.starts_with(v.as_str()),
            },
            Simple::FirstChild => doc.is_first_element_child(id),
            Simple::LastChild => doc.is_last_element_child(id),
            Simple::Not(inner) => !inner.matches(doc, id),
        })
    }
}

// ============================================================================
// Parser
// ============================================================================

struct Parser<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn unexpected(&self, found: char) -> SelectorError {
        SelectorError::Unexpected {
            selector: self.input.to_owned(),
            found,
            offset: self.chars.get(self.pos).map_or(self.input.len(), |&(i, _)| i),
        }
    }

    fn end(&self) -> SelectorError {
        SelectorError::UnexpectedEnd(self.input.to_owned())
    }

    fn complex(&mut self) -> Result<Complex, SelectorError> {
        self.skip_ws();
        let mut parts = vec![(Combinator::Descendant, self.compound()?)];
        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                Some('>') => {
                    self.pos += 1;
                    self.skip_ws();
                    Combinator::Child
                }
                Some(',') | None => break,
                Some(_) if had_ws => Combinator::Descendant,
                Some(c) => return Err(self.unexpected(c)),
            };
            parts.push((combinator, self.compound()?));
        }
        Ok(Complex { parts })
    }

    fn compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        match self.peek() {
            Some('*') => {
                self.pos += 1;
                compound.tag = Some("*".into());
            }
            Some(c) if is_ident_char(c) => compound.tag = Some(self.ident()?.to_ascii_lowercase().into()),
            _ => {}
        }

        while let Some(c) = self.peek() {
            let simple = match c {
                '#' => {
                    self.pos += 1;
                    Simple::Id(self.ident()?.into())
                }
                '.' => {
                    self.pos += 1;
                    Simple::Class(self.ident()?.into())
                }
                '[' => {
                    self.pos += 1;
                    self.attribute()?
                }
                ':' => {
                    self.pos += 1;
                    self.pseudo()?
                }
                _ => break,
            };
            compound.simples.push(simple);
        }

        if compound.is_empty() {
            return Err(match self.peek() {
                Some(c) => self.unexpected(c),
                None => self.end(),
            });
        }
        Ok(compound)
    }

    fn ident(&mut self) -> Result<String, SelectorError> {
        let mut out = String::new();
        while let Some(c) = self.peek().filter(|&c| is_ident_char(c)) {
            out.push(c);
            self.pos += 1;
        }
        if out.is_empty() {
            return Err(match self.peek() {
                Some(c) => self.unexpected(c),
                None => self.end(),
            });
        }
        Ok(out)
    }

    fn attribute(&mut self) -> Result<Simple, SelectorError> {
        self.skip_ws();
        let name: CompactString = self.ident()?.to_ascii_lowercase().into();
        self.skip_ws();
        let op = match self.bump() {
            Some(']') => return Ok(Simple::Attr(name, AttrOp::Exists)),
            Some('=') => AttrOp::Equals(self.attr_value()?),
            Some(c @ ('*' | '^')) => {
                if self.bump() != Some('=') {
                    return Err(self.unexpected(c));
                }
                let value = self.attr_value()?;
                if c == '*' {
                    AttrOp::Contains(value)
                } else {
                    AttrOp::Prefix(value)
                }
            }
            Some(c) => return Err(self.unexpected(c)),
            None => return Err(self.end()),
        };
        self.skip_ws();
        match self.bump() {
            Some(']') => Ok(Simple::Attr(name, op)),
            Some(c) => Err(self.unexpected(c)),
            None => Err(self.end()),
        }
    }

    fn attr_value(&mut self) -> Result<String, SelectorError> {
        self.skip_ws();
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let mut out = String::new();
                loop {
                    match self.bump() {
                        Some(c) if c == quote => return Ok(out),
                        Some(c) => out.push(c),
                        None => return Err(self.end()),
                    }
                }
            }
            _ => self.ident(),
        }
    }

    fn pseudo(&mut self) -> Result<Simple, SelectorError> {
        let name = self.ident()?.to_ascii_lowercase();
        match name.as_str() {
            "first-child" => Ok(Simple::FirstChild),
            "last-child" => Ok(Simple::LastChild),
            "not" => {
                if self.bump() != Some('(') {
                    return Err(self.end());
                }
                self.skip_ws();
                let inner = self.compound()?;
                if !self.eat(')') {
                    return Err(match self.peek() {
                        Some(c) => self.unexpected(c),
                        None => self.end(),
                    });
                }
                Ok(Simple::Not(Box::new(inner)))
            }
            _ => Err(SelectorError::UnknownPseudo(name)),
        }
    }
}

#[inline]
fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<body>
        <div id="sections">
            <section class="page-section first"><p class="x">1</p></section>
            <section class="page-section gallery-section"><p class="x y">2</p></section>
        </div>
        <a href="/shop#popup=/info" data-popup="/info">go</a>
        <script src="https://cdn.example/static/vta/bundle.js"></script>
    </body>"#;

    fn ids(doc: &Document, sel: &str) -> usize {
        doc.query_all(doc.root(), &Selector::parse(sel).unwrap()).len()
    }

    #[test]
    fn test_compound_matching() {
        let doc = Document::parse(PAGE).unwrap();
        assert_eq!(ids(&doc, "section"), 2);
        assert_eq!(ids(&doc, ".x"), 2);
        assert_eq!(ids(&doc, "p.x.y"), 1);
        assert_eq!(ids(&doc, "#sections"), 1);
        assert_eq!(ids(&doc, ".page-section.gallery-section"), 1);
    }

    #[test]
    fn test_combinators() {
        let doc = Document::parse(PAGE).unwrap();
        assert_eq!(ids(&doc, "#sections .x"), 2);
        assert_eq!(ids(&doc, "#sections > .x"), 0);
        assert_eq!(ids(&doc, "#sections > .page-section > .x"), 2);
        assert_eq!(ids(&doc, "body > script"), 1);
    }

    #[test]
    fn test_structural_pseudo_classes() {
        let doc = Document::parse(PAGE).unwrap();
        let sel = Selector::parse("#sections > .page-section:last-child").unwrap();
        let last = doc.query(doc.root(), &sel).unwrap();
        assert!(doc.has_class(last, "gallery-section"));
        assert_eq!(ids(&doc, ".page-section:first-child"), 1);
    }

    #[test]
    fn test_attribute_operators() {
        let doc = Document::parse(PAGE).unwrap();
        assert_eq!(ids(&doc, "[data-popup]"), 1);
        assert_eq!(ids(&doc, "[data-popup='/info']"), 1);
        assert_eq!(ids(&doc, r##"[href*="#popup="]"##), 1);
        assert_eq!(ids(&doc, "[href^=\"/shop\"]"), 1);
        assert_eq!(ids(&doc, r#"body > script[src*="/static/vta"]"#), 1);
    }

    #[test]
    fn test_selector_list_and_not() {
        let doc = Document::parse(PAGE).unwrap();
        assert_eq!(ids(&doc, "a, script"), 2);
        assert_eq!(ids(&doc, "p:not(.y)"), 1);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Selector::parse("  "), Err(SelectorError::Empty));
        assert!(matches!(
            Selector::parse("#"),
            Err(SelectorError::UnexpectedEnd(_))
        ));
        assert!(matches!(
            Selector::parse("div:hover"),
            Err(SelectorError::UnknownPseudo(p)) if p == "hover"
        ));
        assert!(Selector::parse("[href").is_err());
        assert!(Selector::parse("a >").is_err());
    }
}
