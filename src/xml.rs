//! Minimal owned XML element tree built on `quick-xml` events.
//!
//! E-utilities efetch documents are small (one batch of articles) and are
//! queried with ElementTree-style lookups, so the whole document is read
//! into a tree first and each `PubmedArticle` node is then converted on
//! its own. A malformed document fails as a whole; a malformed article
//! only fails its own conversion.

use crate::error::{PapersError, Result};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

/// Name of the synthetic node wrapping the document's top-level content.
const DOCUMENT_NODE: &str = "#document";

#[derive(Debug, Clone, PartialEq, Eq)]
enum XmlContent {
    Text(String),
    Element(XmlElement),
}

/// An element with its text and child elements in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    name: String,
    content: Vec<XmlContent>,
}

impl XmlElement {
    fn new(name: String) -> Self {
        Self {
            name,
            content: Vec::new(),
        }
    }

    /// Direct child elements
    pub fn children(&self) -> impl Iterator<Item = &XmlElement> {
        self.content.iter().filter_map(|c| match c {
            XmlContent::Element(e) => Some(e),
            XmlContent::Text(_) => None,
        })
    }

    /// Direct child elements with the given tag name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children().filter(move |e| e.name == name)
    }

    /// First direct child with the given tag name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children().find(|e| e.name == name)
    }

    /// Follow a path of direct children, e.g. `["JournalIssue", "PubDate"]`
    pub fn child_path(&self, path: &[&str]) -> Option<&XmlElement> {
        path.iter().try_fold(self, |node, name| node.child(name))
    }

    /// First element below this one (pre-order) with the given tag name.
    ///
    /// Equivalent to ElementTree's `.//name` lookup.
    pub fn descendant(&self, name: &str) -> Option<&XmlElement> {
        for child in self.children() {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.descendant(name) {
                return Some(found);
            }
        }
        None
    }

    /// All elements below this one with the given tag name, in document order
    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a XmlElement> {
        let mut found = Vec::new();
        self.collect_descendants(name, &mut found);
        found
    }

    fn collect_descendants<'a>(&'a self, name: &str, found: &mut Vec<&'a XmlElement>) {
        for child in self.children() {
            if child.name == name {
                found.push(child);
            }
            child.collect_descendants(name, found);
        }
    }

    /// All text below this element with whitespace runs collapsed.
    ///
    /// Inline markup such as `<i>` in titles contributes its text in place.
    pub fn text(&self) -> String {
        let mut raw = String::new();
        self.push_text(&mut raw);
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn push_text(&self, out: &mut String) {
        for c in &self.content {
            match c {
                XmlContent::Text(t) => out.push_str(t),
                XmlContent::Element(e) => e.push_text(out),
            }
        }
    }

    /// Text of the first direct child named `name`, if present and non-blank
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).map(XmlElement::text).filter(|t| !t.is_empty())
    }
}

/// Parse a whole document into a tree rooted at a synthetic `#document` node.
pub fn parse_document(xml: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<XmlElement> = vec![XmlElement::new(DOCUMENT_NODE.to_string())];

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                stack.push(XmlElement::new(name));
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                current(&mut stack)?
                    .content
                    .push(XmlContent::Element(XmlElement::new(name)));
            }
            Event::Text(e) => {
                let text = e.unescape()?;
                current(&mut stack)?
                    .content
                    .push(XmlContent::Text(text.into_owned()));
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                current(&mut stack)?.content.push(XmlContent::Text(text));
            }
            Event::End(_) => {
                if stack.len() < 2 {
                    return Err(PapersError::Parse("unbalanced closing tag".to_string()));
                }
                let finished = stack
                    .pop()
                    .ok_or_else(|| PapersError::Parse("unbalanced closing tag".to_string()))?;
                current(&mut stack)?
                    .content
                    .push(XmlContent::Element(finished));
            }
            Event::Eof => break,
            // Declarations, comments, doctype and processing instructions
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(PapersError::Parse(format!(
            "document ended with {} unclosed element(s)",
            stack.len() - 1
        )));
    }
    stack
        .pop()
        .ok_or_else(|| PapersError::Parse("empty document".to_string()))
}

fn current(stack: &mut [XmlElement]) -> Result<&mut XmlElement> {
    stack
        .last_mut()
        .ok_or_else(|| PapersError::Parse("element stack underflow".to_string()))
}
