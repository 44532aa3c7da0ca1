//! C9 — the DOM builder's tree shape (spec.md §4.9).
//!
//! A `Document` always has exactly one root `Element`; everything else a
//! SAX parse can produce (text, comments, processing instructions, nested
//! elements) lives in the `XMLNode` sum type that makes up an element's
//! content list.
//!
//! A `<![CDATA[...]]>` section is kept as its own `XMLNode::CData` variant
//! rather than folded into `Text` (spec.md §3, §4.9): the tree still lets a
//! caller tell a literal section apart from ordinary escaped text.

/// The `<?xml ...?>` declaration, if the source had one.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct XmlDeclaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<bool>,
}

/// The document type declaration's name and external identifier; the
/// internal subset is consumed by the grammar during parsing and is not
/// retained in the tree.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentType {
    pub name: String,
    pub public_id: Option<String>,
    pub system_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Document {
    pub declaration: Option<XmlDeclaration>,
    pub doctype: Option<DocumentType>,
    pub root: Option<Element>,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Element {
    pub name: String,
    /// In document order, duplicates already rejected by the SAX layer.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XMLNode>,
}

impl Element {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Direct child elements, skipping text/comment/PI content.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            XMLNode::Element(element) => Some(element),
            _ => None,
        })
    }

    /// Concatenation of every direct text child.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for node in &self.children {
            if let XMLNode::Text(s) = node {
                text.push_str(s);
            }
        }
        text
    }
}

/// One piece of an element's content, per spec.md §4.9: adjacent text runs
/// from the underlying event stream are coalesced into a single node.
#[derive(Clone, Debug, PartialEq)]
pub enum XMLNode {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction { target: String, data: Option<String> },
}
