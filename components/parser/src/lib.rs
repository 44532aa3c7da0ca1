//! Fast, SAX-style XML parser.
//!
//! [`reader::Reader`] is the grammar-agnostic tokenizer: it yields
//! [`XmlEvent`]s for well-formed XML without consulting a DTD.
//! [`validating::ValidatingReader`] wraps it with the DTD [`Grammar`][g]
//! from `xrs-dtd`, adding entity expansion, attribute defaulting and
//! content/attribute validation. [`namespace`] layers namespace resolution
//! on top of the tokenizer for callers that need qualified names.
//!
//! [g]: xrs_dtd::Grammar

use std::fmt;
use std::io;

use thiserror::Error;

pub use parser::cursor::Cursor;
pub use reader::Reader;

pub(crate) mod cow;
pub mod encoding;
pub mod namespace;
pub(crate) mod parser;
pub mod reader;
pub mod validating;

/// A start tag: `<name attr="value" ...>` or `<name .../>`.
#[derive(Clone, Debug, PartialEq)]
pub struct STag<'a> {
    name: &'a str,
    empty: bool,
}

impl<'a> STag<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }
}

/// An attribute as it appeared in the source, with entity and character
/// references still unexpanded.
#[derive(Clone, PartialEq)]
pub struct Attribute<'a> {
    pub(crate) name: &'a str,
    pub(crate) raw_value: &'a str,
}

impl<'a> Attribute<'a> {
    pub fn new(name: &'a str, raw_value: &'a str) -> Self {
        Self { name, raw_value }
    }

    pub fn raw_value(&self) -> &'a str {
        self.raw_value
    }

    pub fn name(&self) -> &'a str {
        self.name
    }
}

impl<'a> fmt::Debug for Attribute<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("value", &self.raw_value)
            .finish()
    }
}

/// An end tag: `</name>`.
#[derive(Clone, Debug, PartialEq)]
pub struct ETag<'a> {
    pub(crate) name: &'a str,
}

impl<'a> ETag<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }
}

/// The XML declaration: `<?xml version="1.0" ...?>`.
#[derive(Clone, Debug, PartialEq)]
pub struct XmlDecl<'a> {
    pub version: &'a str,
    pub encoding: Option<&'a str>,
    pub standalone: Option<bool>,
}

/// A processing instruction: target and optional data.
#[derive(Clone, Debug, PartialEq)]
pub struct PI<'a>(pub &'a str, pub Option<&'a str>);

impl<'a> PI<'a> {
    pub fn target(&self) -> &'a str {
        self.0
    }

    pub fn data(&self) -> Option<&'a str> {
        self.1
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum XmlEvent<'a> {
    XmlDecl(XmlDecl<'a>),
    Dtd(reader::dtd::DocTypeDecl<'a>),
    STag(STag<'a>),
    ETag(ETag<'a>),
    Characters(std::borrow::Cow<'a, str>),
    /// A `<![CDATA[...]]>` section, kept distinct from `Characters` so
    /// consumers can preserve it as its own node (spec.md §3, §4.9).
    CData(&'a str),
    PI(PI<'a>),
    Comment(&'a str),
}

impl<'a> XmlEvent<'a> {
    pub fn stag(name: &'a str, empty: bool) -> Self {
        XmlEvent::STag(STag { name, empty })
    }

    pub fn etag(name: &'a str) -> Self {
        XmlEvent::ETag(ETag { name })
    }

    pub fn characters(text: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        XmlEvent::Characters(text.into())
    }

    pub fn cdata(text: &'a str) -> Self {
        XmlEvent::CData(text)
    }

    pub fn comment(text: &'a str) -> Self {
        XmlEvent::Comment(text)
    }

    pub fn pi(target: &'a str, data: Option<&'a str>) -> Self {
        XmlEvent::PI(PI(target, data))
    }

    pub fn decl(version: &'a str, encoding: Option<&'a str>, standalone: Option<bool>) -> Self {
        XmlEvent::XmlDecl(XmlDecl {
            version,
            encoding,
            standalone,
        })
    }
}

/// What [`XmlError::Expected`] was looking for when input ran out.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum XmlErrorAtom {
    XmlDecl,
    Comment,
    PI,
    Element,
    Whitespace,
}

impl fmt::Display for XmlErrorAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            XmlErrorAtom::XmlDecl => "XML declaration",
            XmlErrorAtom::Comment => "comment",
            XmlErrorAtom::PI => "processing instruction",
            XmlErrorAtom::Element => "element",
            XmlErrorAtom::Whitespace => "whitespace",
        };
        f.write_str(s)
    }
}

/// All ways parsing can fail, from both the tokenizer and the grammar layer
/// that sits on top of it.
#[derive(Debug, Error)]
pub enum XmlError {
    #[error("expected {0}")]
    ExpectToken(&'static str),
    #[error("one of {0:?} expected")]
    Expected(Box<[XmlErrorAtom]>),
    #[error("illegal character {0:?}")]
    IllegalChar(char),
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("expected whitespace")]
    ExpectedWhitespace,
    #[error("illegal name start character {0:?}")]
    IllegalNameStartChar(char),
    #[error("expected attribute value")]
    ExpectedAttrValue,
    #[error("unknown entity {0:?}")]
    UnknownEntity(String),
    #[error("expected '='")]
    ExpectedEquals,
    #[error("'--' is not allowed inside a comment")]
    CommentColonColon,
    #[error("invalid processing instruction target")]
    InvalidPITarget,
    #[error("illegal attribute value: {0}")]
    IllegalAttributeValue(&'static str),
    #[error("invalid character reference: {0}")]
    InvalidCharacterReference(String),
    #[error("unsupported encoding {0:?}")]
    UnsupportedEncoding(String),
    #[error("unsupported XML version {0:?}")]
    UnsupportedVersion(String),
    #[error("expected start of an element")]
    ExpectedElementStart,
    #[error("unexpected end of input with open element")]
    OpenElementAtEof,
    #[error("expected end of document")]
    ExpectedDocumentEnd,
    #[error("expected end of element")]
    ExpectedElementEnd,
    #[error("attribute {attribute:?} given twice")]
    NonUniqueAttribute { attribute: String },
    #[error("expected closing tag for {expected_name:?}")]
    WrongETagName { expected_name: String },
    #[error("end tag without matching start tag")]
    ETagAfterRootElement,
    #[error("unexpected character {0:?}")]
    UnexpectedCharacter(char),
    #[error("']]>' is not allowed in character content")]
    CDataEndInContent,
    #[error("illegal name {name:?}")]
    IllegalName { name: String },
    #[error("illegal character or entity reference")]
    IllegalReference,
    #[error("grammar error: {0}")]
    GrammarError(#[from] xrs_dtd::DtdError),
    #[error("']]>' is not a legal CDATA section terminator here")]
    IllegalCDataSectionEnd,
    #[error("invalid character {0:?}")]
    InvalidCharacter(char),
    #[error("illegal namespace URI {0:?}")]
    IllegalNamespaceUri(String),
    #[error("unknown namespace prefix {0:?}")]
    UnknownNamespacePrefix(String),
    #[error("I/O error: {0}")]
    Io(String),
}

impl PartialEq for XmlError {
    fn eq(&self, other: &Self) -> bool {
        format!("{:?}", self) == format!("{:?}", other)
    }
}

impl From<io::Error> for XmlError {
    fn from(err: io::Error) -> Self {
        XmlError::Io(err.to_string())
    }
}
