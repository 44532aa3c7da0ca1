//! Namespace-aware wrapper around the DTD-capable [`crate::reader::Reader`].
//!
//! Resolves `xmlns`/`xmlns:prefix` declarations against a scope stack and
//! attaches the resulting namespace URI to every element and attribute
//! name, giving the `{localName, prefix?, namespaceURI?}` qualified name
//! from spec.md §3 to callers that need it (the grammar-validating
//! pipeline itself matches element/attribute names literally, per
//! spec.md §4.6/§4.7, and does not require this layer).

use std::fmt;
use std::rc::Rc;

use crate::reader::dtd::DocTypeDecl;
use crate::{XmlDecl, XmlError, PI};

pub mod parser;
pub mod stack;

pub use parser::NsReader;

pub const XML_URI: &str = "http://www.w3.org/XML/1998/namespace";
pub const XMLNS_URI: &str = "http://www.w3.org/2000/xmlns/";

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct QName<'a> {
    prefix: Option<&'a str>,
    local_part: &'a str,
}

impl<'a> QName<'a> {
    pub fn new(prefix: Option<&'a str>, local_part: &'a str) -> Self {
        QName { prefix, local_part }
    }

    pub fn from_str(input: &'a str) -> Result<Self, XmlError> {
        if let Some((prefix, local)) = input.split_once(':') {
            if local.as_bytes().contains(&b':') {
                return Err(XmlError::IllegalName {
                    name: input.to_string(),
                });
            }
            Ok(QName {
                prefix: Some(prefix),
                local_part: local,
            })
        } else {
            Ok(QName {
                prefix: None,
                local_part: input,
            })
        }
    }

    pub fn prefix(&self) -> Option<&'a str> {
        self.prefix
    }

    pub fn local_part(&self) -> &'a str {
        self.local_part
    }
}

impl<'a> fmt::Display for QName<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = self.prefix {
            write!(f, "{}:{}", prefix, self.local_part)
        } else {
            f.write_str(self.local_part)
        }
    }
}

/// A resolved namespace URI, cheaply clonable and shared across the scopes
/// that declare it.
#[derive(Clone, PartialEq)]
pub struct Namespace(Rc<str>);

impl Namespace {
    pub fn new(uri: impl Into<String>) -> Self {
        Namespace(uri.into().into_boxed_str().into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Namespace").field(&self.0).finish()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NsSTag<'a> {
    qname: QName<'a>,
    namespace: Option<Namespace>,
    empty: bool,
}

impl<'a> NsSTag<'a> {
    pub fn qname(&self) -> QName<'a> {
        self.qname
    }

    pub fn namespace(&self) -> Option<&Namespace> {
        self.namespace.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }
}

#[derive(Clone, PartialEq)]
pub struct NsAttribute<'a> {
    qname: QName<'a>,
    namespace: Option<Namespace>,
    raw_value: &'a str,
}

impl<'a> NsAttribute<'a> {
    pub fn new(qname: QName<'a>, namespace: Option<Namespace>, raw_value: &'a str) -> Self {
        Self {
            qname,
            namespace,
            raw_value,
        }
    }

    pub fn raw_value(&self) -> &'a str {
        self.raw_value
    }

    pub fn qname(&self) -> QName<'a> {
        self.qname
    }

    pub fn namespace(&self) -> Option<&Namespace> {
        self.namespace.as_ref()
    }
}

impl<'a> fmt::Debug for NsAttribute<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NsAttribute")
            .field("name", &self.qname)
            .field("namespace", &self.namespace)
            .field("value", &self.raw_value)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NsETag<'a> {
    qname: QName<'a>,
    namespace: Option<Namespace>,
}

impl<'a> NsETag<'a> {
    pub fn qname(&self) -> QName<'a> {
        self.qname
    }

    pub fn namespace(&self) -> Option<&Namespace> {
        self.namespace.as_ref()
    }
}

/// XML event with resolved namespaces.
#[derive(Clone, Debug, PartialEq)]
pub enum XmlNsEvent<'a> {
    XmlDecl(XmlDecl<'a>),
    Dtd(DocTypeDecl<'a>),
    STag(NsSTag<'a>),
    ETag(NsETag<'a>),
    Characters(std::borrow::Cow<'a, str>),
    CData(&'a str),
    PI(PI<'a>),
    Comment(&'a str),
}
