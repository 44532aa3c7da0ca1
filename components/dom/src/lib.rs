//! C9 — DOM builder content handler (spec.md §4.9).
//!
//! Consumes SAX events from [`xrs_parser::reader::Reader`] (well-formedness
//! only) or [`xrs_parser::validating::ValidatingReader`] (grammar-checked,
//! entity-expanded, attribute-defaulted) and assembles them into the
//! owned tree in [`node`]. Exists primarily as the tree view used by tests
//! and tooling built on top of the toolkit; nothing here is on the hot
//! path of the SAX parser itself.

mod builder;
mod error;
mod node;

pub use builder::{parse, parse_file, parse_file_validating, parse_validating};
pub use error::DomError;
pub use node::{Document, DocumentType, Element, XMLNode, XmlDeclaration};
