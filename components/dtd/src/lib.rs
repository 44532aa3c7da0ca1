//! DTD grammar parsing and validation.
//!
//! Covers the entity store (C3), the content-model engine (C4), the
//! attribute-declaration model (C5), the DTD markup parser (C6), and the
//! [`Grammar`] interface (C7) that the SAX parser validates against.

pub mod attlist;
pub mod content_model;
pub mod entity;
pub mod error;
pub mod grammar;
pub mod notation;
pub mod parser;

pub use attlist::{AttDecl, AttType, DefaultKind};
pub use content_model::{Cardinality, ContentModel, Particle, ParticleKind};
pub use entity::{EntityDecl, EntityStore, EntityValue};
pub use error::{DtdError, DtdErrorKind, DtdResult, Severity, WarningSink};
pub use grammar::{AttributeInfo, CompositeGrammar, DtdGrammar, Grammar, GrammarType, NoOpGrammar};
pub use notation::NotationDecl;
pub use parser::{DtdParser, ExternalSubsetLoader, NoExternalSubsets};
