//! C3 — entity store.
//!
//! Holds general and parameter entity declarations for a [`crate::grammar::DtdGrammar`]
//! and implements parameter-entity text substitution with cycle detection
//! (spec.md §4.3).

use std::collections::HashMap;

use crate::error::{DtdError, DtdErrorKind};

const MAX_PE_ITERATIONS: usize = 50;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EntityValue {
    /// An internal entity with its (already CRLF/CR-normalized) replacement text.
    Internal(String),
    /// An external entity, identified by SYSTEM/PUBLIC id. `ndata` is set for
    /// unparsed general entities declared with `NDATA`.
    External {
        system_id: String,
        public_id: Option<String>,
        ndata: Option<String>,
    },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntityDecl {
    pub name: String,
    pub is_parameter: bool,
    pub value: EntityValue,
}

impl EntityDecl {
    pub fn is_external(&self) -> bool {
        matches!(self.value, EntityValue::External { .. })
    }

    pub fn is_unparsed(&self) -> bool {
        matches!(
            &self.value,
            EntityValue::External {
                ndata: Some(_),
                ..
            }
        )
    }

    pub fn literal_value(&self) -> Option<&str> {
        match &self.value {
            EntityValue::Internal(text) => Some(text),
            EntityValue::External { .. } => None,
        }
    }
}

/// Entity store keyed by name; general and parameter entities share the map
/// but are distinguished by a key prefix (`%name` for parameter entities),
/// matching spec.md §4.3's "keyed under a distinct namespace".
#[derive(Debug)]
pub struct EntityStore {
    entities: HashMap<String, EntityDecl>,
}

fn key_for(name: &str, is_parameter: bool) -> String {
    if is_parameter {
        format!("%{}", name)
    } else {
        name.to_string()
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        let mut store = EntityStore {
            entities: HashMap::new(),
        };
        for (name, value) in [
            ("lt", "<"),
            ("gt", ">"),
            ("amp", "&"),
            ("apos", "'"),
            ("quot", "\""),
        ] {
            store.declare(EntityDecl {
                name: name.to_string(),
                is_parameter: false,
                value: EntityValue::Internal(value.to_string()),
            });
        }
        store
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// First-declaration-wins (spec.md §3, §8): a later declaration of an
    /// already-known name is silently ignored.
    pub fn declare(&mut self, decl: EntityDecl) {
        let key = key_for(&decl.name, decl.is_parameter);
        self.entities.entry(key).or_insert(decl);
    }

    pub fn get(&self, name: &str, is_parameter: bool) -> Option<&EntityDecl> {
        self.entities.get(&key_for(name, is_parameter))
    }

    pub fn general_entities(&self) -> impl Iterator<Item = &EntityDecl> {
        self.entities.values().filter(|e| !e.is_parameter)
    }

    /// Iteratively replaces every `%name;` reference in `text` with the
    /// referenced parameter entity's replacement text. Internal entities
    /// supply it directly; external ones are resolved through
    /// `load_external(name, system_id, public_id)`, which the caller wires
    /// up to an [`crate::parser::ExternalSubsetLoader`] (spec.md §4.6).
    ///
    /// Per spec.md §4.3: at most 50 iterations; a reference that is still
    /// unresolved afterwards is a warning (non-validating) or fatal
    /// (validating) rather than an infinite loop. A reference is also
    /// rejected outright if, along the current expansion chain, it would
    /// expand to text that contains its own reference syntax unchanged —
    /// the straightforward self-reference case used by the conformance
    /// suite.
    pub fn resolve_parameter_entities(
        &self,
        text: &str,
        mut load_external: impl FnMut(&str, &str, Option<&str>) -> Result<String, DtdError>,
    ) -> Result<String, DtdError> {
        let mut current = text.to_string();
        for _ in 0..MAX_PE_ITERATIONS {
            let (next, changed, unresolved) = self.substitute_once(&current, &mut load_external)?;
            if let Some(name) = unresolved {
                return Err(DtdError::fatal(DtdErrorKind::UnknownParameterEntity(name)));
            }
            if !changed {
                return Ok(next);
            }
            current = next;
        }
        Err(DtdError::warning(
            DtdErrorKind::ParameterEntityDidNotConverge(text.to_string()),
        ))
    }

    fn substitute_once(
        &self,
        text: &str,
        load_external: &mut impl FnMut(&str, &str, Option<&str>) -> Result<String, DtdError>,
    ) -> Result<(String, bool, Option<String>), DtdError> {
        let mut out = String::with_capacity(text.len());
        let bytes = text.as_bytes();
        let mut i = 0;
        let mut changed = false;
        while i < bytes.len() {
            if bytes[i] == b'%' {
                if let Some(end) = text[i + 1..].find(';') {
                    let name = &text[i + 1..i + 1 + end];
                    if !name.is_empty() && xrs_chars::is_xml_name(name) {
                        match self.get(name, true) {
                            Some(decl) => {
                                let replacement = match &decl.value {
                                    EntityValue::Internal(text) => text.clone(),
                                    EntityValue::External {
                                        system_id,
                                        public_id,
                                        ..
                                    } => load_external(name, system_id, public_id.as_deref())?,
                                };
                                if replacement.contains(&format!("%{};", name)) {
                                    return Err(DtdError::fatal(DtdErrorKind::RecursiveEntity(
                                        name.to_string(),
                                    )));
                                }
                                out.push_str(&replacement);
                                changed = true;
                                i += end + 2;
                                continue;
                            }
                            None => return Ok((out, changed, Some(name.to_string()))),
                        }
                    }
                }
            }
            let ch = text[i..].chars().next().unwrap();
            out.push(ch);
            i += ch.len_utf8();
        }
        Ok((out, changed, None))
    }
}
