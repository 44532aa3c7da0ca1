//! C7 — the grammar interface shared by every validation backend, and
//! [`DtdGrammar`], the DTD implementation of it (spec.md §4.7).

use std::collections::HashMap;

use crate::attlist::{AttDecl, AttType, DefaultKind};
use crate::content_model::ContentModel;
use crate::entity::{EntityDecl, EntityStore};
use crate::error::{DtdError, DtdErrorKind, Severity, WarningSink};
use crate::notation::NotationDecl;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GrammarType {
    Dtd,
    RelaxNg,
    XmlSchema,
    None,
}

/// Read-only view of an attribute declaration, returned by
/// `get_element_attributes`/`get_default_attributes`.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeInfo {
    pub att_type: AttType,
    pub default_kind: DefaultKind,
    pub default_value: Option<String>,
}

impl From<&AttDecl> for AttributeInfo {
    fn from(decl: &AttDecl) -> Self {
        AttributeInfo {
            att_type: decl.att_type.clone(),
            default_kind: decl.default_kind,
            default_value: decl.default_value.clone(),
        }
    }
}

/// Outcome of `validate_element`/`validate_attributes`: `Ok(())` on success,
/// otherwise the collected validity errors. Whether these abort parsing is
/// decided by the caller (fatal in validating mode, warning otherwise, per
/// spec.md §7).
pub type ValidationResult = Result<(), Vec<DtdError>>;

/// Uniform validation/defaulting contract over every grammar flavor
/// (DTD, and — per spec.md §1 — scaffolding for RelaxNG/XML Schema).
pub trait Grammar {
    fn validate_element(&self, name: &str, children: &[&str]) -> ValidationResult;

    fn validate_attributes(&self, name: &str, attrs: &[(&str, &str)]) -> ValidationResult;

    fn get_element_attributes(&self, name: &str) -> HashMap<String, AttributeInfo>;

    /// Subset of `get_element_attributes` with a usable default value, used
    /// by the SAX parser for attribute defaulting.
    fn get_default_attributes(&self, name: &str) -> HashMap<String, AttributeInfo>;

    fn resolve_entity(&self, name: &str) -> Option<&EntityDecl>;

    fn get_grammar_type(&self) -> GrammarType;

    fn get_target_namespace(&self) -> Option<&str>;

    fn get_namespace_declarations(&self) -> &[(String, String)];

    /// Internal general entities declared by this grammar, as
    /// `(name, replacement text)` pairs, for feeding into the reader's
    /// content-text entity table (spec.md §8 Scenario 3). Externally
    /// declared and unparsed entities are omitted — they have no literal
    /// replacement text to register.
    fn general_entities(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Returns success for everything; used in non-validating mode when no
/// grammar was supplied (spec.md §4.7).
#[derive(Default)]
pub struct NoOpGrammar;

impl Grammar for NoOpGrammar {
    fn validate_element(&self, _name: &str, _children: &[&str]) -> ValidationResult {
        Ok(())
    }

    fn validate_attributes(&self, _name: &str, _attrs: &[(&str, &str)]) -> ValidationResult {
        Ok(())
    }

    fn get_element_attributes(&self, _name: &str) -> HashMap<String, AttributeInfo> {
        HashMap::new()
    }

    fn get_default_attributes(&self, _name: &str) -> HashMap<String, AttributeInfo> {
        HashMap::new()
    }

    fn resolve_entity(&self, _name: &str) -> Option<&EntityDecl> {
        None
    }

    fn get_grammar_type(&self) -> GrammarType {
        GrammarType::None
    }

    fn get_target_namespace(&self) -> Option<&str> {
        None
    }

    fn get_namespace_declarations(&self) -> &[(String, String)] {
        &[]
    }
}

pub struct ElementDecl {
    pub name: String,
    /// The as-declared, parameter-entity-expanded contentspec text.
    /// Parsed into `model` lazily by `DtdGrammar::process_models`
    /// (spec.md §4.6).
    pub raw_content_spec: String,
    pub model: Option<ContentModel>,
}

/// The DTD implementation of [`Grammar`] (spec.md §3 "DTDGrammar").
///
/// Four mappings keyed by name: element declarations, per-element
/// attribute declarations, entities (held in `entities`, a single
/// [`EntityStore`] keeping both flavors under distinct keys), and
/// notations. First declaration wins on every conflict.
#[derive(Default)]
pub struct DtdGrammar {
    pub(crate) elements: HashMap<String, ElementDecl>,
    pub(crate) attlists: HashMap<String, Vec<AttDecl>>,
    pub entities: EntityStore,
    pub(crate) notations: HashMap<String, NotationDecl>,
}

impl DtdGrammar {
    pub fn new() -> Self {
        Self {
            elements: HashMap::new(),
            attlists: HashMap::new(),
            entities: EntityStore::new(),
            notations: HashMap::new(),
        }
    }

    /// First-declaration-wins (spec.md §3, §8).
    pub fn declare_element(&mut self, name: String, content_spec: String) {
        self.elements.entry(name.clone()).or_insert(ElementDecl {
            name,
            raw_content_spec: content_spec,
            model: None,
        });
    }

    /// Merges an ATTLIST's attribute declarations, first-declaration-wins
    /// per attribute name (spec.md §4.6).
    pub fn declare_attlist(&mut self, element: &str, mut decls: Vec<AttDecl>) {
        let entry = self.attlists.entry(element.to_string()).or_default();
        for decl in decls.drain(..) {
            if !entry.iter().any(|existing| existing.name == decl.name) {
                entry.push(decl);
            }
        }
    }

    pub fn declare_notation(&mut self, decl: NotationDecl) {
        self.notations.entry(decl.name.clone()).or_insert(decl);
    }

    pub fn is_element_declared(&self, name: &str) -> bool {
        self.elements.contains_key(name)
    }

    pub fn is_notation_declared(&self, name: &str) -> bool {
        self.notations.contains_key(name)
    }

    /// Parses every element's stored contentspec text into a
    /// [`ContentModel`], after the whole DTD (and thus every parameter
    /// entity) has been read (spec.md §4.6). Parse failures are collected
    /// rather than aborting, so a single malformed declaration does not
    /// prevent validating the rest of the document's elements.
    pub fn process_models(&mut self) -> Vec<DtdError> {
        let mut errors = Vec::new();
        let names: Vec<String> = self.elements.keys().cloned().collect();
        for name in names {
            let spec = self.elements[&name].raw_content_spec.clone();
            match ContentModel::parse(&name, &spec) {
                Ok(model) => {
                    self.elements.get_mut(&name).unwrap().model = Some(model);
                }
                Err(err) => errors.push(err),
            }
        }
        errors
    }

    fn attlist_for(&self, name: &str) -> Option<&AttDecl> {
        None.or_else(|| self.attlists.get(name)?.first())
    }

    fn attdecl<'a>(&'a self, element: &str, attr: &str) -> Option<&'a AttDecl> {
        self.attlists
            .get(element)?
            .iter()
            .find(|d| d.name == attr)
    }
}

impl Grammar for DtdGrammar {
    fn validate_element(&self, name: &str, children: &[&str]) -> ValidationResult {
        let Some(decl) = self.elements.get(name) else {
            return Err(vec![DtdError::fatal(DtdErrorKind::UndeclaredElement(
                name.to_string(),
            ))]);
        };
        let Some(model) = &decl.model else {
            // process_models() was never called, or parsing that model
            // failed earlier; treat as "no constraint" rather than panic.
            return Ok(());
        };
        model
            .validate(children)
            .map_err(|msg| vec![DtdError::fatal(DtdErrorKind::InvalidChildSequence(name.to_string(), msg))])
    }

    fn validate_attributes(&self, name: &str, attrs: &[(&str, &str)]) -> ValidationResult {
        let mut errors = Vec::new();
        let declared = self.attlists.get(name);

        for &(attr_name, raw_value) in attrs {
            if attr_name.starts_with("xml:") && self.attdecl(name, attr_name).is_none() {
                continue;
            }
            match self.attdecl(name, attr_name) {
                Some(decl) => {
                    let value = decl.normalize(raw_value);
                    if let Err(msg) = decl.validate_value(&value) {
                        errors.push(DtdError::fatal(DtdErrorKind::InvalidAttributeValue(
                            name.to_string(),
                            attr_name.to_string(),
                            value,
                            decl.att_type.name().to_string(),
                            msg,
                        )));
                    }
                    if let AttType::Notation(_) = &decl.att_type {
                        if !self.is_notation_declared(&value) {
                            errors.push(DtdError::fatal(DtdErrorKind::UndeclaredNotation(
                                value,
                                attr_name.to_string(),
                                name.to_string(),
                            )));
                        }
                    }
                    if decl.default_kind == DefaultKind::Fixed {
                        if let Some(fixed) = &decl.default_value {
                            if fixed != &value {
                                errors.push(DtdError::fatal(DtdErrorKind::FixedAttributeMismatch(
                                    name.to_string(),
                                    attr_name.to_string(),
                                    fixed.clone(),
                                    value,
                                )));
                            }
                        }
                    }
                }
                None => {
                    if declared.is_some() || self.is_element_declared(name) {
                        errors.push(DtdError::fatal(DtdErrorKind::UndeclaredAttribute(
                            name.to_string(),
                            attr_name.to_string(),
                        )));
                    }
                }
            }
        }

        if let Some(decls) = declared {
            for decl in decls {
                if decl.default_kind == DefaultKind::Required
                    && !attrs.iter().any(|&(n, _)| n == decl.name)
                {
                    errors.push(DtdError::fatal(DtdErrorKind::MissingRequiredAttribute(
                        name.to_string(),
                        decl.name.clone(),
                    )));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn get_element_attributes(&self, name: &str) -> HashMap<String, AttributeInfo> {
        self.attlists
            .get(name)
            .map(|decls| {
                decls
                    .iter()
                    .map(|d| (d.name.clone(), AttributeInfo::from(d)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn get_default_attributes(&self, name: &str) -> HashMap<String, AttributeInfo> {
        self.attlists
            .get(name)
            .map(|decls| {
                decls
                    .iter()
                    .filter(|d| d.has_usable_default())
                    .map(|d| (d.name.clone(), AttributeInfo::from(d)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn resolve_entity(&self, name: &str) -> Option<&EntityDecl> {
        self.entities.get(name, false)
    }

    fn get_grammar_type(&self) -> GrammarType {
        GrammarType::Dtd
    }

    fn get_target_namespace(&self) -> Option<&str> {
        None
    }

    fn get_namespace_declarations(&self) -> &[(String, String)] {
        &[]
    }

    fn general_entities(&self) -> Vec<(String, String)> {
        self.entities
            .general_entities()
            .filter_map(|decl| decl.literal_value().map(|v| (decl.name.clone(), v.to_string())))
            .collect()
    }
}

/// Dispatches to one of several grammars based on which declares the
/// element in question; the first grammar that declares it wins.
#[derive(Default)]
pub struct CompositeGrammar<'g> {
    grammars: Vec<&'g dyn Grammar>,
}

impl<'g> CompositeGrammar<'g> {
    pub fn new() -> Self {
        Self { grammars: Vec::new() }
    }

    pub fn add(&mut self, grammar: &'g dyn Grammar) {
        self.grammars.push(grammar);
    }

    fn owner_for(&self, name: &str) -> Option<&'g dyn Grammar> {
        self.grammars
            .iter()
            .find(|g| !g.get_element_attributes(name).is_empty() || g.validate_element(name, &[]).is_ok())
            .copied()
    }
}

impl<'g> Grammar for CompositeGrammar<'g> {
    fn validate_element(&self, name: &str, children: &[&str]) -> ValidationResult {
        match self.owner_for(name) {
            Some(g) => g.validate_element(name, children),
            None => Err(vec![DtdError::fatal(DtdErrorKind::UndeclaredElement(
                name.to_string(),
            ))]),
        }
    }

    fn validate_attributes(&self, name: &str, attrs: &[(&str, &str)]) -> ValidationResult {
        match self.owner_for(name) {
            Some(g) => g.validate_attributes(name, attrs),
            None => Ok(()),
        }
    }

    fn get_element_attributes(&self, name: &str) -> HashMap<String, AttributeInfo> {
        self.owner_for(name)
            .map(|g| g.get_element_attributes(name))
            .unwrap_or_default()
    }

    fn get_default_attributes(&self, name: &str) -> HashMap<String, AttributeInfo> {
        self.owner_for(name)
            .map(|g| g.get_default_attributes(name))
            .unwrap_or_default()
    }

    fn resolve_entity(&self, name: &str) -> Option<&EntityDecl> {
        self.grammars.iter().find_map(|g| g.resolve_entity(name))
    }

    fn get_grammar_type(&self) -> GrammarType {
        GrammarType::Dtd
    }

    fn get_target_namespace(&self) -> Option<&str> {
        None
    }

    fn get_namespace_declarations(&self) -> &[(String, String)] {
        &[]
    }

    fn general_entities(&self) -> Vec<(String, String)> {
        self.grammars
            .iter()
            .flat_map(|g| g.general_entities())
            .collect()
    }
}

/// Lets non-fatal validity problems (spec.md §7) be collected instead of
/// propagated, for non-validating-mode callers.
pub fn demote_to_warnings(result: ValidationResult, sink: &mut WarningSink) -> ValidationResult {
    match result {
        Ok(()) => Ok(()),
        Err(errors) => {
            for err in errors {
                sink.push(DtdError {
                    severity: Severity::Warning,
                    ..err
                });
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attlist::AttType;

    fn grammar_with_p() -> DtdGrammar {
        let mut g = DtdGrammar::new();
        g.declare_element("p".into(), "(#PCDATA|b)*".into());
        g.declare_attlist(
            "p",
            vec![AttDecl {
                name: "id".into(),
                att_type: AttType::Id,
                default_kind: DefaultKind::Required,
                default_value: None,
            }],
        );
        g.process_models();
        g
    }

    #[test]
    fn validates_children_against_content_model() {
        let g = grammar_with_p();
        assert!(g.validate_element("p", &["b"]).is_ok());
        assert!(g.validate_element("x", &[]).is_err());
    }

    #[test]
    fn required_attribute_enforced() {
        let g = grammar_with_p();
        assert!(g
            .validate_attributes("p", &[("id", "x1")])
            .is_ok());
        assert!(g.validate_attributes("p", &[]).is_err());
    }

    #[test]
    fn undeclared_xml_namespace_attributes_are_exempt_from_declaration_checks() {
        let g = grammar_with_p();
        assert!(g
            .validate_attributes("p", &[("id", "x1"), ("xml:id", "y1"), ("xml:lang", "en")])
            .is_ok());
    }

    #[test]
    fn invalid_attribute_value_error_carries_the_descriptive_message() {
        let mut g = DtdGrammar::new();
        g.declare_element("x".into(), "EMPTY".into());
        g.declare_attlist(
            "x",
            vec![AttDecl {
                name: "n".into(),
                att_type: AttType::Nmtoken,
                default_kind: DefaultKind::Implied,
                default_value: None,
            }],
        );
        let err = g.validate_attributes("x", &[("n", "not valid")]);
        let errors = err.unwrap_err();
        let message = errors[0].kind.to_string();
        assert!(
            message.contains("is not a valid Nmtoken"),
            "expected the underlying validation message in {message:?}"
        );
    }

    #[test]
    fn general_entities_exposes_internal_declarations_only() {
        use crate::entity::{EntityDecl, EntityValue};

        let mut g = DtdGrammar::new();
        g.entities.declare(EntityDecl {
            name: "greet".into(),
            is_parameter: false,
            value: EntityValue::Internal("hello".into()),
        });
        g.entities.declare(EntityDecl {
            name: "logo".into(),
            is_parameter: false,
            value: EntityValue::External {
                system_id: "logo.png".into(),
                public_id: None,
                ndata: Some("PNG".into()),
            },
        });

        let entities = g.general_entities();
        assert!(entities.contains(&("greet".to_string(), "hello".to_string())));
        assert!(!entities.iter().any(|(name, _)| name == "logo"));
    }

    #[test]
    fn default_attributes_exclude_required_and_implied() {
        let mut g = DtdGrammar::new();
        g.declare_element("x".into(), "EMPTY".into());
        g.declare_attlist(
            "x",
            vec![
                AttDecl {
                    name: "t".into(),
                    att_type: AttType::Enumeration(vec!["a".into(), "b".into(), "c".into()]),
                    default_kind: DefaultKind::None,
                    default_value: Some("b".into()),
                },
                AttDecl {
                    name: "u".into(),
                    att_type: AttType::CData,
                    default_kind: DefaultKind::Implied,
                    default_value: None,
                },
            ],
        );
        let defaults = g.get_default_attributes("x");
        assert!(defaults.contains_key("t"));
        assert!(!defaults.contains_key("u"));
        let attrs = g.get_element_attributes("x");
        for key in defaults.keys() {
            assert!(attrs.contains_key(key));
        }
    }

    #[test]
    fn first_declared_attlist_wins() {
        let mut g = DtdGrammar::new();
        g.declare_element("x".into(), "EMPTY".into());
        g.declare_attlist(
            "x",
            vec![AttDecl {
                name: "t".into(),
                att_type: AttType::CData,
                default_kind: DefaultKind::Implied,
                default_value: Some("first".into()),
            }],
        );
        g.declare_attlist(
            "x",
            vec![AttDecl {
                name: "t".into(),
                att_type: AttType::CData,
                default_kind: DefaultKind::Implied,
                default_value: Some("second".into()),
            }],
        );
        assert_eq!(
            g.get_element_attributes("x").get("t").unwrap().default_value,
            Some("first".into())
        );
    }
}
