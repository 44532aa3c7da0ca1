//! Grammar-validating driver over [`Reader`] (spec.md §4.8, C7/C8).
//!
//! [`Reader`] on its own only tokenizes well-formed XML; it hands back a
//! parsed [`crate::reader::dtd::DocTypeDecl`] verbatim and leaves attribute
//! values unexpanded. [`ValidatingReader`] is the layer that turns that
//! DOCTYPE into a [`Grammar`], uses it to expand general entity references,
//! default missing attributes, validate element content and attribute
//! lists, and track ID/IDREF uniqueness across the document.

use std::borrow::Cow;
use std::collections::HashSet;

use xrs_catalog::Catalog;
use xrs_dtd::grammar::demote_to_warnings;
use xrs_dtd::{
    AttType, DtdError, DtdErrorKind, DtdParser, ExternalSubsetLoader, Grammar, GrammarType,
    NoOpGrammar, Severity, WarningSink,
};

use crate::reader::dtd::{DocTypeDecl, ExternalId};
use crate::reader::{expand_attr_value, EntityStrValueResolver, Reader};
use crate::{Attribute, XmlDecl, XmlError, XmlEvent, PI};

/// Knobs spec.md §4.8 leaves to the caller: whether undeclared/invalid
/// content is fatal, whether defaulted attributes are synthesized, and how
/// external subsets and entities are located.
pub struct ParserConfig {
    pub validating: bool,
    pub include_defaults: bool,
    pub catalog: Option<Catalog>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            validating: false,
            include_defaults: true,
            catalog: None,
        }
    }
}

/// Resolves `SYSTEM`/`PUBLIC` identifiers of an external DTD subset through
/// an optional catalog, then reads the result off the filesystem. Catalog
/// misses and relative system identifiers both fall back to reading
/// `system_id` directly, mirroring how most non-network XML processors
/// resolve external subsets in practice.
struct FsExternalSubsetLoader {
    catalog: Option<Catalog>,
}

impl ExternalSubsetLoader for FsExternalSubsetLoader {
    fn load(&self, public_id: Option<&str>, system_id: &str) -> Result<String, DtdError> {
        let path = self
            .catalog
            .as_ref()
            .and_then(|catalog| catalog.resolve(public_id, system_id))
            .unwrap_or_else(|| system_id.to_string());
        std::fs::read_to_string(&path)
            .map_err(|err| DtdError::fatal(DtdErrorKind::Io(err.to_string())))
    }
}

/// A resolved, defaulted attribute as handed to the caller by
/// [`ValidatingReader`].
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedAttribute<'a> {
    name: Cow<'a, str>,
    value: Cow<'a, str>,
}

impl<'a> ResolvedAttribute<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// [`XmlEvent`] with entity references expanded and attribute values
/// resolved against the current [`Grammar`].
#[derive(Clone, Debug, PartialEq)]
pub enum ValidatingEvent<'a> {
    XmlDecl(XmlDecl<'a>),
    Dtd(DocTypeDecl<'a>),
    STag { name: &'a str, empty: bool },
    ETag { name: &'a str },
    Characters(Cow<'a, str>),
    CData(&'a str),
    PI(PI<'a>),
    Comment(&'a str),
}

struct GrammarEntityResolver<'g> {
    grammar: &'g dyn Grammar,
}

impl<'a, 'g> EntityStrValueResolver<'a> for GrammarEntityResolver<'g> {
    fn resolve_entity(&self, name: &str) -> Result<Cow<'a, str>, XmlError> {
        match name {
            "amp" => Ok(Cow::Borrowed("&")),
            "lt" => Ok(Cow::Borrowed("<")),
            "gt" => Ok(Cow::Borrowed(">")),
            "apos" => Ok(Cow::Borrowed("'")),
            "quot" => Ok(Cow::Borrowed("\"")),
            _ => match self.grammar.resolve_entity(name) {
                Some(decl) if decl.is_unparsed() || decl.is_external() => {
                    Err(XmlError::UnknownEntity(name.to_string()))
                }
                Some(decl) => Ok(Cow::Owned(
                    decl.literal_value().unwrap_or_default().to_string(),
                )),
                None => Err(XmlError::UnknownEntity(name.to_string())),
            },
        }
    }
}

struct OpenElement {
    name: String,
    children: Vec<String>,
}

/// Drives a [`Reader`] through a grammar: builds a [`Grammar`] from any
/// DOCTYPE encountered, then uses it at every element boundary for
/// attribute defaulting/expansion, content and attribute validation, and
/// ID/IDREF bookkeeping (spec.md §4.4, §4.8).
pub struct ValidatingReader<'a> {
    reader: Reader<'a>,
    config: ParserConfig,
    grammar: Box<dyn Grammar>,
    warnings: WarningSink,
    stack: Vec<OpenElement>,
    declared_ids: HashSet<String>,
    pending_idrefs: HashSet<String>,
    resolved_attrs: Vec<ResolvedAttribute<'a>>,
    finished: bool,
}

impl<'a> ValidatingReader<'a> {
    pub fn new(input: &'a str, config: ParserConfig) -> Self {
        Self {
            reader: Reader::new(input),
            config,
            grammar: Box::new(NoOpGrammar),
            warnings: WarningSink::default(),
            stack: Vec::new(),
            declared_ids: HashSet::new(),
            pending_idrefs: HashSet::new(),
            resolved_attrs: Vec::with_capacity(4),
            finished: false,
        }
    }

    pub fn attributes(&self) -> &[ResolvedAttribute<'a>] {
        &self.resolved_attrs
    }

    pub fn warnings(&self) -> &[DtdError] {
        self.warnings.warnings()
    }

    pub fn grammar(&self) -> &dyn Grammar {
        self.grammar.as_ref()
    }

    fn report(&mut self, result: Result<(), Vec<DtdError>>) -> Result<(), XmlError> {
        if !self.config.validating {
            let _ = demote_to_warnings(result, &mut self.warnings);
            return Ok(());
        }
        match result {
            Ok(()) => Ok(()),
            Err(errors) => {
                let mut first_fatal = None;
                for error in errors {
                    if error.severity == Severity::Fatal && first_fatal.is_none() {
                        first_fatal = Some(error);
                    } else {
                        self.warnings.push(DtdError::warning(error.kind));
                    }
                }
                match first_fatal {
                    Some(error) => Err(XmlError::from(error)),
                    None => Ok(()),
                }
            }
        }
    }

    fn build_grammar(&mut self, decl: &DocTypeDecl<'a>) -> Result<(), XmlError> {
        let loader = FsExternalSubsetLoader {
            catalog: self.config.catalog.clone(),
        };
        let external_id = decl.external_id.as_ref().map(|id| match id {
            ExternalId::System { system_id } => (None, *system_id),
            ExternalId::Public {
                public_id,
                system_id,
            } => (Some(*public_id), *system_id),
        });

        let parser = DtdParser::new(&loader);
        match parser.parse(decl.internal_subset, external_id) {
            Ok(grammar) => {
                self.grammar = Box::new(grammar);
            }
            Err(error) if error.severity == Severity::Fatal && self.config.validating => {
                return Err(XmlError::from(error));
            }
            Err(error) => {
                let _ = demote_to_warnings(Err(vec![error]), &mut self.warnings);
                self.grammar = Box::new(NoOpGrammar);
            }
        }

        // Internal general entities are resolved as content text the same
        // way the predefined five are (spec.md §8 Scenario 3); external and
        // unparsed entities are left for `resolve_entity` to reject.
        for (name, value) in self.grammar.general_entities() {
            self.reader.register_entity(name, value);
        }

        Ok(())
    }

    fn resolve_attributes(
        &mut self,
        name: &str,
        raw: &[Attribute<'a>],
    ) -> Result<(), XmlError> {
        self.resolved_attrs.clear();
        let resolver = GrammarEntityResolver {
            grammar: self.grammar.as_ref(),
        };
        for attr in raw {
            let value = match expand_attr_value(attr.raw_value(), &resolver) {
                Ok(value) => value,
                Err(_) if !self.config.validating => {
                    log::warn!(
                        "attribute {:?} of <{}> contains an unresolvable entity reference, \
                         using its raw text",
                        attr.name(),
                        name
                    );
                    Cow::Borrowed(attr.raw_value())
                }
                Err(err) => return Err(err),
            };
            self.resolved_attrs.push(ResolvedAttribute {
                name: Cow::Borrowed(attr.name()),
                value,
            });
        }

        if self.config.include_defaults {
            let defaults = self.grammar.get_default_attributes(name);
            for (attr_name, info) in defaults {
                if self.resolved_attrs.iter().any(|a| a.name() == attr_name) {
                    continue;
                }
                if let Some(default_value) = info.default_value {
                    self.resolved_attrs.push(ResolvedAttribute {
                        name: Cow::Owned(attr_name),
                        value: Cow::Owned(default_value),
                    });
                }
            }
        }

        let attr_pairs: Vec<(&str, &str)> = self
            .resolved_attrs
            .iter()
            .map(|a| (a.name(), a.value()))
            .collect();
        let result = self.grammar.validate_attributes(name, &attr_pairs);
        self.report(result)?;

        self.track_ids(name)
    }

    fn track_ids(&mut self, element: &str) -> Result<(), XmlError> {
        let infos = self.grammar.get_element_attributes(element);
        let mut errors = Vec::new();
        for attr in &self.resolved_attrs {
            match infos.get(attr.name()).map(|info| &info.att_type) {
                Some(AttType::Id) => {
                    if !self.declared_ids.insert(attr.value().to_string()) {
                        errors.push(DtdError::fatal(DtdErrorKind::DuplicateId(
                            attr.value().to_string(),
                        )));
                    }
                }
                Some(AttType::IdRef) => {
                    self.pending_idrefs.insert(attr.value().to_string());
                }
                Some(AttType::IdRefs) => {
                    for token in attr.value().split_ascii_whitespace() {
                        self.pending_idrefs.insert(token.to_string());
                    }
                }
                _ => {}
            }
        }
        self.report(if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        })
    }

    fn check_idrefs(&mut self) -> Result<(), XmlError> {
        if self.grammar.get_grammar_type() == GrammarType::None {
            return Ok(());
        }
        let mut errors = Vec::new();
        for idref in &self.pending_idrefs {
            if !self.declared_ids.contains(idref) {
                errors.push(DtdError::fatal(DtdErrorKind::UnresolvedIdRef(
                    idref.clone(),
                )));
            }
        }
        self.report(if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        })
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<ValidatingEvent<'a>>, XmlError> {
        let event = match self.reader.next()? {
            Some(event) => event,
            None => {
                if !self.finished {
                    self.finished = true;
                    self.check_idrefs()?;
                }
                return Ok(None);
            }
        };

        match event {
            XmlEvent::XmlDecl(decl) => Ok(Some(ValidatingEvent::XmlDecl(decl))),
            XmlEvent::Dtd(decl) => {
                self.build_grammar(&decl)?;
                Ok(Some(ValidatingEvent::Dtd(decl)))
            }
            XmlEvent::PI(pi) => Ok(Some(ValidatingEvent::PI(pi))),
            XmlEvent::Comment(text) => Ok(Some(ValidatingEvent::Comment(text))),
            XmlEvent::Characters(text) => Ok(Some(ValidatingEvent::Characters(text))),
            XmlEvent::CData(text) => Ok(Some(ValidatingEvent::CData(text))),
            XmlEvent::STag(stag) => {
                let raw_attrs: Vec<Attribute<'a>> = self.reader.attributes().to_vec();
                self.resolve_attributes(stag.name(), &raw_attrs)?;

                if let Some(parent) = self.stack.last_mut() {
                    parent.children.push(stag.name().to_string());
                }
                self.stack.push(OpenElement {
                    name: stag.name().to_string(),
                    children: Vec::new(),
                });

                Ok(Some(ValidatingEvent::STag {
                    name: stag.name(),
                    empty: stag.is_empty(),
                }))
            }
            XmlEvent::ETag(etag) => {
                if let Some(element) = self.stack.pop() {
                    let children: Vec<&str> = element.children.iter().map(String::as_str).collect();
                    let result = self.grammar.validate_element(&element.name, &children);
                    self.report(result)?;
                }
                Ok(Some(ValidatingEvent::ETag { name: etag.name() }))
            }
        }
    }
}
