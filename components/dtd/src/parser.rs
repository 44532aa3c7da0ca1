//! C6 — the DTD markup parser (spec.md §3, §4.6).
//!
//! Reads `doctypedecl` internal-subset text (and, via an injected loader,
//! external subset text) and populates a [`DtdGrammar`]. Declaration order
//! within a subset is "first wins"; the internal subset is always read
//! before the external one, so an internal declaration shadows an external
//! declaration of the same name (spec.md §4.6, §8).

use std::collections::HashMap;

use crate::attlist::{AttDecl, AttType, DefaultKind};
use crate::entity::{EntityDecl, EntityValue};
use crate::error::{DtdError, DtdErrorKind, Severity, WarningSink};
use crate::grammar::DtdGrammar;
use crate::notation::NotationDecl;

/// Resolves an external identifier (`SYSTEM`/`PUBLIC`) to the subset text it
/// names. Kept as a trait rather than direct filesystem access so the
/// catalog resolution and the character-source loading stay narrow,
/// injectable interfaces (spec.md §1, §4.1, §4.2).
pub trait ExternalSubsetLoader {
    fn load(&self, public_id: Option<&str>, system_id: &str) -> Result<String, DtdError>;
}

/// A loader that always fails; used when external subsets are not being
/// resolved (e.g. non-validating parsing without network/filesystem access).
pub struct NoExternalSubsets;

impl ExternalSubsetLoader for NoExternalSubsets {
    fn load(&self, _public_id: Option<&str>, system_id: &str) -> Result<String, DtdError> {
        Err(DtdError::warning(DtdErrorKind::UnresolvedExternalEntity(
            system_id.to_string(),
        )))
    }
}

pub struct DtdParser<'a, L: ExternalSubsetLoader> {
    grammar: DtdGrammar,
    loader: &'a L,
    warnings: WarningSink,
    /// Text already loaded for an externally declared parameter entity,
    /// keyed by entity name, so a `%pe;` referenced more than once only
    /// triggers one `loader.load` call.
    loaded_external_pes: HashMap<String, String>,
}

impl<'a, L: ExternalSubsetLoader> DtdParser<'a, L> {
    pub fn new(loader: &'a L) -> Self {
        Self {
            grammar: DtdGrammar::new(),
            loader,
            warnings: WarningSink::default(),
            loaded_external_pes: HashMap::new(),
        }
    }

    pub fn warnings(&self) -> &[DtdError] {
        self.warnings.warnings()
    }

    /// Parses the internal subset (the text between `[` and `]` of a
    /// `doctypedecl`), then — if an external identifier is given — the
    /// external subset, and finally resolves every element's content model.
    /// Returns the populated grammar.
    pub fn parse(
        mut self,
        internal_subset: Option<&str>,
        external_id: Option<(Option<&str>, &str)>,
    ) -> Result<DtdGrammar, DtdError> {
        if let Some(text) = internal_subset {
            self.parse_subset(text)?;
        }
        if let Some((public_id, system_id)) = external_id {
            match self.loader.load(public_id, system_id) {
                Ok(text) => self.parse_subset(&text)?,
                Err(err) => self.warnings.push(err),
            }
        }
        for err in self.grammar.process_models() {
            self.warnings.push(err);
        }
        Ok(self.grammar)
    }

    fn parse_subset(&mut self, text: &str) -> Result<(), DtdError> {
        let mut cursor = Subset { text, pos: 0 };
        loop {
            cursor.skip_ws_and_comments();
            if cursor.rest().is_empty() {
                break;
            }
            if cursor.rest().starts_with("<!ELEMENT") {
                self.parse_element_decl(&mut cursor)?;
            } else if cursor.rest().starts_with("<!ATTLIST") {
                self.parse_attlist_decl(&mut cursor)?;
            } else if cursor.rest().starts_with("<!ENTITY") {
                self.parse_entity_decl(&mut cursor)?;
            } else if cursor.rest().starts_with("<!NOTATION") {
                self.parse_notation_decl(&mut cursor)?;
            } else if cursor.rest().starts_with("<?") {
                cursor.skip_pi();
            } else if cursor.rest().starts_with("<![") {
                self.parse_conditional_section(&mut cursor)?;
            } else if cursor.rest().starts_with('%') {
                self.parse_pe_reference_in_subset(&mut cursor)?;
            } else {
                return Err(DtdError::fatal(DtdErrorKind::Expected(
                    "a markup declaration",
                )));
            }
        }
        Ok(())
    }

    /// Expands every `%name;` reference in `text`. An externally declared
    /// parameter entity is loaded via `self.loader` on first reference and
    /// cached — a recursive sub-parse merged into this grammar's text,
    /// per spec.md §4.6 — rather than aborting as unresolved.
    fn expand(&mut self, text: &str) -> Result<String, DtdError> {
        let loader = self.loader;
        let cache = &mut self.loaded_external_pes;
        let entities = &self.grammar.entities;
        let result = entities.resolve_parameter_entities(text, |name, system_id, public_id| {
            if let Some(cached) = cache.get(name) {
                return Ok(cached.clone());
            }
            let loaded = loader.load(public_id, system_id)?;
            cache.insert(name.to_string(), loaded.clone());
            Ok(loaded)
        });
        match result {
            Ok(expanded) => Ok(expanded),
            Err(err) if err.severity == Severity::Warning => {
                self.warnings.push(err);
                Ok(text.to_string())
            }
            Err(err) => Err(err),
        }
    }

    fn parse_element_decl(&mut self, cursor: &mut Subset) -> Result<(), DtdError> {
        cursor.advance("<!ELEMENT".len());
        cursor.skip_required_ws()?;
        let name = self.expand(cursor.take_name()?)?;
        cursor.skip_required_ws()?;
        let spec_text = cursor.take_until_decl_close()?;
        let expanded = self.expand(&spec_text)?;
        self.grammar.declare_element(name, expanded);
        Ok(())
    }

    fn parse_attlist_decl(&mut self, cursor: &mut Subset) -> Result<(), DtdError> {
        cursor.advance("<!ATTLIST".len());
        cursor.skip_required_ws()?;
        let element = self.expand(cursor.take_name()?)?;
        let body = cursor.take_until_decl_close()?;
        let body = self.expand(&body)?;
        let decls = parse_attdefs(&body)?;
        self.grammar.declare_attlist(&element, decls);
        Ok(())
    }

    fn parse_entity_decl(&mut self, cursor: &mut Subset) -> Result<(), DtdError> {
        cursor.advance("<!ENTITY".len());
        cursor.skip_required_ws()?;
        let is_parameter = cursor.rest().starts_with('%');
        if is_parameter {
            cursor.advance(1);
            cursor.skip_required_ws()?;
        }
        let name = cursor.take_name()?.to_string();
        cursor.skip_required_ws()?;
        let body = cursor.take_until_decl_close()?;
        let decl = parse_entity_value(&name, is_parameter, body.trim(), self)?;
        self.grammar.entities.declare(decl);
        Ok(())
    }

    fn parse_notation_decl(&mut self, cursor: &mut Subset) -> Result<(), DtdError> {
        cursor.advance("<!NOTATION".len());
        cursor.skip_required_ws()?;
        let name = self.expand(cursor.take_name()?)?;
        cursor.skip_required_ws()?;
        let body = cursor.take_until_decl_close()?;
        let (public_id, system_id) = parse_external_id(body.trim())?;
        self.grammar.declare_notation(NotationDecl {
            name,
            public_id,
            system_id,
        });
        Ok(())
    }

    /// `includeSect | ignoreSect`, spec.md §3 ("conditional sections").
    fn parse_conditional_section(&mut self, cursor: &mut Subset) -> Result<(), DtdError> {
        cursor.advance("<![".len());
        cursor.skip_ws_and_comments();
        let keyword_start = cursor.pos;
        let keyword = if cursor.rest().starts_with("INCLUDE") {
            cursor.advance("INCLUDE".len());
            "INCLUDE"
        } else if cursor.rest().starts_with("IGNORE") {
            cursor.advance("IGNORE".len());
            "IGNORE"
        } else if cursor.rest().starts_with('%') {
            let expanded = self.parse_pe_reference_value(cursor)?;
            if expanded.trim() == "INCLUDE" {
                "INCLUDE"
            } else if expanded.trim() == "IGNORE" {
                "IGNORE"
            } else {
                return Err(DtdError::fatal(DtdErrorKind::Expected(
                    "INCLUDE or IGNORE",
                )));
            }
        } else {
            return Err(DtdError::fatal(DtdErrorKind::Expected(
                "INCLUDE or IGNORE",
            )));
        };
        let _ = keyword_start;
        cursor.skip_ws_and_comments();
        cursor.expect_literal("[")?;
        let body = cursor.take_balanced_until("]]>")?;
        cursor.expect_literal("]]>")?;
        if keyword == "INCLUDE" {
            self.parse_subset(&body)?;
        }
        Ok(())
    }

    /// A bare `%pe;` reference used directly between declarations in a
    /// subset: expand it and parse the result as subset text (spec.md §4.3).
    fn parse_pe_reference_in_subset(&mut self, cursor: &mut Subset) -> Result<(), DtdError> {
        let expanded = self.parse_pe_reference_value(cursor)?;
        self.parse_subset(&expanded)
    }

    fn parse_pe_reference_value(&mut self, cursor: &mut Subset) -> Result<String, DtdError> {
        cursor.advance(1); // '%'
        let name = cursor.take_name()?.to_string();
        cursor.expect_literal(";")?;
        self.expand(&format!("%{};", name))
    }
}

fn parse_entity_value<L: ExternalSubsetLoader>(
    name: &str,
    is_parameter: bool,
    body: &str,
    parser: &mut DtdParser<'_, L>,
) -> Result<EntityDecl, DtdError> {
    if body.starts_with('"') || body.starts_with('\'') {
        let literal = take_quoted(body)?;
        let expanded = parser.expand(literal)?;
        let expanded = expand_char_refs(&expanded);
        return Ok(EntityDecl {
            name: name.to_string(),
            is_parameter,
            value: EntityValue::Internal(expanded),
        });
    }
    let (public_id, system_id) = parse_external_id(body)?;
    let rest = body.trim_start();
    let after_id = skip_external_id_tokens(rest);
    let ndata = after_id
        .trim_start()
        .strip_prefix("NDATA")
        .map(|r| r.trim().to_string());
    Ok(EntityDecl {
        name: name.to_string(),
        is_parameter,
        value: EntityValue::External {
            system_id: system_id.ok_or_else(|| {
                DtdError::fatal(DtdErrorKind::Expected("SYSTEM or PUBLIC literal"))
            })?,
            public_id,
            ndata,
        },
    })
}

fn expand_char_refs(text: &str) -> String {
    // Predefined-entity and numeric character references inside an entity's
    // literal value are resolved once, at declaration time (XML 1.0 §4.5):
    // only numeric character references (`&#NN;`/`&#xHH;`), since general
    // entity references are resolved lazily when the entity is used.
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'&' && text[i..].starts_with("&#") {
            if let Some(end) = text[i..].find(';') {
                let digits = &text[i + 2..i + end];
                let code = if let Some(hex) = digits.strip_prefix(['x', 'X']) {
                    u32::from_str_radix(hex, 16).ok()
                } else {
                    digits.parse::<u32>().ok()
                };
                if let Some(ch) = code.and_then(char::from_u32) {
                    out.push(ch);
                    i += end + 1;
                    continue;
                }
            }
        }
        let ch = text[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

fn take_quoted(s: &str) -> Result<&str, DtdError> {
    let quote = s.as_bytes()[0];
    let rest = &s[1..];
    let end = rest
        .find(quote as char)
        .ok_or_else(|| DtdError::fatal(DtdErrorKind::UnexpectedEof))?;
    Ok(&rest[..end])
}

fn parse_external_id(s: &str) -> Result<(Option<String>, Option<String>), DtdError> {
    let s = s.trim_start();
    if let Some(rest) = s.strip_prefix("PUBLIC") {
        let rest = rest.trim_start();
        let public_id = take_quoted(rest)?.to_string();
        let rest = &rest[public_id.len() + 2..];
        let rest = rest.trim_start();
        if rest.starts_with('"') || rest.starts_with('\'') {
            let system_id = take_quoted(rest)?.to_string();
            return Ok((Some(public_id), Some(system_id)));
        }
        return Ok((Some(public_id), None));
    }
    if let Some(rest) = s.strip_prefix("SYSTEM") {
        let rest = rest.trim_start();
        let system_id = take_quoted(rest)?.to_string();
        return Ok((None, Some(system_id)));
    }
    Ok((None, None))
}

fn skip_external_id_tokens(s: &str) -> &str {
    let s = s.trim_start();
    if let Some(rest) = s.strip_prefix("PUBLIC") {
        let rest = rest.trim_start();
        if let Ok(lit) = take_quoted(rest) {
            let rest = &rest[lit.len() + 2..];
            let rest = rest.trim_start();
            if rest.starts_with('"') || rest.starts_with('\'') {
                if let Ok(lit2) = take_quoted(rest) {
                    return &rest[lit2.len() + 2..];
                }
            }
            return rest;
        }
        return rest;
    }
    if let Some(rest) = s.strip_prefix("SYSTEM") {
        let rest = rest.trim_start();
        if let Ok(lit) = take_quoted(rest) {
            return &rest[lit.len() + 2..];
        }
        return rest;
    }
    s
}

/// Parses the `AttDef*` body of an `<!ATTLIST ...>` declaration.
fn parse_attdefs(body: &str) -> Result<Vec<AttDecl>, DtdError> {
    let mut decls = Vec::new();
    let mut rest = body;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        let name_end = rest
            .char_indices()
            .find(|&(_, c)| c.is_whitespace())
            .map(|(i, _)| i)
            .ok_or_else(|| DtdError::fatal(DtdErrorKind::ExpectedName))?;
        let name = rest[..name_end].to_string();
        if !xrs_chars::is_xml_name(&name) {
            return Err(DtdError::fatal(DtdErrorKind::IllegalName(name)));
        }
        rest = rest[name_end..].trim_start();
        let (att_type, after_type) = AttType::parse(rest)?;
        rest = after_type.trim_start();

        let (default_kind, default_value, after_default) = if let Some(r) = rest.strip_prefix("#REQUIRED") {
            (DefaultKind::Required, None, r)
        } else if let Some(r) = rest.strip_prefix("#IMPLIED") {
            (DefaultKind::Implied, None, r)
        } else if let Some(r) = rest.strip_prefix("#FIXED") {
            let r = r.trim_start();
            let literal = take_quoted(r)?.to_string();
            (DefaultKind::Fixed, Some(literal.clone()), &r[literal.len() + 2..])
        } else {
            let literal = take_quoted(rest)?.to_string();
            let after = &rest[literal.len() + 2..];
            (DefaultKind::None, Some(literal), after)
        };
        rest = after_default;

        decls.push(AttDecl {
            name,
            att_type,
            default_kind,
            default_value,
        });
    }
    Ok(decls)
}

struct Subset<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Subset<'a> {
    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            let skip = self.rest().len() - self.rest().trim_start().len();
            self.pos += skip;
            if self.rest().starts_with("<!--") {
                if let Some(end) = self.rest()[4..].find("-->") {
                    self.pos += 4 + end + 3;
                    continue;
                }
            }
            break;
        }
    }

    fn skip_pi(&mut self) {
        if let Some(end) = self.rest().find("?>") {
            self.pos += end + 2;
        } else {
            self.pos = self.text.len();
        }
    }

    fn skip_required_ws(&mut self) -> Result<(), DtdError> {
        let before = self.pos;
        self.skip_ws_and_comments();
        if self.pos == before {
            return Err(DtdError::fatal(DtdErrorKind::ExpectedWhitespace));
        }
        Ok(())
    }

    fn take_name(&mut self) -> Result<&'a str, DtdError> {
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|&(_, c)| c.is_whitespace() || "<>()[]%".contains(c))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if end == 0 || !xrs_chars::is_xml_name(&rest[..end]) {
            return Err(DtdError::fatal(DtdErrorKind::ExpectedName));
        }
        self.pos += end;
        Ok(&rest[..end])
    }

    fn expect_literal(&mut self, lit: &str) -> Result<(), DtdError> {
        if self.rest().starts_with(lit) {
            self.pos += lit.len();
            Ok(())
        } else {
            Err(DtdError::fatal(DtdErrorKind::Expected("a literal")))
        }
    }

    /// Reads up to (and consumes) the declaration-closing `>`, respecting
    /// quoted literals so a `>` inside a default attribute value doesn't end
    /// the declaration early.
    fn take_until_decl_close(&mut self) -> Result<String, DtdError> {
        let rest = self.rest();
        let mut depth = 0i32;
        let mut quote: Option<u8> = None;
        for (i, b) in rest.bytes().enumerate() {
            if let Some(q) = quote {
                if b == q {
                    quote = None;
                }
                continue;
            }
            match b {
                b'"' | b'\'' => quote = Some(b),
                b'(' => depth += 1,
                b')' => depth -= 1,
                b'>' if depth <= 0 => {
                    let body = rest[..i].trim_end().to_string();
                    self.pos += i + 1;
                    return Ok(body);
                }
                _ => {}
            }
        }
        Err(DtdError::fatal(DtdErrorKind::UnexpectedEof))
    }

    /// Reads up to (not including) `terminator`, tracking nested `<![...]]>`
    /// conditional sections so inner ones don't end the outer section early.
    fn take_balanced_until(&mut self, terminator: &str) -> Result<String, DtdError> {
        let rest = self.rest();
        let mut depth = 0i32;
        let mut i = 0;
        while i < rest.len() {
            if rest[i..].starts_with("<![") {
                depth += 1;
                i += 3;
                continue;
            }
            if rest[i..].starts_with(terminator) {
                if depth == 0 {
                    let body = rest[..i].to_string();
                    self.pos += i;
                    return Ok(body);
                }
                depth -= 1;
                i += terminator.len();
                continue;
            }
            i += 1;
        }
        Err(DtdError::fatal(DtdErrorKind::UnbalancedConditionalSection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(subset: &str) -> DtdGrammar {
        DtdParser::new(&NoExternalSubsets)
            .parse(Some(subset), None)
            .unwrap()
    }

    #[test]
    fn parses_element_and_attlist() {
        let g = parse(
            r#"
            <!ELEMENT p (#PCDATA|b)*>
            <!ATTLIST p id ID #REQUIRED class CDATA #IMPLIED>
            "#,
        );
        assert!(g.is_element_declared("p"));
        let attrs = g.get_element_attributes("p");
        assert!(attrs.contains_key("id"));
        assert!(attrs.contains_key("class"));
    }

    #[test]
    fn parses_general_and_parameter_entities() {
        let g = parse(
            r#"
            <!ENTITY % name "CDATA">
            <!ENTITY greet "hello">
            <!ELEMENT x EMPTY>
            <!ATTLIST x a %name; #IMPLIED>
            "#,
        );
        assert_eq!(
            g.entities.get("greet", false).unwrap().literal_value(),
            Some("hello")
        );
        let attrs = g.get_element_attributes("x");
        assert_eq!(attrs.get("a").unwrap().att_type.name(), "CDATA");
    }

    #[test]
    fn parses_notation_decl() {
        let g = parse(r#"<!NOTATION jpeg SYSTEM "image/jpeg">"#);
        assert!(g.is_notation_declared("jpeg"));
    }

    #[test]
    fn include_section_is_parsed_ignore_section_is_not() {
        let g = parse(
            r#"
            <![INCLUDE[
            <!ELEMENT a EMPTY>
            ]]>
            <![IGNORE[
            <!ELEMENT b EMPTY>
            ]]>
            "#,
        );
        assert!(g.is_element_declared("a"));
        assert!(!g.is_element_declared("b"));
    }

    #[test]
    fn first_declared_element_wins_across_subset() {
        let g = parse(
            r#"
            <!ELEMENT x EMPTY>
            <!ELEMENT x ANY>
            "#,
        );
        assert_eq!(g.elements.get("x").unwrap().raw_content_spec, "EMPTY");
    }

    #[test]
    fn greater_than_inside_attribute_default_does_not_close_declaration_early() {
        let g = parse(r#"<!ATTLIST x note CDATA "a > b">"#);
        let attrs = g.get_element_attributes("x");
        assert_eq!(
            attrs.get("note").unwrap().default_value.as_deref(),
            Some("a > b")
        );
    }

    #[test]
    fn ignore_section_skips_arbitrarily_nested_conditional_sections() {
        let g = parse(
            r#"
            <![IGNORE[
            <!ELEMENT a EMPTY>
            <![IGNORE[
            <!ELEMENT b EMPTY>
            <![INCLUDE[
            <!ELEMENT c EMPTY>
            ]]>
            ]]>
            <!ELEMENT d EMPTY>
            ]]>
            <!ELEMENT kept EMPTY>
            "#,
        );
        assert!(!g.is_element_declared("a"));
        assert!(!g.is_element_declared("b"));
        assert!(!g.is_element_declared("c"));
        assert!(!g.is_element_declared("d"));
        assert!(g.is_element_declared("kept"));
    }

    struct StaticLoader(&'static str);

    impl ExternalSubsetLoader for StaticLoader {
        fn load(&self, _public_id: Option<&str>, _system_id: &str) -> Result<String, DtdError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn external_parameter_entity_is_merged_via_the_loader() {
        let loader = StaticLoader("<!ELEMENT a EMPTY>");
        let g = DtdParser::new(&loader)
            .parse(
                Some(
                    r#"
                    <!ENTITY % pe SYSTEM "pe.dtd">
                    %pe;
                    "#,
                ),
                None,
            )
            .unwrap();
        assert!(g.is_element_declared("a"));
    }

    #[test]
    fn external_parameter_entity_referenced_inline_is_resolved_too() {
        let loader = StaticLoader("CDATA");
        let g = DtdParser::new(&loader)
            .parse(
                Some(
                    r#"
                    <!ENTITY % name SYSTEM "name.dtd">
                    <!ELEMENT x EMPTY>
                    <!ATTLIST x a %name; #IMPLIED>
                    "#,
                ),
                None,
            )
            .unwrap();
        let attrs = g.get_element_attributes("x");
        assert_eq!(attrs.get("a").unwrap().att_type.name(), "CDATA");
    }
}
