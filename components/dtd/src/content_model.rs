//! C4 — content-model AST, parser and matcher (spec.md §3, §4.4).

use xrs_chars::is_xml_name;

use crate::error::{DtdError, DtdErrorKind};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Cardinality {
    One,
    Optional,
    ZeroOrMore,
    OneOrMore,
}

impl Cardinality {
    fn min(self) -> usize {
        match self {
            Cardinality::One | Cardinality::OneOrMore => 1,
            Cardinality::Optional | Cardinality::ZeroOrMore => 0,
        }
    }

    fn allows_more(self) -> bool {
        matches!(self, Cardinality::ZeroOrMore | Cardinality::OneOrMore)
    }

    fn is_nullable(self) -> bool {
        self.min() == 0
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ParticleKind {
    Name(String),
    Sequence(Vec<Particle>),
    Choice(Vec<Particle>),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Particle {
    pub kind: ParticleKind,
    pub cardinality: Cardinality,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ContentModel {
    Empty,
    Any,
    /// `(#PCDATA|a|b)*` — `names` is empty for plain `(#PCDATA)`.
    Mixed(Vec<String>),
    Children(Particle),
}

impl ContentModel {
    /// Parses a `contentspec` string (the text between `<!ELEMENT name` and
    /// the closing `>`, already parameter-entity-expanded) into a
    /// [`ContentModel`]. Per spec.md §4.6 this happens lazily — the DTD
    /// parser collects raw content-spec text for every element and calls
    /// this once the whole DTD (and hence every parameter entity) has been
    /// read, so forward references to entities resolve correctly.
    pub fn parse(element: &str, spec: &str) -> Result<Self, DtdError> {
        let spec = spec.trim();
        if spec == "EMPTY" {
            return Ok(ContentModel::Empty);
        }
        if spec == "ANY" {
            return Ok(ContentModel::Any);
        }
        let mut p = ContentSpecParser {
            input: spec,
            pos: 0,
            element,
        };
        if p.peek_str("(#PCDATA") {
            return p.parse_mixed();
        }
        let particle = p.parse_children()?;
        p.skip_ws();
        if p.pos != p.input.len() {
            return Err(p.err("trailing characters after content model"));
        }
        Ok(ContentModel::Children(particle))
    }

    /// Validates a sequence of child element names against this model
    /// (spec.md §4.4). Attribute contents never affect the result.
    pub fn validate(&self, children: &[&str]) -> Result<(), String> {
        match self {
            ContentModel::Empty => {
                if children.is_empty() {
                    Ok(())
                } else {
                    Err(format!("EMPTY element has {} children", children.len()))
                }
            }
            ContentModel::Any => Ok(()),
            ContentModel::Mixed(names) => {
                for (i, child) in children.iter().enumerate() {
                    if !names.iter().any(|n| n == child) {
                        return Err(format!(
                            "child '{}' at position {} is not declared in mixed content",
                            child, i
                        ));
                    }
                }
                Ok(())
            }
            ContentModel::Children(particle) => {
                let mut pos = 0;
                if !match_particle(particle, children, &mut pos) {
                    return Err(format!(
                        "child sequence does not match content model at position {}",
                        pos
                    ));
                }
                if pos != children.len() {
                    return Err(format!(
                        "unmatched trailing children starting at position {}",
                        pos
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Greedy, first-alternative-wins NFA-style walker (spec.md §4.4): sufficient
/// for the deterministic content models the DTD grammar requires. Advances
/// `pos` past every child consumed by `particle`; returns whether the
/// particle (including its cardinality) matched starting at `pos`.
fn match_particle(particle: &Particle, children: &[&str], pos: &mut usize) -> bool {
    let mut count = 0;
    loop {
        let before = *pos;
        if !match_particle_once(&particle.kind, children, pos) {
            break;
        }
        count += 1;
        if *pos == before {
            // nullable particle matched without consuming input: stop to
            // avoid looping forever (spec.md §4.4).
            break;
        }
        if !particle.cardinality.allows_more() {
            break;
        }
    }
    count >= particle.cardinality.min()
}

fn match_particle_once(kind: &ParticleKind, children: &[&str], pos: &mut usize) -> bool {
    match kind {
        ParticleKind::Name(name) => {
            if children.get(*pos) == Some(&name.as_str()) {
                *pos += 1;
                true
            } else {
                false
            }
        }
        ParticleKind::Sequence(parts) => {
            let start = *pos;
            for part in parts {
                if !match_particle(part, children, pos) {
                    *pos = start;
                    return false;
                }
            }
            true
        }
        ParticleKind::Choice(parts) => {
            for part in parts {
                let save = *pos;
                if match_particle(part, children, pos) {
                    return true;
                }
                *pos = save;
            }
            false
        }
    }
}

struct ContentSpecParser<'a> {
    input: &'a str,
    pos: usize,
    element: &'a str,
}

impl<'a> ContentSpecParser<'a> {
    fn err(&self, msg: &str) -> DtdError {
        DtdError::fatal(DtdErrorKind::InvalidContentSpec(
            self.element.to_string(),
            msg.to_string(),
        ))
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek_str(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn skip_ws(&mut self) {
        let skip = self.rest().len() - self.rest().trim_start().len();
        self.pos += skip;
    }

    fn expect_byte(&mut self, b: u8) -> Result<(), DtdError> {
        if self.rest().as_bytes().first() == Some(&b) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.err(&format!("expected '{}'", b as char)))
        }
    }

    fn parse_mixed(&mut self) -> Result<ContentModel, DtdError> {
        self.pos += "(#PCDATA".len();
        self.skip_ws();
        let mut names = Vec::new();
        loop {
            self.skip_ws();
            if self.peek_str(")") {
                self.pos += 1;
                if names.is_empty() {
                    // '(#PCDATA)' with no trailing '*' is allowed only with no siblings.
                    if self.peek_str("*") {
                        self.pos += 1;
                    }
                    return Ok(ContentModel::Mixed(names));
                }
                if !self.peek_str("*") {
                    return Err(DtdError::fatal(DtdErrorKind::MixedContentMustRepeat(
                        self.element.to_string(),
                    )));
                }
                self.pos += 1;
                return Ok(ContentModel::Mixed(names));
            }
            self.expect_byte(b'|')?;
            self.skip_ws();
            let name = self.parse_name()?;
            names.push(name);
        }
    }

    fn parse_name(&mut self) -> Result<String, DtdError> {
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|&(_, c)| !c.is_alphanumeric() && !"._-:".contains(c))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if end == 0 || !is_xml_name(&rest[..end]) {
            return Err(self.err("expected a name"));
        }
        self.pos += end;
        Ok(rest[..end].to_string())
    }

    fn parse_cardinality(&mut self) -> Cardinality {
        match self.rest().as_bytes().first() {
            Some(b'?') => {
                self.pos += 1;
                Cardinality::Optional
            }
            Some(b'*') => {
                self.pos += 1;
                Cardinality::ZeroOrMore
            }
            Some(b'+') => {
                self.pos += 1;
                Cardinality::OneOrMore
            }
            _ => Cardinality::One,
        }
    }

    /// `children ::= (choice | seq) ('?' | '*' | '+')?`
    fn parse_children(&mut self) -> Result<Particle, DtdError> {
        self.skip_ws();
        self.expect_byte(b'(')?;
        let mut items = vec![self.parse_cp()?];
        self.skip_ws();
        let mut separator: Option<u8> = None;
        loop {
            match self.rest().as_bytes().first() {
                Some(b',') | Some(b'|') => {
                    let sep = self.rest().as_bytes()[0];
                    if let Some(prev) = separator {
                        if prev != sep {
                            return Err(DtdError::fatal(DtdErrorKind::MixedSeparators));
                        }
                    }
                    separator = Some(sep);
                    self.pos += 1;
                    self.skip_ws();
                    items.push(self.parse_cp()?);
                    self.skip_ws();
                }
                Some(b')') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(self.err("expected ',', '|' or ')'")),
            }
        }
        let cardinality = self.parse_cardinality();
        let kind = if items.len() == 1 {
            items.pop().unwrap().kind
        } else if separator == Some(b'|') {
            ParticleKind::Choice(items)
        } else {
            ParticleKind::Sequence(items)
        };
        Ok(Particle { kind, cardinality })
    }

    /// `cp ::= (Name | choice | seq) ('?' | '*' | '+')?`
    fn parse_cp(&mut self) -> Result<Particle, DtdError> {
        self.skip_ws();
        if self.peek_str("(") {
            return self.parse_children();
        }
        let name = self.parse_name()?;
        let cardinality = self.parse_cardinality();
        Ok(Particle {
            kind: ParticleKind::Name(name),
            cardinality,
        })
    }
}
