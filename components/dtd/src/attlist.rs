//! C5 — attribute-declaration model (spec.md §3, §4.5).

use xrs_chars::{is_xml_name, is_xml_nmtoken};

use crate::error::{DtdError, DtdErrorKind};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AttType {
    CData,
    Id,
    IdRef,
    IdRefs,
    Entity,
    Entities,
    Nmtoken,
    Nmtokens,
    /// `(v1|v2|...)`, values already parsed and validated as NMTOKENs.
    Enumeration(Vec<String>),
    /// `NOTATION (n1|n2|...)`, values already parsed and validated as Names.
    Notation(Vec<String>),
}

impl AttType {
    pub fn name(&self) -> &'static str {
        match self {
            AttType::CData => "CDATA",
            AttType::Id => "ID",
            AttType::IdRef => "IDREF",
            AttType::IdRefs => "IDREFS",
            AttType::Entity => "ENTITY",
            AttType::Entities => "ENTITIES",
            AttType::Nmtoken => "NMTOKEN",
            AttType::Nmtokens => "NMTOKENS",
            AttType::Enumeration(_) => "enumeration",
            AttType::Notation(_) => "NOTATION",
        }
    }

    /// Parses the type token from an ATTLIST attribute definition. `spec` is
    /// the text following the attribute name (already trimmed of its own
    /// leading whitespace), positioned at the type keyword or group.
    pub fn parse(spec: &str) -> Result<(Self, &str), DtdError> {
        let trimmed = spec.trim_start();
        if let Some(rest) = trimmed.strip_prefix("CDATA") {
            return Ok((AttType::CData, rest));
        }
        if let Some(rest) = trimmed.strip_prefix("IDREFS") {
            return Ok((AttType::IdRefs, rest));
        }
        if let Some(rest) = trimmed.strip_prefix("IDREF") {
            return Ok((AttType::IdRef, rest));
        }
        if let Some(rest) = trimmed.strip_prefix("ID") {
            return Ok((AttType::Id, rest));
        }
        if let Some(rest) = trimmed.strip_prefix("ENTITIES") {
            return Ok((AttType::Entities, rest));
        }
        if let Some(rest) = trimmed.strip_prefix("ENTITY") {
            return Ok((AttType::Entity, rest));
        }
        if let Some(rest) = trimmed.strip_prefix("NMTOKENS") {
            return Ok((AttType::Nmtokens, rest));
        }
        if let Some(rest) = trimmed.strip_prefix("NMTOKEN") {
            return Ok((AttType::Nmtoken, rest));
        }
        if let Some(rest) = trimmed.strip_prefix("NOTATION") {
            let rest = rest.trim_start();
            let (values, rest) = parse_group(rest)?;
            for v in &values {
                if !is_xml_name(v) {
                    return Err(DtdError::fatal(DtdErrorKind::InvalidAttType(format!(
                        "NOTATION value {:?} is not a Name",
                        v
                    ))));
                }
            }
            return Ok((AttType::Notation(values), rest));
        }
        if trimmed.starts_with('(') {
            let (values, rest) = parse_group(trimmed)?;
            for v in &values {
                if !is_xml_nmtoken(v) {
                    return Err(DtdError::fatal(DtdErrorKind::InvalidAttType(format!(
                        "enumeration value {:?} is not an Nmtoken",
                        v
                    ))));
                }
            }
            return Ok((AttType::Enumeration(values), rest));
        }
        Err(DtdError::fatal(DtdErrorKind::InvalidAttType(
            trimmed.to_string(),
        )))
    }
}

fn parse_group(spec: &str) -> Result<(Vec<String>, &str), DtdError> {
    let spec = spec.trim_start();
    let rest = spec
        .strip_prefix('(')
        .ok_or_else(|| DtdError::fatal(DtdErrorKind::Expected("(")))?;
    let end = rest
        .find(')')
        .ok_or_else(|| DtdError::fatal(DtdErrorKind::Expected(")")))?;
    let (body, after) = rest.split_at(end);
    let values = body
        .split('|')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    Ok((values, &after[1..]))
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DefaultKind {
    Required,
    Implied,
    Fixed,
    /// Plain default value, no keyword.
    None,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AttDecl {
    pub name: String,
    pub att_type: AttType,
    pub default_kind: DefaultKind,
    pub default_value: Option<String>,
}

impl AttDecl {
    /// Whether this declaration contributes a value via SAX-time defaulting
    /// (spec.md §4.7 `getDefaultAttributes`): any default whose kind is
    /// neither `#REQUIRED` nor `#IMPLIED`.
    pub fn has_usable_default(&self) -> bool {
        matches!(self.default_kind, DefaultKind::Fixed | DefaultKind::None)
            && self.default_value.is_some()
    }

    /// Attribute-value normalization (XML 1.0 §3.3.3) applied before type
    /// matching, per spec.md §9's open-question resolution: CDATA keeps
    /// literal whitespace, every other type collapses runs of whitespace to
    /// single spaces and trims the ends.
    pub fn normalize(&self, raw: &str) -> String {
        if matches!(self.att_type, AttType::CData) {
            return raw.to_string();
        }
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Validates an already-normalized attribute value against this
    /// declaration's type (spec.md §4.5). Does not consult the grammar's
    /// notation table — callers check `NOTATION` membership themselves,
    /// since that requires access to sibling declarations.
    pub fn validate_value(&self, value: &str) -> Result<(), String> {
        match &self.att_type {
            AttType::CData => Ok(()),
            AttType::Id | AttType::IdRef | AttType::Entity => {
                if is_xml_name(value) {
                    Ok(())
                } else {
                    Err(format!("{:?} is not a valid Name", value))
                }
            }
            AttType::IdRefs | AttType::Entities => {
                let tokens: Vec<&str> = value.split_whitespace().collect();
                if tokens.is_empty() {
                    return Err("value must contain at least one Name".to_string());
                }
                for tok in &tokens {
                    if !is_xml_name(tok) {
                        return Err(format!("{:?} is not a valid Name", tok));
                    }
                }
                Ok(())
            }
            AttType::Nmtoken => {
                if is_xml_nmtoken(value) {
                    Ok(())
                } else {
                    Err(format!("{:?} is not a valid Nmtoken", value))
                }
            }
            AttType::Nmtokens => {
                let tokens: Vec<&str> = value.split_whitespace().collect();
                if tokens.is_empty() {
                    return Err("value must contain at least one Nmtoken".to_string());
                }
                for tok in &tokens {
                    if !is_xml_nmtoken(tok) {
                        return Err(format!("{:?} is not a valid Nmtoken", tok));
                    }
                }
                Ok(())
            }
            AttType::Enumeration(values) => {
                if values.iter().any(|v| v == value) {
                    Ok(())
                } else {
                    Err(format!("{:?} is not one of {:?}", value, values))
                }
            }
            AttType::Notation(values) => {
                if values.iter().any(|v| v == value) {
                    Ok(())
                } else {
                    Err(format!("{:?} is not one of the declared notations", value))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_enumeration() {
        let (ty, rest) = AttType::parse("(a|b|c) \"b\"").unwrap();
        assert_eq!(
            ty,
            AttType::Enumeration(vec!["a".into(), "b".into(), "c".into()])
        );
        assert_eq!(rest.trim(), "\"b\"");
    }

    #[test]
    fn parses_notation() {
        let (ty, _) = AttType::parse("NOTATION (jpeg|png)").unwrap();
        assert_eq!(ty, AttType::Notation(vec!["jpeg".into(), "png".into()]));
    }

    #[test]
    fn id_requires_name() {
        let decl = AttDecl {
            name: "id".into(),
            att_type: AttType::Id,
            default_kind: DefaultKind::Required,
            default_value: None,
        };
        assert!(decl.validate_value("x1").is_ok());
        assert!(decl.validate_value("1x").is_err());
    }

    #[test]
    fn idrefs_requires_every_token_valid() {
        let decl = AttDecl {
            name: "refs".into(),
            att_type: AttType::IdRefs,
            default_kind: DefaultKind::Implied,
            default_value: None,
        };
        assert!(decl.validate_value("a b c").is_ok());
        assert!(decl.validate_value("a 1b c").is_err());
    }

    #[test]
    fn normalize_collapses_whitespace_except_cdata() {
        let cdata = AttDecl {
            name: "x".into(),
            att_type: AttType::CData,
            default_kind: DefaultKind::Implied,
            default_value: None,
        };
        assert_eq!(cdata.normalize("a   b\tc"), "a   b\tc");

        let nmtoken = AttDecl {
            name: "x".into(),
            att_type: AttType::Nmtoken,
            default_kind: DefaultKind::Implied,
            default_value: None,
        };
        assert_eq!(nmtoken.normalize("  a   b "), "a b");
    }
}
