use std::fmt;

/// Whether a problem found while reading or validating a DTD aborts parsing
/// or is merely collected for the caller to inspect afterwards.
///
/// Mirrors the well-formedness/validity split from the XML Recommendation:
/// a validating parser promotes every [`DtdErrorKind`] to [`Severity::Fatal`],
/// a non-validating one only promotes the syntactic ones.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Severity {
    Fatal,
    Warning,
}

#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct DtdError {
    pub kind: DtdErrorKind,
    pub severity: Severity,
}

impl DtdError {
    pub fn fatal(kind: DtdErrorKind) -> Self {
        Self {
            kind,
            severity: Severity::Fatal,
        }
    }

    pub fn warning(kind: DtdErrorKind) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DtdErrorKind {
    #[error("expected '{0}'")]
    Expected(&'static str),
    #[error("expected whitespace")]
    ExpectedWhitespace,
    #[error("expected a name")]
    ExpectedName,
    #[error("unexpected end of DTD input")]
    UnexpectedEof,
    #[error("illegal name: {0:?}")]
    IllegalName(String),
    #[error("unbalanced conditional section")]
    UnbalancedConditionalSection,
    #[error("unknown parameter entity '%{0};'")]
    UnknownParameterEntity(String),
    #[error("unknown general entity '&{0};'")]
    UnknownGeneralEntity(String),
    #[error("parameter entity '%{0};' recursively references itself")]
    RecursiveEntity(String),
    #[error("parameter-entity expansion of '%{0};' did not converge after 50 iterations")]
    ParameterEntityDidNotConverge(String),
    #[error("invalid content spec for element '{0}': {1}")]
    InvalidContentSpec(String, String),
    #[error("mixed content model for '{0}' must end in '*' when it has children")]
    MixedContentMustRepeat(String),
    #[error("duplicate separator kind mixing ',' and '|' in one group")]
    MixedSeparators,
    #[error("invalid attribute type: {0:?}")]
    InvalidAttType(String),
    #[error("element '{0}' is not declared in this grammar")]
    UndeclaredElement(String),
    #[error("element '{0}' does not allow the child sequence found: {1}")]
    InvalidChildSequence(String, String),
    #[error("attribute '{1}' on element '{0}' is not declared")]
    UndeclaredAttribute(String, String),
    #[error("required attribute '{1}' missing on element '{0}'")]
    MissingRequiredAttribute(String, String),
    #[error("attribute '{1}' on element '{0}' is #FIXED to {2:?} but found {3:?}")]
    FixedAttributeMismatch(String, String, String, String),
    #[error("value {2:?} is not valid for attribute '{1}' of element '{0}' (type {3}): {4}")]
    InvalidAttributeValue(String, String, String, String, String),
    #[error("notation '{0}' referenced by attribute '{1}' of element '{2}' is not declared")]
    UndeclaredNotation(String, String, String),
    #[error("external entity '{0}' could not be resolved or loaded")]
    UnresolvedExternalEntity(String),
    #[error("I/O error reading external DTD subset: {0}")]
    Io(String),
    #[error("duplicate ID value {0:?}")]
    DuplicateId(String),
    #[error("IDREF(S) attribute references undeclared ID {0:?}")]
    UnresolvedIdRef(String),
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Fatal => write!(f, "fatal"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

pub type DtdResult<T> = Result<T, DtdError>;

/// Collects non-fatal [`DtdError`]s so callers can inspect them once
/// parsing/validation has finished, per spec.md §7 ("Warnings accumulate
/// in a context object reachable to the caller after `endDocument`").
#[derive(Default, Debug)]
pub struct WarningSink {
    warnings: Vec<DtdError>,
}

impl WarningSink {
    pub fn push(&mut self, error: DtdError) {
        log::warn!("{}", error.kind);
        self.warnings.push(error);
    }

    pub fn warnings(&self) -> &[DtdError] {
        &self.warnings
    }
}
