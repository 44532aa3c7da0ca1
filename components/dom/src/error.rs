use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomError {
    #[error(transparent)]
    Parse(#[from] xrs_parser::XmlError),
    #[error("document has no root element")]
    EmptyDocument,
}
