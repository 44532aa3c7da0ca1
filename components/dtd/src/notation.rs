//! Notation declarations (spec.md §3, `<!NOTATION name PUBLIC|SYSTEM ...>`).

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NotationDecl {
    pub name: String,
    pub public_id: Option<String>,
    pub system_id: Option<String>,
}
