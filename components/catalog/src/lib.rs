//! C2 — catalog resolver (spec.md §4.2).
//!
//! `Catalog::resolve` maps a `(publicId, systemId)` pair to an absolute
//! location, following the lookup order of the OASIS XML Catalogs
//! specification's `public`/`system`/`uri` entries. A catalog file is
//! parsed once into a pure, in-memory table; resolution never touches the
//! filesystem itself — that decision (relative-path resolution, HTTP
//! fetch, etc.) is left to the caller, keeping this crate's surface to the
//! single operation spec.md §1 scopes it down to.
//!
//! Catalog files are themselves small, attribute-only XML fragments
//! (`<public publicId="..." uri="..."/>` and friends); rather than pull in
//! the full SAX parser (which would create a dependency cycle, since the
//! SAX parser itself consults a catalog to resolve external subsets), this
//! crate scans them with the same kind of small manual cursor the DTD
//! parser uses for markup declarations.

use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("unterminated tag starting at byte {0}")]
    UnterminatedTag(usize),
    #[error("malformed attribute in tag: {0:?}")]
    MalformedAttribute(String),
}

/// One parsed `(publicId, systemId)` → location table, per spec.md §4.2.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    public: HashMap<String, String>,
    system: HashMap<String, String>,
    uri: HashMap<String, String>,
    next_catalogs: Vec<String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an OASIS-style catalog document's `public`, `system`, `uri`
    /// and `nextCatalog` entries. Unknown tags (`group`, `delegatePublic`,
    /// comments, ...) are skipped rather than rejected, since the
    /// resolver's contract only promises the three direct-entry kinds.
    pub fn parse(text: &str) -> Result<Self, CatalogError> {
        let mut catalog = Catalog::new();
        let bytes = text.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != b'<' {
                i += 1;
                continue;
            }
            if text[i..].starts_with("<!--") {
                i += match text[i..].find("-->") {
                    Some(end) => end + 3,
                    None => return Err(CatalogError::UnterminatedTag(i)),
                };
                continue;
            }
            if text[i..].starts_with("<?") {
                i += match text[i..].find("?>") {
                    Some(end) => end + 2,
                    None => return Err(CatalogError::UnterminatedTag(i)),
                };
                continue;
            }
            let end = text[i..]
                .find('>')
                .map(|e| i + e)
                .ok_or(CatalogError::UnterminatedTag(i))?;
            let tag = &text[i + 1..end];
            let tag = tag.strip_suffix('/').unwrap_or(tag);
            let (name, attr_text) = match tag.find(char::is_whitespace) {
                Some(sp) => (&tag[..sp], &tag[sp..]),
                None => (tag, ""),
            };
            match name {
                "public" => {
                    let attrs = parse_attrs(attr_text)?;
                    if let (Some(public_id), Some(uri)) =
                        (attrs.get("publicId"), attrs.get("uri"))
                    {
                        catalog
                            .public
                            .entry(public_id.clone())
                            .or_insert_with(|| uri.clone());
                    }
                }
                "system" => {
                    let attrs = parse_attrs(attr_text)?;
                    if let (Some(system_id), Some(uri)) =
                        (attrs.get("systemId"), attrs.get("uri"))
                    {
                        catalog
                            .system
                            .entry(system_id.clone())
                            .or_insert_with(|| uri.clone());
                    }
                }
                "uri" => {
                    let attrs = parse_attrs(attr_text)?;
                    if let (Some(name), Some(uri)) = (attrs.get("name"), attrs.get("uri")) {
                        catalog.uri.entry(name.clone()).or_insert_with(|| uri.clone());
                    }
                }
                "nextCatalog" => {
                    let attrs = parse_attrs(attr_text)?;
                    if let Some(catalog_uri) = attrs.get("catalog") {
                        catalog.next_catalogs.push(catalog_uri.clone());
                    }
                }
                _ => {}
            }
            i = end + 1;
        }
        Ok(catalog)
    }

    /// `resolve(publicId, systemId) -> Option<AbsolutePath>` (spec.md
    /// §4.2). Tries a `public` entry first (when a public identifier is
    /// given), then `system`, then a bare `uri` entry keyed by systemId.
    /// `None` means the caller must fall back to resolving `systemId`
    /// relative to the including document — absence is not an error.
    pub fn resolve(&self, public_id: Option<&str>, system_id: &str) -> Option<String> {
        if let Some(pid) = public_id {
            if let Some(uri) = self.public.get(pid) {
                return Some(uri.clone());
            }
        }
        if let Some(uri) = self.system.get(system_id) {
            return Some(uri.clone());
        }
        match self.uri.get(system_id) {
            Some(uri) => Some(uri.clone()),
            None => {
                log::debug!("catalog miss for publicId={:?} systemId={:?}", public_id, system_id);
                None
            }
        }
    }

    /// Additional catalog files named by `nextCatalog` entries, in file
    /// order — the caller decides whether and how to chain-load them.
    pub fn next_catalogs(&self) -> &[String] {
        &self.next_catalogs
    }
}

fn parse_attrs(text: &str) -> Result<HashMap<String, String>, CatalogError> {
    let mut attrs = HashMap::new();
    let mut rest = text.trim_start();
    while !rest.is_empty() {
        let eq = rest
            .find('=')
            .ok_or_else(|| CatalogError::MalformedAttribute(text.to_string()))?;
        let name = rest[..eq].trim().to_string();
        rest = rest[eq + 1..].trim_start();
        let quote = rest
            .as_bytes()
            .first()
            .copied()
            .filter(|&b| b == b'"' || b == b'\'')
            .ok_or_else(|| CatalogError::MalformedAttribute(text.to_string()))?;
        let value_rest = &rest[1..];
        let value_end = value_rest
            .find(quote as char)
            .ok_or_else(|| CatalogError::MalformedAttribute(text.to_string()))?;
        attrs.insert(name, value_rest[..value_end].to_string());
        rest = value_rest[value_end + 1..].trim_start();
    }
    Ok(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_by_public_id_first() {
        let catalog = Catalog::parse(
            r#"
            <catalog>
              <public publicId="-//OASIS//DTD DocBook XML//EN" uri="docbook.dtd"/>
              <system systemId="http://example.com/docbook.dtd" uri="other.dtd"/>
            </catalog>
            "#,
        )
        .unwrap();
        assert_eq!(
            catalog.resolve(
                Some("-//OASIS//DTD DocBook XML//EN"),
                "http://example.com/docbook.dtd"
            ),
            Some("docbook.dtd".to_string())
        );
    }

    #[test]
    fn falls_back_to_system_then_uri() {
        let catalog = Catalog::parse(
            r#"<catalog>
                <system systemId="urn:a" uri="a.dtd"/>
                <uri name="urn:b" uri="b.dtd"/>
               </catalog>"#,
        )
        .unwrap();
        assert_eq!(catalog.resolve(None, "urn:a"), Some("a.dtd".to_string()));
        assert_eq!(catalog.resolve(None, "urn:b"), Some("b.dtd".to_string()));
    }

    #[test]
    fn absence_is_none_not_error() {
        let catalog = Catalog::parse("<catalog></catalog>").unwrap();
        assert_eq!(catalog.resolve(Some("-//x//"), "urn:missing"), None);
    }

    #[test]
    fn first_matching_entry_wins_on_duplicate_keys() {
        let catalog = Catalog::parse(
            r#"<catalog>
                <system systemId="urn:a" uri="first.dtd"/>
                <system systemId="urn:a" uri="second.dtd"/>
               </catalog>"#,
        )
        .unwrap();
        assert_eq!(catalog.resolve(None, "urn:a"), Some("first.dtd".to_string()));
    }

    #[test]
    fn collects_next_catalog_entries() {
        let catalog = Catalog::parse(
            r#"<catalog>
                <nextCatalog catalog="other/catalog.xml"/>
               </catalog>"#,
        )
        .unwrap();
        assert_eq!(catalog.next_catalogs(), &["other/catalog.xml".to_string()]);
    }
}
