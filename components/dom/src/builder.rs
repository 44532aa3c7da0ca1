//! Drives a SAX event source and assembles the tree from [`crate::node`].

use std::path::Path;

use xrs_parser::encoding::decode;
use xrs_parser::reader::Reader;
use xrs_parser::validating::{ParserConfig, ValidatingEvent, ValidatingReader};
use xrs_parser::{XmlError, XmlEvent};

use crate::error::DomError;
use crate::node::{Document, DocumentType, Element, XMLNode, XmlDeclaration};

/// Reads `path` (spec.md §6's "file path" input kind), detects its
/// encoding (BOM or `<?xml ... encoding="..."?>`) and decodes it to UTF-8,
/// then parses it without consulting a DTD. See [`parse`].
pub fn parse_file(path: impl AsRef<Path>) -> Result<Document, DomError> {
    let bytes = std::fs::read(path).map_err(XmlError::from)?;
    let (text, _encoding, _had_errors) = decode(&bytes, None).map_err(DomError::Parse)?;
    parse(&text)
}

/// Like [`parse_file`], but validates against any DOCTYPE the document
/// declares, per `config`. See [`parse_validating`].
pub fn parse_file_validating(
    path: impl AsRef<Path>,
    config: ParserConfig,
) -> Result<Document, DomError> {
    let bytes = std::fs::read(path).map_err(XmlError::from)?;
    let (text, _encoding, _had_errors) = decode(&bytes, None).map_err(DomError::Parse)?;
    parse_validating(&text, config)
}

/// Parses `input` without consulting a DTD: well-formedness only, no
/// attribute defaulting or entity expansion beyond the five predefined
/// entities.
pub fn parse(input: &str) -> Result<Document, DomError> {
    let mut reader = Reader::new(input);
    let mut builder = TreeBuilder::default();
    while let Some(event) = reader.next()? {
        match event {
            XmlEvent::XmlDecl(decl) => {
                builder.declaration = Some(XmlDeclaration {
                    version: decl.version.to_string(),
                    encoding: decl.encoding.map(str::to_string),
                    standalone: decl.standalone,
                });
            }
            XmlEvent::Dtd(decl) => {
                builder.doctype = Some(DocumentType {
                    name: decl.name.to_string(),
                    public_id: None,
                    system_id: None,
                });
            }
            XmlEvent::STag(stag) => {
                let attrs = reader
                    .attributes()
                    .iter()
                    .map(|a| (a.name().to_string(), a.raw_value().to_string()))
                    .collect();
                builder.start_element(stag.name(), attrs);
            }
            XmlEvent::ETag(_) => builder.end_element(),
            XmlEvent::Characters(text) => builder.text(&text),
            XmlEvent::CData(text) => builder.cdata(text),
            XmlEvent::Comment(text) => builder.push(XMLNode::Comment(text.to_string())),
            XmlEvent::PI(pi) => builder.push(XMLNode::ProcessingInstruction {
                target: pi.target().to_string(),
                data: pi.data().map(str::to_string),
            }),
        }
    }
    builder.finish()
}

/// Parses `input` validating against any DOCTYPE it declares, per
/// `config`; attribute values are defaulted and entity-expanded by
/// [`ValidatingReader`] before reaching this builder.
pub fn parse_validating(input: &str, config: ParserConfig) -> Result<Document, DomError> {
    let mut reader = ValidatingReader::new(input, config);
    let mut builder = TreeBuilder::default();
    while let Some(event) = reader.next()? {
        match event {
            ValidatingEvent::XmlDecl(decl) => {
                builder.declaration = Some(XmlDeclaration {
                    version: decl.version.to_string(),
                    encoding: decl.encoding.map(str::to_string),
                    standalone: decl.standalone,
                });
            }
            ValidatingEvent::Dtd(decl) => {
                let (public_id, system_id) = match decl.external_id {
                    Some(xrs_parser::reader::dtd::ExternalId::System { system_id }) => {
                        (None, Some(system_id.to_string()))
                    }
                    Some(xrs_parser::reader::dtd::ExternalId::Public {
                        public_id,
                        system_id,
                    }) => (Some(public_id.to_string()), Some(system_id.to_string())),
                    None => (None, None),
                };
                builder.doctype = Some(DocumentType {
                    name: decl.name.to_string(),
                    public_id,
                    system_id,
                });
            }
            ValidatingEvent::STag { name, .. } => {
                let attrs = reader
                    .attributes()
                    .iter()
                    .map(|a| (a.name().to_string(), a.value().to_string()))
                    .collect();
                builder.start_element(name, attrs);
            }
            ValidatingEvent::ETag { .. } => builder.end_element(),
            ValidatingEvent::Characters(text) => builder.text(&text),
            ValidatingEvent::CData(text) => builder.cdata(text),
            ValidatingEvent::Comment(text) => builder.push(XMLNode::Comment(text.to_string())),
            ValidatingEvent::PI(pi) => builder.push(XMLNode::ProcessingInstruction {
                target: pi.target().to_string(),
                data: pi.data().map(str::to_string),
            }),
        }
    }
    builder.finish()
}

#[derive(Default)]
struct TreeBuilder {
    declaration: Option<XmlDeclaration>,
    doctype: Option<DocumentType>,
    stack: Vec<Element>,
    root: Option<Element>,
}

impl TreeBuilder {
    fn start_element(&mut self, name: &str, attributes: Vec<(String, String)>) {
        self.stack.push(Element {
            name: name.to_string(),
            attributes,
            children: Vec::new(),
        });
    }

    fn end_element(&mut self) {
        let element = self
            .stack
            .pop()
            .expect("end_element without a matching start_element");
        self.push(XMLNode::Element(element));
    }

    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(parent) = self.stack.last_mut() {
            if let Some(XMLNode::Text(last)) = parent.children.last_mut() {
                last.push_str(text);
                return;
            }
        }
        self.push(XMLNode::Text(text.to_string()));
    }

    fn cdata(&mut self, text: &str) {
        self.push(XMLNode::CData(text.to_string()));
    }

    /// Attaches a finished node to the innermost open element, or sets it
    /// as the document root once the stack has emptied back out.
    fn push(&mut self, node: XMLNode) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => {
                if let XMLNode::Element(element) = node {
                    self.root = Some(element);
                }
                // prolog/epilog comments and PIs outside the root are not
                // part of the tree spec.md §4.9 asks this crate to build.
            }
        }
    }

    fn finish(self) -> Result<Document, DomError> {
        Ok(Document {
            declaration: self.declaration,
            doctype: self.doctype,
            root: self.root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::XMLNode;

    #[test]
    fn parse_file_reads_and_decodes_from_disk() {
        let path = std::env::temp_dir().join(format!("xrs-dom-test-{:?}.xml", std::thread::current().id()));
        std::fs::write(&path, br#"<?xml version="1.0"?><root a="1"/>"#).unwrap();
        let doc = parse_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(Some("1"), doc.root.unwrap().attribute("a"));
    }

    #[test]
    fn only_root() {
        let doc = parse("<root></root>").unwrap();
        let root = doc.root.unwrap();
        assert_eq!("root", root.name);
        assert!(root.children.is_empty());
    }

    #[test]
    fn empty_element() {
        let doc = parse("<root/>").unwrap();
        assert_eq!("root", doc.root.unwrap().name);
    }

    #[test]
    fn nested_children_and_attributes() {
        let doc = parse(r#"<root a="1"><child b="2"/></root>"#).unwrap();
        let root = doc.root.unwrap();
        assert_eq!(Some("1"), root.attribute("a"));
        let children: Vec<_> = root.child_elements().collect();
        assert_eq!(1, children.len());
        assert_eq!(Some("2"), children[0].attribute("b"));
    }

    #[test]
    fn adjacent_character_events_coalesce() {
        let doc = parse("<root>a&amp;b</root>").unwrap();
        let root = doc.root.unwrap();
        assert_eq!(1, root.children.len());
        assert_eq!("a&b", root.text());
    }

    #[test]
    fn text_and_child_interleave_without_merging() {
        let doc = parse("<root>before<child/>after</root>").unwrap();
        let root = doc.root.unwrap();
        assert_eq!(3, root.children.len());
        assert!(matches!(&root.children[0], XMLNode::Text(t) if t == "before"));
        assert!(matches!(&root.children[1], XMLNode::Element(_)));
        assert!(matches!(&root.children[2], XMLNode::Text(t) if t == "after"));
    }

    #[test]
    fn cdata_section_is_kept_as_its_own_node_not_merged_into_text() {
        let doc = parse("<root>before<![CDATA[a<b]]>after</root>").unwrap();
        let root = doc.root.unwrap();
        assert_eq!(3, root.children.len());
        assert!(matches!(&root.children[0], XMLNode::Text(t) if t == "before"));
        assert!(matches!(&root.children[1], XMLNode::CData(t) if t == "a<b"));
        assert!(matches!(&root.children[2], XMLNode::Text(t) if t == "after"));
    }

    #[test]
    fn comments_and_pis_inside_root_are_kept() {
        let doc = parse("<root><!-- c --><?pi data?></root>").unwrap();
        let root = doc.root.unwrap();
        assert!(matches!(&root.children[0], XMLNode::Comment(c) if c == " c "));
        assert!(matches!(
            &root.children[1],
            XMLNode::ProcessingInstruction { target, .. } if target == "pi"
        ));
    }

    #[test]
    fn xml_declaration_is_captured() {
        let doc = parse(r#"<?xml version="1.0" encoding="UTF-8"?><root/>"#).unwrap();
        let decl = doc.declaration.unwrap();
        assert_eq!("1.0", decl.version);
        assert_eq!(Some("UTF-8".to_string()), decl.encoding);
    }

    #[test]
    fn doctype_without_dtd_support_still_records_name() {
        let doc = parse("<!DOCTYPE root><root/>").unwrap();
        assert_eq!("root", doc.doctype.unwrap().name);
    }

    #[test]
    fn validating_mode_defaults_missing_attribute() {
        let input = r#"<!DOCTYPE root [
            <!ELEMENT root EMPTY>
            <!ATTLIST root id CDATA "fallback">
        ]>
        <root/>"#;
        let doc = parse_validating(input, ParserConfig::default()).unwrap();
        assert_eq!(Some("fallback"), doc.root.unwrap().attribute("id"));
    }

    #[test]
    fn validating_mode_rejects_undeclared_child_when_validating() {
        let input = r#"<!DOCTYPE root [
            <!ELEMENT root EMPTY>
        ]>
        <root><bad/></root>"#;
        let config = ParserConfig {
            validating: true,
            ..ParserConfig::default()
        };
        assert!(parse_validating(input, config).is_err());
    }
}
