use crate::namespace::stack::NamespaceStack;
use crate::namespace::{NsAttribute, NsETag, NsSTag, QName, XmlNsEvent, XMLNS_URI, XML_URI};
use crate::reader::Reader;
use crate::{Attribute, XmlError, XmlEvent};

/// Namespace-resolving wrapper around [`Reader`].
pub struct NsReader<'a> {
    reader: Reader<'a>,
    namespaces: NamespaceStack<'a>,
    attributes: Vec<NsAttribute<'a>>,
}

impl<'a> NsReader<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            reader: Reader::new(input),
            namespaces: NamespaceStack::default(),
            attributes: Vec::with_capacity(4),
        }
    }

    pub fn attributes(&self) -> &[NsAttribute<'a>] {
        &self.attributes
    }

    fn build_scope(&mut self, raw_attrs: &[Attribute<'a>]) -> Result<(), XmlError> {
        let mut qnames = Vec::with_capacity(raw_attrs.len());
        for attr in raw_attrs {
            qnames.push(QName::from_str(attr.name())?);
        }

        let mut scope = self.namespaces.build_scope();
        for (qname, attr) in qnames.iter().zip(raw_attrs.iter()) {
            let value = attr.raw_value();
            if let Some(prefix) = qname.prefix() {
                if prefix == "xmlns" {
                    if value.is_empty()
                        || ((qname.local_part() == "xml") != (value == XML_URI))
                        || ((qname.local_part() == "xmlns") != (value == XMLNS_URI))
                    {
                        return Err(XmlError::IllegalNamespaceUri(value.to_string()));
                    }
                    scope.add_prefix(qname.local_part(), value);
                }
            } else if qname.local_part() == "xmlns" {
                if value == XML_URI || value == XMLNS_URI {
                    return Err(XmlError::IllegalNamespaceUri(value.to_string()));
                }
                if value.is_empty() {
                    scope.reset_default();
                } else {
                    scope.set_default(value);
                }
            }
        }
        scope.finish();

        self.attributes.clear();
        for (qname, attr) in qnames.into_iter().zip(raw_attrs.iter()) {
            let namespace = self.namespaces.resolve_attribute_namespace(&qname)?;
            self.attributes
                .push(NsAttribute::new(qname, namespace, attr.raw_value()));
        }

        self.check_unique_attributes()
    }

    fn check_unique_attributes(&self) -> Result<(), XmlError> {
        for (i, attr) in self.attributes.iter().enumerate() {
            if let Some(namespace) = attr.namespace() {
                let clashes = self.attributes[..i].iter().any(|other| {
                    other.namespace() == Some(namespace)
                        && other.qname().local_part() == attr.qname().local_part()
                });
                if clashes {
                    return Err(XmlError::NonUniqueAttribute {
                        attribute: format!("{{{}}}{}", namespace, attr.qname().local_part()),
                    });
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<XmlNsEvent<'a>>, XmlError> {
        match self.reader.next()? {
            None => Ok(None),
            Some(XmlEvent::XmlDecl(decl)) => Ok(Some(XmlNsEvent::XmlDecl(decl))),
            Some(XmlEvent::Dtd(decl)) => Ok(Some(XmlNsEvent::Dtd(decl))),
            Some(XmlEvent::PI(pi)) => Ok(Some(XmlNsEvent::PI(pi))),
            Some(XmlEvent::Comment(comment)) => Ok(Some(XmlNsEvent::Comment(comment))),
            Some(XmlEvent::Characters(text)) => Ok(Some(XmlNsEvent::Characters(text))),
            Some(XmlEvent::CData(text)) => Ok(Some(XmlNsEvent::CData(text))),
            Some(XmlEvent::STag(stag)) => {
                let raw_attrs: Vec<Attribute<'a>> = self.reader.attributes().to_vec();
                self.build_scope(&raw_attrs)?;

                let qname = QName::from_str(stag.name())?;
                if qname.prefix().is_none() && qname.local_part() == "xmlns" {
                    return Err(XmlError::IllegalName {
                        name: qname.to_string(),
                    });
                }
                let namespace = self.namespaces.resolve_element_namespace(&qname)?;

                Ok(Some(XmlNsEvent::STag(NsSTag {
                    qname,
                    namespace,
                    empty: stag.is_empty(),
                })))
            }
            Some(XmlEvent::ETag(etag)) => {
                let qname = QName::from_str(etag.name())?;
                let namespace = self.namespaces.resolve_element_namespace(&qname)?;
                self.namespaces.pop_scope();
                Ok(Some(XmlNsEvent::ETag(NsETag { qname, namespace })))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::Namespace;

    fn start_tag<'a>(reader: &mut NsReader<'a>) -> NsSTag<'a> {
        match reader.next().unwrap().unwrap() {
            XmlNsEvent::STag(stag) => stag,
            other => panic!("expected a start tag, got {:?}", other),
        }
    }

    fn expect_error(reader: &mut NsReader) -> XmlError {
        reader.next().unwrap_err()
    }

    #[test]
    fn unprefixed_element_has_no_namespace() {
        let mut reader = NsReader::new("<e/>");
        let stag = start_tag(&mut reader);
        assert_eq!(stag.qname(), QName::new(None, "e"));
        assert_eq!(stag.namespace(), None);
    }

    #[test]
    fn prefixed_element_resolves_declared_namespace() {
        let mut reader = NsReader::new("<n1:e xmlns:n1='https://example.org'/>");
        let stag = start_tag(&mut reader);
        assert_eq!(stag.qname(), QName::new(Some("n1"), "e"));
        assert_eq!(stag.namespace(), Some(&Namespace::new("https://example.org")));
    }

    #[test]
    fn empty_namespace_uri_is_rejected() {
        let mut reader = NsReader::new("<n1:e xmlns:n1=''/>");
        assert!(matches!(
            expect_error(&mut reader),
            XmlError::IllegalNamespaceUri(ref ns) if ns.is_empty()
        ));
    }

    #[test]
    fn xml_prefix_may_only_rebind_to_its_reserved_uri() {
        let mut reader = NsReader::new("<e xmlns:xml='https://example.org'/>");
        assert!(matches!(
            expect_error(&mut reader),
            XmlError::IllegalNamespaceUri(ref ns) if ns == "https://example.org"
        ));
    }

    #[test]
    fn rebinding_xml_prefix_to_its_own_uri_is_legal() {
        let mut reader =
            NsReader::new("<e xml:base='' xmlns:xml='http://www.w3.org/XML/1998/namespace'/>");
        let stag = start_tag(&mut reader);
        let attrs = reader.attributes();
        assert_eq!(attrs.len(), 2);
        let base = attrs
            .iter()
            .find(|a| a.qname().local_part() == "base")
            .unwrap();
        assert_eq!(
            base.namespace(),
            Some(&Namespace::new("http://www.w3.org/XML/1998/namespace"))
        );
        let _ = stag;
    }

    #[test]
    fn default_namespace_uri_cannot_be_the_xmlns_uri() {
        let mut reader = NsReader::new("<e xmlns='http://www.w3.org/2000/xmlns/'/>");
        assert!(matches!(
            expect_error(&mut reader),
            XmlError::IllegalNamespaceUri(ref ns) if ns == "http://www.w3.org/2000/xmlns/"
        ));
    }

    #[test]
    fn default_namespace_declaration_applies_to_unprefixed_children() {
        let mut reader = NsReader::new("<x xmlns='https://example.org'><e/></x>");
        let x = start_tag(&mut reader);
        assert_eq!(x.namespace(), Some(&Namespace::new("https://example.org")));
        let e = start_tag(&mut reader);
        assert_eq!(e.namespace(), Some(&Namespace::new("https://example.org")));
    }

    #[test]
    fn inner_scope_can_rebind_a_prefix_without_leaking_outward() {
        let mut reader = NsReader::new(
            "<x xmlns:n1='https://example.org'>\
               <n1:e xmlns:n1='https://example.com'/>\
               <n1:f/>\
             </x>",
        );
        let _x = start_tag(&mut reader);
        let inner = start_tag(&mut reader);
        assert_eq!(inner.namespace(), Some(&Namespace::new("https://example.com")));

        // </n1:e>, still inside the rebound scope
        match reader.next().unwrap().unwrap() {
            XmlNsEvent::ETag(etag) => {
                assert_eq!(etag.namespace(), Some(&Namespace::new("https://example.com")))
            }
            other => panic!("expected an end tag, got {:?}", other),
        }

        // the sibling sees the outer binding again once the inner scope popped
        let sibling = start_tag(&mut reader);
        assert_eq!(sibling.namespace(), Some(&Namespace::new("https://example.org")));
    }

    #[test]
    fn unknown_prefix_is_an_error() {
        let mut reader = NsReader::new("<n1:e/>");
        assert!(matches!(
            expect_error(&mut reader),
            XmlError::UnknownNamespacePrefix(ref p) if p == "n1"
        ));
    }

    #[test]
    fn two_attributes_in_the_same_namespace_with_the_same_local_name_clash() {
        let mut reader =
            NsReader::new("<e xmlns:a='https://example.org' xmlns:b='https://example.org' a:x='1' b:x='2'/>");
        assert!(matches!(
            expect_error(&mut reader),
            XmlError::NonUniqueAttribute { .. }
        ));
    }
}
