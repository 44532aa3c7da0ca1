use crate::namespace::{Namespace, QName, XML_URI, XMLNS_URI};
use crate::XmlError;

/// Lexical stack of namespace bindings in scope at the current point in the
/// document, one entry per `xmlns`/`xmlns:prefix` declaration plus the two
/// bindings the XML Recommendation predefines.
pub struct NamespaceStack<'a> {
    namespaces: Vec<(Option<&'a str>, Option<Namespace>)>,
    sub_sizes: Vec<usize>,
}

impl<'a> NamespaceStack<'a> {
    pub fn new() -> Self {
        Self {
            namespaces: vec![
                (Some("xml"), Some(Namespace::new(XML_URI))),
                (Some("xmlns"), Some(Namespace::new(XMLNS_URI))),
            ],
            sub_sizes: vec![],
        }
    }

    pub fn build_scope<'s>(&'s mut self) -> NamespaceStackScopeBuilder<'a, 's> {
        NamespaceStackScopeBuilder {
            stack: self,
            size: 0,
        }
    }

    pub fn pop_scope(&mut self) {
        let size = self.sub_sizes.pop().expect("namespace stack underflow");
        self.namespaces.truncate(self.namespaces.len() - size);
    }

    pub fn resolve(&self, prefix: &str) -> Option<Namespace> {
        self.namespaces
            .iter()
            .rev()
            .find(|(pre, _)| *pre == Some(prefix))
            .and_then(|(_, ns)| ns.clone())
    }

    pub fn resolve_default(&self) -> Option<Namespace> {
        self.namespaces
            .iter()
            .rev()
            .find(|(pre, _)| pre.is_none())
            .and_then(|(_, ns)| ns.clone())
    }

    pub fn resolve_namespace(&self, prefix: Option<&str>) -> Option<Namespace> {
        match prefix {
            Some(prefix) => self.resolve(prefix),
            None => self.resolve_default(),
        }
    }

    pub fn resolve_element_namespace(
        &self,
        qname: &QName<'a>,
    ) -> Result<Option<Namespace>, XmlError> {
        match qname.prefix() {
            Some(prefix) => self
                .resolve(prefix)
                .map(Some)
                .ok_or_else(|| XmlError::UnknownNamespacePrefix(prefix.to_string())),
            None => Ok(self.resolve_default()),
        }
    }

    pub fn resolve_attribute_namespace(
        &self,
        qname: &QName<'a>,
    ) -> Result<Option<Namespace>, XmlError> {
        match qname.prefix() {
            Some(prefix) => self
                .resolve(prefix)
                .map(Some)
                .ok_or_else(|| XmlError::UnknownNamespacePrefix(prefix.to_string())),
            None => Ok(None),
        }
    }
}

impl<'a> Default for NamespaceStack<'a> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct NamespaceStackScopeBuilder<'a, 's> {
    stack: &'s mut NamespaceStack<'a>,
    size: usize,
}

impl<'a, 's> NamespaceStackScopeBuilder<'a, 's> {
    pub fn add_prefix(&mut self, prefix: &'a str, uri: impl Into<String>) {
        self.stack
            .namespaces
            .push((Some(prefix), Some(Namespace::new(uri.into()))));
        self.size += 1;
    }

    pub fn set_default(&mut self, uri: impl Into<String>) {
        self.stack
            .namespaces
            .push((None, Some(Namespace::new(uri.into()))));
        self.size += 1;
    }

    pub fn reset_default(&mut self) {
        self.stack.namespaces.push((None, None));
        self.size += 1;
    }

    pub fn finish(self) {
        self.stack.sub_sizes.push(self.size);
    }
}
