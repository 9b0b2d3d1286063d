//! XML namespace handling
//!
//! This module provides qualified names and a scoped prefix table used while
//! loading RELAX NG documents, where element namespaces decide what is part
//! of the grammar and `<name>` contents may carry prefixes.

use std::collections::HashMap;

/// XML Namespace URI
pub type NamespaceUri = String;

/// Namespace prefix
pub type Prefix = String;

/// Qualified name (QName) - combination of namespace and local name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    /// Namespace URI (None for no namespace)
    pub namespace: Option<NamespaceUri>,
    /// Local name
    pub local_name: String,
}

impl QName {
    /// Create a QName without a namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local_name: local_name.into(),
        }
    }

    /// Create a QName with a namespace
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local_name: local_name.into(),
        }
    }

    /// Check the namespace against a URI
    pub fn is_in(&self, namespace: &str) -> bool {
        self.namespace.as_deref() == Some(namespace)
    }
}

impl std::fmt::Display for QName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local_name),
            None => write!(f, "{}", self.local_name),
        }
    }
}

/// Namespace context for resolving prefixes
///
/// Scopes are pushed for each element and popped at its end, so a
/// declaration only applies to the element that carries it and its
/// descendants.
#[derive(Debug, Clone)]
pub struct NamespaceContext {
    scopes: Vec<Scope>,
}

#[derive(Debug, Clone, Default)]
struct Scope {
    prefixes: HashMap<Prefix, NamespaceUri>,
    default_namespace: Option<NamespaceUri>,
}

impl NamespaceContext {
    /// Create a new context holding only the `xml` prefix
    pub fn new() -> Self {
        let mut root = Scope::default();
        root.prefixes
            .insert("xml".to_string(), crate::XML_NAMESPACE.to_string());
        Self { scopes: vec![root] }
    }

    /// Open a new scope
    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Close the innermost scope
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Add a namespace prefix mapping to the innermost scope
    pub fn add_prefix(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.prefixes.insert(prefix.into(), namespace.into());
        }
    }

    /// Set the default namespace of the innermost scope
    pub fn set_default_namespace(&mut self, namespace: impl Into<String>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.default_namespace = Some(namespace.into());
        }
    }

    /// Get the namespace for a prefix
    pub fn get_namespace(&self, prefix: &str) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.prefixes.get(prefix))
            .map(|s| s.as_str())
    }

    /// Get the default namespace
    pub fn get_default_namespace(&self) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.default_namespace.as_deref())
            .filter(|ns| !ns.is_empty())
    }

    /// Resolve an element name; unprefixed names take the default namespace
    ///
    /// Unknown prefixes leave the name without a namespace.
    pub fn resolve_element(&self, prefixed_name: &str) -> QName {
        match prefixed_name.split_once(':') {
            Some((prefix, local)) => QName {
                namespace: self.get_namespace(prefix).map(str::to_string),
                local_name: local.to_string(),
            },
            None => QName {
                namespace: self.get_default_namespace().map(str::to_string),
                local_name: prefixed_name.to_string(),
            },
        }
    }

    /// All prefix mappings in scope, innermost declarations winning
    pub fn in_scope(&self) -> HashMap<Prefix, NamespaceUri> {
        let mut map = HashMap::new();
        for scope in &self.scopes {
            for (prefix, uri) in &scope.prefixes {
                map.insert(prefix.clone(), uri.clone());
            }
        }
        map
    }
}

impl Default for NamespaceContext {
    fn default() -> Self {
        Self::new()
    }
}
