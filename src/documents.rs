//! XML document trees for schema files
//!
//! RELAX NG schemas are small and need random access while they are cleaned
//! up and parsed, so they are loaded into an owned element tree. Loading goes
//! through the positioned [`TokenCursor`](crate::sax::TokenCursor) and never
//! fails on recoverable markup errors; those are kept in
//! [`Document::errors`].

use crate::error::{Error, ParseError, Result};
use crate::limits::Limits;
use crate::loaders::Loader;
use crate::locations::Location;
use crate::namespaces::{NamespaceContext, QName};
use crate::sax::{NodeKind, ParseEvent, TokenCursor};

/// Child of an element
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Nested element
    Element(Element),
    /// Character data, adjacent text and CDATA merged
    Text(String),
}

impl Node {
    /// The element, if this is one
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        }
    }
}

/// Namespace declaration carried by an element (`None` prefix is `xmlns=`)
pub type NamespaceDecl = (Option<String>, String);

/// XML element in the document tree
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Namespace-resolved name
    pub name: QName,
    /// Attributes in document order, namespace declarations excluded
    pub attributes: Vec<(String, String)>,
    /// Namespace declarations made on this element
    pub namespace_decls: Vec<NamespaceDecl>,
    /// Children in document order
    pub children: Vec<Node>,
    /// Line of the start tag
    pub line: u32,
    /// Location of the document the element comes from
    pub base: Option<Location>,
    /// Cleaned root of the document an `include` or `externalRef` points to
    pub resolved: Option<Box<Element>>,
}

impl Element {
    /// Create a new element
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            namespace_decls: Vec::new(),
            children: Vec::new(),
            line: 0,
            base: None,
            resolved: None,
        }
    }

    /// Get the local name of the element
    pub fn local_name(&self) -> &str {
        &self.name.local_name
    }

    /// Get the namespace of the element
    pub fn namespace(&self) -> Option<&str> {
        self.name.namespace.as_deref()
    }

    /// Check for an element of the given local name in a namespace
    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.name.is_in(namespace) && self.name.local_name == local_name
    }

    /// Get an attribute value by name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Check whether an attribute is present
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Set an attribute, replacing an existing value
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    /// Remove an attribute, returning its value
    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(key, _)| key == name)?;
        Some(self.attributes.remove(pos).1)
    }

    /// Child elements in document order
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Concatenated text of the element and its descendants
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        collect_text(self, &mut text);
        text
    }

    /// Replace all children with a single text node
    pub fn set_text_content(&mut self, text: impl Into<String>) {
        self.children = vec![Node::Text(text.into())];
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Element(e) => collect_text(e, out),
            Node::Text(t) => out.push_str(t),
        }
    }
}

/// XML Document representation
#[derive(Debug, Clone)]
pub struct Document {
    /// Root element of the document
    pub root: Option<Element>,
    /// Where the document was loaded from
    pub location: Option<Location>,
    /// Recoverable markup errors met while loading
    pub errors: Vec<ParseError>,
}

impl Document {
    /// Parse an XML document from a string
    pub fn from_string(xml: &str) -> Result<Self> {
        Self::parse(xml.as_bytes(), None, &Limits::default())
    }

    /// Load and parse the document at a location
    pub fn from_location(loader: &Loader, location: &Location) -> Result<Self> {
        let resource = loader.load(location)?;
        Self::parse(&resource.content, Some(location.clone()), loader.limits())
    }

    /// Parse an XML document from bytes
    ///
    /// Fails only when no root element can be recovered or a limit is hit.
    pub fn parse(xml: &[u8], location: Option<Location>, limits: &Limits) -> Result<Self> {
        limits.check_xml_size(xml.len())?;

        let mut cursor = TokenCursor::new(xml);
        let mut namespaces = NamespaceContext::new();
        let mut root = None;

        while cursor.advance() {
            if cursor.node_kind() == Some(NodeKind::Element) {
                root = Some(read_element(
                    &mut cursor,
                    &mut namespaces,
                    location.as_ref(),
                    limits,
                    1,
                )?);
                break;
            }
        }

        let source = location.as_ref().map(Location::to_uri);
        let errors: Vec<ParseError> = cursor
            .errors()
            .iter()
            .map(|err| {
                let error = ParseError::new(err.message.clone()).with_location(err.line, err.col);
                match &source {
                    Some(source) => error.with_source(source.clone()),
                    None => error,
                }
            })
            .collect();

        let Some(root) = root else {
            let error = errors
                .first()
                .cloned()
                .unwrap_or_else(|| ParseError::new("Document has no root element"));
            return Err(Error::Parse(error));
        };

        for error in &errors {
            tracing::debug!(%error, "recovered from markup error");
        }

        Ok(Self {
            root: Some(root),
            location,
            errors,
        })
    }

    /// Get the root element
    pub fn root(&self) -> Option<&Element> {
        self.root.as_ref()
    }

    /// Take the root element out of the document
    pub fn into_root(self) -> Option<Element> {
        self.root
    }
}

// The cursor is on a start tag. On return it sits on the element's end tag,
// or still on the start tag for a self-closing element.
fn read_element(
    cursor: &mut TokenCursor<'_>,
    namespaces: &mut NamespaceContext,
    base: Option<&Location>,
    limits: &Limits,
    depth: usize,
) -> Result<Element> {
    limits.check_xml_depth(depth)?;
    namespaces.push_scope();

    let mut namespace_decls = Vec::new();
    let mut attributes = Vec::new();
    for (key, value) in cursor.attributes() {
        let value = value.clone().unwrap_or_default();
        if key == "xmlns" {
            namespaces.set_default_namespace(value.clone());
            namespace_decls.push((None, value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            namespaces.add_prefix(prefix, value.clone());
            namespace_decls.push((Some(prefix.to_string()), value));
        } else {
            attributes.push((key.clone(), value));
        }
    }

    let mut element = Element::new(namespaces.resolve_element(cursor.name().unwrap_or_default()));
    element.attributes = attributes;
    element.namespace_decls = namespace_decls;
    element.line = cursor.current_range().map(|r| r.start_line).unwrap_or(0);
    element.base = base.cloned();

    if cursor.advance_into_children() {
        loop {
            match cursor.node_kind() {
                Some(NodeKind::Element) => {
                    let child = read_element(cursor, namespaces, base, limits, depth + 1)?;
                    element.children.push(Node::Element(child));
                }
                Some(NodeKind::Text) | Some(NodeKind::CData) => {
                    if let Some(
                        ParseEvent::Characters { text, .. } | ParseEvent::CData { text, .. },
                    ) = cursor.current()
                    {
                        match element.children.last_mut() {
                            Some(Node::Text(last)) => last.push_str(text),
                            _ => element.children.push(Node::Text(text.clone())),
                        }
                    }
                }
                _ => {}
            }

            if !cursor.advance_to_next_sibling() {
                break;
            }
        }
    }

    namespaces.pop_scope();
    Ok(element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_simple_xml() {
        let xml = r#"<root><child>text</child></root>"#;
        let doc = Document::from_string(xml).unwrap();

        let root = doc.root.unwrap();
        assert_eq!(root.local_name(), "root");
        assert_eq!(root.children.len(), 1);
        let child = root.child_elements().next().unwrap();
        assert_eq!(child.local_name(), "child");
        assert_eq!(child.text_content(), "text");
    }

    #[test]
    fn test_parse_with_attributes() {
        let xml = r#"<root attr1="value1" attr2="value2"><child/></root>"#;
        let doc = Document::from_string(xml).unwrap();

        let root = doc.root.unwrap();
        assert_eq!(root.attribute("attr1"), Some("value1"));
        assert_eq!(root.attribute("attr2"), Some("value2"));
        assert_eq!(root.attribute("attr3"), None);
    }

    #[test]
    fn test_namespaces_resolved_per_scope() {
        let xml = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0" xmlns:a="urn:a">
  <start><a:doc/><element name="x"><empty/></element></start>
</grammar>"#;
        let doc = Document::from_string(xml).unwrap();

        let root = doc.root.unwrap();
        assert!(root.is(crate::RNG_NAMESPACE, "grammar"));
        assert_eq!(
            root.namespace_decls,
            vec![
                (None, crate::RNG_NAMESPACE.to_string()),
                (Some("a".to_string()), "urn:a".to_string())
            ]
        );

        let start = root.child_elements().next().unwrap();
        let names: Vec<_> = start
            .child_elements()
            .map(|e| (e.namespace().unwrap_or(""), e.local_name()))
            .collect();
        assert_eq!(
            names,
            vec![("urn:a", "doc"), (crate::RNG_NAMESPACE, "element")]
        );
        assert_eq!(start.line, 2);
    }

    #[test]
    fn test_text_and_cdata_are_merged() {
        let doc = Document::from_string("<value>a<![CDATA[b]]>c</value>").unwrap();
        let root = doc.root.unwrap();
        assert_eq!(root.children, vec![Node::Text("abc".to_string())]);
    }

    #[test]
    fn test_recovered_errors_are_kept() {
        let doc = Document::from_string("<a><b></a>").unwrap();
        assert_eq!(doc.errors.len(), 1);
        assert_eq!(doc.root.unwrap().child_elements().count(), 1);
    }

    #[test]
    fn test_no_root_is_an_error() {
        assert!(matches!(
            Document::from_string("   "),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_depth_limit() {
        let mut xml = String::new();
        for _ in 0..20 {
            xml.push_str("<a>");
        }
        let limits = Limits::strict().with_max_xml_depth(5);
        assert!(matches!(
            Document::parse(xml.as_bytes(), None, &limits),
            Err(Error::LimitExceeded(_))
        ));
    }

    #[test]
    fn test_attribute_editing() {
        let mut element = Element::new(QName::local("element"));
        element.set_attribute("name", "x");
        element.set_attribute("name", "y");
        assert_eq!(element.attribute("name"), Some("y"));
        assert_eq!(element.remove_attribute("name"), Some("y".to_string()));
        assert!(!element.has_attribute("name"));
    }
}
