//! Element paths and their element patterns
//!
//! An [`XmlPath`] is the chain of element names from the top of a
//! document down to one node. [`XmlPath::matching_defines`] walks a
//! grammar in lock-step with the path and returns the `element` patterns
//! the last name can be an instance of.

use crate::rng::{DefineArena, DefineId, DefineType, Schema};
use crate::symbol::{NodeId, SymbolTree};
use std::fmt;

// Ref chains are bounded by the path for elements only
const MAX_DEPTH: usize = 256;

/// Element names from the first element down to a node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlPath {
    nodes: Vec<NodeId>,
    names: Vec<String>,
}

impl XmlPath {
    /// Path of `node`, empty for the root
    pub fn from_node(tree: &SymbolTree, node: NodeId) -> Self {
        let nodes = tree.path_to(node);
        let names = nodes.iter().map(|id| tree[*id].element_name.clone()).collect();
        Self { nodes, names }
    }

    /// Nodes along the path
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Qualified element names along the path
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True for the root path
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// `element` patterns of `schema` matching the whole path
    ///
    /// An empty path has no element to match; use [`Schema::start`] as the
    /// content to complete at the top of the document.
    pub fn matching_defines(&self, schema: &Schema) -> Vec<DefineId> {
        let mut out = Vec::new();
        if !self.is_empty() {
            collect(schema.defines(), &self.names, 0, schema.start(), &mut out, 0);
        }
        out
    }
}

impl fmt::Display for XmlPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.names.is_empty() {
            return write!(f, "/");
        }
        for name in &self.names {
            write!(f, "/{}", name)?;
        }
        Ok(())
    }
}

fn collect(
    arena: &DefineArena,
    path: &[String],
    index: usize,
    first: Option<DefineId>,
    out: &mut Vec<DefineId>,
    depth: usize,
) {
    if depth > MAX_DEPTH {
        tracing::trace!(index, "define walk too deep");
        return;
    }

    for id in arena.siblings(first) {
        let def = &arena[id];
        let (next_index, child) = match def.kind {
            DefineType::Element => {
                if !arena.is_name_class_match(id, &path[index]) {
                    continue;
                }
                (index + 1, def.content)
            }
            DefineType::Noop
            | DefineType::Start
            | DefineType::Define
            | DefineType::Ref
            | DefineType::ParentRef
            | DefineType::ExternalRef
            | DefineType::ZeroOrMore
            | DefineType::OneOrMore
            | DefineType::Optional
            | DefineType::Choice
            | DefineType::Group
            | DefineType::Interleave => (index, def.content),
            _ => continue,
        };

        if next_index == path.len() {
            if !out.contains(&id) {
                out.push(id);
            }
        } else if child.is_some() {
            collect(arena, path, next_index, child, out, depth + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loaders::Loader;
    use crate::symbol::{ChildKind, SymbolKind, SymbolNode};
    use pretty_assertions::assert_eq;

    const BOOK: &str = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <start><ref name="book"/></start>
  <define name="book">
    <element name="book">
      <oneOrMore><ref name="chapter"/></oneOrMore>
    </element>
  </define>
  <define name="chapter">
    <element name="chapter">
      <element name="title"><text/></element>
      <zeroOrMore><ref name="chapter"/></zeroOrMore>
    </element>
  </define>
</grammar>"#;

    fn schema() -> Schema {
        Schema::parse(BOOK.as_bytes(), None, &Loader::new()).unwrap()
    }

    fn path(names: &[&str]) -> XmlPath {
        let mut tree = SymbolTree::new(None);
        let mut parent = tree.root();
        for name in names {
            parent = tree.append(parent, SymbolNode::new(name, SymbolKind::Element), ChildKind::Visible);
        }
        XmlPath::from_node(&tree, parent)
    }

    #[test]
    fn test_path_from_node() {
        let path = path(&["book", "chapter"]);
        assert_eq!(path.len(), 2);
        assert_eq!(path.to_string(), "/book/chapter");
        assert_eq!(XmlPath::default().to_string(), "/");
    }

    #[test]
    fn test_matching_defines_follow_refs() {
        let schema = schema();
        let arena = schema.defines();

        let found = path(&["book", "chapter", "chapter", "title"]).matching_defines(&schema);
        assert_eq!(found.len(), 1);
        assert_eq!(arena[found[0]].kind, DefineType::Element);
        assert_eq!(arena[found[0]].name.as_deref(), Some("title"));

        assert!(path(&["book", "title"]).matching_defines(&schema).is_empty());
        assert!(path(&["chapter"]).matching_defines(&schema).is_empty());
        assert!(XmlPath::default().matching_defines(&schema).is_empty());
    }
}
