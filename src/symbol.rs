//! Symbol tree of a parsed document
//!
//! Every element of the document becomes a [`SymbolNode`] stored in a
//! [`SymbolTree`] arena. Children are tagged [`ChildKind::Visible`] or
//! [`ChildKind::Internal`]: internal children (GtkBuilder `<property>`,
//! `<attribute>`, ...) stay in the tree for completion and lookups but are
//! skipped by the visible outline, whose counting walks *through* them.

use crate::locations::Location;
use crate::names;
use crate::sax::NodeRange;
use serde::Serialize;
use std::fmt;
use std::ops::{Index, IndexMut};

/// Handle of a node in a [`SymbolTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub usize);

/// How a child is attached to its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChildKind {
    /// Shown in the outline
    Visible,
    /// Hidden helper node
    Internal,
}

/// Parse state of a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeState {
    /// Start tag complete
    #[default]
    Ok,
    /// Start tag never got its `>`
    NotClosed,
    /// Not known yet
    Unknown,
}

/// Symbol kind, used by presentation layers to pick icons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SymbolKind {
    /// Document root
    Root,
    /// Plain XML element
    Element,
    /// `<object>`
    UiObject,
    /// `<template>`
    UiTemplate,
    /// `<child>`
    UiChild,
    /// `<packing>`
    UiPacking,
    /// `<property>`
    UiProperty,
    /// `<style>`
    UiStyle,
    /// `<class>` under `<style>`
    UiStyleClass,
    /// `<menu>`
    UiMenu,
    /// `<submenu>`
    UiSubmenu,
    /// `<section>`
    UiSection,
    /// `<item>`
    UiItem,
    /// `<attribute>` under a menu entry
    UiMenuAttribute,
}

/// Position of a cursor relative to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativePosition {
    /// Before the start tag
    Before,
    /// Inside the start tag
    InStartTag,
    /// Between start and end tags
    InContent,
    /// Inside the end tag
    InEndTag,
    /// After the node
    After,
}

/// Display label of a node: a name plus `key: value` decorations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Label {
    /// Main text
    pub name: String,
    /// Extra facts, in display order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub decorations: Vec<(String, String)>,
}

impl Label {
    /// Label with no decorations
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            decorations: Vec::new(),
        }
    }

    /// Add a decoration
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.decorations.push((key.into(), value.into()));
        self
    }

    /// Value of a decoration
    pub fn decoration(&self, key: &str) -> Option<&str> {
        self.decorations
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for (key, value) in &self.decorations {
            write!(f, " {}: {}", key, value)?;
        }
        Ok(())
    }
}

/// One node of the document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolNode {
    /// Qualified element name, `unknown` for a nameless tag
    pub element_name: String,
    /// Outline label
    pub label: Label,
    /// Symbol kind
    pub kind: SymbolKind,
    /// Captured text content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Attributes in document order
    pub attributes: Vec<(String, Option<String>)>,
    /// Parse state
    pub state: NodeState,
    /// Range of the start tag
    pub start_tag: NodeRange,
    /// Range of the end tag, once seen
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_tag: Option<NodeRange>,
    #[serde(skip)]
    parent: Option<NodeId>,
    #[serde(skip)]
    children: Vec<(NodeId, ChildKind)>,
}

impl SymbolNode {
    /// Create a node labelled with its element name
    pub fn new(element_name: &str, kind: SymbolKind) -> Self {
        let element_name = if element_name.is_empty() {
            "unknown".to_string()
        } else {
            element_name.to_string()
        };
        Self {
            label: Label::new(element_name.clone()),
            element_name,
            kind,
            value: None,
            attributes: Vec::new(),
            state: NodeState::Ok,
            start_tag: NodeRange::default(),
            end_tag: None,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Replace the label
    pub fn with_label(mut self, label: Label) -> Self {
        self.label = label;
        self
    }

    /// Local part of the element name
    pub fn local_name(&self) -> &str {
        names::local_name(&self.element_name)
    }

    /// Prefix of the element name
    pub fn prefix(&self) -> Option<&str> {
        names::split_qname(&self.element_name).0
    }

    /// Attribute value; the last occurrence wins
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Check whether an attribute is present, valued or not
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|(n, _)| n == name)
    }

    /// Attribute names in document order
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|(n, _)| n.as_str())
    }

    /// Parent node, `None` for the root
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Direct children, internal ones included
    pub fn direct_children(&self) -> &[(NodeId, ChildKind)] {
        &self.children
    }

    /// Whether the end tag was seen
    pub fn has_end_tag(&self) -> bool {
        self.end_tag.is_some()
    }

    /// Where a cursor sits relative to this node
    pub fn compare_location(&self, line: u32, col: u32) -> RelativePosition {
        use std::cmp::Ordering;

        match self.start_tag.compare(line, col) {
            Ordering::Less => return RelativePosition::Before,
            Ordering::Equal => return RelativePosition::InStartTag,
            Ordering::Greater => {}
        }
        match self.end_tag.map(|end| end.compare(line, col)) {
            Some(Ordering::Less) => RelativePosition::InContent,
            Some(Ordering::Equal) => RelativePosition::InEndTag,
            _ => RelativePosition::After,
        }
    }
}

/// Arena of [`SymbolNode`]s rooted at a synthetic `root` node
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolTree {
    nodes: Vec<SymbolNode>,
    file: Option<Location>,
}

impl SymbolTree {
    /// Create a tree holding only its root
    pub fn new(file: Option<Location>) -> Self {
        Self {
            nodes: vec![SymbolNode::new("root", SymbolKind::Root)],
            file,
        }
    }

    /// The root node
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// File the tree was built from
    pub fn file(&self) -> Option<&Location> {
        self.file.as_ref()
    }

    /// Number of nodes, the root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A tree always holds its root; true when that is all it holds
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Node by handle
    pub fn get(&self, id: NodeId) -> Option<&SymbolNode> {
        self.nodes.get(id.0)
    }

    /// Attach `node` as the last child of `parent`
    pub fn append(&mut self, parent: NodeId, mut node: SymbolNode, kind: ChildKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent.0].children.push((id, kind));
        id
    }

    /// Parent of a node
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Number of visible children, counted through internal ones
    pub fn n_children(&self, id: NodeId) -> usize {
        self.nodes[id.0]
            .children
            .iter()
            .map(|&(child, kind)| match kind {
                ChildKind::Visible => 1,
                ChildKind::Internal => self.n_children(child),
            })
            .sum()
    }

    /// The `n`th visible child, counted through internal ones
    pub fn nth_child(&self, id: NodeId, n: usize) -> Option<NodeId> {
        let mut pos = 0;
        self.nth_child_deep(id, n, &mut pos)
    }

    fn nth_child_deep(&self, id: NodeId, n: usize, pos: &mut usize) -> Option<NodeId> {
        for &(child, kind) in &self.nodes[id.0].children {
            match kind {
                ChildKind::Internal => {
                    if let Some(found) = self.nth_child_deep(child, n, pos) {
                        return Some(found);
                    }
                }
                ChildKind::Visible => {
                    if *pos == n {
                        return Some(child);
                    }
                    *pos += 1;
                }
            }
        }
        None
    }

    /// Visible children in order
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_visible(id, &mut out);
        out
    }

    fn collect_visible(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for &(child, kind) in &self.nodes[id.0].children {
            match kind {
                ChildKind::Visible => out.push(child),
                ChildKind::Internal => self.collect_visible(child, out),
            }
        }
    }

    /// Number of direct internal children
    pub fn n_internal_children(&self, id: NodeId) -> usize {
        self.internal_children(id).count()
    }

    /// The `n`th direct internal child
    pub fn nth_internal_child(&self, id: NodeId, n: usize) -> Option<NodeId> {
        self.internal_children(id).nth(n)
    }

    /// Direct internal children in order
    pub fn internal_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id.0]
            .children
            .iter()
            .filter(|(_, kind)| *kind == ChildKind::Internal)
            .map(|(child, _)| *child)
    }

    /// Number of direct children, visible and internal
    pub fn n_direct_children(&self, id: NodeId) -> usize {
        self.nodes[id.0].children.len()
    }

    /// The `n`th direct child, visible or internal
    pub fn nth_direct_child(&self, id: NodeId, n: usize) -> Option<NodeId> {
        self.nodes[id.0].children.get(n).map(|(child, _)| *child)
    }

    /// Depth-first walk over every node below `id`, `id` excluded
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id.0]
            .children
            .iter()
            .rev()
            .map(|(child, _)| *child)
            .collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.nodes[next.0].children.iter().rev().map(|(c, _)| *c));
        }
        out
    }

    /// Nodes from the first element below the root down to `id`
    pub fn path_to(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root() {
                break;
            }
            path.push(node);
            current = self.nodes[node.0].parent;
        }
        path.reverse();
        path
    }

    /// Indented outline of the visible tree with start tag ranges
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.write_outline(self.root(), 0, &mut out);
        out
    }

    fn write_outline(&self, id: NodeId, depth: usize, out: &mut String) {
        use std::fmt::Write;

        for child in self.children(id) {
            let node = &self.nodes[child.0];
            let range = node.start_tag;
            let _ = write!(
                out,
                "{:indent$}{} ({}:{}-{}:{})",
                "",
                node.label,
                range.start_line,
                range.start_col,
                range.end_line,
                range.end_col,
                indent = depth * 2
            );
            if node.state == NodeState::NotClosed {
                out.push_str(" [not closed]");
            }
            out.push('\n');
            self.write_outline(child, depth + 1, out);
        }
    }
}

impl Index<NodeId> for SymbolTree {
    type Output = SymbolNode;

    fn index(&self, id: NodeId) -> &SymbolNode {
        &self.nodes[id.0]
    }
}

impl IndexMut<NodeId> for SymbolTree {
    fn index_mut(&mut self, id: NodeId) -> &mut SymbolNode {
        &mut self.nodes[id.0]
    }
}
