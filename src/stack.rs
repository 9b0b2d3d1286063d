//! Open element stack used while building a symbol tree

use crate::symbol::NodeId;

/// One open element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Element name as written in the start tag
    pub name: String,
    /// Node created for the element
    pub node: NodeId,
    /// Parent the element was attached to
    pub parent: NodeId,
    /// Reader nesting depth of the start tag
    pub depth: usize,
}

/// LIFO stack of open elements
#[derive(Debug, Clone, Default)]
pub struct ElementStack {
    frames: Vec<Frame>,
}

impl ElementStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an open element
    pub fn push(&mut self, name: impl Into<String>, node: NodeId, parent: NodeId, depth: usize) {
        self.frames.push(Frame {
            name: name.into(),
            node,
            parent,
            depth,
        });
    }

    /// Pop the innermost open element
    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Innermost open element
    pub fn peek(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// Whether some open element has this name
    pub fn contains(&self, name: &str) -> bool {
        self.frames.iter().any(|frame| frame.name == name)
    }

    /// Number of open elements
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when nothing is open
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
