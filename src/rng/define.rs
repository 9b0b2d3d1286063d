//! RELAX NG pattern nodes
//!
//! Patterns live in a [`DefineArena`] and point at each other through
//! [`DefineId`] handles. Lists of patterns (a choice's alternatives, an
//! element's content, an element's attributes) are singly linked through
//! `next`, starting at the owner's `content`, `attributes` or `name_class`
//! handle. One `define` may be the target of many `ref`s.

use crate::names;
use serde::Serialize;
use std::ops::{Index, IndexMut};

/// Handle of a pattern in a [`DefineArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DefineId(pub usize);

/// Pattern kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DefineType {
    /// Placeholder left by simplification
    Noop,
    /// Named `<define>`
    Define,
    /// `<element>`
    Element,
    /// `<attribute>`
    Attribute,
    /// `<start>`
    Start,
    /// `<param>`
    Param,
    /// `<except>` of a name class
    Except,
    /// `<text>`
    Text,
    /// `<data>`
    Datatype,
    /// `<value>`
    Value,
    /// `<list>`
    List,
    /// `<ref>`
    Ref,
    /// `<parentRef>`
    ParentRef,
    /// `<externalRef>`
    ExternalRef,
    /// `<empty>`
    Empty,
    /// `<notAllowed>`
    NotAllowed,
    /// `<oneOrMore>`
    OneOrMore,
    /// `<zeroOrMore>`
    ZeroOrMore,
    /// `<optional>`
    Optional,
    /// `<choice>`
    Choice,
    /// `<group>`
    Group,
    /// `<interleave>`
    Interleave,
    /// Group of attributes
    AttributesGroup,
}

impl DefineType {
    /// Name used in dumps
    pub fn as_str(&self) -> &'static str {
        match self {
            DefineType::Noop => "noop",
            DefineType::Define => "define",
            DefineType::Element => "element",
            DefineType::Attribute => "attribute",
            DefineType::Start => "start",
            DefineType::Param => "param",
            DefineType::Except => "except",
            DefineType::Text => "text",
            DefineType::Datatype => "datatype",
            DefineType::Value => "value",
            DefineType::List => "list",
            DefineType::Ref => "ref",
            DefineType::ParentRef => "parentRef",
            DefineType::ExternalRef => "externalRef",
            DefineType::Empty => "empty",
            DefineType::NotAllowed => "notAllowed",
            DefineType::OneOrMore => "oneOrMore",
            DefineType::ZeroOrMore => "zeroOrMore",
            DefineType::Optional => "optional",
            DefineType::Choice => "choice",
            DefineType::Group => "group",
            DefineType::Interleave => "interleave",
            DefineType::AttributesGroup => "attributesGroup",
        }
    }

    /// Kinds that only forward to their content
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            DefineType::Define
                | DefineType::Ref
                | DefineType::ParentRef
                | DefineType::ExternalRef
        )
    }

    /// `zeroOrMore`, `oneOrMore` and `optional`
    pub fn is_repeat(&self) -> bool {
        matches!(
            self,
            DefineType::ZeroOrMore | DefineType::OneOrMore | DefineType::Optional
        )
    }
}

impl std::fmt::Display for DefineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How same-named patterns are merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Combine {
    /// `combine="choice"`
    Choice,
    /// `combine="interleave"`
    Interleave,
}

impl Combine {
    /// Parse a `combine` attribute value
    pub fn from_attribute(value: &str) -> Option<Self> {
        match value.trim() {
            "choice" => Some(Combine::Choice),
            "interleave" => Some(Combine::Interleave),
            _ => None,
        }
    }
}

/// One pattern node
#[derive(Debug, Clone, PartialEq)]
pub struct Define {
    /// Pattern kind
    pub kind: DefineType,
    /// Element/attribute name, define or ref target, or literal value
    pub name: Option<String>,
    /// Namespace of the name
    pub ns: Option<String>,
    /// Parent as of the last simplification
    pub parent: Option<DefineId>,
    /// Next sibling
    pub next: Option<DefineId>,
    /// First content pattern
    pub content: Option<DefineId>,
    /// First attribute pattern of an element
    pub attributes: Option<DefineId>,
    /// Name class for wildcard names
    pub name_class: Option<DefineId>,
    /// Line of the schema element this pattern comes from
    pub line: u32,
    /// `combine` of the `<define>` or `<start>` this pattern comes from
    pub combine: Option<Combine>,
    /// The pattern comes from another grammar through `externalRef`
    pub is_external_ref: bool,
    /// The ref target has already been simplified through this ref
    pub is_ref_simplified: bool,
}

impl Define {
    fn new(kind: DefineType, parent: Option<DefineId>, name: Option<String>, line: u32) -> Self {
        Self {
            kind,
            name,
            ns: None,
            parent,
            next: None,
            content: None,
            attributes: None,
            name_class: None,
            line,
            combine: None,
            is_external_ref: false,
            is_ref_simplified: false,
        }
    }
}

/// Storage for all patterns of one schema
#[derive(Debug, Clone, Default)]
pub struct DefineArena {
    defines: Vec<Define>,
}

impl DefineArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new pattern
    pub fn alloc(
        &mut self,
        kind: DefineType,
        parent: Option<DefineId>,
        name: Option<String>,
        line: u32,
    ) -> DefineId {
        self.defines.push(Define::new(kind, parent, name, line));
        DefineId(self.defines.len() - 1)
    }

    /// Number of allocated patterns
    pub fn len(&self) -> usize {
        self.defines.len()
    }

    /// Check whether the arena is empty
    pub fn is_empty(&self) -> bool {
        self.defines.is_empty()
    }

    /// Get a pattern, if the handle belongs to this arena
    pub fn get(&self, id: DefineId) -> Option<&Define> {
        self.defines.get(id.0)
    }

    /// Iterate over a sibling chain starting at `first`
    pub fn siblings(&self, first: Option<DefineId>) -> Siblings<'_> {
        Siblings {
            arena: self,
            current: first,
            remaining: self.defines.len(),
        }
    }

    /// Iterate over the content list of a pattern
    pub fn content(&self, id: DefineId) -> Siblings<'_> {
        self.siblings(self[id].content)
    }

    /// Append `def` at the end of the chain starting at `first`
    pub fn append(&mut self, first: DefineId, def: DefineId) {
        let last = self.siblings(Some(first)).last().unwrap_or(first);
        if last != def {
            self[last].next = Some(def);
        }
    }

    /// Append `def` to the name class list of `owner`
    pub fn append_name_class(&mut self, owner: DefineId, def: DefineId) {
        match self[owner].name_class {
            Some(first) => self.append(first, def),
            None => self[owner].name_class = Some(def),
        }
    }

    /// Set `parent` on every pattern of a chain
    pub fn propagate_parent(&mut self, first: Option<DefineId>, parent: DefineId) {
        let chain: Vec<_> = self.siblings(first).collect();
        for id in chain {
            self[id].parent = Some(parent);
        }
    }

    /// Check an element or attribute name against the name class of `id`
    ///
    /// Prefixes are ignored; only local names are compared.
    pub fn is_name_class_match(&self, id: DefineId, name: &str) -> bool {
        self.matches_name(id, names::local_name(name), 0)
    }

    fn matches_name(&self, id: DefineId, local: &str, depth: usize) -> bool {
        if depth > self.defines.len() {
            return false;
        }

        let def = &self[id];
        match def.kind {
            DefineType::Choice => self
                .siblings(def.name_class)
                .any(|alt| self.matches_name(alt, local, depth + 1)),
            DefineType::Except => !self
                .siblings(def.content)
                .any(|alt| self.matches_name(alt, local, depth + 1)),
            _ => match (&def.name, def.name_class) {
                (Some(name), _) => name == local,
                (None, None) => true,
                (None, Some(name_class)) => self.matches_name(name_class, local, depth + 1),
            },
        }
    }

    /// Short description used by dumps and logs
    pub fn describe(&self, id: DefineId) -> String {
        let def = &self[id];
        let mut text = def.kind.as_str().to_string();
        if let Some(name) = &def.name {
            text.push_str(&format!(" name=\"{}\"", name));
        }
        if let Some(ns) = def.ns.as_deref().filter(|ns| !ns.is_empty()) {
            text.push_str(&format!(" ns=\"{}\"", ns));
        }
        text
    }
}

impl Index<DefineId> for DefineArena {
    type Output = Define;

    fn index(&self, id: DefineId) -> &Define {
        &self.defines[id.0]
    }
}

impl IndexMut<DefineId> for DefineArena {
    fn index_mut(&mut self, id: DefineId) -> &mut Define {
        &mut self.defines[id.0]
    }
}

/// Iterator over a sibling chain
///
/// Stops after as many steps as there are patterns, so a corrupted chain
/// cannot loop forever.
pub struct Siblings<'a> {
    arena: &'a DefineArena,
    current: Option<DefineId>,
    remaining: usize,
}

impl Iterator for Siblings<'_> {
    type Item = DefineId;

    fn next(&mut self) -> Option<DefineId> {
        let id = self.current?;
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.current = self.arena.get(id).and_then(|def| def.next);
        Some(id)
    }
}
