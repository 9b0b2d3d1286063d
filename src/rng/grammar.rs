//! Grammars: named defines, start patterns and pending references

use super::define::DefineId;
use indexmap::IndexMap;

/// Handle of a grammar inside a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GrammarId(pub usize);

/// One `<grammar>` (or the implicit grammar of a bare pattern)
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    /// First start pattern (merged into one after parsing)
    pub start_defines: Option<DefineId>,
    /// `<define>`s by name, several before merging
    pub defines: IndexMap<String, Vec<DefineId>>,
    /// `ref`/`parentRef` patterns by target name
    pub refs: IndexMap<String, Vec<DefineId>>,
    /// Enclosing grammar
    pub parent: Option<GrammarId>,
    /// Nested grammars
    pub children: Vec<GrammarId>,
}

impl Grammar {
    /// Create an empty grammar
    pub fn new(parent: Option<GrammarId>) -> Self {
        Self {
            parent,
            ..Self::default()
        }
    }

    /// Record a `<define>`
    pub fn add_define(&mut self, name: &str, define: DefineId) {
        self.defines.entry(name.to_string()).or_default().push(define);
    }

    /// Record a reference to be linked once the grammar is complete
    pub fn add_ref(&mut self, name: &str, reference: DefineId) {
        self.refs.entry(name.to_string()).or_default().push(reference);
    }

    /// First define recorded under a name
    pub fn define(&self, name: &str) -> Option<DefineId> {
        self.defines.get(name).and_then(|defs| defs.first().copied())
    }
}
