//! Complete analysis of a document: tree, schemas and validation
//!
//! [`TreeBuilder`] is the synchronous pipeline used by the CLI and by tests:
//! parse the document, fetch the schemas it references, then run
//! [`validate`]. The service runs the same steps on worker tasks and shares
//! fetched schemas between documents.

use crate::analysis::{Analysis, Diagnostic};
use crate::error::Result;
use crate::loaders::Loader;
use crate::locations::Location;
use crate::parser::DocumentParser;
use crate::path::XmlPath;
use crate::rng::Schema;
use crate::schema::{self, SchemaCacheEntry, SchemaKind, SchemaState};
use crate::symbol::{NodeId, NodeState, SymbolTree};

/// Builds and validates analyses on the current thread
#[derive(Debug, Clone, Default)]
pub struct TreeBuilder {
    parser: DocumentParser,
    loader: Loader,
}

impl TreeBuilder {
    /// Builder with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a configured document parser
    pub fn with_parser(mut self, parser: DocumentParser) -> Self {
        self.parser = parser;
        self
    }

    /// Use a configured loader for schemas
    pub fn with_loader(mut self, loader: Loader) -> Self {
        self.loader = loader;
        self
    }

    /// Parse `content`, fetch its schemas and validate it
    pub fn build(&self, file: Option<&Location>, content: &[u8], sequence: i64) -> Result<Analysis> {
        let mut analysis = self.parser.parse(file, content, sequence)?;
        for entry in analysis.schemas.iter_mut() {
            let Some(location) = entry.file.clone() else {
                continue;
            };
            let fetched = schema::fetch_blocking(&self.loader, &location, entry.kind);
            entry.merge_from(&fetched);
        }
        validate(&mut analysis);
        Ok(analysis)
    }
}

/// Turn schema states into diagnostics and check the tree against RNG schemas
pub fn validate(analysis: &mut Analysis) {
    let mut diagnostics = Vec::new();
    for entry in &analysis.schemas {
        validate_entry(&analysis.tree, entry, &mut diagnostics);
    }
    tracing::debug!(count = diagnostics.len(), "validation done");
    analysis.diagnostics.extend(diagnostics);
}

fn validate_entry(tree: &SymbolTree, entry: &SchemaCacheEntry, out: &mut Vec<Diagnostic>) {
    let uri = entry.file.as_ref().map(Location::to_uri).unwrap_or_default();
    let (line, col) = (entry.line + 1, entry.col + 1);

    if entry.state == SchemaState::CantLoad {
        let message = entry
            .error_message
            .clone()
            .unwrap_or_else(|| format!("Can't load the schema: '{}'", uri));
        out.push(Diagnostic::error(message, line, col));
        return;
    }

    match entry.kind {
        SchemaKind::Rng => match (&entry.schema, entry.state) {
            (Some(schema), SchemaState::Parsed) => check_structure(tree, schema, out),
            (_, SchemaState::CantParse) => out.push(Diagnostic::error(
                format!("Can't parse the schema: '{}'", uri),
                line,
                col,
            )),
            _ => {}
        },
        SchemaKind::XmlSchema => out.push(Diagnostic::error(
            format!("Can't validate the schema: '{}'", uri),
            line,
            col,
        )),
        SchemaKind::Dtd => {}
    }
}

fn check_structure(tree: &SymbolTree, schema: &Schema, out: &mut Vec<Diagnostic>) {
    let mut pending: Vec<NodeId> = tree.children(tree.root());
    pending.reverse();

    while let Some(id) = pending.pop() {
        let node = &tree[id];
        if node.state == NodeState::Ok && XmlPath::from_node(tree, id).matching_defines(schema).is_empty() {
            let range = node.start_tag;
            out.push(
                Diagnostic::warning(
                    format!("Element '{}' is not allowed here", node.element_name),
                    range.start_line,
                    range.start_col,
                )
                .with_end(range.end_line, range.end_col),
            );
            continue;
        }
        pending.extend(tree.children(id).into_iter().rev());
    }
}
