//! Result of analysing one version of a document

use crate::locations::Location;
use crate::schema::SchemaCacheEntry;
use crate::symbol::{NodeId, SymbolTree};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Suspicious but usable
    Warning,
    /// Invalid input, parsing went on
    Error,
    /// Invalid input the reader could not get past
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Fatal => write!(f, "fatal"),
        }
    }
}

/// A message anchored in the document
///
/// Positions are 1-based, columns count bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Message
    pub message: String,
    /// Start line
    pub line: u32,
    /// Start column
    pub col: u32,
    /// End line and column, when the diagnostic covers a range
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<(u32, u32)>,
}

impl Diagnostic {
    /// Point diagnostic
    pub fn new(severity: Severity, message: impl Into<String>, line: u32, col: u32) -> Self {
        Self {
            severity,
            message: message.into(),
            line,
            col,
            end: None,
        }
    }

    /// Warning at a point
    pub fn warning(message: impl Into<String>, line: u32, col: u32) -> Self {
        Self::new(Severity::Warning, message, line, col)
    }

    /// Error at a point
    pub fn error(message: impl Into<String>, line: u32, col: u32) -> Self {
        Self::new(Severity::Error, message, line, col)
    }

    /// Extend the diagnostic to a range
    pub fn with_end(mut self, line: u32, col: u32) -> Self {
        self.end = Some((line, col));
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}: {}", self.line, self.col, self.severity, self.message)
    }
}

/// Receiver of diagnostics, e.g. an editor's problem list
pub trait DiagnosticsSink: Send + Sync {
    /// Report one diagnostic of `file`
    fn report(&self, file: &Location, diagnostic: &Diagnostic);
}

impl<F> DiagnosticsSink for F
where
    F: Fn(&Location, &Diagnostic) + Send + Sync,
{
    fn report(&self, file: &Location, diagnostic: &Diagnostic) {
        self(file, diagnostic)
    }
}

/// A `<requires lib="…" version="…"/>` declaration of a GtkBuilder file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    /// Library name
    pub lib: String,
    /// Required version
    pub version: String,
}

/// Symbol tree, diagnostics and schema references of one document version
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Symbol tree, shared with callers of the service
    pub tree: Arc<SymbolTree>,
    /// Markup, schema and validation diagnostics
    pub diagnostics: Vec<Diagnostic>,
    /// Schemas the document references
    pub schemas: Vec<SchemaCacheEntry>,
    /// Buffer version the analysis was built from
    pub sequence: i64,
    /// GtkBuilder file
    pub is_ui: bool,
    /// GtkBuilder library requirements
    pub requires: Vec<Requirement>,
}

impl Analysis {
    /// Empty analysis around a tree
    pub fn new(tree: SymbolTree, sequence: i64) -> Self {
        Self {
            tree: Arc::new(tree),
            diagnostics: Vec::new(),
            schemas: Vec::new(),
            sequence,
            is_ui: false,
            requires: Vec::new(),
        }
    }

    /// Root of the symbol tree
    pub fn root_node(&self) -> NodeId {
        self.tree.root()
    }

    /// Parsed RELAX NG schemas attached to the document
    pub fn rng_schemas(&self) -> impl Iterator<Item = &crate::rng::Schema> {
        self.schemas
            .iter()
            .filter(|entry| entry.is_parsed())
            .filter_map(|entry| entry.schema.as_deref())
    }

    /// Version of a required library
    pub fn required_version(&self, lib: &str) -> Option<&str> {
        self.requires
            .iter()
            .find(|req| req.lib == lib)
            .map(|req| req.version.as_str())
    }

    /// Send every diagnostic to a sink
    pub fn report(&self, file: &Location, sink: &dyn DiagnosticsSink) {
        for diagnostic in &self.diagnostics {
            sink.report(file, diagnostic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_diagnostic_display() {
        let diagnostic = Diagnostic::error("Opening and ending tag mismatch", 3, 7).with_end(3, 10);
        assert_eq!(diagnostic.to_string(), "3:7: error: Opening and ending tag mismatch");
        assert_eq!(diagnostic.end, Some((3, 10)));
        assert!(Severity::Warning < Severity::Fatal);
    }

    #[test]
    fn test_report_to_sink() {
        let mut analysis = Analysis::new(SymbolTree::new(None), 4);
        analysis.diagnostics.push(Diagnostic::warning("a", 1, 1));
        analysis.diagnostics.push(Diagnostic::error("b", 2, 1));

        let seen = Mutex::new(Vec::new());
        let sink = |_: &Location, d: &Diagnostic| seen.lock().push(d.message.clone());
        analysis.report(&Location::String("doc".to_string()), &sink);
        assert_eq!(*seen.lock(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_required_version() {
        let mut analysis = Analysis::new(SymbolTree::new(None), 0);
        analysis.requires.push(Requirement {
            lib: "gtk".to_string(),
            version: "4.0".to_string(),
        });
        assert_eq!(analysis.required_version("gtk"), Some("4.0"));
        assert_eq!(analysis.required_version("adw"), None);
        assert_eq!(analysis.rng_schemas().count(), 0);
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(Diagnostic::warning("w", 1, 2)).unwrap();
        assert_eq!(json["severity"], "warning");
        assert!(json.get("end").is_none());
    }
}
