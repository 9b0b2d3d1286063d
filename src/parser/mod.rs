//! Document parser: token stream to [`Analysis`]
//!
//! [`DocumentParser::parse`] drives a [`SaxReader`] over one version of a
//! document and builds its [`SymbolTree`]. A [`FrontEnd`] decides how each
//! element is represented; the generic front end makes every element a
//! visible node, the GtkBuilder front end hides helper elements and labels
//! widgets.
//!
//! Malformed markup never fails the parse. Reader errors become
//! diagnostics and the open element stack is repaired:
//!
//! - a start tag missing its `>` is marked [`NodeState::NotClosed`] and
//!   closed as soon as the next tag shows up
//! - an end tag closes every element opened after its own start tag,
//!   marking them not closed
//! - an end tag matching no open element only produces a warning

pub mod generic;
pub mod ui;

pub use generic::GenericFrontEnd;
pub use ui::UiFrontEnd;

use crate::analysis::{Analysis, Diagnostic, Requirement, Severity};
use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::locations::Location;
use crate::names;
use crate::sax::{NodeRange, ParseEvent, RawAttribute, SaxErrorKind, SaxReader};
use crate::schema::{SchemaCacheEntry, SchemaKind};
use crate::stack::ElementStack;
use crate::symbol::{ChildKind, NodeId, NodeState, SymbolKind, SymbolNode, SymbolTree};
use std::path::PathBuf;

/// Bundled grammar of GTK 3 builder files
pub const GTK3_BUILDER_SCHEMA: &str = "gtkbuilder.rng";

/// Bundled grammar of GTK 4 builder files
pub const GTK4_BUILDER_SCHEMA: &str = "gtk4builder.rng";

/// How a front end wants an element attached
#[derive(Debug, Clone)]
pub struct NodeSpec {
    /// Node to attach, start tag and attributes are filled in by the parser
    pub node: SymbolNode,
    /// Visible or internal child
    pub kind: ChildKind,
    /// Keep the element's character data as the node value
    pub capture_text: bool,
}

impl NodeSpec {
    /// Visible node without text capture
    pub fn visible(node: SymbolNode) -> Self {
        Self {
            node,
            kind: ChildKind::Visible,
            capture_text: false,
        }
    }

    /// Internal node without text capture
    pub fn internal(node: SymbolNode) -> Self {
        Self {
            node,
            kind: ChildKind::Internal,
            capture_text: false,
        }
    }

    /// Capture the element's text
    pub fn capturing(mut self) -> Self {
        self.capture_text = true;
        self
    }
}

/// Format specific part of tree building
pub trait FrontEnd {
    /// Node for a start tag under `parent`
    ///
    /// `None` attaches an internal node named after the element.
    fn start_element(
        &mut self,
        parent: &SymbolNode,
        name: &str,
        attributes: &[RawAttribute],
    ) -> Option<NodeSpec>;

    /// Final pass over the complete tree, returns library requirements
    fn post_process(&mut self, _tree: &mut SymbolTree) -> Vec<Requirement> {
        Vec::new()
    }
}

/// Builds an [`Analysis`] from document bytes
#[derive(Debug, Clone, Default)]
pub struct DocumentParser {
    limits: Limits,
    bundled_schemas: Option<PathBuf>,
}

impl DocumentParser {
    /// Parser with default limits and no bundled schemas
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Directory holding `gtkbuilder.rng` and `gtk4builder.rng`
    pub fn with_bundled_schemas(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bundled_schemas = Some(dir.into());
        self
    }

    /// Limits in use
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Parse one version of a document
    ///
    /// Only empty content and limit violations are errors; malformed
    /// markup ends up in [`Analysis::diagnostics`].
    pub fn parse(&self, file: Option<&Location>, content: &[u8], sequence: i64) -> Result<Analysis> {
        if content.is_empty() {
            return Err(Error::Other("Failed to create the XML tree.".to_string()));
        }
        self.limits.check_xml_size(content.len())?;

        let is_ui = is_ui_file(file, content);
        let mut front: Box<dyn FrontEnd> = if is_ui {
            Box::new(UiFrontEnd::new())
        } else {
            Box::new(GenericFrontEnd)
        };

        tracing::debug!(
            file = %file.map(|f| f.to_string()).unwrap_or_default(),
            sequence,
            is_ui,
            "building symbol tree"
        );

        let mut state = TreeState::new(file, &self.limits, front.as_mut());
        if is_ui {
            if let Some(entry) = self.bundled_entry(content) {
                state.schemas.push(entry);
            }
        }
        for event in SaxReader::new(content) {
            state.handle(event);
        }
        state.finish(sequence, is_ui)
    }

    fn bundled_entry(&self, content: &[u8]) -> Option<SchemaCacheEntry> {
        let dir = self.bundled_schemas.as_ref()?;
        let name = if is_gtk3(content) {
            GTK3_BUILDER_SCHEMA
        } else {
            GTK4_BUILDER_SCHEMA
        };
        Some(SchemaCacheEntry::new(SchemaKind::Rng, Some(Location::Path(dir.join(name)))))
    }
}

fn head(content: &[u8], len: usize) -> String {
    String::from_utf8_lossy(&content[..content.len().min(len)]).into_owned()
}

/// GtkBuilder files are `.ui`/`.glade` files with an `<interface>` near the top
pub fn is_ui_file(file: Option<&Location>, content: &[u8]) -> bool {
    let Some(extension) = file.and_then(|f| f.extension()) else {
        return false;
    };
    matches!(extension.as_str(), "ui" | "glade") && head(content, 256).contains("<interface>")
}

fn is_gtk3(content: &[u8]) -> bool {
    let head = head(content, 512);
    head.contains(r#"<requires lib="gtk" version="3"#) || head.contains("<requires lib='gtk' version='3")
}

struct TreeState<'a> {
    file: Option<&'a Location>,
    limits: &'a Limits,
    front: &'a mut dyn FrontEnd,
    tree: SymbolTree,
    stack: ElementStack,
    parent: NodeId,
    capture: Option<NodeId>,
    missing_tag_end: bool,
    too_deep: bool,
    diagnostics: Vec<Diagnostic>,
    schemas: Vec<SchemaCacheEntry>,
}

impl<'a> TreeState<'a> {
    fn new(file: Option<&'a Location>, limits: &'a Limits, front: &'a mut dyn FrontEnd) -> Self {
        let tree = SymbolTree::new(file.cloned());
        let parent = tree.root();
        Self {
            file,
            limits,
            front,
            tree,
            stack: ElementStack::new(),
            parent,
            capture: None,
            missing_tag_end: false,
            too_deep: false,
            diagnostics: Vec::new(),
            schemas: Vec::new(),
        }
    }

    fn handle(&mut self, event: ParseEvent) {
        match event {
            ParseEvent::StartElement {
                name,
                attributes,
                range,
                depth,
                self_closing,
                terminated,
            } => {
                if self.exceeds_depth(depth, range) {
                    return;
                }
                self.start_element(name, attributes, range, depth, self_closing, terminated);
            }
            ParseEvent::EndElement { name, range, depth } => {
                if self.limits.check_xml_depth(depth).is_err() {
                    return;
                }
                self.end_element(&name, range);
            }
            ParseEvent::Characters { text, .. } | ParseEvent::CData { text, .. } => {
                if let Some(id) = self.capture {
                    self.tree[id].value.get_or_insert_with(String::new).push_str(&text);
                }
            }
            ParseEvent::Comment { .. } => {}
            ParseEvent::ProcessingInstruction {
                target, data, range, ..
            } => {
                if !target.eq_ignore_ascii_case("xml") {
                    self.processing_instruction(&data, range);
                }
            }
            ParseEvent::InternalSubset {
                external_id,
                system_id,
                range,
                ..
            } => {
                let declared = |id: &Option<String>| id.as_deref().is_some_and(|id| !id.is_empty());
                if declared(&external_id) && declared(&system_id) {
                    self.schemas.push(
                        SchemaCacheEntry::new(SchemaKind::Dtd, None)
                            .at(range.start_line.saturating_sub(1), range.start_col.saturating_sub(1)),
                    );
                }
            }
            ParseEvent::Error(error) => {
                let severity = match error.kind {
                    SaxErrorKind::Malformed | SaxErrorKind::PrematureEnd => Severity::Fatal,
                    _ => Severity::Error,
                };
                self.diagnostics
                    .push(Diagnostic::new(severity, error.message, error.line, error.col));
            }
        }
    }

    fn exceeds_depth(&mut self, depth: usize, range: NodeRange) -> bool {
        match self.limits.check_xml_depth(depth) {
            Ok(()) => false,
            Err(e) => {
                if !self.too_deep {
                    self.too_deep = true;
                    self.diagnostics
                        .push(Diagnostic::error(e.to_string(), range.start_line, range.start_col));
                }
                true
            }
        }
    }

    fn start_element(
        &mut self,
        name: String,
        attributes: Vec<RawAttribute>,
        range: NodeRange,
        depth: usize,
        self_closing: bool,
        terminated: bool,
    ) {
        self.capture = None;

        if name.is_empty() {
            // a lone `<`: keep it around so the cursor can land on it
            let mut node = SymbolNode::new("", SymbolKind::Element);
            node.state = NodeState::NotClosed;
            node.start_tag = range;
            self.tree.append(self.parent, node, ChildKind::Internal);
            return;
        }

        if self.missing_tag_end {
            self.missing_tag_end = false;
            if self.stack.peek().is_some_and(|frame| frame.name != name) {
                self.close_unterminated();
            }
        }

        let spec = self
            .front
            .start_element(&self.tree[self.parent], &name, &attributes)
            .unwrap_or_else(|| NodeSpec::internal(SymbolNode::new(&name, SymbolKind::Element)));
        let NodeSpec {
            mut node,
            kind,
            capture_text,
        } = spec;
        node.start_tag = range;
        node.attributes = attributes;
        if !terminated {
            node.state = NodeState::NotClosed;
        }

        let id = self.tree.append(self.parent, node, kind);
        if self_closing {
            return;
        }

        self.stack.push(name, id, self.parent, depth);
        self.parent = id;
        if capture_text {
            self.capture = Some(id);
        }
        if !terminated {
            self.missing_tag_end = true;
        }
    }

    fn close_unterminated(&mut self) {
        if let Some(frame) = self.stack.pop() {
            self.tree[frame.node].state = NodeState::NotClosed;
            self.parent = frame.parent;
        }
    }

    fn end_element(&mut self, name: &str, range: NodeRange) {
        self.capture = None;

        if self.missing_tag_end {
            self.missing_tag_end = false;
            if self.stack.peek().is_some_and(|frame| frame.name != name) {
                self.close_unterminated();
            }
        }

        if !self.stack.contains(name) {
            tracing::warn!(element = name, line = range.start_line, "Xml nodes stack empty");
            self.diagnostics.push(
                Diagnostic::warning("Xml nodes stack empty", range.start_line, range.start_col)
                    .with_end(range.end_line, range.end_col),
            );
            return;
        }

        while let Some(frame) = self.stack.pop() {
            if frame.name == name {
                self.tree[frame.node].end_tag = Some(range);
                self.parent = frame.parent;
                break;
            }
            self.tree[frame.node].state = NodeState::NotClosed;
        }
    }

    fn processing_instruction(&mut self, data: &str, range: NodeRange) {
        let Some(href) = names::pseudo_href(data) else {
            return;
        };
        if href.ends_with(GTK3_BUILDER_SCHEMA) || href.ends_with(GTK4_BUILDER_SCHEMA) {
            return;
        }

        let location = Location::resolve(self.file, &href);
        let kind = location
            .extension()
            .and_then(|extension| SchemaKind::from_extension(&extension));
        match kind {
            Some(kind) => self.schemas.push(
                SchemaCacheEntry::new(kind, Some(location))
                    .at(range.start_line.saturating_sub(1), range.start_col.saturating_sub(1)),
            ),
            None => self.diagnostics.push(
                Diagnostic::warning("Schema type not supported", range.start_line, range.start_col)
                    .with_end(range.end_line, range.end_col),
            ),
        }
    }

    fn finish(mut self, sequence: i64, is_ui: bool) -> Result<Analysis> {
        while let Some(frame) = self.stack.pop() {
            self.tree[frame.node].state = NodeState::NotClosed;
        }
        let requires = self.front.post_process(&mut self.tree);

        let mut analysis = Analysis::new(self.tree, sequence);
        analysis.diagnostics = self.diagnostics;
        analysis.schemas = self.schemas;
        analysis.is_ui = is_ui;
        analysis.requires = requires;
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(content: &str) -> Analysis {
        DocumentParser::new()
            .parse(None, content.as_bytes(), 1)
            .unwrap()
    }

    #[test]
    fn test_well_formed_tree() {
        let analysis = parse("<a x=\"1\">\n  <b/>\n  <c>text</c>\n</a>\n");
        assert!(analysis.diagnostics.is_empty());
        assert_eq!(
            analysis.tree.outline(),
            "a (1:1-1:9)\n  b (2:3-2:6)\n  c (3:3-3:5)\n"
        );
        let a = analysis.tree.nth_child(analysis.root_node(), 0).unwrap();
        assert_eq!(analysis.tree[a].attribute("x"), Some("1"));
        assert!(analysis.tree[a].has_end_tag());
        let b = analysis.tree.nth_child(a, 0).unwrap();
        assert!(!analysis.tree[b].has_end_tag());
        assert_eq!(analysis.tree[b].state, NodeState::Ok);
    }

    #[test]
    fn test_mismatched_end_tag_recovers() {
        let analysis = parse("<a><b></a>");
        let a = analysis.tree.nth_child(analysis.root_node(), 0).unwrap();
        let b = analysis.tree.nth_child(a, 0).unwrap();
        assert_eq!(analysis.tree[b].element_name, "b");
        assert_eq!(analysis.tree[b].state, NodeState::NotClosed);
        assert!(analysis.tree[a].has_end_tag());
        assert_eq!(analysis.diagnostics.len(), 1);
    }

    #[test]
    fn test_unterminated_start_tag_is_closed_by_next_tag() {
        let analysis = parse("<a>\n<b\n<c/>\n</a>");
        let a = analysis.tree.nth_child(analysis.root_node(), 0).unwrap();
        let children: Vec<_> = analysis
            .tree
            .children(a)
            .into_iter()
            .map(|id| analysis.tree[id].element_name.clone())
            .collect();
        assert_eq!(children, vec!["b", "c"]);
        let b = analysis.tree.nth_child(a, 0).unwrap();
        assert_eq!(analysis.tree[b].state, NodeState::NotClosed);
        assert!(analysis.tree[a].has_end_tag());
    }

    #[test]
    fn test_stray_end_tag_is_reported_once() {
        let analysis = parse("<a></b></a>");
        assert_eq!(analysis.diagnostics.len(), 1);
        assert_eq!(analysis.diagnostics[0].severity, Severity::Error);
        let a = analysis.tree.nth_child(analysis.root_node(), 0).unwrap();
        assert!(analysis.tree[a].has_end_tag());
    }

    #[test]
    fn test_schema_references() {
        let file = Location::Path(PathBuf::from("/tmp/doc/file.xml"));
        let content = "<?xml-model href=\"schema.rng\"?>\n<?xml-model href=\"other.xsd\"?>\n<?xml-model href=\"what.dtd\"?>\n<a/>";
        let analysis = DocumentParser::new()
            .parse(Some(&file), content.as_bytes(), 1)
            .unwrap();

        assert_eq!(analysis.schemas.len(), 2);
        assert_eq!(analysis.schemas[0].kind, SchemaKind::Rng);
        assert_eq!(
            analysis.schemas[0].file,
            Some(Location::Path(PathBuf::from("/tmp/doc/schema.rng")))
        );
        assert_eq!((analysis.schemas[0].line, analysis.schemas[0].col), (0, 0));
        assert_eq!(analysis.schemas[1].kind, SchemaKind::XmlSchema);
        assert_eq!(analysis.schemas[1].line, 1);
        assert_eq!(analysis.diagnostics.len(), 1);
        assert_eq!(analysis.diagnostics[0].message, "Schema type not supported");
    }

    #[test]
    fn test_doctype_adds_dtd_entry() {
        let analysis = parse(
            "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\" \"xhtml1-strict.dtd\">\n<html/>",
        );
        assert_eq!(analysis.schemas.len(), 1);
        assert_eq!(analysis.schemas[0].kind, SchemaKind::Dtd);
        assert!(analysis.schemas[0].file.is_none());
    }

    #[test]
    fn test_invalid_utf8_is_an_error() {
        let analysis = DocumentParser::new()
            .parse(None, b"<a \xff\xfe=\"\xc3\">\xff</a>", 1)
            .unwrap();
        assert_eq!(analysis.diagnostics.len(), 1);
        assert_eq!(analysis.diagnostics[0].severity, Severity::Error);
        assert_eq!((analysis.diagnostics[0].line, analysis.diagnostics[0].col), (1, 4));
        assert_eq!(analysis.tree.outline(), "a (1:1-1:10)\n");
    }

    #[test]
    fn test_empty_content_fails() {
        let err = DocumentParser::new().parse(None, b"", 1).unwrap_err();
        assert_eq!(err.to_string(), "Failed to create the XML tree.");
    }

    #[test]
    fn test_depth_limit() {
        let parser = DocumentParser::new().with_limits(Limits::default().with_max_xml_depth(2));
        let analysis = parser.parse(None, b"<a><b><c><d/></c></b></a>", 1).unwrap();
        assert_eq!(analysis.tree.len(), 3);
        assert_eq!(analysis.diagnostics.len(), 1);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let content = "<a><b x='1'/><c><d></c></a>";
        assert_eq!(parse(content).tree, parse(content).tree);
    }

    #[test]
    fn test_bundled_schema_for_ui_files() {
        let file = Location::Path(PathBuf::from("/tmp/window.ui"));
        let content = "<?xml version=\"1.0\"?>\n<interface>\n  <requires lib=\"gtk\" version=\"3.24\"/>\n</interface>\n";
        let analysis = DocumentParser::new()
            .with_bundled_schemas("/usr/share/schemas")
            .parse(Some(&file), content.as_bytes(), 1)
            .unwrap();
        assert!(analysis.is_ui);
        assert_eq!(
            analysis.schemas[0].file,
            Some(Location::Path(PathBuf::from("/usr/share/schemas/gtkbuilder.rng")))
        );
        assert_eq!(analysis.required_version("gtk"), Some("3.24"));
    }
}
