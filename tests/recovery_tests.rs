//! Malformed documents still give a usable tree

use pretty_assertions::assert_eq;
use std::path::PathBuf;
use xmlpack::analysis::Severity;
use xmlpack::parser::DocumentParser;
use xmlpack::symbol::NodeState;
use xmlpack::Location;

fn parse(text: &str) -> xmlpack::Analysis {
    DocumentParser::new().parse(None, text.as_bytes(), 1).unwrap()
}

#[test]
fn missing_end_tag_is_repaired() {
    let analysis = parse("<a><b></a>");
    let tree = &analysis.tree;

    let a = tree.children(tree.root())[0];
    assert_eq!(tree[a].element_name, "a");
    assert!(tree[a].end_tag.is_some());

    let children = tree.children(a);
    assert_eq!(children.len(), 1);
    let b = &tree[children[0]];
    assert_eq!(b.element_name, "b");
    assert_eq!(b.state, NodeState::NotClosed);
    assert!(b.end_tag.is_none());

    assert_eq!(analysis.diagnostics.len(), 1);
    assert_eq!(analysis.diagnostics[0].severity, Severity::Error);
}

#[test]
fn siblings_after_unterminated_tag() {
    let analysis = parse("<a>\n  <b\n  <c/>\n</a>\n");
    assert_eq!(
        analysis.tree.outline(),
        "a (1:1-1:3)\n  b (2:3-2:4) [not closed]\n  c (3:3-3:6)\n"
    );
    assert!(!analysis.diagnostics.is_empty());
}

#[test]
fn truncated_document() {
    let analysis = parse("<a>\n<b>text");
    let tree = &analysis.tree;
    let a = tree.children(tree.root())[0];
    assert_eq!(tree.children(a).len(), 1);
    assert!(analysis
        .diagnostics
        .iter()
        .any(|d| d.severity == Severity::Fatal));
}

#[test]
fn parsing_is_idempotent() {
    let documents = [
        "<a x=\"1\">\n  <b/>\n  <c>text</c>\n</a>\n",
        "<a><b></a>",
        "<a>\n  <b\n  <c/>\n</a>\n",
        "<?xml-model href=\"s.rng\"?>\n<!-- note -->\n<a><![CDATA[x]]></a>",
    ];
    let parser = DocumentParser::new();
    for text in documents {
        let first = parser.parse(None, text.as_bytes(), 3).unwrap();
        let second = parser.parse(None, text.as_bytes(), 3).unwrap();
        assert_eq!(first.tree, second.tree);
        assert_eq!(first.diagnostics, second.diagnostics);
        assert_eq!(first.schemas.len(), second.schemas.len());
    }
}

#[test]
fn ui_parsing_is_idempotent() {
    let text = "<interface>\n  <requires lib=\"gtk\" version=\"4.0\"/>\n  <object class=\"GtkBox\" id=\"box\">\n    <property name=\"spacing\">6</property>\n    <child>\n      <object class=\"GtkLabel\"/>\n    </child>\n  </object>\n</interface>\n";
    let file = Location::Path(PathBuf::from("/tmp/window.ui"));
    let parser = DocumentParser::new();
    let first = parser.parse(Some(&file), text.as_bytes(), 1).unwrap();
    let second = parser.parse(Some(&file), text.as_bytes(), 1).unwrap();

    assert!(first.is_ui);
    assert_eq!(first.tree, second.tree);
    assert_eq!(first.requires, second.requires);
    assert_eq!(first.required_version("gtk"), Some("4.0"));
}
