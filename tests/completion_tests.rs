//! Completion against grammars on disk

use pretty_assertions::assert_eq;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use xmlpack::completion::attributes;
use xmlpack::completion::elements::{Child, ElementMatcher};
use xmlpack::completion::{CompletionProvider, Proposal, ProposalKind};
use xmlpack::position::scan_detail;
use xmlpack::tree_builder::TreeBuilder;
use xmlpack::{Loader, Location, Position, PositionDetail, PositionKind, Schema};

const SEQUENCE: &str = r#"<element name="root" xmlns="http://relaxng.org/ns/structure/1.0">
  <element name="a"><empty/></element>
  <optional><element name="b"><empty/></element></optional>
  <oneOrMore><element name="c"><empty/></element></oneOrMore>
</element>"#;

fn candidates(schema: &Schema, children: &[Child<'_>]) -> Vec<String> {
    let arena = schema.defines();
    let root = schema.start().unwrap();
    let mut names: Vec<String> = ElementMatcher::new(arena, children, "")
        .run(arena[root].content)
        .into_iter()
        .map(|item| item.name)
        .collect();
    names.sort();
    names
}

#[test]
fn sequence_matching_is_sound() {
    let schema = Schema::parse(SEQUENCE.as_bytes(), None, &Loader::new()).unwrap();

    assert_eq!(candidates(&schema, &[Child::Candidate]), vec!["a"]);
    assert_eq!(
        candidates(&schema, &[Child::Node("a"), Child::Candidate]),
        vec!["b", "c"]
    );
    assert_eq!(
        candidates(&schema, &[Child::Node("a"), Child::Node("b"), Child::Candidate]),
        vec!["c"]
    );
    assert_eq!(
        candidates(&schema, &[Child::Node("a"), Child::Node("c"), Child::Candidate]),
        vec!["c"]
    );
    assert!(candidates(&schema, &[Child::Node("b"), Child::Candidate]).is_empty());
}

#[test]
fn choice_keeps_every_matching_alternative() {
    let schema = Schema::parse(
        br#"<element name="root" xmlns="http://relaxng.org/ns/structure/1.0">
  <choice>
    <element name="a"><empty/></element>
    <group>
      <element name="a"><empty/></element>
      <element name="c"><empty/></element>
    </group>
  </choice>
  <element name="d"><empty/></element>
</element>"#,
        None,
        &Loader::new(),
    )
    .unwrap();

    // `a` alone ends the first branch, `a` then `c` continues the second
    assert_eq!(
        candidates(&schema, &[Child::Node("a"), Child::Candidate]),
        vec!["c", "d"]
    );
    assert_eq!(
        candidates(&schema, &[Child::Node("a"), Child::Node("c"), Child::Candidate]),
        vec!["d"]
    );
}

#[test]
fn chosen_choice_branch_settles_optionality() {
    let schema = Schema::parse(
        br#"<element name="x" xmlns="http://relaxng.org/ns/structure/1.0">
  <attribute name="p1"/>
  <choice><attribute name="p2"/><attribute name="p3"/></choice>
  <empty/>
</element>"#,
        None,
        &Loader::new(),
    )
    .unwrap();
    let element = schema.start().unwrap();

    let matches = attributes::get_matches(schema.defines(), element, &["p2"], false);
    let find = |name: &str| matches.iter().find(|m| m.name == name).unwrap();
    assert!(!find("p1").is_optional);
    assert_eq!(find("p1").pos, None);
    assert!(!find("p2").is_optional);
    assert_eq!(find("p2").pos, Some(0));
    assert!(find("p3").is_optional);

    let remaining: Vec<(String, bool)> = attributes::get_matches(schema.defines(), element, &["p2"], true)
        .into_iter()
        .map(|m| (m.name, m.is_optional))
        .collect();
    assert_eq!(
        remaining,
        vec![("p1".to_string(), false), ("p3".to_string(), true)]
    );
}

#[test]
fn unterminated_value_detail() {
    let detail = scan_detail("elem attr=\"va", None);
    assert_eq!(detail.detail, PositionDetail::InAttributeValue);
    assert_eq!(detail.name.as_deref(), Some("attr"));
    assert_eq!(detail.value.as_deref(), Some("va"));
    assert_eq!(detail.quote, Some('"'));

    let text = "<elem attr=\"va";
    let builder = TreeBuilder::new();
    let analysis = builder.build(None, text.as_bytes(), 1).unwrap();
    let position = Position::resolve(Arc::new(analysis), text.as_bytes(), 1, 15);
    assert_eq!(position.kind, PositionKind::InStartTag);
    assert_eq!(position.detail, PositionDetail::InAttributeValue);
    assert_eq!(position.detail_name.as_deref(), Some("attr"));
    assert_eq!(position.detail_value.as_deref(), Some("va"));
    assert_eq!(position.quote, Some('"'));
}

struct Workspace {
    _dir: TempDir,
    file: Location,
    text: String,
}

fn workspace(document: &str) -> Workspace {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("seq.rng"), SEQUENCE).unwrap();
    let text = format!("<?xml-model href=\"seq.rng\"?>\n{}", document);
    let path = dir.path().join("doc.xml");
    fs::write(&path, &text).unwrap();
    Workspace {
        file: Location::Path(path),
        text,
        _dir: dir,
    }
}

fn complete(ws: &Workspace, line: u32, col: u32) -> Vec<Proposal> {
    let analysis = TreeBuilder::new()
        .build(Some(&ws.file), ws.text.as_bytes(), 1)
        .unwrap();
    let position = Position::resolve(Arc::new(analysis), ws.text.as_bytes(), line, col);
    CompletionProvider::new().populate(&position)
}

#[test]
fn elements_in_content() {
    let ws = workspace("<root>\n<a/>\n\n</root>\n");
    let proposals = complete(&ws, 4, 1);
    let texts: Vec<&str> = proposals.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(texts, vec!["<b></b>", "<c></c>"]);
    assert!(proposals.iter().all(|p| p.kind == ProposalKind::Element));
}

#[test]
fn element_name_being_typed() {
    let ws = workspace("<root>\n<a/>\n<b\n</root>\n");
    let proposals = complete(&ws, 4, 3);
    assert_eq!(proposals.len(), 1);
    assert_eq!(proposals[0].text, "b></b>");
    assert_eq!(proposals[0].label, "<b>");
    assert_eq!(proposals[0].cursor_offset, 1);
}

#[test]
fn document_without_schema_offers_nothing() {
    let text = "<root>\n\n</root>";
    let analysis = TreeBuilder::new().build(None, text.as_bytes(), 1).unwrap();
    let position = Position::resolve(Arc::new(analysis), text.as_bytes(), 2, 1);
    assert!(CompletionProvider::new().populate(&position).is_empty());
}
