//! Schema-driven completion
//!
//! [`CompletionProvider::populate`] turns a resolved [`Position`] into
//! proposals. What is offered depends on where the cursor sits:
//!
//! - between tags, or in the name of a start tag: elements the parent's
//!   pattern allows at that point ([`elements`])
//! - on an attribute name: attributes of the element not yet present
//!   ([`attributes`])
//! - in an attribute value: the literal values of that attribute
//!   ([`values`]), plus GtkBuilder property, signal and package names when
//!   a [`ui::GiIntrospection`] service is available ([`ui`])

pub mod attributes;
pub mod elements;
pub mod ui;
pub mod values;

use crate::analysis::Analysis;
use crate::path::XmlPath;
use crate::position::{Position, PositionDetail, PositionKind};
use crate::rng::{DefineArena, DefineId, DefineType, Schema};
use crate::symbol::NodeId;
use elements::{Child, ElementMatcher};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use ui::GiIntrospection;

const MAX_NAME_DEPTH: usize = 64;

/// What a proposal inserts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ProposalKind {
    /// Element with its end tag
    Element,
    /// Attribute with an empty value
    Attribute,
    /// Literal attribute value
    Value,
    /// GtkBuilder property name
    Property,
    /// GtkBuilder signal name
    Signal,
    /// Library name of a `<requires>`
    Package,
}

/// One completion proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Proposal {
    /// Text to insert
    pub text: String,
    /// Text to display
    pub label: String,
    /// Cursor position inside `text` after insertion, in bytes
    pub cursor_offset: usize,
    /// Kind of proposal
    pub kind: ProposalKind,
    /// Documentation, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl Proposal {
    /// A proposal inserting `text` as is, cursor at the end
    pub fn literal(text: impl Into<String>, kind: ProposalKind) -> Self {
        let text = text.into();
        Self {
            label: text.clone(),
            cursor_offset: text.len(),
            text,
            kind,
            doc: None,
        }
    }

    /// Element proposal; `with_lt` adds the opening `<`
    pub fn element(name: &str, with_lt: bool) -> Self {
        let lt = if with_lt { "<" } else { "" };
        let text = format!("{lt}{name}></{name}>");
        Self {
            cursor_offset: lt.len() + name.len(),
            label: format!("<{name}>"),
            text,
            kind: ProposalKind::Element,
            doc: None,
        }
    }

    /// Attribute proposal with the cursor between the quotes
    pub fn attribute(name: &str, is_optional: bool) -> Self {
        Self {
            text: format!("{name}=\"\""),
            label: if is_optional {
                format!("({name})")
            } else {
                name.to_string()
            },
            cursor_offset: name.len() + 2,
            kind: ProposalKind::Attribute,
            doc: None,
        }
    }

    /// Attach documentation
    pub fn with_doc(mut self, doc: Option<String>) -> Self {
        self.doc = doc;
        self
    }
}

/// Names a name class accepts, wildcards excluded
pub(crate) fn pattern_names(arena: &DefineArena, id: DefineId) -> Vec<String> {
    let mut names = Vec::new();
    collect_names(arena, id, &mut names, 0);
    names
}

fn collect_names(arena: &DefineArena, id: DefineId, out: &mut Vec<String>, depth: usize) {
    if depth > MAX_NAME_DEPTH {
        return;
    }
    let def = &arena[id];
    match (def.kind, def.name.as_deref()) {
        (DefineType::Except, _) => {}
        (kind, Some(name)) if kind != DefineType::Choice => {
            if !out.iter().any(|n| n == name) {
                out.push(name.to_string());
            }
        }
        _ => {
            for alternative in arena.siblings(def.name_class) {
                collect_names(arena, alternative, out, depth + 1);
            }
        }
    }
}

/// Produces proposals for cursor positions
#[derive(Default, Clone)]
pub struct CompletionProvider {
    gi: Option<Arc<dyn GiIntrospection>>,
}

impl std::fmt::Debug for CompletionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionProvider")
            .field("gi", &self.gi.is_some())
            .finish()
    }
}

impl CompletionProvider {
    /// Provider using the document's schemas only
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that also completes GtkBuilder property, signal and package names
    pub fn with_gi(gi: Arc<dyn GiIntrospection>) -> Self {
        Self { gi: Some(gi) }
    }

    /// Proposals for a resolved position
    pub fn populate(&self, position: &Position) -> Vec<Proposal> {
        let analysis = &position.analysis;
        let mut proposals = match (position.kind, position.detail) {
            (PositionKind::InContent, _) => complete_elements(position, true),
            (PositionKind::InStartTag, PositionDetail::InName) => complete_elements(position, false),
            (PositionKind::InStartTag, PositionDetail::InAttributeName) => complete_attributes(position),
            (PositionKind::InStartTag, PositionDetail::InAttributeValue) => complete_values(position),
            _ => Vec::new(),
        };

        if analysis.is_ui {
            if let Some(gi) = &self.gi {
                proposals.extend(ui::populate(gi.as_ref(), position));
            }
        }

        tracing::debug!(
            kind = ?position.kind,
            detail = ?position.detail,
            count = proposals.len(),
            "completion"
        );
        proposals
    }
}

fn complete_elements(position: &Position, in_content: bool) -> Vec<Proposal> {
    let analysis = &position.analysis;
    let tree = &analysis.tree;
    let names: Vec<&str> = tree[position.node]
        .direct_children()
        .iter()
        .map(|(id, _)| tree[*id].element_name.as_str())
        .collect();

    let mut children: Vec<Child<'_>> = names.iter().map(|name| Child::Node(*name)).collect();
    let at = position.child_pos.min(children.len());
    if in_content || at == children.len() {
        children.insert(at, Child::Candidate);
    } else {
        children[at] = Child::Candidate;
    }

    let prefix = if in_content {
        ""
    } else {
        position.detail_name.as_deref().unwrap_or_default()
    };
    let path = XmlPath::from_node(tree, position.node);

    let mut found: Vec<String> = Vec::new();
    for schema in analysis.rng_schemas() {
        let arena = schema.defines();
        let contents: Vec<Option<DefineId>> = if path.is_empty() {
            vec![schema.start()]
        } else {
            path.matching_defines(schema)
                .into_iter()
                .map(|id| arena[id].content)
                .collect()
        };
        for content in contents {
            for item in ElementMatcher::new(arena, &children, prefix).run(content) {
                if !found.contains(&item.name) {
                    found.push(item.name);
                }
            }
        }
    }
    found.sort();
    found.iter().map(|name| Proposal::element(name, in_content)).collect()
}

fn element_defines<'a>(analysis: &'a Analysis, node: NodeId) -> Vec<(&'a Schema, DefineId)> {
    let path = XmlPath::from_node(&analysis.tree, node);
    analysis
        .rng_schemas()
        .flat_map(|schema| {
            path.matching_defines(schema)
                .into_iter()
                .filter(|id| schema.defines()[*id].kind == DefineType::Element)
                .map(move |id| (schema, id))
        })
        .collect()
}

fn complete_attributes(position: &Position) -> Vec<Proposal> {
    let Some(child) = position.child_node else {
        return Vec::new();
    };
    let analysis = &position.analysis;
    let node = &analysis.tree[child];
    let typed = position.detail_name.as_deref();

    // the name being typed is already in the tag
    let mut present: Vec<&str> = node.attribute_names().collect();
    if let Some(typed) = typed {
        if let Some(i) = present.iter().position(|name| *name == typed) {
            present.remove(i);
        }
    }

    let prefix = typed.unwrap_or_default();
    let mut seen = HashSet::new();
    let mut proposals: Vec<Proposal> = Vec::new();
    for (schema, element) in element_defines(analysis, child) {
        for item in attributes::get_matches(schema.defines(), element, &present, true) {
            if item.name.starts_with(prefix) && seen.insert(item.name.clone()) {
                proposals.push(Proposal::attribute(&item.name, item.is_optional));
            }
        }
    }
    proposals
}

fn complete_values(position: &Position) -> Vec<Proposal> {
    let (Some(child), Some(name)) = (position.child_node, position.detail_name.as_deref()) else {
        return Vec::new();
    };
    let analysis = &position.analysis;
    let prefix = position.detail_value.as_deref().unwrap_or_default();
    let present: Vec<&str> = analysis.tree[child].attribute_names().collect();

    let mut found: Vec<String> = Vec::new();
    for (schema, element) in element_defines(analysis, child) {
        let arena = schema.defines();
        for item in attributes::get_matches(arena, element, &present, false) {
            if item.name != name {
                continue;
            }
            for value in values::get_matches(arena, item.define, prefix) {
                if !found.contains(&value) {
                    found.push(value);
                }
            }
        }
    }
    found
        .into_iter()
        .map(|value| Proposal::literal(value, ProposalKind::Value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loaders::Loader;
    use crate::locations::Location;
    use crate::tree_builder::TreeBuilder;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    const GRAMMAR: &str = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <start>
    <element name="library">
      <zeroOrMore><ref name="book"/></zeroOrMore>
    </element>
  </start>
  <define name="book">
    <element name="book">
      <attribute name="isbn"/>
      <optional><attribute name="lang"><choice><value>en</value><value>fr</value><value>de</value></choice></attribute></optional>
      <element name="title"><text/></element>
      <optional><element name="subtitle"><text/></element></optional>
      <oneOrMore><element name="author"><text/></element></oneOrMore>
    </element>
  </define>
</grammar>"#;

    fn complete(document: &str, line: u32, col: u32) -> Vec<Proposal> {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("library.rng"), GRAMMAR).unwrap();
        let path = dir.path().join("library.xml");
        let text = format!("<?xml-model href=\"library.rng\"?>\n{}", document);
        fs::write(&path, &text).unwrap();

        let location = Location::Path(path);
        let analysis = TreeBuilder::new()
            .with_loader(Loader::new())
            .build(Some(&location), text.as_bytes(), 1)
            .unwrap();
        let position = Position::resolve(Arc::new(analysis), text.as_bytes(), line + 1, col);
        CompletionProvider::new().populate(&position)
    }

    fn texts(proposals: &[Proposal]) -> Vec<&str> {
        proposals.iter().map(|p| p.text.as_str()).collect()
    }

    #[test]
    fn test_pattern_names_of_choice() {
        let text = r#"<element xmlns="http://relaxng.org/ns/structure/1.0"><choice><name>a</name><name>b</name></choice><empty/></element>"#;
        let schema = Schema::parse(text.as_bytes(), None, &Loader::new()).unwrap();
        let root = schema.start().unwrap();
        assert_eq!(pattern_names(schema.defines(), root), vec!["a", "b"]);
    }

    #[test]
    fn test_proposal_shapes() {
        let element = Proposal::element("book", true);
        assert_eq!(element.text, "<book></book>");
        assert_eq!(element.label, "<book>");
        assert_eq!(&element.text[element.cursor_offset..], "></book>");

        let attribute = Proposal::attribute("lang", true);
        assert_eq!(attribute.text, "lang=\"\"");
        assert_eq!(attribute.label, "(lang)");
        assert_eq!(&attribute.text[attribute.cursor_offset..], "\"");
    }

    #[test]
    fn test_elements_after_title() {
        let document = "<library>\n<book isbn=\"1\">\n<title>x</title>\n\n</book>\n</library>\n";
        let proposals = complete(document, 4, 1);
        assert_eq!(texts(&proposals), vec!["<author></author>", "<subtitle></subtitle>"]);
    }

    #[test]
    fn test_elements_at_document_top() {
        let proposals = complete("\n", 1, 1);
        assert_eq!(texts(&proposals), vec!["<library></library>"]);
    }

    #[test]
    fn test_attributes_skip_present() {
        let document = "<library>\n<book isbn=\"1\" ></book>\n</library>\n";
        let proposals = complete(document, 2, 16);
        assert_eq!(texts(&proposals), vec!["lang=\"\""]);
        assert_eq!(proposals[0].label, "(lang)");
    }

    #[test]
    fn test_attribute_values() {
        let document = "<library>\n<book isbn=\"1\" lang=\"\"></book>\n</library>\n";
        let proposals = complete(document, 2, 22);
        assert_eq!(texts(&proposals), vec!["en", "fr", "de"]);
    }
}
