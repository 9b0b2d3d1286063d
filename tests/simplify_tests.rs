//! Shape of simplified RELAX NG pattern graphs

use std::collections::HashSet;
use xmlpack::rng::{DefineArena, DefineId, DefineType};
use xmlpack::{Loader, Schema};

fn reachable(schema: &Schema) -> Vec<DefineId> {
    fn walk(arena: &DefineArena, first: Option<DefineId>, seen: &mut HashSet<DefineId>, out: &mut Vec<DefineId>) {
        for id in arena.siblings(first) {
            if !seen.insert(id) {
                continue;
            }
            out.push(id);
            let def = &arena[id];
            walk(arena, def.content, seen, out);
            walk(arena, def.attributes, seen, out);
            walk(arena, def.name_class, seen, out);
        }
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    walk(schema.defines(), schema.start(), &mut seen, &mut out);
    out
}

fn parse(text: &str) -> Schema {
    Schema::parse(text.as_bytes(), None, &Loader::new()).unwrap()
}

const GRAMMAR: &str = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <start>
    <element name="root">
      <group><element name="only"><empty/></element></group>
      <choice>
        <notAllowed/>
        <element name="ok"><empty/></element>
      </choice>
      <optional>
        <group>
          <element name="x"><empty/></element>
          <notAllowed/>
        </group>
      </optional>
      <zeroOrMore><ref name="item"/></zeroOrMore>
    </element>
  </start>
  <define name="item">
    <element name="item">
      <interleave><ref name="item"/></interleave>
      <optional><attribute name="id"/></optional>
    </element>
  </define>
</grammar>"#;

#[test]
fn no_single_child_groups_remain() {
    let schema = parse(GRAMMAR);
    let arena = schema.defines();
    for id in reachable(&schema) {
        let def = &arena[id];
        if matches!(def.kind, DefineType::Group | DefineType::Interleave) && def.parent.is_some() {
            let children = arena.siblings(def.content).count();
            assert_ne!(children, 1, "{} kept a single child", arena.describe(id));
        }
    }
}

#[test]
fn not_allowed_collapses_required_content() {
    let schema = parse(GRAMMAR);
    let arena = schema.defines();
    let ids = reachable(&schema);

    let optional = ids
        .iter()
        .copied()
        .filter(|id| arena[*id].kind == DefineType::Optional)
        .find(|id| arena.siblings(arena[*id].content).all(|c| arena[c].kind != DefineType::Attribute))
        .unwrap();
    let content: Vec<DefineType> = arena.siblings(arena[optional].content).map(|c| arena[c].kind).collect();
    assert_eq!(content, vec![DefineType::NotAllowed]);

    let choice = ids.iter().copied().find(|id| arena[*id].kind == DefineType::Choice).unwrap();
    let alternatives: Vec<Option<&str>> = arena
        .siblings(arena[choice].content)
        .map(|c| arena[c].name.as_deref())
        .collect();
    assert_eq!(alternatives, vec![Some("ok")]);
}

#[test]
fn attributes_are_hoisted_out_of_content() {
    let schema = parse(GRAMMAR);
    let arena = schema.defines();
    let item = reachable(&schema)
        .into_iter()
        .find(|id| arena[*id].kind == DefineType::Element && arena[*id].name.as_deref() == Some("item"))
        .unwrap();

    assert!(arena.siblings(arena[item].attributes).next().is_some());
    assert!(arena
        .siblings(arena[item].content)
        .all(|c| !matches!(arena[c].kind, DefineType::Attribute | DefineType::Optional)));
}

#[test]
fn recursive_grammar_terminates() {
    let schema = parse(
        r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <start><ref name="node"/></start>
  <define name="node">
    <element name="node"><zeroOrMore><ref name="node"/></zeroOrMore></element>
  </define>
</grammar>"#,
    );
    assert!(!reachable(&schema).is_empty());
    assert!(schema.errors().is_empty());
}
