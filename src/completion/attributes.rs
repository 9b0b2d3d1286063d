//! Attributes of an element pattern against a live start tag
//!
//! Attribute patterns are collected from an `element` pattern together
//! with the chain of patterns leading to them. Which of them are optional
//! depends on what the tag already holds: once an attribute is present,
//! every pattern on its chain counts as chosen, so the other members of an
//! `optional` group become required while the other branches of a `choice`
//! stay optional. These facts live in a per-call side table; the schema is
//! never written to.

use super::pattern_names;
use crate::rng::{DefineArena, DefineId, DefineType};
use std::collections::{HashMap, HashSet};

const MAX_DEPTH: usize = 256;

/// An attribute pattern of an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMatch {
    /// Attribute name
    pub name: String,
    /// The `attribute` pattern
    pub define: DefineId,
    /// The tag can do without it
    pub is_optional: bool,
    /// Index of the attribute in the live tag
    pub pos: Option<usize>,
}

struct Found {
    name: String,
    define: DefineId,
    // outermost first
    ancestors: Vec<DefineId>,
}

#[derive(Default)]
struct Scratch {
    pos: HashMap<DefineId, usize>,
    mandatory: HashSet<DefineId>,
}

/// Attribute patterns of `element` checked against the `present` names
///
/// With `filtered`, present names are dropped, duplicates merged and the
/// result sorted case-insensitively; otherwise every pattern is returned
/// in schema order.
pub fn get_matches(
    arena: &DefineArena,
    element: DefineId,
    present: &[&str],
    filtered: bool,
) -> Vec<AttributeMatch> {
    let def = &arena[element];
    let mut found = Vec::new();
    let mut ancestors = Vec::new();
    collect(arena, def.attributes, &mut ancestors, &mut found, 0);
    collect(arena, def.content, &mut ancestors, &mut found, 0);

    let mut scratch = Scratch::default();
    set_attributes_position(&found, present, &mut scratch);
    propagate_mandatory(&found, &mut scratch);

    let mut matches: Vec<AttributeMatch> = found
        .iter()
        .map(|item| AttributeMatch {
            name: item.name.clone(),
            define: item.define,
            is_optional: is_optional(arena, item, &scratch),
            pos: scratch.pos.get(&item.define).copied(),
        })
        .collect();

    if filtered {
        let mut seen = HashSet::new();
        matches.retain(|item| item.pos.is_none() && seen.insert(item.name.clone()));
        matches.sort_by_key(|item| item.name.to_lowercase());
    }
    matches
}

fn collect(
    arena: &DefineArena,
    first: Option<DefineId>,
    ancestors: &mut Vec<DefineId>,
    out: &mut Vec<Found>,
    depth: usize,
) {
    if depth > MAX_DEPTH {
        return;
    }

    for id in arena.siblings(first) {
        let def = &arena[id];
        match def.kind {
            DefineType::Attribute => {
                for name in pattern_names(arena, id) {
                    out.push(Found {
                        name,
                        define: id,
                        ancestors: ancestors.clone(),
                    });
                }
            }
            DefineType::Choice
            | DefineType::Group
            | DefineType::Interleave
            | DefineType::Optional
            | DefineType::ZeroOrMore
            | DefineType::OneOrMore
            | DefineType::AttributesGroup
            | DefineType::Noop
            | DefineType::Define
            | DefineType::Ref
            | DefineType::ParentRef
            | DefineType::ExternalRef => {
                // refs may loop back on themselves
                if def.kind.is_reference() && ancestors.contains(&id) {
                    continue;
                }
                ancestors.push(id);
                collect(arena, def.content, ancestors, out, depth + 1);
                ancestors.pop();
            }
            _ => {}
        }
    }
}

fn set_attributes_position(found: &[Found], present: &[&str], scratch: &mut Scratch) {
    for item in found {
        if let Some(pos) = present.iter().position(|name| *name == item.name) {
            scratch.pos.insert(item.define, pos);
        }
    }
}

fn propagate_mandatory(found: &[Found], scratch: &mut Scratch) {
    for item in found.iter().filter(|item| scratch.pos.contains_key(&item.define)) {
        scratch.mandatory.insert(item.define);
        scratch.mandatory.extend(item.ancestors.iter().copied());
    }
}

fn is_optional(arena: &DefineArena, item: &Found, scratch: &Scratch) -> bool {
    let mut below = item.define;
    for &ancestor in item.ancestors.iter().rev() {
        match arena[ancestor].kind {
            DefineType::Optional | DefineType::ZeroOrMore => {
                if !scratch.mandatory.contains(&ancestor) {
                    return true;
                }
            }
            DefineType::Choice => {
                if !scratch.mandatory.contains(&below) {
                    return true;
                }
            }
            _ => {}
        }
        below = ancestor;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loaders::Loader;
    use crate::rng::Schema;
    use pretty_assertions::assert_eq;

    fn schema(attributes: &str) -> Schema {
        let text = format!(
            r#"<element name="x" xmlns="http://relaxng.org/ns/structure/1.0">{}<empty/></element>"#,
            attributes
        );
        Schema::parse(text.as_bytes(), None, &Loader::new()).unwrap()
    }

    fn summary(schema: &Schema, present: &[&str], filtered: bool) -> Vec<(String, bool)> {
        let element = schema.start().unwrap();
        get_matches(schema.defines(), element, present, filtered)
            .into_iter()
            .map(|item| (item.name, item.is_optional))
            .collect()
    }

    #[test]
    fn test_filtered_sorted_ascending() {
        let schema = schema(
            r#"<attribute name="Zeta"/><optional><attribute name="alpha"/></optional><attribute name="beta"/>"#,
        );
        assert_eq!(
            summary(&schema, &["beta"], true),
            vec![("alpha".to_string(), true), ("Zeta".to_string(), false)]
        );
    }

    #[test]
    fn test_present_branch_of_choice() {
        let schema = schema(
            r#"<attribute name="p1"/><choice><attribute name="p2"/><attribute name="p3"/></choice>"#,
        );
        let all = summary(&schema, &[], false);
        assert!(all.contains(&("p1".to_string(), false)));
        assert!(all.contains(&("p2".to_string(), true)));
        assert!(all.contains(&("p3".to_string(), true)));

        let matches = get_matches(schema.defines(), schema.start().unwrap(), &["p2"], false);
        let p2 = matches.iter().find(|m| m.name == "p2").unwrap();
        assert_eq!(p2.pos, Some(0));
        assert!(!p2.is_optional);
        let p3 = matches.iter().find(|m| m.name == "p3").unwrap();
        assert!(p3.is_optional);
    }

    #[test]
    fn test_optional_group_becomes_required() {
        let schema = schema(
            r#"<optional><attribute name="a"/><attribute name="b"/></optional><optional><attribute name="c"/></optional>"#,
        );
        assert_eq!(
            summary(&schema, &[], true),
            vec![
                ("a".to_string(), true),
                ("b".to_string(), true),
                ("c".to_string(), true)
            ]
        );
        assert_eq!(
            summary(&schema, &["a"], true),
            vec![("b".to_string(), false), ("c".to_string(), true)]
        );
    }
}
