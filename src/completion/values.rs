//! Literal values of an attribute pattern

use crate::rng::{DefineArena, DefineId, DefineType};

const MAX_DEPTH: usize = 256;

/// Literal values of `attribute` starting with `prefix`, in schema order
pub fn get_matches(arena: &DefineArena, attribute: DefineId, prefix: &str) -> Vec<String> {
    let mut values = Vec::new();
    collect(arena, arena[attribute].content, prefix, &mut values, 0);
    values
}

fn collect(arena: &DefineArena, first: Option<DefineId>, prefix: &str, out: &mut Vec<String>, depth: usize) {
    if depth > MAX_DEPTH {
        return;
    }
    for id in arena.siblings(first) {
        let def = &arena[id];
        match def.kind {
            DefineType::Value => {
                if let Some(value) = def.name.as_deref() {
                    if value.starts_with(prefix) && !out.iter().any(|v| v == value) {
                        out.push(value.to_string());
                    }
                }
            }
            DefineType::Choice
            | DefineType::Group
            | DefineType::Interleave
            | DefineType::Optional
            | DefineType::ZeroOrMore
            | DefineType::OneOrMore
            | DefineType::List
            | DefineType::Noop
            | DefineType::Define
            | DefineType::Ref
            | DefineType::ParentRef
            | DefineType::ExternalRef => collect(arena, def.content, prefix, out, depth + 1),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loaders::Loader;
    use crate::rng::Schema;

    const ORIENTATION: &str = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <start>
    <element name="box">
      <attribute name="orientation"><ref name="orientation"/></attribute>
      <empty/>
    </element>
  </start>
  <define name="orientation">
    <choice>
      <value>horizontal</value>
      <value>vertical</value>
      <value> horizontal </value>
    </choice>
  </define>
</grammar>"#;

    #[test]
    fn test_values_through_refs() {
        let schema = Schema::parse(ORIENTATION.as_bytes(), None, &Loader::new()).unwrap();
        let arena = schema.defines();
        let element = schema.start().unwrap();
        let attribute = arena.siblings(arena[element].attributes).next().unwrap();

        assert_eq!(get_matches(arena, attribute, ""), vec!["horizontal", "vertical"]);
        assert_eq!(get_matches(arena, attribute, "v"), vec!["vertical"]);
        assert!(get_matches(arena, attribute, "x").is_empty());
    }
}
