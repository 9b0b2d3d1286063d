//! Pattern graph construction from cleaned schema documents

use super::define::{Combine, DefineArena, DefineId, DefineType};
use super::grammar::{Grammar, GrammarId};
use super::simplify;
use crate::documents::Element;
use crate::RNG_NAMESPACE;

/// Builds the define graph of one schema
pub(crate) struct Parser {
    pub(crate) arena: DefineArena,
    pub(crate) grammars: Vec<Grammar>,
    current_grammar: Option<GrammarId>,
    parent_grammar: Option<GrammarId>,
    current_def: Option<DefineId>,
    in_attribute: bool,
    in_external_ref: bool,
}

impl Parser {
    pub(crate) fn new() -> Self {
        Self {
            arena: DefineArena::new(),
            grammars: Vec::new(),
            current_grammar: None,
            parent_grammar: None,
            current_def: None,
            in_attribute: false,
            in_external_ref: false,
        }
    }

    /// Parse a cleaned schema root and simplify its start patterns
    pub(crate) fn parse_document(&mut self, root: &Element) -> GrammarId {
        let top = if root.is(RNG_NAMESPACE, "grammar") {
            self.parse_grammar(root)
        } else {
            self.parse_bare_pattern(root)
        };

        if !self.in_external_ref {
            let start = self.grammars[top.0].start_defines;
            simplify::simplify(&mut self.arena, start, None);

            let mut start = start;
            while let Some(id) = start {
                let def = &self.arena[id];
                if def.kind != DefineType::Noop || def.next.is_some() || def.content.is_none() {
                    break;
                }
                start = def.content;
            }
            self.grammars[top.0].start_defines = start;
        }

        top
    }

    fn alloc(&mut self, kind: DefineType, element: &Element, name: Option<String>) -> DefineId {
        self.arena.alloc(kind, self.current_def, name, element.line)
    }

    fn new_grammar(&mut self) -> GrammarId {
        let id = GrammarId(self.grammars.len());
        self.grammars.push(Grammar::new(self.current_grammar));
        if let Some(parent) = self.current_grammar {
            self.grammars[parent.0].children.push(id);
        }
        id
    }

    fn parse_grammar(&mut self, grammar: &Element) -> GrammarId {
        let id = self.new_grammar();
        let saved = self.current_grammar.replace(id);

        self.parse_grammar_content(grammar);
        self.finish_grammar(id);

        self.current_grammar = saved;
        id
    }

    // A schema whose root is a pattern is a grammar with that pattern as start.
    fn parse_bare_pattern(&mut self, pattern: &Element) -> GrammarId {
        let id = self.new_grammar();
        let saved = self.current_grammar.replace(id);

        self.parse_start_content(&[pattern], None);
        self.finish_grammar(id);

        self.current_grammar = saved;
        id
    }

    fn finish_grammar(&mut self, id: GrammarId) {
        self.merge_starts(id);
        self.merge_defines(id);
        self.merge_refs(id);
    }

    fn parse_grammar_content(&mut self, parent: &Element) {
        for child in parent.child_elements() {
            match child.local_name() {
                "start" => {
                    let nodes: Vec<&Element> = child.child_elements().collect();
                    let combine = child.attribute("combine").and_then(Combine::from_attribute);
                    self.parse_start_content(&nodes, combine);
                }
                "define" => self.parse_define(child),
                "include" => {
                    if let Some(included) = child.resolved.as_deref() {
                        self.parse_grammar_content(included);
                    }
                    self.parse_grammar_content(child);
                }
                other => tracing::debug!(element = other, line = child.line, "unexpected grammar content"),
            }
        }
    }

    fn parse_start_content(&mut self, nodes: &[&Element], combine: Option<Combine>) {
        let Some(first) = nodes.first() else {
            return;
        };

        let def = match first.local_name() {
            "empty" => Some(self.alloc(DefineType::Empty, first, None)),
            "notAllowed" => Some(self.alloc(DefineType::NotAllowed, first, None)),
            _ => self.parse_patterns(nodes, true),
        };
        let (Some(def), Some(grammar)) = (def, self.current_grammar) else {
            return;
        };

        self.arena[def].combine = combine;
        match self.grammars[grammar.0].start_defines {
            Some(first) => self.arena.append(first, def),
            None => self.grammars[grammar.0].start_defines = Some(def),
        }
    }

    fn parse_define(&mut self, element: &Element) {
        let Some(name) = element
            .attribute("name")
            .map(str::trim)
            .filter(|name| !name.is_empty())
        else {
            tracing::debug!(line = element.line, "define without a name");
            return;
        };

        let def = self.arena.alloc(DefineType::Define, None, Some(name.to_string()), element.line);
        self.arena[def].combine = element.attribute("combine").and_then(Combine::from_attribute);

        let saved = self.current_def.replace(def);
        let nodes: Vec<&Element> = element.child_elements().collect();
        let content = self.parse_patterns(&nodes, false);
        self.current_def = saved;

        self.arena[def].content = content;
        self.arena.propagate_parent(content, def);

        if let Some(grammar) = self.current_grammar {
            self.grammars[grammar.0].add_define(name, def);
        }
    }

    fn parse_patterns(&mut self, nodes: &[&Element], group_elements: bool) -> Option<DefineId> {
        let mut first: Option<DefineId> = None;
        let mut last: Option<DefineId> = None;

        for node in nodes {
            let Some(current) = self.parse_pattern(node) else {
                continue;
            };

            match (first, last) {
                (Some(head), Some(tail)) => {
                    if group_elements
                        && node.local_name() == "element"
                        && head == tail
                        && self.arena[head].kind == DefineType::Element
                    {
                        let group = self.alloc(DefineType::Group, node, None);
                        self.arena[group].content = Some(head);
                        self.arena[head].parent = Some(group);
                        first = Some(group);
                    }
                    self.arena[tail].next = Some(current);
                    last = Some(current);
                }
                _ => {
                    first = Some(current);
                    last = Some(current);
                }
            }
        }

        first
    }

    fn parse_pattern(&mut self, element: &Element) -> Option<DefineId> {
        let saved = self.current_def;

        let def = match element.local_name() {
            "element" => self.parse_element(element),
            "attribute" => self.parse_attribute(element),
            "empty" => Some(self.alloc(DefineType::Empty, element, None)),
            "text" => Some(self.alloc(DefineType::Text, element, None)),
            "notAllowed" => Some(self.alloc(DefineType::NotAllowed, element, None)),
            "zeroOrMore" => Some(self.parse_container(element, DefineType::ZeroOrMore, true)),
            "oneOrMore" => Some(self.parse_container(element, DefineType::OneOrMore, true)),
            "optional" => Some(self.parse_container(element, DefineType::Optional, true)),
            "choice" => Some(self.parse_container(element, DefineType::Choice, false)),
            "group" => Some(self.parse_container(element, DefineType::Group, false)),
            "list" => Some(self.parse_container(element, DefineType::List, false)),
            "interleave" => self.parse_interleave(element),
            "mixed" => self.parse_mixed(element),
            "ref" => self.parse_ref(element, false),
            "parentRef" => self.parse_ref(element, true),
            "data" => {
                let def = self.alloc(
                    DefineType::Datatype,
                    element,
                    element.attribute("type").map(|t| t.trim().to_string()),
                );
                self.arena[def].ns = element.attribute("datatypeLibrary").map(str::to_string);
                Some(def)
            }
            "value" => {
                let def = self.alloc(
                    DefineType::Value,
                    element,
                    Some(element.text_content().trim().to_string()),
                );
                self.arena[def].ns = element.attribute("ns").map(str::to_string);
                Some(def)
            }
            "externalRef" => self.parse_external_ref(element),
            "grammar" => {
                let outer = std::mem::replace(&mut self.parent_grammar, self.current_grammar);
                let grammar = self.parse_grammar(element);
                self.parent_grammar = outer;
                self.grammars[grammar.0].start_defines
            }
            other => {
                tracing::debug!(element = other, line = element.line, "unexpected pattern");
                None
            }
        };

        self.current_def = saved;
        def
    }

    fn parse_container(&mut self, element: &Element, kind: DefineType, group_elements: bool) -> DefineId {
        let def = self.alloc(kind, element, None);
        self.current_def = Some(def);

        let nodes: Vec<&Element> = element.child_elements().collect();
        if nodes.is_empty() {
            tracing::debug!(kind = %kind, line = element.line, "pattern has no content");
        }
        let content = self.parse_patterns(&nodes, group_elements);
        self.arena[def].content = content;
        def
    }

    fn parse_ref(&mut self, element: &Element, parent: bool) -> Option<DefineId> {
        let name = element.attribute("name").map(str::trim).filter(|n| !n.is_empty())?;

        let (kind, grammar) = if parent {
            (DefineType::ParentRef, self.parent_grammar)
        } else {
            (DefineType::Ref, self.current_grammar)
        };
        let Some(grammar) = grammar else {
            tracing::debug!(name, line = element.line, "parentRef outside a nested grammar");
            return None;
        };

        let def = self.alloc(kind, element, Some(name.to_string()));
        self.grammars[grammar.0].add_ref(name, def);
        Some(def)
    }

    fn parse_interleave(&mut self, element: &Element) -> Option<DefineId> {
        let nodes: Vec<&Element> = element.child_elements().collect();
        if nodes.is_empty() {
            return None;
        }

        let def = self.alloc(DefineType::Interleave, element, None);
        self.current_def = Some(def);

        let mut last: Option<DefineId> = None;
        for node in nodes {
            let Some(current) = self.parse_pattern(node) else {
                continue;
            };
            match last {
                Some(tail) => self.arena[tail].next = Some(current),
                None => self.arena[def].content = Some(current),
            }
            last = Some(current);
        }

        Some(def)
    }

    fn parse_mixed(&mut self, element: &Element) -> Option<DefineId> {
        let def = self.alloc(DefineType::Interleave, element, None);
        self.current_def = Some(def);

        let nodes: Vec<&Element> = element.child_elements().collect();
        let mut content = self.parse_patterns(&nodes, true);
        if let Some(first) = content.filter(|&id| self.arena[id].next.is_some()) {
            let group = self.alloc(DefineType::Group, element, None);
            self.arena[group].content = Some(first);
            self.arena.propagate_parent(Some(first), group);
            content = Some(group);
        }

        let text = self.alloc(DefineType::Text, element, None);
        self.arena[text].next = content;
        self.arena[def].content = Some(text);
        Some(def)
    }

    fn parse_element(&mut self, element: &Element) -> Option<DefineId> {
        let children: Vec<&Element> = element.child_elements().collect();
        let (first, rest) = children.split_first()?;

        let def = self.alloc(DefineType::Element, element, None);
        self.current_def = Some(def);

        let rest = match self.parse_name_class(first, def) {
            Some(_) => rest,
            None => &children[..],
        };

        let mut last: Option<DefineId> = None;
        for child in rest {
            let Some(current) = self.parse_pattern(child) else {
                continue;
            };

            match self.arena[current].kind {
                DefineType::Attribute => {
                    self.arena[current].next = self.arena[def].attributes;
                    self.arena[def].attributes = Some(current);
                }
                DefineType::Start
                | DefineType::Param
                | DefineType::Except
                | DefineType::Define
                | DefineType::Noop
                | DefineType::AttributesGroup => {
                    tracing::debug!(line = child.line, "unexpected pattern in element");
                }
                _ => {
                    match last {
                        None => self.arena[def].content = Some(current),
                        Some(tail) => {
                            if self.arena[def].content == Some(tail)
                                && self.arena[tail].kind == DefineType::Element
                            {
                                let group = self.arena.alloc(DefineType::Group, Some(def), None, child.line);
                                self.arena[group].content = Some(tail);
                                self.arena[tail].parent = Some(group);
                                self.arena[def].content = Some(group);
                                self.current_def = Some(group);
                            }
                            self.arena[tail].next = Some(current);
                        }
                    }
                    last = Some(current);
                }
            }
        }

        Some(def)
    }

    fn parse_attribute(&mut self, element: &Element) -> Option<DefineId> {
        let def = self.alloc(DefineType::Attribute, element, None);
        let children: Vec<&Element> = element.child_elements().collect();
        let Some((first, rest)) = children.split_first() else {
            return Some(def);
        };

        let saved_in_attribute = std::mem::replace(&mut self.in_attribute, true);
        self.current_def = Some(def);

        let rest = match self.parse_name_class(first, def) {
            Some(_) => rest,
            None => &children[..],
        };

        if let Some(child) = rest.first() {
            if let Some(current) = self.parse_pattern(child) {
                match self.arena[current].kind {
                    DefineType::Element
                    | DefineType::Attribute
                    | DefineType::Start
                    | DefineType::Param
                    | DefineType::Except
                    | DefineType::Define
                    | DefineType::AttributesGroup => {
                        tracing::debug!(line = child.line, "unexpected pattern in attribute");
                    }
                    _ => self.arena[def].content = Some(current),
                }
            }
        }
        if rest.len() > 1 {
            tracing::debug!(line = element.line, "attribute has more than one pattern");
        }

        self.in_attribute = saved_in_attribute;
        Some(def)
    }

    fn parse_name_class(&mut self, element: &Element, current: DefineId) -> Option<DefineId> {
        let local_name = element.local_name();
        let kind = if self.in_attribute {
            DefineType::Attribute
        } else {
            DefineType::Element
        };

        let def = match local_name {
            "name" | "anyName" | "nsName" => {
                let def = if matches!(
                    self.arena[current].kind,
                    DefineType::Element | DefineType::Attribute
                ) {
                    current
                } else {
                    self.arena.alloc(kind, Some(current), None, element.line)
                };

                match local_name {
                    "name" => {
                        self.arena[def].name = Some(element.text_content().trim().to_string());
                        self.arena[def].ns = element.attribute("ns").map(str::to_string);
                    }
                    "anyName" => {
                        self.arena[def].name = None;
                        self.arena[def].ns = None;
                    }
                    _ => {
                        self.arena[def].name = None;
                        self.arena[def].ns = element.attribute("ns").map(str::to_string);
                    }
                }

                if local_name != "name" {
                    if let Some(except) = element.child_elements().next() {
                        self.arena[def].name_class = self.parse_except_name_class(except);
                    }
                }
                def
            }
            "choice" => {
                let def = self.arena.alloc(DefineType::Choice, Some(current), None, element.line);
                for child in element.child_elements() {
                    self.parse_name_class(child, def);
                }
                def
            }
            _ => return None,
        };

        if def != current {
            self.arena.append_name_class(current, def);
        }
        Some(def)
    }

    fn parse_except_name_class(&mut self, element: &Element) -> Option<DefineId> {
        if element.local_name() != "except" {
            return None;
        }

        let kind = if self.in_attribute {
            DefineType::Attribute
        } else {
            DefineType::Element
        };
        let def = self.arena.alloc(DefineType::Except, self.current_def, None, element.line);

        let mut last: Option<DefineId> = None;
        for child in element.child_elements() {
            let current = self.arena.alloc(kind, Some(def), None, child.line);
            if self.parse_name_class(child, current).is_none() {
                continue;
            }
            match last {
                Some(tail) => self.arena[tail].next = Some(current),
                None => self.arena[def].content = Some(current),
            }
            last = Some(current);
        }

        Some(def)
    }

    fn parse_external_ref(&mut self, element: &Element) -> Option<DefineId> {
        let root = element.resolved.as_deref()?;

        let def = self.alloc(DefineType::ExternalRef, element, None);
        let saved_in_external_ref = std::mem::replace(&mut self.in_external_ref, true);
        self.current_def = Some(def);

        let grammar = if root.is(RNG_NAMESPACE, "grammar") {
            self.parse_grammar(root)
        } else {
            self.parse_bare_pattern(root)
        };

        let imported: Vec<(String, Vec<DefineId>)> = self.grammars[grammar.0]
            .refs
            .iter()
            .map(|(name, refs)| (name.clone(), refs.clone()))
            .collect();
        for (name, refs) in imported {
            for reference in refs {
                self.arena[reference].is_external_ref = true;
                if let Some(current) = self.current_grammar {
                    self.grammars[current.0].add_ref(&name, reference);
                }
            }
        }

        let content = self.grammars[grammar.0].start_defines;
        self.arena[def].content = content;
        self.arena.propagate_parent(content, def);

        self.in_external_ref = saved_in_external_ref;
        Some(def)
    }

    fn merge_starts(&mut self, grammar: GrammarId) {
        let starts: Vec<DefineId> = self
            .arena
            .siblings(self.grammars[grammar.0].start_defines)
            .collect();
        let (Some(&first), true) = (starts.first(), starts.len() > 1) else {
            return;
        };

        let kind = combine_kind(&self.arena, &starts);
        let line = self.arena[first].line;
        let combined = self.arena.alloc(kind, None, None, line);
        self.arena[combined].content = Some(first);
        self.arena.propagate_parent(Some(first), combined);
        self.grammars[grammar.0].start_defines = Some(combined);
    }

    fn merge_defines(&mut self, grammar: GrammarId) {
        let merged: Vec<Vec<DefineId>> = self.grammars[grammar.0]
            .defines
            .values()
            .filter(|defs| defs.len() > 1)
            .cloned()
            .collect();

        for defs in merged {
            let kind = combine_kind(&self.arena, &defs);
            let line = self.arena[defs[0]].line;
            let combined = self.arena.alloc(kind, None, None, line);

            let mut last: Option<DefineId> = None;
            for &define in &defs {
                let Some(content) = self.arena[define].content else {
                    continue;
                };
                let item = if self.arena[content].next.is_some() {
                    let group = self.arena.alloc(DefineType::Group, Some(combined), None, line);
                    self.arena[group].content = Some(content);
                    self.arena.propagate_parent(Some(content), group);
                    group
                } else {
                    content
                };

                match last {
                    Some(tail) => self.arena[tail].next = Some(item),
                    None => self.arena[combined].content = Some(item),
                }
                last = Some(item);
            }

            let content = self.arena[combined].content;
            self.arena.propagate_parent(content, combined);
            for define in defs {
                self.arena[define].content = Some(combined);
            }
        }
    }

    fn merge_refs(&mut self, grammar: GrammarId) {
        let grammar = &self.grammars[grammar.0];
        for (name, refs) in &grammar.refs {
            let Some(target) = grammar.define(name) else {
                tracing::debug!(name = name.as_str(), "reference to an undefined pattern");
                continue;
            };
            for &reference in refs {
                let def = &mut self.arena[reference];
                if !def.is_external_ref && def.content.is_none() {
                    def.content = Some(target);
                }
            }
        }
    }
}

// Patterns without a combine attribute default to interleave.
fn combine_kind(arena: &DefineArena, defs: &[DefineId]) -> DefineType {
    match defs.iter().find_map(|&id| arena[id].combine) {
        Some(Combine::Choice) => DefineType::Choice,
        Some(Combine::Interleave) | None => DefineType::Interleave,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::Document;
    use crate::loaders::Loader;
    use crate::rng::cleanup::Cleanup;

    fn parse(xml: &str) -> (Parser, GrammarId) {
        let mut root = Document::from_string(xml).unwrap().into_root().unwrap();
        let loader = Loader::new();
        Cleanup::new(&loader).run(&mut root, None);
        let mut parser = Parser::new();
        let top = parser.parse_document(&root);
        (parser, top)
    }

    #[test]
    fn test_bare_element_pattern() {
        let (parser, top) = parse(
            r#"<element name="interface" xmlns="http://relaxng.org/ns/structure/1.0">
  <attribute name="domain"/>
  <zeroOrMore><element name="object"><empty/></element></zeroOrMore>
</element>"#,
        );

        let arena = &parser.arena;
        let start = parser.grammars[top.0].start_defines.unwrap();
        assert_eq!(arena[start].kind, DefineType::Element);
        assert_eq!(arena[start].name.as_deref(), Some("interface"));

        let attribute = arena[start].attributes.unwrap();
        assert_eq!(arena[attribute].name.as_deref(), Some("domain"));
        assert_eq!(arena[attribute].ns.as_deref(), Some(""));

        let repeat = arena[start].content.unwrap();
        assert_eq!(arena[repeat].kind, DefineType::ZeroOrMore);
        let object = arena[repeat].content.unwrap();
        assert_eq!(arena[object].name.as_deref(), Some("object"));
    }

    #[test]
    fn test_refs_are_linked() {
        let (parser, top) = parse(
            r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <start><ref name="doc"/></start>
  <define name="doc"><element name="doc"><text/></element></define>
</grammar>"#,
        );

        let arena = &parser.arena;
        let grammar = &parser.grammars[top.0];
        let start = grammar.start_defines.unwrap();
        assert_eq!(arena[start].kind, DefineType::Ref);
        let define = arena[start].content.unwrap();
        assert_eq!(Some(define), grammar.define("doc"));
        assert_eq!(arena[define].kind, DefineType::Define);
    }

    #[test]
    fn test_combined_defines() {
        let (parser, top) = parse(
            r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <start><element name="a"><ref name="inline"/></element></start>
  <define name="inline"><element name="b"><empty/></element></define>
  <define name="inline" combine="choice"><element name="c"><empty/></element></define>
</grammar>"#,
        );

        let arena = &parser.arena;
        let defs = &parser.grammars[top.0].defines["inline"];
        assert_eq!(defs.len(), 2);

        let combined = arena[defs[0]].content.unwrap();
        assert_eq!(arena[defs[1]].content, Some(combined));
        assert_eq!(arena[combined].kind, DefineType::Choice);
        let names: Vec<_> = arena
            .content(combined)
            .map(|id| arena[id].name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn test_name_class_choice() {
        let (parser, top) = parse(
            r#"<element xmlns="http://relaxng.org/ns/structure/1.0">
  <choice><name>a</name><choice><name>b</name><name>c</name></choice></choice>
  <empty/>
</element>"#,
        );

        let arena = &parser.arena;
        let start = parser.grammars[top.0].start_defines.unwrap();
        assert_eq!(arena[start].name, None);
        assert!(arena.is_name_class_match(start, "a"));
        assert!(arena.is_name_class_match(start, "c"));
        assert!(!arena.is_name_class_match(start, "d"));
    }

    #[test]
    fn test_any_name_except() {
        let (parser, top) = parse(
            r#"<element xmlns="http://relaxng.org/ns/structure/1.0">
  <anyName><except><name>script</name></except></anyName>
  <text/>
</element>"#,
        );

        let arena = &parser.arena;
        let start = parser.grammars[top.0].start_defines.unwrap();
        assert!(arena.is_name_class_match(start, "anything"));
        assert!(!arena.is_name_class_match(start, "script"));
    }

    #[test]
    fn test_mixed_prepends_text() {
        let (parser, top) = parse(
            r#"<element name="p" xmlns="http://relaxng.org/ns/structure/1.0">
  <mixed><element name="b"><text/></element><element name="i"><text/></element></mixed>
</element>"#,
        );

        let arena = &parser.arena;
        let start = parser.grammars[top.0].start_defines.unwrap();
        let interleave = arena[start].content.unwrap();
        assert_eq!(arena[interleave].kind, DefineType::Interleave);
        let kinds: Vec<_> = arena.content(interleave).map(|id| arena[id].kind).collect();
        assert_eq!(kinds, vec![DefineType::Text, DefineType::Group]);
    }

    #[test]
    fn test_nested_grammar_parent_ref() {
        let (parser, top) = parse(
            r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <start>
    <element name="outer">
      <grammar>
        <start><element name="inner"><parentRef name="leaf"/></element></start>
      </grammar>
    </element>
  </start>
  <define name="leaf"><element name="leaf"><empty/></element></define>
</grammar>"#,
        );

        assert_eq!(parser.grammars[top.0].children.len(), 1);
        let arena = &parser.arena;
        let parent_refs = &parser.grammars[top.0].refs["leaf"];
        assert_eq!(parent_refs.len(), 1);
        let reference = parent_refs[0];
        assert_eq!(arena[reference].kind, DefineType::ParentRef);
        assert_eq!(arena[reference].content, parser.grammars[top.0].define("leaf"));
    }
}
