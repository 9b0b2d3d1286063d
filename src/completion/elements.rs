//! Elements allowed at a point of an element's content
//!
//! The children of the element being completed are matched against its
//! content pattern, with a [`Child::Candidate`] standing for the element
//! about to be typed. Matching tracks every reachable position in the
//! child list at once, so optional and repeated patterns before the
//! candidate all get their chance to offer it an element.

use super::pattern_names;
use crate::rng::{DefineArena, DefineId, DefineType};
use std::collections::{BTreeSet, HashMap};

const MAX_DEPTH: usize = 256;

// Interleaves with more members are matched in document order
const MAX_INTERLEAVE: usize = 8;

/// One child of the element being completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Child<'a> {
    /// Existing child, by element name
    Node(&'a str),
    /// The element being typed
    Candidate,
}

/// An element the candidate can be
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementMatch {
    /// Element name
    pub name: String,
    /// Its `element` pattern
    pub define: DefineId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Cursor {
    At(usize),
    // the candidate has been matched
    Done,
}

type States = BTreeSet<Cursor>;

/// Matches a child list against a content pattern
pub struct ElementMatcher<'a> {
    arena: &'a DefineArena,
    children: &'a [Child<'a>],
    prefix: &'a str,
    items: Vec<ElementMatch>,
}

impl<'a> ElementMatcher<'a> {
    /// Matcher over `children`, offering names starting with `prefix`
    pub fn new(arena: &'a DefineArena, children: &'a [Child<'a>], prefix: &'a str) -> Self {
        Self {
            arena,
            children,
            prefix,
            items: Vec::new(),
        }
    }

    /// Elements the candidate can be when the parent's content starts at `content`
    pub fn run(mut self, content: Option<DefineId>) -> Vec<ElementMatch> {
        let start = States::from([Cursor::At(0)]);
        self.chain(content, start, 0);
        self.items
    }

    fn chain(&mut self, first: Option<DefineId>, mut states: States, depth: usize) -> States {
        for id in self.arena.siblings(first) {
            if states.is_empty() {
                break;
            }
            states = self.pattern(id, states, depth);
        }
        states
    }

    fn pattern(&mut self, id: DefineId, states: States, depth: usize) -> States {
        if depth > MAX_DEPTH || states.is_empty() {
            return States::new();
        }

        let def = &self.arena[id];
        let content = def.content;
        match def.kind {
            DefineType::Element => self.element(id, states),
            DefineType::Noop
            | DefineType::Start
            | DefineType::Define
            | DefineType::Ref
            | DefineType::ParentRef
            | DefineType::ExternalRef
            | DefineType::Group => self.chain(content, states, depth + 1),
            DefineType::Choice => {
                if content.is_none() {
                    return states;
                }
                let mut out = States::new();
                for alternative in self.arena.siblings(content) {
                    out.extend(self.pattern(alternative, states.clone(), depth + 1));
                }
                out
            }
            DefineType::Optional => {
                let mut out = self.chain(content, states.clone(), depth + 1);
                out.extend(states);
                out
            }
            DefineType::ZeroOrMore => self.repeat(content, states, depth),
            DefineType::OneOrMore => {
                let once = self.chain(content, states, depth + 1);
                self.repeat(content, once, depth)
            }
            DefineType::Interleave => self.interleave(content, states, depth),
            DefineType::NotAllowed => States::new(),
            // match no element children
            _ => states,
        }
    }

    fn element(&mut self, id: DefineId, states: States) -> States {
        let mut out = States::new();
        for state in states {
            let index = match state {
                Cursor::Done => {
                    out.insert(Cursor::Done);
                    continue;
                }
                Cursor::At(index) => index,
            };
            match self.children.get(index) {
                Some(Child::Candidate) => {
                    if self.offer(id) {
                        out.insert(Cursor::Done);
                    }
                }
                Some(Child::Node(name)) => {
                    if self.arena.is_name_class_match(id, name) {
                        out.insert(Cursor::At(index + 1));
                    }
                }
                None => {}
            }
        }
        out
    }

    fn offer(&mut self, id: DefineId) -> bool {
        let mut offered = false;
        for name in pattern_names(self.arena, id) {
            if !name.starts_with(self.prefix) {
                continue;
            }
            offered = true;
            if !self.items.iter().any(|item| item.name == name) {
                self.items.push(ElementMatch { name, define: id });
            }
        }
        offered
    }

    fn repeat(&mut self, content: Option<DefineId>, states: States, depth: usize) -> States {
        let mut all = states.clone();
        let mut frontier = states;
        while !frontier.is_empty() {
            let reached = self.chain(content, frontier, depth + 1);
            frontier = reached.difference(&all).copied().collect();
            all.extend(frontier.iter().copied());
        }
        all
    }

    fn interleave(&mut self, content: Option<DefineId>, states: States, depth: usize) -> States {
        let members: Vec<DefineId> = self.arena.siblings(content).collect();
        if members.len() > MAX_INTERLEAVE {
            return self.chain(content, states, depth + 1);
        }

        // states reached after using each subset of members, in any order
        let full = (1u32 << members.len()) - 1;
        let mut layer: HashMap<u32, States> = HashMap::from([(0, states)]);
        for _ in 0..members.len() {
            let mut next: HashMap<u32, States> = HashMap::new();
            for (used, reached) in layer {
                for (i, member) in members.iter().enumerate() {
                    if used & (1 << i) != 0 {
                        continue;
                    }
                    let out = self.pattern(*member, reached.clone(), depth + 1);
                    if !out.is_empty() {
                        next.entry(used | (1 << i)).or_default().extend(out);
                    }
                }
            }
            layer = next;
        }
        layer.remove(&full).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loaders::Loader;
    use crate::rng::Schema;

    fn names(schema: &Schema, children: &[Child<'_>], prefix: &str) -> Vec<String> {
        let arena = schema.defines();
        let root = schema.start().unwrap();
        let content = arena[root].content;
        let mut names: Vec<String> = ElementMatcher::new(arena, children, prefix)
            .run(content)
            .into_iter()
            .map(|item| item.name)
            .collect();
        names.sort();
        names
    }

    fn schema(content: &str) -> Schema {
        let text = format!(
            r#"<element name="root" xmlns="http://relaxng.org/ns/structure/1.0">{}</element>"#,
            content
        );
        Schema::parse(text.as_bytes(), None, &Loader::new()).unwrap()
    }

    #[test]
    fn test_choice_offers_every_alternative() {
        let schema = schema(
            r#"<choice><element name="a"><empty/></element><element name="b"><empty/></element></choice>"#,
        );
        assert_eq!(names(&schema, &[Child::Candidate], ""), vec!["a", "b"]);
        assert_eq!(names(&schema, &[Child::Candidate], "b"), vec!["b"]);
        assert!(names(&schema, &[Child::Node("a"), Child::Candidate], "").is_empty());
    }

    #[test]
    fn test_interleave_any_order() {
        let schema = schema(
            r#"<interleave><element name="a"><empty/></element><element name="b"><empty/></element></interleave>"#,
        );
        assert_eq!(names(&schema, &[Child::Candidate], ""), vec!["a", "b"]);
        assert_eq!(names(&schema, &[Child::Node("b"), Child::Candidate], ""), vec!["a"]);
    }

    #[test]
    fn test_mixed_content() {
        let schema = schema(
            r#"<mixed><zeroOrMore><choice><element name="em"><text/></element><element name="strong"><text/></element></choice></zeroOrMore></mixed>"#,
        );
        let children = [Child::Node("em"), Child::Node("strong"), Child::Candidate];
        assert_eq!(names(&schema, &children, ""), vec!["em", "strong"]);
    }

    #[test]
    fn test_name_class_choice() {
        let schema = schema(
            r#"<element><choice><name>left</name><name>right</name></choice><empty/></element>"#,
        );
        assert_eq!(names(&schema, &[Child::Candidate], ""), vec!["left", "right"]);
    }
}
