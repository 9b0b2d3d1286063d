//! Normalization of RELAX NG documents before parsing
//!
//! The pass works on the owned element tree and rewrites it in place:
//!
//! - elements outside the RELAX NG namespace and blank text go away
//!   (text inside `value` and `param` is kept as written)
//! - `include` and `externalRef` targets are loaded, cleaned and attached
//!   to the referencing element; unloadable or recursive ones are dropped
//! - `name="..."` on `element`/`attribute` becomes a leading `<name>` child
//! - `name`, `nsName` and `value` get an explicit `ns`
//! - `div` children are spliced into the enclosing element

use crate::documents::{Document, Element, Node};
use crate::loaders::Loader;
use crate::locations::Location;
use crate::names;
use crate::namespaces::{NamespaceContext, QName};
use crate::RNG_NAMESPACE;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reference {
    Include,
    ExternalRef,
}

impl Reference {
    fn as_str(&self) -> &'static str {
        match self {
            Reference::Include => "include",
            Reference::ExternalRef => "externalRef",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Redefined<'a> {
    Start,
    Define(&'a str),
}

/// Cleanup pass over one schema document and everything it references
pub struct Cleanup<'a> {
    loader: &'a Loader,
    includes: Vec<Location>,
    external_refs: Vec<Location>,
    namespaces: NamespaceContext,
}

impl<'a> Cleanup<'a> {
    /// Create a cleanup pass loading references through `loader`
    pub fn new(loader: &'a Loader) -> Self {
        Self {
            loader,
            includes: Vec::new(),
            external_refs: Vec::new(),
            namespaces: NamespaceContext::new(),
        }
    }

    /// Clean `root`, the root element of the document at `location`
    pub fn run(&mut self, root: &mut Element, location: Option<&Location>) {
        if let Some(location) = location {
            self.includes.push(location.clone());
            self.external_refs.push(location.clone());
        }

        self.clean_element(root, None);

        if location.is_some() {
            self.includes.pop();
            self.external_refs.pop();
        }
    }

    fn clean_element(&mut self, element: &mut Element, inherited_ns: Option<&str>) {
        self.namespaces.push_scope();
        for (prefix, uri) in &element.namespace_decls {
            match prefix {
                Some(prefix) => self.namespaces.add_prefix(prefix.clone(), uri.clone()),
                None => self.namespaces.set_default_namespace(uri.clone()),
            }
        }

        let local_name = element.local_name().to_string();
        match local_name.as_str() {
            "element" | "attribute" => hoist_name(element),
            "name" | "nsName" | "value" => {
                if !element.has_attribute("ns") {
                    element.set_attribute("ns", inherited_ns.unwrap_or_default());
                }
                if local_name == "name" {
                    self.resolve_name_prefix(element);
                }
            }
            _ => {}
        }

        let ns = element
            .attribute("ns")
            .map(str::to_string)
            .or_else(|| inherited_ns.map(str::to_string));
        self.clean_children(element, ns.as_deref());

        self.namespaces.pop_scope();
    }

    fn resolve_name_prefix(&self, element: &mut Element) {
        let content = element.text_content();
        let (Some(prefix), local) = names::split_qname(content.trim()) else {
            return;
        };
        if let Some(uri) = self.namespaces.get_namespace(prefix) {
            let (uri, local) = (uri.to_string(), local.to_string());
            element.set_attribute("ns", uri);
            element.set_text_content(local);
        }
    }

    fn clean_children(&mut self, parent: &mut Element, ns: Option<&str>) {
        let keep_blank = matches!(parent.local_name(), "value" | "param");
        let mut pending: VecDeque<Node> = std::mem::take(&mut parent.children).into();
        let mut children = Vec::with_capacity(pending.len());

        while let Some(node) = pending.pop_front() {
            let mut child = match node {
                Node::Text(text) => {
                    if keep_blank || !names::is_blank(&text) {
                        children.push(Node::Text(text));
                    }
                    continue;
                }
                Node::Element(child) => child,
            };

            if !child.name.is_in(RNG_NAMESPACE) {
                continue;
            }

            let local_name = child.local_name().to_string();
            match local_name.as_str() {
                "div" => {
                    let div_ns = child.attribute("ns").map(str::to_string);
                    for (prefix, uri) in &child.namespace_decls {
                        match prefix {
                            Some(prefix) => self.namespaces.add_prefix(prefix.clone(), uri.clone()),
                            None => self.namespaces.set_default_namespace(uri.clone()),
                        }
                    }
                    parent.namespace_decls.append(&mut child.namespace_decls);

                    for mut node in std::mem::take(&mut child.children).into_iter().rev() {
                        if let (Node::Element(e), Some(div_ns)) = (&mut node, &div_ns) {
                            if !e.has_attribute("ns") {
                                e.set_attribute("ns", div_ns.clone());
                            }
                        }
                        pending.push_front(node);
                    }
                    continue;
                }
                "include" => {
                    self.clean_element(&mut child, ns);
                    match self.load_include(&child, ns) {
                        Some(root) => child.resolved = Some(Box::new(root)),
                        None => continue,
                    }
                }
                "externalRef" => {
                    self.clean_element(&mut child, ns);
                    match self.load_reference(&child, ns, Reference::ExternalRef) {
                        Some(root) => child.resolved = Some(Box::new(root)),
                        None => continue,
                    }
                }
                _ => self.clean_element(&mut child, ns),
            }

            children.push(Node::Element(child));
        }

        parent.children = children;
    }

    fn load_include(&mut self, include: &Element, ns: Option<&str>) -> Option<Element> {
        let mut root = self.load_reference(include, ns, Reference::Include)?;

        if !root.is(RNG_NAMESPACE, "grammar") {
            tracing::warn!(
                href = include.attribute("href").unwrap_or_default(),
                "included document is not a grammar"
            );
            return None;
        }

        for redefinition in include.child_elements() {
            match redefinition.local_name() {
                "start" => remove_redefinitions(&mut root, Redefined::Start),
                "define" => {
                    if let Some(name) = redefinition.attribute("name") {
                        remove_redefinitions(&mut root, Redefined::Define(name.trim()));
                    }
                }
                _ => {}
            }
        }

        Some(root)
    }

    fn load_reference(
        &mut self,
        element: &Element,
        ns: Option<&str>,
        kind: Reference,
    ) -> Option<Element> {
        let href = element.attribute("href")?.trim();
        if href.is_empty() {
            return None;
        }
        let location = Location::resolve(element.base.as_ref(), href);

        let stack = match kind {
            Reference::Include => &self.includes,
            Reference::ExternalRef => &self.external_refs,
        };
        if stack.contains(&location) {
            tracing::warn!(%location, kind = kind.as_str(), "recursive reference ignored");
            return None;
        }

        let depth = self.includes.len() + self.external_refs.len() + 1;
        if let Err(err) = self.loader.limits().check_schema_depth(depth) {
            tracing::warn!(%location, %err, "schema nesting too deep");
            return None;
        }

        let mut root = match Document::from_location(self.loader, &location) {
            Ok(document) => document.into_root()?,
            Err(err) => {
                tracing::warn!(%location, %err, kind = kind.as_str(), "can't load schema fragment");
                return None;
            }
        };
        if !root.name.is_in(RNG_NAMESPACE) {
            return None;
        }
        if let (false, Some(ns)) = (root.has_attribute("ns"), ns) {
            root.set_attribute("ns", ns);
        }

        match kind {
            Reference::Include => self.includes.push(location),
            Reference::ExternalRef => self.external_refs.push(location),
        }
        let outer = std::mem::take(&mut self.namespaces);

        self.clean_element(&mut root, None);

        self.namespaces = outer;
        match kind {
            Reference::Include => self.includes.pop(),
            Reference::ExternalRef => self.external_refs.pop(),
        };

        Some(root)
    }
}

fn hoist_name(element: &mut Element) {
    let Some(name) = element.remove_attribute("name") else {
        return;
    };

    let mut name_element = Element::new(QName::namespaced(RNG_NAMESPACE, "name"));
    name_element.line = element.line;
    name_element.base = element.base.clone();
    match element.attribute("ns") {
        Some(ns) => name_element.set_attribute("ns", ns),
        None if element.local_name() == "attribute" => name_element.set_attribute("ns", ""),
        None => {}
    }
    name_element.set_text_content(name.trim());

    element.children.insert(0, Node::Element(name_element));
}

fn remove_redefinitions(grammar: &mut Element, target: Redefined<'_>) {
    grammar.children.retain(|node| {
        let Node::Element(e) = node else {
            return true;
        };
        match target {
            Redefined::Start => !e.is(RNG_NAMESPACE, "start"),
            Redefined::Define(name) => {
                !(e.is(RNG_NAMESPACE, "define") && e.attribute("name").map(str::trim) == Some(name))
            }
        }
    });

    for node in grammar.children.iter_mut() {
        if let Node::Element(e) = node {
            if let (true, Some(nested)) = (
                e.is(RNG_NAMESPACE, "include"),
                e.resolved.as_deref_mut(),
            ) {
                remove_redefinitions(nested, target);
            }
        }
    }
}
