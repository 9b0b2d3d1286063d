//! GtkBuilder front end
//!
//! Widgets, children and menus are visible; properties, menu attributes
//! and style classes are internal children whose text or names feed the
//! labels of their parents.

use super::{FrontEnd, NodeSpec};
use crate::analysis::Requirement;
use crate::sax::RawAttribute;
use crate::symbol::{Label, SymbolKind, SymbolNode, SymbolTree};

/// Front end for `.ui` and `.glade` files
#[derive(Debug, Default)]
pub struct UiFrontEnd {
    requires: Vec<Requirement>,
}

impl UiFrontEnd {
    /// Create the front end
    pub fn new() -> Self {
        Self::default()
    }
}

/// Attribute value, `None` when missing or empty
fn attribute<'a>(attributes: &'a [RawAttribute], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .rev()
        .find(|(n, _)| n == name)
        .and_then(|(_, v)| v.as_deref())
        .filter(|v| !v.is_empty())
}

fn named(element: &str, kind: SymbolKind, attributes: &[RawAttribute]) -> SymbolNode {
    let node = SymbolNode::new(element, kind);
    match attribute(attributes, "name") {
        Some(name) => node.with_label(Label::new(name)),
        None => node,
    }
}

impl FrontEnd for UiFrontEnd {
    fn start_element(
        &mut self,
        parent: &SymbolNode,
        name: &str,
        attributes: &[RawAttribute],
    ) -> Option<NodeSpec> {
        let parent_name = parent.element_name.as_str();
        let spec = match name {
            "property" if matches!(parent_name, "object" | "template") => {
                NodeSpec::internal(named("property", SymbolKind::UiProperty, attributes)).capturing()
            }
            "attribute" if matches!(parent_name, "section" | "submenu" | "item") => {
                NodeSpec::internal(named("attribute", SymbolKind::UiMenuAttribute, attributes))
                    .capturing()
            }
            "class" if parent_name == "style" => {
                NodeSpec::internal(named("class", SymbolKind::UiStyleClass, attributes))
            }
            "child" => {
                let mut label = Label::new("child");
                if let Some(kind) = attribute(attributes, "type") {
                    label = label.with("type", kind);
                }
                if let Some(internal) = attribute(attributes, "internal-child") {
                    label = label.with("internal", internal);
                }
                NodeSpec::visible(SymbolNode::new("child", SymbolKind::UiChild).with_label(label))
            }
            "object" => {
                let mut label =
                    Label::new("object").with("class", attribute(attributes, "class").unwrap_or("?"));
                if let Some(id) = attribute(attributes, "id") {
                    label = label.with("id", id);
                }
                NodeSpec::visible(SymbolNode::new("object", SymbolKind::UiObject).with_label(label))
            }
            "template" => {
                let label = Label::new("template")
                    .with("class", attribute(attributes, "class").unwrap_or("?"))
                    .with("parent", attribute(attributes, "parent").unwrap_or("?"));
                NodeSpec::visible(SymbolNode::new("template", SymbolKind::UiTemplate).with_label(label))
            }
            "packing" => NodeSpec::visible(SymbolNode::new("packing", SymbolKind::UiPacking)),
            "style" => NodeSpec::visible(SymbolNode::new("style", SymbolKind::UiStyle)),
            "item" => NodeSpec::visible(SymbolNode::new("item", SymbolKind::UiItem)),
            "menu" | "submenu" | "section" => {
                let kind = match name {
                    "menu" => SymbolKind::UiMenu,
                    "submenu" => SymbolKind::UiSubmenu,
                    _ => SymbolKind::UiSection,
                };
                let label = Label::new(name).with("id", attribute(attributes, "id").unwrap_or("?"));
                NodeSpec::visible(SymbolNode::new(name, kind).with_label(label))
            }
            "requires" => {
                if let (Some(lib), Some(version)) =
                    (attribute(attributes, "lib"), attribute(attributes, "version"))
                {
                    self.requires.push(Requirement {
                        lib: lib.to_string(),
                        version: version.to_string(),
                    });
                }
                return None;
            }
            _ => return None,
        };
        Some(spec)
    }

    fn post_process(&mut self, tree: &mut SymbolTree) -> Vec<Requirement> {
        for id in tree.descendants(tree.root()) {
            let decoration = match tree[id].element_name.as_str() {
                "style" => {
                    let classes: Vec<String> = tree
                        .internal_children(id)
                        .filter(|child| tree[*child].kind == SymbolKind::UiStyleClass)
                        .map(|child| tree[child].label.name.clone())
                        .collect();
                    Some(("class", classes.join(" ")))
                }
                "item" | "submenu" | "section" => tree
                    .internal_children(id)
                    .find(|child| {
                        tree[*child].kind == SymbolKind::UiMenuAttribute
                            && tree[*child].label.name == "label"
                    })
                    .and_then(|child| tree[child].value.clone())
                    .map(|value| ("label", value)),
                _ => None,
            };
            if let Some((key, value)) = decoration {
                tree[id].label.decorations.push((key.to_string(), value));
            }
        }
        std::mem::take(&mut self.requires)
    }
}
