//! GtkBuilder semantic completion
//!
//! Property and signal names come from the class of the enclosing
//! `<object>` (or the parent class of a `<template>`), looked up through a
//! [`GiIntrospection`] implementation. `<requires lib="…">` completes
//! package names.

use super::{Proposal, ProposalKind};
use crate::analysis::Requirement;
use crate::position::{Position, PositionDetail, PositionKind};
use crate::symbol::NodeId;

/// Handle of a type known to the introspection service
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeHandle(pub String);

/// A property or signal of a class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Name
    pub name: String,
    /// Documentation
    pub doc: Option<String>,
}

/// Type information for GtkBuilder files
pub trait GiIntrospection: Send + Sync {
    /// Resolve a class name under the file's library requirements
    fn lookup_gtype(&self, requires: &[Requirement], name: &str) -> Option<TypeHandle>;

    /// Properties of a class, inherited ones included
    fn class_properties(&self, gtype: &TypeHandle) -> Vec<Member>;

    /// Signals of a class, inherited ones included
    fn class_signals(&self, gtype: &TypeHandle) -> Vec<Member>;

    /// Package names starting with `prefix`
    fn complete_package_prefix(&self, prefix: &str) -> Vec<String>;
}

/// Proposals for attribute values with a meaning in GtkBuilder files
pub fn populate(gi: &dyn GiIntrospection, position: &Position) -> Vec<Proposal> {
    if position.kind != PositionKind::InStartTag || position.detail != PositionDetail::InAttributeValue {
        return Vec::new();
    }
    let Some(child) = position.child_node else {
        return Vec::new();
    };

    let analysis = &position.analysis;
    let element = analysis.tree[child].element_name.as_str();
    let attribute = position.detail_name.as_deref().unwrap_or_default();
    let prefix = position.detail_value.as_deref().unwrap_or_default();

    match (element, attribute) {
        ("property", "name") | ("signal", "name") => {
            let Some(class) = enclosing_class(position, position.node) else {
                return Vec::new();
            };
            let Some(gtype) = gi.lookup_gtype(&analysis.requires, class) else {
                tracing::debug!(class, "unknown class");
                return Vec::new();
            };
            let (members, kind) = if element == "property" {
                (gi.class_properties(&gtype), ProposalKind::Property)
            } else {
                (gi.class_signals(&gtype), ProposalKind::Signal)
            };
            members
                .into_iter()
                .filter(|member| member.name.starts_with(prefix))
                .map(|member| Proposal::literal(member.name, kind).with_doc(member.doc))
                .collect()
        }
        ("requires", "lib") => gi
            .complete_package_prefix(prefix)
            .into_iter()
            .map(|name| Proposal::literal(name, ProposalKind::Package))
            .collect(),
        _ => Vec::new(),
    }
}

fn enclosing_class(position: &Position, from: NodeId) -> Option<&str> {
    let tree = &position.analysis.tree;
    let mut current = Some(from);
    while let Some(id) = current {
        let node = &tree[id];
        match node.element_name.as_str() {
            "object" => return node.attribute("class"),
            "template" => return node.attribute("parent"),
            _ => current = node.parent(),
        }
    }
    None
}
