//! Pattern simplification
//!
//! Runs once over the start patterns after parsing, following refs:
//!
//! - `notAllowed` makes an enclosing attribute, list, group, interleave or
//!   repetition `notAllowed`, and drops out of a choice
//! - `empty` makes an enclosing repetition `empty`, and drops out of
//!   groups, interleaves and choices
//! - empty groups become `empty`, single-child groups are replaced by the
//!   child
//! - attribute-only patterns in element content move to the element's
//!   attribute list
//! - an `except` of `notAllowed` is removed

use super::define::{DefineArena, DefineId, DefineType};
use std::collections::HashSet;

/// Simplify the sibling chain starting at `first`, owned by `parent`
pub(crate) fn simplify(arena: &mut DefineArena, first: Option<DefineId>, parent: Option<DefineId>) {
    let mut prev: Option<DefineId> = None;
    let mut current = first;

    while let Some(mut cur) = current {
        match arena[cur].kind {
            DefineType::Ref | DefineType::ParentRef => {
                if !arena[cur].is_ref_simplified {
                    arena[cur].is_ref_simplified = true;
                    let content = arena[cur].content;
                    simplify(arena, content, Some(cur));
                }
                prev = Some(cur);
            }
            DefineType::NotAllowed => {
                arena[cur].parent = parent;
                match apply_not_allowed(arena, cur, parent, prev) {
                    Some(p) => prev = p,
                    None => break,
                }
            }
            DefineType::Empty => {
                arena[cur].parent = parent;
                match apply_empty(arena, cur, parent, prev, false) {
                    Some(p) => prev = p,
                    None => break,
                }
            }
            kind => {
                arena[cur].parent = parent;

                let content = arena[cur].content;
                simplify(arena, content, Some(cur));
                if kind != DefineType::Value {
                    let attributes = arena[cur].attributes;
                    simplify(arena, attributes, Some(cur));
                }
                let name_class = arena[cur].name_class;
                simplify(arena, name_class, Some(cur));

                if arena[cur].kind == DefineType::Element {
                    hoist_attributes(arena, cur);
                }

                if matches!(arena[cur].kind, DefineType::Group | DefineType::Interleave) {
                    match arena[cur].content {
                        None => arena[cur].kind = DefineType::Empty,
                        Some(child) if arena[child].next.is_none() => match (parent, prev) {
                            (None, None) => arena[cur].kind = DefineType::Noop,
                            (Some(owner), None) => {
                                arena[child].next = arena[cur].next;
                                replace_link(arena, owner, cur, child);
                                arena[child].parent = Some(owner);
                                cur = child;
                            }
                            (_, Some(p)) => {
                                arena[child].next = arena[cur].next;
                                arena[p].next = Some(child);
                                arena[child].parent = parent;
                                cur = child;
                            }
                        },
                        Some(_) => {}
                    }
                }

                let kind = arena[cur].kind;
                let except_not_allowed = kind == DefineType::Except
                    && arena[cur]
                        .content
                        .map_or(false, |c| arena[c].kind == DefineType::NotAllowed);

                if except_not_allowed {
                    prev = unlink(arena, cur, parent, prev);
                } else if kind == DefineType::NotAllowed {
                    match apply_not_allowed(arena, cur, parent, prev) {
                        Some(p) => prev = p,
                        None => break,
                    }
                } else if kind == DefineType::Empty {
                    match apply_empty(arena, cur, parent, prev, true) {
                        Some(p) => prev = p,
                        None => break,
                    }
                } else {
                    prev = Some(cur);
                }
            }
        }

        current = arena[cur].next;
    }
}

fn parent_kind(arena: &DefineArena, parent: Option<DefineId>) -> Option<DefineType> {
    parent.map(|p| arena[p].kind)
}

// `None` stops the walk over the remaining siblings.
fn apply_not_allowed(
    arena: &mut DefineArena,
    cur: DefineId,
    parent: Option<DefineId>,
    prev: Option<DefineId>,
) -> Option<Option<DefineId>> {
    match parent_kind(arena, parent) {
        Some(
            DefineType::Attribute
            | DefineType::List
            | DefineType::Group
            | DefineType::Interleave
            | DefineType::OneOrMore
            | DefineType::ZeroOrMore,
        ) => {
            if let Some(p) = parent {
                arena[p].kind = DefineType::NotAllowed;
            }
            None
        }
        Some(DefineType::Choice) => Some(unlink(arena, cur, parent, prev)),
        _ => Some(Some(cur)),
    }
}

fn apply_empty(
    arena: &mut DefineArena,
    cur: DefineId,
    parent: Option<DefineId>,
    prev: Option<DefineId>,
    in_choice: bool,
) -> Option<Option<DefineId>> {
    match parent_kind(arena, parent) {
        Some(DefineType::OneOrMore | DefineType::ZeroOrMore) => {
            if let Some(p) = parent {
                arena[p].kind = DefineType::Empty;
            }
            None
        }
        Some(DefineType::Group | DefineType::Interleave) => Some(unlink(arena, cur, parent, prev)),
        Some(DefineType::Choice) if in_choice => Some(unlink(arena, cur, parent, prev)),
        _ => Some(Some(cur)),
    }
}

/// Remove `cur` from the chain it belongs to and return the new previous sibling
fn unlink(
    arena: &mut DefineArena,
    cur: DefineId,
    parent: Option<DefineId>,
    prev: Option<DefineId>,
) -> Option<DefineId> {
    let next = arena[cur].next;
    if let Some(p) = prev {
        arena[p].next = next;
        return prev;
    }

    match parent {
        Some(owner) => {
            let def = &mut arena[owner];
            if def.content == Some(cur) {
                def.content = next;
            } else if def.attributes == Some(cur) {
                def.attributes = next;
            } else if def.name_class == Some(cur) {
                def.name_class = next;
            }
            None
        }
        None => {
            arena[cur].kind = DefineType::Noop;
            Some(cur)
        }
    }
}

fn replace_link(arena: &mut DefineArena, owner: DefineId, old: DefineId, new: DefineId) {
    let def = &mut arena[owner];
    if def.content == Some(old) {
        def.content = Some(new);
    } else if def.attributes == Some(old) {
        def.attributes = Some(new);
    } else if def.name_class == Some(old) {
        def.name_class = Some(new);
    }
}

fn hoist_attributes(arena: &mut DefineArena, element: DefineId) {
    while let Some(head) = arena[element].content {
        if !is_attribute_pattern(arena, head) {
            break;
        }
        arena[element].content = arena[head].next;
        arena[head].next = arena[element].attributes;
        arena[element].attributes = Some(head);
    }

    let mut tail = arena[element].content;
    while let Some(t) = tail {
        let Some(candidate) = arena[t].next else {
            break;
        };
        if is_attribute_pattern(arena, candidate) {
            arena[t].next = arena[candidate].next;
            arena[candidate].next = arena[element].attributes;
            arena[element].attributes = Some(candidate);
        } else {
            tail = Some(candidate);
        }
    }
}

/// Check whether a pattern only ever produces attributes
pub(crate) fn is_attribute_pattern(arena: &mut DefineArena, id: DefineId) -> bool {
    let mut visited = HashSet::new();
    attribute_only(arena, id, &mut visited)
}

fn attribute_only(arena: &mut DefineArena, id: DefineId, visited: &mut HashSet<DefineId>) -> bool {
    match arena[id].kind {
        DefineType::Element
        | DefineType::Text
        | DefineType::Datatype
        | DefineType::Param
        | DefineType::List
        | DefineType::Value
        | DefineType::Empty => false,
        DefineType::Choice
        | DefineType::Interleave
        | DefineType::Group
        | DefineType::OneOrMore
        | DefineType::ZeroOrMore
        | DefineType::Optional
        | DefineType::ParentRef
        | DefineType::ExternalRef
        | DefineType::Ref
        | DefineType::Define => {
            if !visited.insert(id) {
                return true;
            }
            let children: Vec<DefineId> = arena.content(id).collect();
            for child in children {
                arena[child].parent = Some(id);
                if !attribute_only(arena, child, visited) {
                    return false;
                }
            }
            true
        }
        _ => true,
    }
}
