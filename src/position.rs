//! What sits under a cursor
//!
//! [`Position::resolve`] descends the symbol tree comparing the cursor with
//! the recorded tag ranges, then classifies the spot inside a tag by
//! scanning the buffer from the tag start up to the cursor.

use crate::analysis::Analysis;
use crate::names;
use crate::sax::LineIndex;
use crate::symbol::{NodeId, NodeState, RelativePosition};
use std::sync::Arc;

/// Coarse cursor location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionKind {
    /// Inside a start tag
    InStartTag,
    /// Inside an end tag
    InEndTag,
    /// Between tags
    InContent,
}

/// Cursor location inside a tag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PositionDetail {
    /// Nowhere specific
    #[default]
    None,
    /// In the element name
    InName,
    /// In or at an attribute name
    InAttributeName,
    /// In an attribute value
    InAttributeValue,
}

/// Resolved cursor position
#[derive(Debug, Clone)]
pub struct Position {
    /// Analysis the position was resolved against
    pub analysis: Arc<Analysis>,
    /// Cursor line, 1-based
    pub line: u32,
    /// Cursor column, 1-based
    pub col: u32,
    /// Content node for [`PositionKind::InContent`], parent of the tag's
    /// node otherwise
    pub node: NodeId,
    /// Node whose tag holds the cursor
    pub child_node: Option<NodeId>,
    /// Sibling before the insertion point or the tag's node
    pub previous_sibling: Option<NodeId>,
    /// Sibling after the insertion point or the tag's node
    pub next_sibling: Option<NodeId>,
    /// Coarse location
    pub kind: PositionKind,
    /// Location inside a tag
    pub detail: PositionDetail,
    /// Element or attribute name being typed
    pub detail_name: Option<String>,
    /// Attribute value typed so far
    pub detail_value: Option<String>,
    /// Index among `node`'s direct children where something would be
    /// inserted; for tags, the index of the tag's node
    pub child_pos: usize,
    /// Quote of the attribute value being typed
    pub quote: Option<char>,
    /// Tag text between `<` and the cursor
    pub prefix: Option<String>,
}

impl Position {
    /// Resolve a 1-based cursor against an analysis and the text it was built from
    pub fn resolve(analysis: Arc<Analysis>, text: &[u8], line: u32, col: u32) -> Position {
        let tree = &analysis.tree;
        let mut current = tree.root();
        let mut kind: PositionKind;
        let mut target: NodeId;
        let mut previous: Option<NodeId>;
        let mut child_pos: usize;

        'descend: loop {
            let n_children = tree.n_direct_children(current);
            target = current;
            kind = PositionKind::InContent;
            child_pos = 0;
            previous = None;

            for i in 0..n_children {
                let Some(child) = tree.nth_direct_child(current, i) else {
                    break;
                };
                child_pos = i;
                match tree[child].compare_location(line, col) {
                    RelativePosition::InStartTag => {
                        target = child;
                        kind = PositionKind::InStartTag;
                        break 'descend;
                    }
                    RelativePosition::InEndTag => {
                        target = child;
                        kind = PositionKind::InEndTag;
                        break 'descend;
                    }
                    RelativePosition::Before => break 'descend,
                    RelativePosition::After => {
                        previous = Some(child);
                        if i + 1 == n_children {
                            child_pos = n_children;
                            break 'descend;
                        }
                    }
                    RelativePosition::InContent => {
                        current = child;
                        continue 'descend;
                    }
                }
            }
            break;
        }

        // typing a new tag: the reader has not seen its `>` yet
        if kind == PositionKind::InContent {
            if let Some(prev) = previous.filter(|prev| tree[*prev].state == NodeState::NotClosed) {
                target = prev;
                kind = PositionKind::InStartTag;
            }
        }

        let mut position = Position {
            analysis: analysis.clone(),
            line,
            col,
            node: target,
            child_node: None,
            previous_sibling: None,
            next_sibling: None,
            kind,
            detail: PositionDetail::None,
            detail_name: None,
            detail_value: None,
            child_pos,
            quote: None,
            prefix: None,
        };

        match kind {
            PositionKind::InContent => {
                position.previous_sibling = child_pos
                    .checked_sub(1)
                    .and_then(|i| tree.nth_direct_child(target, i));
                position.next_sibling = tree.nth_direct_child(target, child_pos);
            }
            PositionKind::InStartTag | PositionKind::InEndTag => {
                let parent = tree.parent(target).unwrap_or_else(|| tree.root());
                let index = tree[parent]
                    .direct_children()
                    .iter()
                    .position(|(id, _)| *id == target)
                    .unwrap_or(0);
                position.node = parent;
                position.child_node = Some(target);
                position.child_pos = index;
                position.previous_sibling = index.checked_sub(1).and_then(|i| tree.nth_direct_child(parent, i));
                position.next_sibling = tree.nth_direct_child(parent, index + 1);
                position.classify_tag(target, text);
            }
        }

        tracing::trace!(
            line,
            col,
            kind = ?position.kind,
            detail = ?position.detail,
            "cursor position"
        );
        position
    }

    fn classify_tag(&mut self, target: NodeId, text: &[u8]) {
        let range = self.analysis.tree[target].start_tag;
        let range = match self.kind {
            PositionKind::InEndTag => self.analysis.tree[target].end_tag.unwrap_or(range),
            _ => range,
        };
        let lines = LineIndex::new(text);
        let (Some(mut start), Some(end)) = (
            lines.offset(range.start_line, range.start_col),
            lines.offset(self.line, self.col),
        ) else {
            return;
        };
        if text.get(start) == Some(&b'<') {
            start += 1;
        }
        if start >= end {
            self.detail = PositionDetail::InName;
            self.prefix = Some(String::new());
            return;
        }

        let prefix = String::from_utf8_lossy(&text[start..end.min(text.len())]).into_owned();
        let next = text.get(end).map(|b| *b as char);
        let detail = scan_detail(&prefix, next);
        self.detail = detail.detail;
        self.detail_name = detail.name;
        self.detail_value = detail.value;
        self.quote = detail.quote;
        self.prefix = Some(prefix);
    }

    /// Whether the cursor is completing a name or value with a known prefix
    pub fn has_prefix(&self) -> bool {
        self.prefix.is_some()
    }
}

/// Result of scanning a tag prefix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDetail {
    /// Classification
    pub detail: PositionDetail,
    /// Element or attribute name
    pub name: Option<String>,
    /// Attribute value so far
    pub value: Option<String>,
    /// Opening quote of the value
    pub quote: Option<char>,
}

impl TagDetail {
    fn new(detail: PositionDetail) -> Self {
        Self {
            detail,
            ..Self::default()
        }
    }

    fn named(detail: PositionDetail, name: &str) -> Self {
        Self {
            detail,
            name: Some(name.to_string()),
            ..Self::default()
        }
    }
}

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Classify the end of `prefix`, the tag text between `<` and the cursor
///
/// `next` is the character right after the cursor.
pub fn scan_detail(prefix: &str, next: Option<char>) -> TagDetail {
    let Some(rest) = names::skip_element_name(prefix) else {
        return TagDetail::default();
    };
    if rest.is_empty() {
        return match next {
            None => TagDetail::named(PositionDetail::InName, prefix),
            Some(c) if is_space(c) || matches!(c, '<' | '>' | '/') => {
                TagDetail::named(PositionDetail::InName, prefix)
            }
            Some(_) => TagDetail::default(),
        };
    }

    let (mut cursor, _) = names::skip_whitespace(rest);
    loop {
        if cursor.is_empty() {
            return TagDetail::new(PositionDetail::InAttributeName);
        }

        let Some(after_name) = names::skip_attribute_name(cursor) else {
            return TagDetail::default();
        };
        let name = &cursor[..cursor.len() - after_name.len()];
        if after_name.is_empty() {
            return match next {
                Some(c) if !is_space(c) && c != '=' => TagDetail::default(),
                _ => TagDetail::named(PositionDetail::InAttributeName, name),
            };
        }

        let (after_space, _) = names::skip_whitespace(after_name);
        if after_space.is_empty() {
            return TagDetail::new(PositionDetail::InAttributeName);
        }
        let Some(after_eq) = after_space.strip_prefix('=') else {
            // a value-less attribute, go on with the next name
            cursor = after_space;
            continue;
        };

        let (value_start, _) = names::skip_whitespace(after_eq);
        let Some(quote) = value_start.chars().next() else {
            return TagDetail::named(PositionDetail::InAttributeValue, name);
        };
        if quote != '"' && quote != '\'' {
            let unquoted = names::skip_to_whitespace(value_start);
            let (after_value, _) = names::skip_whitespace(unquoted);
            if unquoted.is_empty() {
                return TagDetail::default();
            }
            cursor = after_value;
            continue;
        }

        match names::skip_attribute_value(&value_start[1..], quote) {
            Err(partial) => {
                return TagDetail {
                    detail: PositionDetail::InAttributeValue,
                    name: Some(name.to_string()),
                    value: Some(partial.to_string()),
                    quote: Some(quote),
                };
            }
            Ok(after_value) => {
                let (after_space, has_space) = names::skip_whitespace(after_value);
                if after_space.is_empty() {
                    return if has_space {
                        TagDetail::new(PositionDetail::InAttributeName)
                    } else {
                        TagDetail::default()
                    };
                }
                cursor = if has_space {
                    after_space
                } else {
                    names::skip_whitespace(names::skip_to_whitespace(after_space)).0
                };
            }
        }
    }
}
