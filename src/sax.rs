//! Positioned XML token stream
//!
//! [`SaxReader`] wraps a `quick-xml` reader and turns it into a lazy, finite
//! sequence of [`ParseEvent`]s, each carrying the exact line/column range
//! of the markup it comes from. It never stops on malformed input: a tag
//! missing its `>`, a lone `<` or a truncated document produce an
//! [`ParseEvent::Error`] followed by the best structure that can be
//! recovered.
//!
//! [`TokenCursor`] layers a DOM-style walk (`advance_into_children`,
//! `advance_to_next_sibling`, `read_text`, ...) over the same events.

use crate::names;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use std::collections::VecDeque;

/// Source range of a piece of markup
///
/// Lines and columns are 1-based, columns count bytes. `start_col` is the
/// column of the opening `<` and `end_col` the column of the closing `>`
/// (or the last byte of an unterminated tag).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct NodeRange {
    /// Line of the first byte
    pub start_line: u32,
    /// Column of the first byte
    pub start_col: u32,
    /// Line of the last byte
    pub end_line: u32,
    /// Column of the last byte
    pub end_col: u32,
    /// Size in bytes
    pub size: usize,
}

impl NodeRange {
    /// Three-way comparison of a cursor against this range
    ///
    /// A cursor at `(line, col)` sits just before the byte at that column.
    /// Returns `Less` when the cursor is before the range, `Greater` when it
    /// is after the last byte, `Equal` inside.
    pub fn compare(&self, line: u32, col: u32) -> std::cmp::Ordering {
        use std::cmp::Ordering;

        if line < self.start_line || (line == self.start_line && col <= self.start_col) {
            return Ordering::Less;
        }
        if line > self.end_line || (line == self.end_line && col > self.end_col) {
            return Ordering::Greater;
        }
        Ordering::Equal
    }
}

/// Byte offset to line/column mapping for one buffer
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    /// Index the line starts of `text`
    pub fn new(text: &[u8]) -> Self {
        let mut starts = vec![0];
        starts.extend(
            text.iter()
                .enumerate()
                .filter(|(_, b)| **b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            starts,
            len: text.len(),
        }
    }

    /// 1-based (line, column) of a byte offset
    pub fn position(&self, offset: usize) -> (u32, u32) {
        let offset = offset.min(self.len);
        let line = match self.starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        (line as u32 + 1, (offset - self.starts[line]) as u32 + 1)
    }

    /// Byte offset of a 1-based (line, column), clamped to the line end
    pub fn offset(&self, line: u32, col: u32) -> Option<usize> {
        let line_idx = (line as usize).checked_sub(1)?;
        let start = *self.starts.get(line_idx)?;
        let line_end = self
            .starts
            .get(line_idx + 1)
            .map(|next| next - 1)
            .unwrap_or(self.len);
        let col_offset = (col as usize).saturating_sub(1);
        Some((start + col_offset).min(line_end))
    }

    /// Range covering the bytes `start..=end`
    pub fn range(&self, start: usize, end: usize) -> NodeRange {
        let end = end.max(start);
        let (start_line, start_col) = self.position(start);
        let (end_line, end_col) = self.position(end);
        NodeRange {
            start_line,
            start_col,
            end_line,
            end_col,
            size: end + 1 - start,
        }
    }

    /// Number of lines
    pub fn line_count(&self) -> usize {
        self.starts.len()
    }
}

/// Kind of recoverable markup error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SaxErrorKind {
    /// A start or end tag is missing its closing `>`
    GtRequired,
    /// A `<` is not followed by a name
    NameRequired,
    /// An end tag closes an element that is not the innermost open one
    TagNameMismatch,
    /// An end tag matches no open element
    UnexpectedEndTag,
    /// The input ends with elements still open
    PrematureEnd,
    /// The input is not valid UTF-8; reported once, text is decoded lossily
    InvalidEncoding,
    /// Any other syntax error; the rest of the input is skipped
    Malformed,
}

/// A recoverable error reported by the reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaxError {
    /// Error kind
    pub kind: SaxErrorKind,
    /// Human readable message
    pub message: String,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub col: u32,
}

/// Attribute as written in the document
pub type RawAttribute = (String, Option<String>);

/// One event of the positioned token stream
#[derive(Debug, Clone, PartialEq)]
pub enum ParseEvent {
    /// Start tag (or self-closing tag)
    StartElement {
        /// Qualified name, empty for a lone `<`
        name: String,
        /// Attributes in document order
        attributes: Vec<RawAttribute>,
        /// Range of the tag
        range: NodeRange,
        /// Nesting depth, 1 for the root element
        depth: usize,
        /// `<a/>` form
        self_closing: bool,
        /// The tag has its closing `>`
        terminated: bool,
    },
    /// End tag
    EndElement {
        /// Qualified name
        name: String,
        /// Range of the tag
        range: NodeRange,
        /// Depth of the element being closed
        depth: usize,
    },
    /// Character data between tags
    Characters {
        /// Unescaped text
        text: String,
        /// Range of the text
        range: NodeRange,
        /// Depth of the enclosing element
        depth: usize,
    },
    /// `<!-- -->`
    Comment {
        /// Comment body
        text: String,
        /// Range of the comment
        range: NodeRange,
        /// Depth of the enclosing element
        depth: usize,
    },
    /// `<![CDATA[ ]]>`
    CData {
        /// Section body
        text: String,
        /// Range of the section
        range: NodeRange,
        /// Depth of the enclosing element
        depth: usize,
    },
    /// `<?target data?>`
    ProcessingInstruction {
        /// Target name
        target: String,
        /// Everything after the target
        data: String,
        /// Range of the instruction
        range: NodeRange,
        /// Depth of the enclosing element
        depth: usize,
    },
    /// `<!DOCTYPE name PUBLIC "ext" "sys">`
    InternalSubset {
        /// Root element name
        name: String,
        /// Public identifier
        external_id: Option<String>,
        /// System identifier
        system_id: Option<String>,
        /// Range of the declaration
        range: NodeRange,
    },
    /// Recoverable error
    Error(SaxError),
}

impl ParseEvent {
    /// Depth of the event, see each variant
    pub fn depth(&self) -> usize {
        match self {
            ParseEvent::StartElement { depth, .. }
            | ParseEvent::EndElement { depth, .. }
            | ParseEvent::Characters { depth, .. }
            | ParseEvent::Comment { depth, .. }
            | ParseEvent::CData { depth, .. }
            | ParseEvent::ProcessingInstruction { depth, .. } => *depth,
            ParseEvent::InternalSubset { .. } | ParseEvent::Error(_) => 0,
        }
    }

    /// Source range, if the event has one
    pub fn range(&self) -> Option<NodeRange> {
        match self {
            ParseEvent::StartElement { range, .. }
            | ParseEvent::EndElement { range, .. }
            | ParseEvent::Characters { range, .. }
            | ParseEvent::Comment { range, .. }
            | ParseEvent::CData { range, .. }
            | ParseEvent::ProcessingInstruction { range, .. }
            | ParseEvent::InternalSubset { range, .. } => Some(*range),
            ParseEvent::Error(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagShape {
    Start,
    Empty,
    End,
}

/// Pull parser producing [`ParseEvent`]s with exact tag ranges
pub struct SaxReader<'a> {
    reader: Reader<&'a [u8]>,
    input: &'a [u8],
    lines: LineIndex,
    pending: VecDeque<ParseEvent>,
    open: Vec<(String, NodeRange)>,
    consumed: usize,
    finished: bool,
}

impl<'a> SaxReader<'a> {
    /// Create a reader over a complete buffer
    pub fn new(input: &'a [u8]) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(false);
        reader.check_end_names(false);
        reader.expand_empty_elements(false);

        let mut sax = Self {
            reader,
            input,
            lines: LineIndex::new(input),
            pending: VecDeque::new(),
            open: Vec::new(),
            consumed: 0,
            finished: false,
        };
        if let Err(e) = std::str::from_utf8(input) {
            let offset = e.valid_up_to();
            sax.error_at(
                offset,
                SaxErrorKind::InvalidEncoding,
                format!(
                    "Input is not proper UTF-8, indicate encoding ! Bytes: 0x{:02X}",
                    input[offset]
                ),
            );
        }
        sax
    }

    /// Line index of the underlying buffer
    pub fn line_index(&self) -> &LineIndex {
        &self.lines
    }

    /// Number of currently open elements
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    fn fill(&mut self) {
        let before = self.reader.buffer_position();
        let event = self.reader.read_event();
        if !matches!(event, Ok(Event::Text(_)) | Ok(Event::Eof) | Err(_)) {
            self.consumed = self.reader.buffer_position();
        }

        match event {
            Ok(Event::Start(_)) => {
                let after = self.reader.buffer_position();
                self.on_tag(before, after, TagShape::Start);
            }
            Ok(Event::Empty(_)) => {
                let after = self.reader.buffer_position();
                self.on_tag(before, after, TagShape::Empty);
            }
            Ok(Event::End(_)) => {
                let after = self.reader.buffer_position();
                self.on_tag(before, after, TagShape::End);
            }
            Ok(Event::Text(e)) => {
                let raw_len = e.len();
                let text = match e.unescape() {
                    Ok(text) => text.into_owned(),
                    Err(_) => String::from_utf8_lossy(&e).into_owned(),
                };
                if raw_len > 0 {
                    let start = self.text_start(before);
                    self.consumed = start + raw_len;
                    let range = self.lines.range(start, start + raw_len - 1);
                    self.pending.push_back(ParseEvent::Characters {
                        text,
                        range,
                        depth: self.open.len(),
                    });
                }
            }
            Ok(Event::CData(e)) => {
                let after = self.reader.buffer_position();
                let range = self.markup_range(before, after);
                self.pending.push_back(ParseEvent::CData {
                    text: String::from_utf8_lossy(&e).into_owned(),
                    range,
                    depth: self.open.len(),
                });
            }
            Ok(Event::Comment(e)) => {
                let after = self.reader.buffer_position();
                let range = self.markup_range(before, after);
                self.pending.push_back(ParseEvent::Comment {
                    text: String::from_utf8_lossy(&e).into_owned(),
                    range,
                    depth: self.open.len(),
                });
            }
            Ok(Event::PI(e)) => {
                let after = self.reader.buffer_position();
                let range = self.markup_range(before, after);
                let content = String::from_utf8_lossy(&e).into_owned();
                let (target, data) = match content.split_once(char::is_whitespace) {
                    Some((target, data)) => (target.to_string(), data.trim().to_string()),
                    None => (content.clone(), String::new()),
                };
                self.pending.push_back(ParseEvent::ProcessingInstruction {
                    target,
                    data,
                    range,
                    depth: self.open.len(),
                });
            }
            Ok(Event::DocType(e)) => {
                let after = self.reader.buffer_position();
                let range = self.markup_range(before, after);
                let content = String::from_utf8_lossy(&e).into_owned();
                let (name, external_id, system_id) = parse_doctype(&content);
                self.pending.push_back(ParseEvent::InternalSubset {
                    name,
                    external_id,
                    system_id,
                    range,
                });
            }
            Ok(Event::Decl(_)) => {}
            Ok(Event::Eof) | Err(quick_xml::Error::UnexpectedEof(_)) => {
                let rest = &self.input[self.consumed.min(self.input.len())..];
                if let Some(pos) = rest.iter().position(|b| *b == b'<') {
                    self.on_truncated_tag(self.consumed + pos);
                }
                self.finish();
            }
            Err(e) => {
                let (line, col) = self.lines.position(before);
                tracing::debug!(line, col, error = %e, "giving up on malformed markup");
                self.pending.push_back(ParseEvent::Error(SaxError {
                    kind: SaxErrorKind::Malformed,
                    message: e.to_string(),
                    line,
                    col,
                }));
                self.finish();
            }
        }
    }

    // Depending on the reader state the position before a markup event is
    // either on its `<` or just past it.
    fn tag_start(&self, before: usize) -> usize {
        if before < self.input.len() && self.input[before] == b'<' {
            before
        } else if before > 0 && self.input.get(before - 1) == Some(&b'<') {
            before - 1
        } else {
            before
        }
    }

    fn text_start(&self, before: usize) -> usize {
        if before > 0 && self.input.get(before - 1) == Some(&b'>') {
            before
        } else if before < self.input.len() && self.input[before] == b'<' {
            before + 1
        } else {
            before
        }
    }

    fn markup_range(&self, before: usize, after: usize) -> NodeRange {
        let start = self.tag_start(before);
        self.lines.range(start, after.saturating_sub(1))
    }

    fn on_tag(&mut self, before: usize, after: usize, shape: TagShape) {
        let start = self.tag_start(before);
        let end = after.saturating_sub(1);
        let mut body_end = end;
        if shape == TagShape::Empty && body_end > start + 1 && self.input[body_end - 1] == b'/' {
            body_end -= 1;
        }

        let segments = split_segments(&self.input[start + 1..body_end]);
        let last = segments.len().saturating_sub(1);
        for (i, (offset, len)) in segments.into_iter().enumerate() {
            let seg_start = start + offset;
            let seg = &self.input[seg_start + 1..seg_start + 1 + len];
            if i == last {
                self.emit_tag(seg_start, end, seg, Some(shape));
            } else {
                let seg_end = trimmed_end(self.input, seg_start, seg_start + len);
                self.emit_tag(seg_start, seg_end, seg, None);
            }
        }
    }

    fn on_truncated_tag(&mut self, start: usize) {
        if matches!(self.input.get(start + 1), Some(b'!') | Some(b'?')) {
            self.error_at(
                start,
                SaxErrorKind::Malformed,
                "Unterminated markup declaration".to_string(),
            );
            return;
        }

        let segments = split_segments(&self.input[start + 1..]);
        for (offset, len) in segments {
            let seg_start = start + offset;
            let seg = &self.input[seg_start + 1..seg_start + 1 + len];
            let seg_end = trimmed_end(self.input, seg_start, seg_start + len);
            self.emit_tag(seg_start, seg_end, seg, None);
        }
    }

    // `shape` is None for a tag that lacks its `>`.
    fn emit_tag(&mut self, start: usize, end: usize, body: &[u8], shape: Option<TagShape>) {
        let range = self.lines.range(start, end);
        let body = String::from_utf8_lossy(body).into_owned();

        if let Some(rest) = body.strip_prefix('/') {
            let name = rest.trim().to_string();
            if shape.is_none() {
                self.error_at(
                    end + 1,
                    SaxErrorKind::GtRequired,
                    format!("expected '>' after end tag '{}'", name),
                );
            }
            self.close(name, range);
            return;
        }

        let name_len = names::name_len(&body).unwrap_or(0);
        let name = body[..name_len].to_string();
        let attributes = parse_attributes(&body, name_len);
        let self_closing = shape == Some(TagShape::Empty);

        if name.is_empty() {
            self.error_at(
                start + 1,
                SaxErrorKind::NameRequired,
                "StartTag: invalid element name".to_string(),
            );
        }

        let depth = self.open.len() + 1;
        self.pending.push_back(ParseEvent::StartElement {
            name: name.clone(),
            attributes,
            range,
            depth,
            self_closing,
            terminated: shape.is_some(),
        });

        if shape.is_none() && !name.is_empty() {
            self.error_at(
                end + 1,
                SaxErrorKind::GtRequired,
                format!("Couldn't find end of Start Tag {}", name),
            );
        }

        if !self_closing && !name.is_empty() {
            self.open.push((name, range));
        }
    }

    fn close(&mut self, name: String, range: NodeRange) {
        let Some(pos) = self.open.iter().rposition(|(open, _)| *open == name) else {
            self.pending.push_back(ParseEvent::Error(SaxError {
                kind: SaxErrorKind::UnexpectedEndTag,
                message: format!("Unexpected end tag : {}", name),
                line: range.start_line,
                col: range.start_col,
            }));
            return;
        };

        if pos + 1 != self.open.len() {
            if let Some((inner, inner_range)) = self.open.last() {
                let message = format!(
                    "Opening and ending tag mismatch: {} line {} and {}",
                    inner, inner_range.start_line, name
                );
                self.pending.push_back(ParseEvent::Error(SaxError {
                    kind: SaxErrorKind::TagNameMismatch,
                    message,
                    line: range.start_line,
                    col: range.start_col,
                }));
            }
        }

        let depth = pos + 1;
        self.open.truncate(pos);
        self.pending
            .push_back(ParseEvent::EndElement { name, range, depth });
    }

    fn error_at(&mut self, offset: usize, kind: SaxErrorKind, message: String) {
        let (line, col) = self.lines.position(offset);
        self.pending.push_back(ParseEvent::Error(SaxError {
            kind,
            message,
            line,
            col,
        }));
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        let (line, col) = self.lines.position(self.input.len());
        while let Some((name, range)) = self.open.pop() {
            self.pending.push_back(ParseEvent::Error(SaxError {
                kind: SaxErrorKind::PrematureEnd,
                message: format!(
                    "Premature end of data in tag {} line {}",
                    name, range.start_line
                ),
                line,
                col,
            }));
        }
    }
}

impl Iterator for SaxReader<'_> {
    type Item = ParseEvent;

    fn next(&mut self) -> Option<ParseEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if self.finished {
                return None;
            }
            self.fill();
        }
    }
}

// Splits a tag body on `<` found outside quoted values. Offsets are
// relative to the `<` of the first segment: (offset of segment `<`, length
// of the segment body).
fn split_segments(body: &[u8]) -> Vec<(usize, usize)> {
    let mut segments = Vec::new();
    let mut seg_start = 0;
    let mut quote: Option<u8> = None;
    let mut last_significant = 0u8;

    for (i, &b) in body.iter().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => {
                if (b == b'"' || b == b'\'') && last_significant == b'=' {
                    quote = Some(b);
                } else if b == b'<' {
                    segments.push((seg_start, i - seg_start));
                    seg_start = i + 1;
                }
            }
        }
        if !b.is_ascii_whitespace() {
            last_significant = b;
        }
    }
    segments.push((seg_start, body.len() - seg_start));
    segments
}

// Last non-blank byte of `start..end` (the range always keeps its `<`).
fn trimmed_end(input: &[u8], start: usize, end: usize) -> usize {
    let mut last = end.min(input.len().saturating_sub(1));
    while last > start && input[last].is_ascii_whitespace() {
        last -= 1;
    }
    last
}

fn parse_attributes(body: &str, name_len: usize) -> Vec<RawAttribute> {
    let start = BytesStart::from_content(body, name_len);
    let mut attributes = Vec::new();

    for attr in start.html_attributes().with_checks(false) {
        let Ok(attr) = attr else {
            break;
        };
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = match attr.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        };
        attributes.push((key, Some(value)));
    }

    attributes
}

fn parse_doctype(content: &str) -> (String, Option<String>, Option<String>) {
    let content = content.trim();
    let declaration = match content.find('[') {
        Some(pos) => &content[..pos],
        None => content,
    };

    let name_end = declaration
        .find(char::is_whitespace)
        .unwrap_or(declaration.len());
    let name = declaration[..name_end].to_string();
    let rest = declaration[name_end..].trim_start();

    let mut literals = Vec::new();
    let mut remaining = rest;
    let keyword = if let Some(r) = remaining.strip_prefix("PUBLIC") {
        remaining = r;
        "PUBLIC"
    } else if let Some(r) = remaining.strip_prefix("SYSTEM") {
        remaining = r;
        "SYSTEM"
    } else {
        return (name, None, None);
    };

    while literals.len() < 2 {
        remaining = remaining.trim_start();
        let Some(quote) = remaining.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            break;
        };
        let body = &remaining[1..];
        let Some(end) = body.find(quote) else {
            break;
        };
        literals.push(body[..end].to_string());
        remaining = &body[end + 1..];
    }

    match keyword {
        "PUBLIC" => {
            let mut it = literals.into_iter();
            (name, it.next(), it.next())
        }
        _ => (name, None, literals.into_iter().next()),
    }
}

/// Kind of the node a [`TokenCursor`] is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Start tag
    Element,
    /// End tag
    EndElement,
    /// Character data
    Text,
    /// CDATA section
    CData,
    /// Comment
    Comment,
    /// Processing instruction
    ProcessingInstruction,
    /// Doctype declaration
    DocumentType,
}

/// DOM-style walk over a [`SaxReader`]
///
/// Errors met while advancing are kept in [`TokenCursor::errors`] instead of
/// being returned as nodes.
pub struct TokenCursor<'a> {
    events: SaxReader<'a>,
    current: Option<ParseEvent>,
    errors: Vec<SaxError>,
}

impl<'a> TokenCursor<'a> {
    /// Create a cursor positioned before the first node
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            events: SaxReader::new(input),
            current: None,
            errors: Vec::new(),
        }
    }

    /// Move to the next node in document order
    pub fn advance(&mut self) -> bool {
        loop {
            match self.events.next() {
                Some(ParseEvent::Error(err)) => self.errors.push(err),
                other => {
                    self.current = other;
                    return self.current.is_some();
                }
            }
        }
    }

    /// Move to the first child of the current element
    ///
    /// Returns false, leaving the cursor on the element's end tag, when it
    /// has no children.
    pub fn advance_into_children(&mut self) -> bool {
        let depth = match &self.current {
            Some(ParseEvent::StartElement {
                depth,
                self_closing: false,
                ..
            }) => *depth,
            _ => return false,
        };

        if !self.advance() {
            return false;
        }
        !matches!(&self.current, Some(ParseEvent::EndElement { depth: d, .. }) if *d <= depth)
    }

    /// Move past the current node and its subtree to its next sibling
    ///
    /// Returns false on the parent's end tag or at the end of input.
    pub fn advance_to_next_sibling(&mut self) -> bool {
        let level = self.level();

        if let Some(ParseEvent::StartElement {
            self_closing: false,
            ..
        }) = &self.current
        {
            loop {
                if !self.advance() {
                    return false;
                }
                if let Some(ParseEvent::EndElement { depth, .. }) = &self.current {
                    if *depth < level {
                        return false;
                    }
                    if *depth == level {
                        break;
                    }
                }
            }
        }

        loop {
            if !self.advance() {
                return false;
            }
            if let Some(ParseEvent::EndElement { depth, .. }) = &self.current {
                if *depth < level {
                    return false;
                }
            }
            if self.level() == level {
                return true;
            }
        }
    }

    // Start and end tags sit at their own depth, other nodes one below the
    // enclosing element.
    fn level(&self) -> usize {
        match &self.current {
            Some(ParseEvent::StartElement { depth, .. })
            | Some(ParseEvent::EndElement { depth, .. }) => *depth,
            Some(event) => event.depth() + 1,
            None => 0,
        }
    }

    /// Current event
    pub fn current(&self) -> Option<&ParseEvent> {
        self.current.as_ref()
    }

    /// Kind of the current node
    pub fn node_kind(&self) -> Option<NodeKind> {
        Some(match self.current.as_ref()? {
            ParseEvent::StartElement { .. } => NodeKind::Element,
            ParseEvent::EndElement { .. } => NodeKind::EndElement,
            ParseEvent::Characters { .. } => NodeKind::Text,
            ParseEvent::CData { .. } => NodeKind::CData,
            ParseEvent::Comment { .. } => NodeKind::Comment,
            ParseEvent::ProcessingInstruction { .. } => NodeKind::ProcessingInstruction,
            ParseEvent::InternalSubset { .. } => NodeKind::DocumentType,
            ParseEvent::Error(_) => return None,
        })
    }

    /// Qualified name of the current element
    pub fn name(&self) -> Option<&str> {
        match self.current.as_ref()? {
            ParseEvent::StartElement { name, .. } | ParseEvent::EndElement { name, .. } => {
                Some(name)
            }
            _ => None,
        }
    }

    /// Local name of the current element
    pub fn local_name(&self) -> Option<&str> {
        self.name().map(names::local_name)
    }

    /// Value of an attribute of the current start tag, last one winning
    pub fn attribute(&self, name: &str) -> Option<&str> {
        match self.current.as_ref()? {
            ParseEvent::StartElement { attributes, .. } => attributes
                .iter()
                .rev()
                .find(|(key, _)| key == name)
                .and_then(|(_, value)| value.as_deref()),
            _ => None,
        }
    }

    /// Attributes of the current start tag
    pub fn attributes(&self) -> &[RawAttribute] {
        match &self.current {
            Some(ParseEvent::StartElement { attributes, .. }) => attributes,
            _ => &[],
        }
    }

    /// Whether the current start tag is self-closing
    pub fn is_self_closing(&self) -> bool {
        matches!(
            &self.current,
            Some(ParseEvent::StartElement {
                self_closing: true,
                ..
            })
        )
    }

    /// Consume character data up to the next tag
    ///
    /// The cursor ends on the first node that is not text. Returns `None`
    /// when the cursor is not on text.
    pub fn read_text(&mut self) -> Option<String> {
        let mut text = String::new();
        let mut found = false;

        while let Some(ParseEvent::Characters { text: t, .. } | ParseEvent::CData { text: t, .. }) =
            &self.current
        {
            text.push_str(t);
            found = true;
            if !self.advance() {
                break;
            }
        }

        found.then_some(text)
    }

    /// Range of the current node
    pub fn current_range(&self) -> Option<NodeRange> {
        self.current.as_ref().and_then(ParseEvent::range)
    }

    /// Depth of the current node
    pub fn current_depth(&self) -> usize {
        self.current.as_ref().map(ParseEvent::depth).unwrap_or(0)
    }

    /// Line index of the buffer
    pub fn line_index(&self) -> &LineIndex {
        self.events.line_index()
    }

    /// Errors met so far
    pub fn errors(&self) -> &[SaxError] {
        &self.errors
    }
}
