//! XML name scanning and utilities
//!
//! This module provides the small forward scanners used to classify a
//! cursor inside a partially typed tag, plus QName helpers and the
//! pseudo-attribute lookup used on processing instructions.

use once_cell::sync::Lazy;
use regex::Regex;

static NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[:A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}\u{370}-\u{37D}\u{37F}-\u{1FFF}\u{200C}-\u{200D}\u{2070}-\u{218F}\u{2C00}-\u{2FEF}\u{3001}-\u{D7FF}\u{F900}-\u{FDCF}\u{FDF0}-\u{FFFD}][:A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}\u{370}-\u{37D}\u{37F}-\u{1FFF}\u{200C}-\u{200D}\u{2070}-\u{218F}\u{2C00}-\u{2FEF}\u{3001}-\u{D7FF}\u{F900}-\u{FDCF}\u{FDF0}-\u{FFFD}\-\.0-9\u{B7}\u{300}-\u{36F}\u{203F}-\u{2040}]*",
    )
    .unwrap()
});

static PSEUDO_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|\s)href\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// Length in bytes of the XML name at the start of `s`, if any
pub fn name_len(s: &str) -> Option<usize> {
    NAME.find(s).map(|m| m.end())
}

/// Check if a string is a valid XML Name
pub fn is_valid_name(name: &str) -> bool {
    name_len(name) == Some(name.len())
}

/// Skip an element name at the start of `s`
///
/// Returns the remaining input, or `None` when `s` does not start with a name.
pub fn skip_element_name(s: &str) -> Option<&str> {
    name_len(s).map(|len| &s[len..])
}

/// Skip an attribute name at the start of `s`
pub fn skip_attribute_name(s: &str) -> Option<&str> {
    skip_element_name(s)
}

/// Skip an attribute value up to and including its closing `quote`
///
/// Returns `Ok(rest)` after the quote, or `Err(value)` with the partial
/// value when the closing quote is missing.
pub fn skip_attribute_value(s: &str, quote: char) -> std::result::Result<&str, &str> {
    match s.find(quote) {
        Some(end) => Ok(&s[end + quote.len_utf8()..]),
        None => Err(s),
    }
}

/// Skip leading whitespace, returning the rest and whether any was skipped
pub fn skip_whitespace(s: &str) -> (&str, bool) {
    let rest = s.trim_start();
    (rest, rest.len() != s.len())
}

/// Skip everything up to the next whitespace
pub fn skip_to_whitespace(s: &str) -> &str {
    match s.find(char::is_whitespace) {
        Some(pos) => &s[pos..],
        None => "",
    }
}

/// Split a QName into prefix and local name
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    if let Some((prefix, local)) = qname.split_once(':') {
        (Some(prefix), local)
    } else {
        (None, qname)
    }
}

/// Local part of a QName
pub fn local_name(qname: &str) -> &str {
    split_qname(qname).1
}

/// Value of the `href` pseudo-attribute of a processing instruction
pub fn pseudo_href(data: &str) -> Option<String> {
    let caps = PSEUDO_HREF.captures(data)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().trim().to_string())
        .filter(|href| !href.is_empty())
}

/// Check whether a string only holds XML whitespace
pub fn is_blank(s: &str) -> bool {
    s.chars().all(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
}
