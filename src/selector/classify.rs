//! Identifier classification and escaping
//!
//! Framework-assigned ids and classes change between reloads, so they are
//! recognised on every lookup and kept out of synthesized selectors. Nothing
//! here is cached: frameworks reuse nodes and rewrite their attributes.

use crate::dom::{Document, NodeId};
use std::fmt::Write;

/// An 8+ character purely alphanumeric token, presumed auto-generated
pub fn is_generated_token(value: &str) -> bool {
    value.len() >= 8 && value.chars().all(|c| c.is_ascii_alphanumeric())
}

/// `ns-<kebab>` namespacing utility class
pub fn is_namespace_class(value: &str) -> bool {
    match value.strip_prefix("ns-") {
        Some(rest) => {
            !rest.is_empty()
                && rest
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        }
        None => false,
    }
}

pub fn is_generated_id(id: &str) -> bool {
    is_generated_token(id)
}

pub fn is_generated_class(class: &str) -> bool {
    is_generated_token(class) || is_namespace_class(class)
}

/// The element's id when present and not generated
pub fn stable_id(doc: &Document, node: NodeId) -> Option<&str> {
    doc.id_attr(node).filter(|id| !is_generated_id(id))
}

/// Non-generated classes in DOM order
pub fn stable_classes(doc: &Document, node: NodeId) -> Vec<&str> {
    doc.class_list(node)
        .into_iter()
        .filter(|c| !is_generated_class(c))
        .collect()
}

/// Escape a value for use as a CSS identifier (`#id`, `.class`)
///
/// Follows the `CSS.escape()` algorithm: control characters and leading
/// digits become hex escapes, other ASCII punctuation gets a backslash.
pub fn escape_ident(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        let code = c as u32;
        if c == '\0' {
            out.push('\u{FFFD}');
        } else if (0x01..=0x1f).contains(&code)
            || code == 0x7f
            || (i == 0 && c.is_ascii_digit())
            || (i == 1 && c.is_ascii_digit() && chars[0] == '-')
        {
            let _ = write!(out, "\\{:x} ", code);
        } else if i == 0 && c == '-' && chars.len() == 1 {
            out.push_str("\\-");
        } else if code >= 0x80 || c == '-' || c == '_' || c.is_ascii_alphanumeric() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

/// Single-quoted CSS attribute value with `\` and `'` escaped; newlines
/// and other control characters become hex escapes
pub fn quote_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' | '\'' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\{:x} ", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// XPath 1.0 string literal; XPath has no escapes, so mixed quotes need `concat()`
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }
    let parts: Vec<String> = value
        .split('\'')
        .map(|part| format!("'{}'", part))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}
