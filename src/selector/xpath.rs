//! Absolute XPath fallback selectors
//!
//! The XPath branch is the brute-force fallback: any id is accepted (even a
//! generated one) and otherwise the path runs all the way to the root.

use super::classify::xpath_literal;
use super::same_tag_position;
use crate::dom::{Document, NodeId};
use crate::error::{RecorderError, Result};

/// Absolute XPath for an element; empty for non-element nodes
pub fn absolute_xpath(doc: &Document, node: NodeId) -> String {
    if !doc.is_element(node) {
        return String::new();
    }
    if let Some(id) = doc.id_attr(node) {
        return format!("//*[@id={}]", xpath_literal(id));
    }
    let mut parts: Vec<String> = doc
        .inclusive_ancestors(node)
        .take_while(|&n| doc.is_element(n))
        .map(|n| {
            let (index, _) = same_tag_position(doc, n);
            format!("{}[{}]", doc.tag_name(n).unwrap_or("*"), index)
        })
        .collect();
    parts.reverse();
    format!("/{}", parts.join("/"))
}

/// Evaluate an XPath of the shapes [`absolute_xpath`] produces
///
/// Returns `Ok(None)` when the expression is well-formed but nothing matches.
pub fn resolve_xpath(doc: &Document, expression: &str) -> Result<Option<NodeId>> {
    let expr = expression.trim();
    let invalid = |reason: &str| RecorderError::InvalidXPath {
        expression: expression.to_string(),
        reason: reason.to_string(),
    };

    if let Some(rest) = expr.strip_prefix("//*[@id=") {
        let literal = rest
            .strip_suffix(']')
            .ok_or_else(|| invalid("missing closing bracket"))?;
        let id = parse_literal(literal.trim()).ok_or_else(|| invalid("malformed string literal"))?;
        return Ok(doc
            .descendants(doc.root())
            .into_iter()
            .find(|&n| doc.attribute(n, "id") == Some(id.as_str())));
    }

    let Some(path) = expr.strip_prefix('/') else {
        return Err(invalid("only absolute paths and id lookups are supported"));
    };
    if path.is_empty() || path.starts_with('/') {
        return Err(invalid("unsupported path shape"));
    }

    let mut current = doc.root();
    for segment in path.split('/') {
        let (tag, index) = parse_segment(segment).ok_or_else(|| invalid("malformed step"))?;
        let next = doc
            .element_children(current)
            .filter(|&c| doc.tag_name(c) == Some(tag.as_str()))
            .nth(index - 1);
        match next {
            Some(n) => current = n,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

fn parse_segment(segment: &str) -> Option<(String, usize)> {
    let segment = segment.trim();
    let (tag, index) = match segment.find('[') {
        Some(open) => {
            let index = segment[open + 1..]
                .strip_suffix(']')?
                .trim()
                .parse::<usize>()
                .ok()?;
            (&segment[..open], index)
        }
        None => (segment, 1),
    };
    if tag.is_empty()
        || index == 0
        || tag.chars().any(|c| matches!(c, '[' | ']' | '/') || c.is_whitespace())
    {
        return None;
    }
    Some((tag.to_ascii_lowercase(), index))
}

fn parse_literal(literal: &str) -> Option<String> {
    if let Some(args) = literal
        .strip_prefix("concat(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let mut out = String::new();
        let mut rest = args.trim();
        while !rest.is_empty() {
            let quote = rest.chars().next()?;
            if quote != '\'' && quote != '"' {
                return None;
            }
            let end = rest[1..].find(quote)? + 1;
            out.push_str(&rest[1..end]);
            rest = rest[end + 1..].trim_start();
            if let Some(after_comma) = rest.strip_prefix(',') {
                rest = after_comma.trim_start();
            } else if !rest.is_empty() {
                return None;
            }
        }
        return Some(out);
    }
    let quote = literal.chars().next()?;
    if (quote == '\'' || quote == '"') && literal.len() >= 2 && literal.ends_with(quote) {
        let inner = &literal[1..literal.len() - 1];
        if !inner.contains(quote) {
            return Some(inner.to_string());
        }
    }
    None
}
