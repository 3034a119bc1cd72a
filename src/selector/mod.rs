//! Selector synthesis and lookup

pub mod classify;
pub mod css;
pub mod query;
pub mod xpath;

pub use classify::{
    escape_ident, is_generated_class, is_generated_id, quote_attr, stable_classes, stable_id,
};
pub use css::{SelectorOptions, SelectorSynthesizer, SynthesizedSelector};
pub use query::SelectorList;
pub use xpath::{absolute_xpath, resolve_xpath};

use crate::dom::{Document, NodeId};
use crate::error::Result;

/// 1-based position among same-tag element siblings, and their count
pub(crate) fn same_tag_position(doc: &Document, node: NodeId) -> (usize, usize) {
    let (Some(parent), Some(tag)) = (doc.parent(node), doc.tag_name(node)) else {
        return (1, 1);
    };
    let mut index = 1;
    let mut total = 0;
    for sibling in doc.element_children(parent) {
        if doc.tag_name(sibling) != Some(tag) {
            continue;
        }
        total += 1;
        if sibling == node {
            index = total;
        }
    }
    (index, total.max(1))
}

/// Look up an element by CSS selector or XPath
///
/// Strings starting with `/` or `(//` are treated as XPath.
pub fn find_element(doc: &Document, selector: &str) -> Result<Option<NodeId>> {
    let trimmed = selector.trim();
    if trimmed.starts_with('/') || trimmed.starts_with("(//") {
        resolve_xpath(doc, trimmed)
    } else {
        Ok(SelectorList::parse(trimmed)?.query_first(doc, doc.root()))
    }
}
