//! Stable CSS selector synthesis
//!
//! Walks from the element toward the root, one compound "piece" per level,
//! and stops early at an id anchor or a widget root. Framework-generated ids
//! and classes are never used.

use super::classify::{escape_ident, quote_attr, stable_classes, stable_id};
use super::query::SelectorList;
use super::same_tag_position;
use super::xpath::absolute_xpath;
use crate::dom::{Document, NodeId};
use crate::error::Result;
use crate::widgets::WIDGET_ROOTS;
use serde::Serialize;

/// Both selectors for one element
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesizedSelector {
    /// Short, human-legible CSS selector
    pub css: String,

    /// Absolute structural fallback (empty for non-element nodes)
    pub xpath: String,
}

/// Options for CSS synthesis
#[derive(Debug, Clone)]
pub struct SelectorOptions {
    /// Maximum number of pieces in an un-anchored chain
    pub max_depth: usize,

    /// Anchor the chain on the nearest ancestor with a stable id
    pub anchor_on_ancestor_id: bool,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self {
            max_depth: 4,
            anchor_on_ancestor_id: true,
        }
    }
}

/// Computes CSS and XPath selectors for elements
#[derive(Debug, Clone)]
pub struct SelectorSynthesizer {
    options: SelectorOptions,
    widget_roots: SelectorList,
}

impl SelectorSynthesizer {
    pub fn new(options: SelectorOptions) -> Result<Self> {
        Ok(Self {
            options,
            widget_roots: SelectorList::parse(WIDGET_ROOTS)?,
        })
    }

    pub fn options(&self) -> &SelectorOptions {
        &self.options
    }

    /// CSS and XPath for a node; text nodes resolve to their parent element
    pub fn synthesize(&self, doc: &Document, node: NodeId) -> SynthesizedSelector {
        match subject(doc, node) {
            Some(element) => SynthesizedSelector {
                css: self.css_with_depth(doc, element, self.options.max_depth),
                xpath: absolute_xpath(doc, element),
            },
            None => SynthesizedSelector {
                css: doc.node_name(node),
                xpath: String::new(),
            },
        }
    }

    pub fn css(&self, doc: &Document, node: NodeId) -> String {
        self.css_with_depth(doc, node, self.options.max_depth)
    }

    /// CSS selector with an explicit depth bound
    pub fn css_with_depth(&self, doc: &Document, node: NodeId, max_depth: usize) -> String {
        let Some(element) = subject(doc, node) else {
            return doc.node_name(node);
        };
        if let Some(id) = stable_id(doc, element) {
            return format!("#{}", escape_ident(id));
        }

        let mut chain: Vec<String> = Vec::new();
        let mut current = Some(element);
        while let Some(el) = current {
            if chain.len() >= max_depth {
                break;
            }
            chain.push(self.piece(doc, el));

            let parent = doc.parent_element(el);
            if self.options.anchor_on_ancestor_id {
                if let Some(anchor) = parent.and_then(|p| stable_id(doc, p)) {
                    chain.reverse();
                    return format!("#{} > {}", escape_ident(anchor), chain.join(" > "));
                }
            }
            if self.widget_roots.matches(doc, el) {
                break;
            }
            current = parent;
        }

        if chain.is_empty() {
            return doc.node_name(element);
        }
        chain.reverse();
        chain.join(" > ")
    }

    /// One compound piece: tag, up to two stable classes, attribute
    /// qualifiers and an `:nth-of-type` disambiguator
    pub fn piece(&self, doc: &Document, el: NodeId) -> String {
        let tag = doc.tag_name(el).unwrap_or("*");
        let mut piece = tag.to_string();

        for class in stable_classes(doc, el).into_iter().take(2) {
            piece.push('.');
            piece.push_str(&escape_ident(class));
        }

        let mut qualifiers = vec!["role"];
        if matches!(tag, "input" | "select" | "textarea") {
            qualifiers.push("name");
        }
        qualifiers.extend(["data-label", "aria-label"]);
        for name in qualifiers {
            if let Some(value) = doc.attribute(el, name).filter(|v| !v.is_empty()) {
                piece.push_str(&format!("[{}={}]", name, quote_attr(value)));
            }
        }

        let (index, total) = same_tag_position(doc, el);
        if total > 1 {
            piece.push_str(&format!(":nth-of-type({})", index));
        }
        piece
    }
}

/// The element a selector describes: the node itself or a text node's parent
fn subject(doc: &Document, node: NodeId) -> Option<NodeId> {
    if doc.is_element(node) {
        Some(node)
    } else if doc.text_data(node).is_some() {
        doc.parent_element(node)
    } else {
        None
    }
}
