//! Interactive-element resolution

use crate::dom::{Document, NodeId};
use crate::error::Result;
use crate::selector::SelectorList;

/// Elements that carry interaction semantics of their own. The same set
/// gets per-element listeners bound.
pub const INTERACTIVE: &str = "button, a[href], input, select, textarea, [role='button'], \
     [role='menuitem'], li, .ui-selectonemenu, .ui-selectonemenu-trigger, .ui-autocomplete, \
     .ui-dropdown, td, tr";

/// Finds the nearest interactive ancestor of a raw event target
#[derive(Debug, Clone)]
pub struct InteractiveResolver {
    interactive: SelectorList,
}

impl InteractiveResolver {
    pub fn new() -> Result<Self> {
        Ok(Self {
            interactive: SelectorList::parse(INTERACTIVE)?,
        })
    }

    /// Nearest inclusive ancestor matching the interactive set; the target
    /// itself when nothing matches. Text nodes start from their parent.
    pub fn resolve(&self, doc: &Document, target: NodeId) -> NodeId {
        let start = if doc.text_data(target).is_some() {
            doc.parent_element(target).unwrap_or(target)
        } else {
            target
        };
        self.interactive.closest(doc, start).unwrap_or(start)
    }

    pub fn is_interactive(&self, doc: &Document, el: NodeId) -> bool {
        self.interactive.matches(doc, el)
    }

    /// Interactive elements below `scope`, in document order
    pub fn interactive_in(&self, doc: &Document, scope: NodeId) -> Vec<NodeId> {
        self.interactive.query_all(doc, scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_to_nearest_interactive_ancestor() {
        let mut doc = Document::with_body();
        let body = doc.body().unwrap();
        let button = doc.create_element("button");
        doc.append_child(body, button).unwrap();
        let icon = doc.create_element("span");
        doc.append_child(button, icon).unwrap();
        let text = doc.create_text("Save");
        doc.append_child(icon, text).unwrap();

        let resolver = InteractiveResolver::new().unwrap();
        assert_eq!(resolver.resolve(&doc, icon), button);
        assert_eq!(resolver.resolve(&doc, text), button);
    }

    #[test]
    fn test_anchor_needs_href() {
        let mut doc = Document::with_body();
        let body = doc.body().unwrap();
        let anchor = doc.create_element("a");
        doc.append_child(body, anchor).unwrap();

        let resolver = InteractiveResolver::new().unwrap();
        assert_eq!(resolver.resolve(&doc, anchor), anchor);
        assert!(!resolver.is_interactive(&doc, anchor));

        doc.set_attribute(anchor, "href", "/home").unwrap();
        assert!(resolver.is_interactive(&doc, anchor));
    }

    #[test]
    fn test_falls_back_to_target() {
        let mut doc = Document::with_body();
        let body = doc.body().unwrap();
        let div = doc.create_element("div");
        doc.append_child(body, div).unwrap();

        let resolver = InteractiveResolver::new().unwrap();
        assert_eq!(resolver.resolve(&doc, div), div);

        let detached = doc.create_element("p");
        assert_eq!(resolver.resolve(&doc, detached), detached);
    }

    #[test]
    fn test_custom_widget_parts() {
        let mut doc = Document::with_body();
        let body = doc.body().unwrap();
        let row = doc.create_element("tr");
        doc.append_child(body, row).unwrap();
        let cell = doc.create_element("td");
        doc.append_child(row, cell).unwrap();
        let inner = doc.create_element("em");
        doc.append_child(cell, inner).unwrap();

        let resolver = InteractiveResolver::new().unwrap();
        assert_eq!(resolver.resolve(&doc, inner), cell);
    }
}
