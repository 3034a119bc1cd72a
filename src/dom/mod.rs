//! Host DOM model
//!
//! An arena-backed document the recorder reads from. A host integration keeps
//! it in step with the page (or builds it from a snapshot) and delivers native
//! events against its node handles.
//!
//! Nodes are never freed: removed subtrees stay readable in a detached state,
//! which lets `removed` mutation events still describe what went away.

mod mutation;

pub use mutation::{MutationRecord, ObserveOptions, ObserverId};

use crate::error::{RecorderError, Result};
use mutation::Observer;
use std::fmt;

/// Handle to a node in a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// An attribute in source order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Element payload
#[derive(Debug, Clone)]
pub struct ElementData {
    /// Lowercase tag name
    pub tag: String,

    /// Attributes in insertion order
    pub attributes: Vec<Attribute>,

    /// Current form value (the `value` property, not the attribute)
    pub value: String,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// Arena DOM with mutation observation
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    observers: Vec<Observer>,
    next_observer: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document (just the document node)
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
            observers: Vec::new(),
            next_observer: 1,
        }
    }

    /// Create a document with `<html><head></head><body></body></html>`
    pub fn with_body() -> Self {
        let mut doc = Self::new();
        let html = doc.create_element("html");
        let head = doc.create_element("head");
        let body = doc.create_element("body");
        // Fresh nodes under a fresh root cannot violate the hierarchy rules.
        let _ = doc.append_child(doc.root(), html);
        let _ = doc.append_child(html, head);
        let _ = doc.append_child(html, body);
        doc
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The `<html>` element, if any
    pub fn document_element(&self) -> Option<NodeId> {
        self.element_children(self.root()).next()
    }

    /// The `<body>` element, if any
    pub fn body(&self) -> Option<NodeId> {
        let html = self.document_element()?;
        self.element_children(html)
            .find(|&child| self.tag_name(child) == Some("body"))
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn checked(&self, id: NodeId) -> Result<&Node> {
        self.node(id).ok_or(RecorderError::NodeNotFound(id))
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node(id).map(|n| &n.kind)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.kind(id) {
            Some(NodeKind::Element(el)) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData> {
        match self.nodes.get_mut(id.0).map(|n| &mut n.kind) {
            Some(NodeKind::Element(el)) => Ok(el),
            _ => Err(RecorderError::NodeNotFound(id)),
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    /// `#document`, `#text` or the tag name
    pub fn node_name(&self, id: NodeId) -> String {
        match self.kind(id) {
            Some(NodeKind::Document) => "#document".to_string(),
            Some(NodeKind::Text(_)) => "#text".to_string(),
            Some(NodeKind::Element(el)) => el.tag.clone(),
            None => String::new(),
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.attribute(id, name).is_some()
    }

    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        self.element(id)
            .map(|el| el.attributes.as_slice())
            .unwrap_or(&[])
    }

    /// The `id` attribute when present and non-empty
    pub fn id_attr(&self, id: NodeId) -> Option<&str> {
        self.attribute(id, "id").filter(|v| !v.is_empty())
    }

    /// Class tokens in DOM order, duplicates removed
    pub fn class_list(&self, id: NodeId) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        if let Some(classes) = self.attribute(id, "class") {
            for token in classes.split_whitespace() {
                if !out.contains(&token) {
                    out.push(token);
                }
            }
        }
        out
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attribute(id, "class")
            .map(|c| c.split_whitespace().any(|t| t == class))
            .unwrap_or(false)
    }

    /// Current form value of an element
    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.value.as_str())
    }

    /// Set the form value. Like the browser property, this is not a mutation.
    pub fn set_value(&mut self, id: NodeId, value: &str) -> Result<()> {
        self.element_mut(id)?.value = value.to_string();
        Ok(())
    }

    pub fn text_data(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            Some(NodeKind::Text(data)) => Some(data.as_str()),
            _ => None,
        }
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let Some(node) = self.node(next) else {
                continue;
            };
            match &node.kind {
                NodeKind::Text(data) => out.push_str(data),
                _ => stack.extend(node.children.iter().rev().copied()),
            }
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// Parent when it is an element (the document node is not)
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|&p| self.is_element(p))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |&c| self.is_element(c))
    }

    pub fn previous_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        siblings[..pos]
            .iter()
            .rev()
            .copied()
            .find(|&c| self.is_element(c))
    }

    /// Ancestors from the parent upwards (self excluded)
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.parent(id),
        }
    }

    /// The node itself followed by its ancestors
    pub fn inclusive_ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.node(id).map(|_| id),
        }
    }

    /// All descendants in document order (self excluded)
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.inclusive_ancestors(node).any(|a| a == ancestor)
    }

    /// Whether the node is reachable from the document root
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.is_inclusive_ancestor(self.root(), id)
    }

    // ===== TREE MUTATION =====

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            kind,
        });
        id
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeKind::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            value: String::new(),
        }))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, data: &str) -> NodeId {
        self.push_node(NodeKind::Text(data.to_string()))
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<NodeId> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` under `parent` before `reference` (or at the end)
    ///
    /// A child that already has a parent is moved, producing a removal record
    /// on its old parent first.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<NodeId> {
        if matches!(self.checked(parent)?.kind, NodeKind::Text(_)) {
            return Err(RecorderError::Hierarchy(format!(
                "{} cannot have children",
                parent
            )));
        }
        if matches!(self.checked(child)?.kind, NodeKind::Document) {
            return Err(RecorderError::Hierarchy(
                "the document node cannot be inserted".to_string(),
            ));
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(RecorderError::Hierarchy(format!(
                "{} is an ancestor of {}",
                child, parent
            )));
        }
        if let Some(reference) = reference {
            if self.parent(reference) != Some(parent) {
                return Err(RecorderError::Hierarchy(format!(
                    "{} is not a child of {}",
                    reference, parent
                )));
            }
        }

        if let Some(old_parent) = self.parent(child) {
            self.remove_child(old_parent, child)?;
        }

        let children = &mut self.nodes[parent.0].children;
        let pos = reference
            .and_then(|r| children.iter().position(|&c| c == r))
            .unwrap_or(children.len());
        children.insert(pos, child);
        self.nodes[child.0].parent = Some(parent);

        self.queue_record(MutationRecord::ChildList {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
        Ok(child)
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<NodeId> {
        self.checked(parent)?;
        if self.checked(child)?.parent != Some(parent) {
            return Err(RecorderError::Hierarchy(format!(
                "{} is not a child of {}",
                child, parent
            )));
        }
        self.nodes[parent.0].children.retain(|&c| c != child);
        self.nodes[child.0].parent = None;

        self.queue_record(MutationRecord::ChildList {
            target: parent,
            added: Vec::new(),
            removed: vec![child],
        });
        Ok(child)
    }

    /// Detach a node from its parent; a no-op for detached nodes
    pub fn remove(&mut self, node: NodeId) -> Result<()> {
        if let Some(parent) = self.parent(node) {
            self.remove_child(parent, node)?;
        }
        Ok(())
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<()> {
        let el = self.element_mut(id)?;
        let old_value = match el.attributes.iter_mut().find(|a| a.name == name) {
            Some(attr) => Some(std::mem::replace(&mut attr.value, value.to_string())),
            None => {
                el.attributes.push(Attribute {
                    name: name.to_string(),
                    value: value.to_string(),
                });
                None
            }
        };
        self.queue_record(MutationRecord::Attributes {
            target: id,
            name: name.to_string(),
            old_value,
        });
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<()> {
        let el = self.element_mut(id)?;
        let Some(pos) = el.attributes.iter().position(|a| a.name == name) else {
            return Ok(());
        };
        let removed = el.attributes.remove(pos);
        self.queue_record(MutationRecord::Attributes {
            target: id,
            name: name.to_string(),
            old_value: Some(removed.value),
        });
        Ok(())
    }

    /// Replace the data of a text node
    pub fn set_text_data(&mut self, id: NodeId, data: &str) -> Result<()> {
        let old_value = match self.nodes.get_mut(id.0).map(|n| &mut n.kind) {
            Some(NodeKind::Text(current)) => std::mem::replace(current, data.to_string()),
            _ => return Err(RecorderError::NodeNotFound(id)),
        };
        self.queue_record(MutationRecord::CharacterData {
            target: id,
            old_value: Some(old_value),
        });
        Ok(())
    }

    /// Replace all children of a node with a single text node
    pub fn set_text_content(&mut self, id: NodeId, text: &str) -> Result<()> {
        for child in self.children(id).to_vec() {
            self.remove_child(id, child)?;
        }
        if !text.is_empty() {
            let text_node = self.create_text(text);
            self.append_child(id, text_node)?;
        }
        Ok(())
    }

    // ===== OBSERVATION =====

    /// Register an observer on a connected node
    pub fn observe(&mut self, root: NodeId, options: ObserveOptions) -> Result<ObserverId> {
        if !self.contains_node(root) {
            return Err(RecorderError::ObserverStart(format!("{} does not exist", root)));
        }
        if !self.is_connected(root) {
            return Err(RecorderError::ObserverStart(format!(
                "{} is not connected to the document",
                root
            )));
        }
        if options.is_empty() {
            return Err(RecorderError::ObserverStart(
                "no mutation type selected".to_string(),
            ));
        }
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push(Observer {
            id,
            root,
            options,
            queue: Vec::new(),
        });
        Ok(id)
    }

    /// Stop an observer; returns whether it was registered
    pub fn disconnect(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|o| o.id != id);
        before != self.observers.len()
    }

    pub fn is_observing(&self, id: ObserverId) -> bool {
        self.observers.iter().any(|o| o.id == id)
    }

    /// Drain the records queued for an observer
    pub fn take_records(&mut self, id: ObserverId) -> Vec<MutationRecord> {
        self.observers
            .iter_mut()
            .find(|o| o.id == id)
            .map(|o| std::mem::take(&mut o.queue))
            .unwrap_or_default()
    }

    fn queue_record(&mut self, record: MutationRecord) {
        if self.observers.is_empty() {
            return;
        }
        let target = record.target();
        let interested: Vec<usize> = self
            .observers
            .iter()
            .enumerate()
            .filter(|(_, o)| record.wanted_by(&o.options))
            .filter(|(_, o)| {
                o.root == target || (o.options.subtree && self.is_inclusive_ancestor(o.root, target))
            })
            .map(|(i, _)| i)
            .collect();
        for i in interested {
            let shaped = record.shaped_for(&self.observers[i].options);
            self.observers[i].queue.push(shaped);
        }
    }
}

/// Iterator over a node's ancestor chain
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(doc: &mut Document, parent: NodeId, tag: &str) -> NodeId {
        let el = doc.create_element(tag);
        doc.append_child(parent, el).unwrap()
    }

    #[test]
    fn test_with_body_layout() {
        let doc = Document::with_body();
        let html = doc.document_element().unwrap();
        assert_eq!(doc.tag_name(html), Some("html"));
        let body = doc.body().unwrap();
        assert_eq!(doc.parent(body), Some(html));
        assert!(doc.is_connected(body));
    }

    #[test]
    fn test_previous_element_sibling_skips_text() {
        let mut doc = Document::with_body();
        let body = doc.body().unwrap();
        let first = element(&mut doc, body, "p");
        let text = doc.create_text("gap");
        doc.append_child(body, text).unwrap();
        let second = element(&mut doc, body, "p");

        assert_eq!(doc.previous_element_sibling(second), Some(first));
        assert_eq!(doc.previous_element_sibling(first), None);
    }

    #[test]
    fn test_cannot_insert_ancestor_into_descendant() {
        let mut doc = Document::with_body();
        let body = doc.body().unwrap();
        let outer = element(&mut doc, body, "div");
        let inner = element(&mut doc, outer, "div");

        let err = doc.append_child(inner, outer).unwrap_err();
        assert!(matches!(err, RecorderError::Hierarchy(_)));
    }

    #[test]
    fn test_removed_subtree_stays_readable() {
        let mut doc = Document::with_body();
        let body = doc.body().unwrap();
        let list = element(&mut doc, body, "ul");
        let item = element(&mut doc, list, "li");
        doc.set_text_content(item, "hello").unwrap();

        doc.remove(list).unwrap();
        assert!(!doc.is_connected(item));
        assert_eq!(doc.text_content(item), "hello");
        assert_eq!(doc.parent(item), Some(list));
    }

    #[test]
    fn test_class_list_dedups_and_keeps_order() {
        let mut doc = Document::with_body();
        let body = doc.body().unwrap();
        let div = element(&mut doc, body, "div");
        doc.set_attribute(div, "class", "  b a b  c ").unwrap();
        assert_eq!(doc.class_list(div), vec!["b", "a", "c"]);
        assert!(doc.has_class(div, "c"));
        assert!(!doc.has_class(div, "d"));
    }

    #[test]
    fn test_observer_receives_subtree_records() {
        let mut doc = Document::with_body();
        let body = doc.body().unwrap();
        let observer = doc.observe(body, ObserveOptions::all()).unwrap();

        let div = element(&mut doc, body, "div");
        doc.set_attribute(div, "title", "a").unwrap();
        doc.set_attribute(div, "title", "b").unwrap();
        let text = doc.create_text("x");
        doc.append_child(div, text).unwrap();
        doc.set_text_data(text, "y").unwrap();

        let records = doc.take_records(observer);
        assert_eq!(records.len(), 5);
        assert_eq!(
            records[2],
            MutationRecord::Attributes {
                target: div,
                name: "title".to_string(),
                old_value: Some("a".to_string()),
            }
        );
        assert_eq!(
            records[4],
            MutationRecord::CharacterData {
                target: text,
                old_value: Some("x".to_string()),
            }
        );
        assert!(doc.take_records(observer).is_empty());
    }

    #[test]
    fn test_observer_filters_by_type_and_scope() {
        let mut doc = Document::with_body();
        let body = doc.body().unwrap();
        let observed = element(&mut doc, body, "section");
        let outside = element(&mut doc, body, "aside");
        let observer = doc
            .observe(observed, ObserveOptions::child_list_subtree())
            .unwrap();

        doc.set_attribute(observed, "class", "x").unwrap();
        element(&mut doc, outside, "p");
        let inside = element(&mut doc, observed, "p");

        let records = doc.take_records(observer);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target(), observed);
        assert!(matches!(&records[0], MutationRecord::ChildList { added, .. } if added == &vec![inside]));
    }

    #[test]
    fn test_observe_detached_node_fails() {
        let mut doc = Document::with_body();
        let detached = doc.create_element("div");
        let err = doc.observe(detached, ObserveOptions::all()).unwrap_err();
        assert!(matches!(err, RecorderError::ObserverStart(_)));
    }

    #[test]
    fn test_disconnect_stops_queueing() {
        let mut doc = Document::with_body();
        let body = doc.body().unwrap();
        let observer = doc.observe(body, ObserveOptions::all()).unwrap();
        assert!(doc.disconnect(observer));
        assert!(!doc.disconnect(observer));
        element(&mut doc, body, "div");
        assert!(doc.take_records(observer).is_empty());
    }

    #[test]
    fn test_text_content_of_deep_tree() {
        let mut doc = Document::with_body();
        let body = doc.body().unwrap();
        // Built bottom-up so every append sees a short ancestor chain
        let mut top = doc.create_text("leaf");
        for _ in 0..100_000 {
            let div = doc.create_element("div");
            doc.append_child(div, top).unwrap();
            top = div;
        }
        doc.append_child(body, top).unwrap();

        assert_eq!(doc.text_content(body), "leaf");
        assert_eq!(doc.descendants(body).len(), 100_001);
    }
}
