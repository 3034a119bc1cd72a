//! Building documents from page snapshots
//!
//! Two input shapes are accepted: a plain JSON element tree, and the response
//! of CDP's `DOMSnapshot.captureSnapshot`, which stores every string once in a
//! shared table and describes nodes with parallel arrays.

use crate::dom::{Document, NodeId};
use crate::error::{RecorderError, Result};
use crate::selector::find_element;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

const ELEMENT_NODE: i64 = 1;
const TEXT_NODE: i64 = 3;
const DOCUMENT_NODE: i64 = 9;

/// Node of a JSON element tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Text {
        text: String,
    },
    Element {
        tag: String,
        #[serde(default)]
        attributes: BTreeMap<String, String>,
        /// Current form value
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        #[serde(default)]
        children: Vec<TreeNode>,
    },
}

/// CDP DOMSnapshot.captureSnapshot response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSnapshotResponse {
    /// Main document first, then iframes
    pub documents: Vec<DocumentSnapshot>,

    /// String table; all strings are indexes into it
    pub strings: Vec<String>,
}

/// A snapshot of a single document. Layout data is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub nodes: NodeTreeSnapshot,
}

/// Parallel node arrays
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeTreeSnapshot {
    #[serde(rename = "parentIndex", default)]
    pub parent_index: Option<Vec<i64>>,

    #[serde(rename = "nodeType", default)]
    pub node_type: Option<Vec<i64>>,

    #[serde(rename = "nodeName", default)]
    pub node_name: Option<Vec<i64>>,

    #[serde(rename = "nodeValue", default)]
    pub node_value: Option<Vec<i64>>,

    #[serde(rename = "backendNodeId", default)]
    pub backend_node_id: Option<Vec<i64>>,

    /// Flattened name/value string index pairs per node
    #[serde(default)]
    pub attributes: Option<Vec<Vec<i64>>>,

    #[serde(rename = "inputValue", default)]
    pub input_value: Option<RareStringData>,
}

/// Sparse string data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RareStringData {
    /// Node indexes
    pub index: Vec<i64>,

    /// String table indexes at those nodes
    pub value: Vec<i64>,
}

/// Either snapshot shape
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageSnapshot {
    Cdp(CaptureSnapshotResponse),
    Tree(TreeNode),
}

/// A document built from a snapshot
#[derive(Debug)]
pub struct LoadedPage {
    pub document: Document,

    /// CDP backend node id to arena node (CDP snapshots only)
    pub backend_nodes: HashMap<i64, NodeId>,
}

impl PageSnapshot {
    pub fn load(&self) -> Result<LoadedPage> {
        match self {
            PageSnapshot::Cdp(response) => document_from_cdp(response),
            PageSnapshot::Tree(root) => Ok(LoadedPage {
                document: document_from_tree(root)?,
                backend_nodes: HashMap::new(),
            }),
        }
    }
}

/// Build a document whose document element is `root`
pub fn document_from_tree(root: &TreeNode) -> Result<Document> {
    if matches!(root, TreeNode::Text { .. }) {
        return Err(RecorderError::Snapshot(
            "the root of an element tree must be an element".to_string(),
        ));
    }
    let mut doc = Document::new();
    let document_node = doc.root();
    append_tree(&mut doc, document_node, root)?;
    Ok(doc)
}

fn append_tree(doc: &mut Document, parent: NodeId, node: &TreeNode) -> Result<()> {
    match node {
        TreeNode::Text { text } => {
            let text = doc.create_text(text);
            doc.append_child(parent, text)?;
        }
        TreeNode::Element {
            tag,
            attributes,
            value,
            children,
        } => {
            let el = doc.create_element(tag);
            for (name, value) in attributes {
                doc.set_attribute(el, name, value)?;
            }
            if let Some(value) = value {
                doc.set_value(el, value)?;
            }
            doc.append_child(parent, el)?;
            for child in children {
                append_tree(doc, el, child)?;
            }
        }
    }
    Ok(())
}

/// Build a document from the main document of a CDP snapshot
///
/// Only element and text nodes are kept; children of skipped nodes (doctype,
/// comments) are dropped with them.
pub fn document_from_cdp(response: &CaptureSnapshotResponse) -> Result<LoadedPage> {
    let snapshot = response
        .documents
        .first()
        .ok_or_else(|| RecorderError::Snapshot("snapshot contains no documents".to_string()))?;
    let nodes = &snapshot.nodes;
    let strings = &response.strings;
    let string = |index: i64| -> &str {
        usize::try_from(index)
            .ok()
            .and_then(|i| strings.get(i))
            .map(String::as_str)
            .unwrap_or("")
    };

    let node_types = nodes.node_type.as_deref().unwrap_or(&[]);
    let parents = nodes.parent_index.as_deref().unwrap_or(&[]);
    let names = nodes.node_name.as_deref().unwrap_or(&[]);
    let values = nodes.node_value.as_deref().unwrap_or(&[]);
    let backend_ids = nodes.backend_node_id.as_deref().unwrap_or(&[]);
    let attributes = nodes.attributes.as_deref().unwrap_or(&[]);

    let input_values: HashMap<i64, i64> = nodes
        .input_value
        .as_ref()
        .map(|rare| rare.index.iter().copied().zip(rare.value.iter().copied()).collect())
        .unwrap_or_default();

    let mut doc = Document::new();
    let mut mapped: Vec<Option<NodeId>> = vec![None; node_types.len()];
    let mut backend_nodes = HashMap::new();

    for (i, &node_type) in node_types.iter().enumerate() {
        let parent = parents
            .get(i)
            .and_then(|&p| usize::try_from(p).ok())
            .and_then(|p| mapped.get(p).copied().flatten());

        let node = match (node_type, parent) {
            (DOCUMENT_NODE, None) if i == 0 => Some(doc.root()),
            (ELEMENT_NODE, Some(parent)) => {
                let el = doc.create_element(string(names.get(i).copied().unwrap_or(-1)));
                if let Some(pairs) = attributes.get(i) {
                    for pair in pairs.chunks_exact(2) {
                        doc.set_attribute(el, string(pair[0]), string(pair[1]))?;
                    }
                }
                if let Some(&value) = input_values.get(&(i as i64)) {
                    doc.set_value(el, string(value))?;
                }
                doc.append_child(parent, el)?;
                Some(el)
            }
            (TEXT_NODE, Some(parent)) => {
                let text = doc.create_text(string(values.get(i).copied().unwrap_or(-1)));
                doc.append_child(parent, text)?;
                Some(text)
            }
            _ => None,
        };

        if let Some(node) = node {
            mapped[i] = Some(node);
            if let Some(&backend_id) = backend_ids.get(i) {
                backend_nodes.insert(backend_id, node);
            }
        }
    }

    if doc.document_element().is_none() {
        return Err(RecorderError::Snapshot(
            "snapshot has no document element".to_string(),
        ));
    }
    Ok(LoadedPage {
        document: doc,
        backend_nodes,
    })
}

/// How a request names a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTarget {
    /// CSS selector or XPath
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_node_id: Option<i64>,

    /// Child indexes from the document node (text nodes included)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<usize>>,
}

impl NodeTarget {
    pub fn resolve(&self, page: &LoadedPage) -> Result<NodeId> {
        let doc = &page.document;
        if let Some(selector) = &self.selector {
            return find_element(doc, selector)?.ok_or_else(|| {
                RecorderError::Snapshot(format!("no element matches '{}'", selector))
            });
        }
        if let Some(backend_id) = self.backend_node_id {
            return page.backend_nodes.get(&backend_id).copied().ok_or_else(|| {
                RecorderError::Snapshot(format!("unknown backendNodeId {}", backend_id))
            });
        }
        if let Some(path) = &self.path {
            let mut node = doc.root();
            for &index in path {
                node = *doc.children(node).get(index).ok_or_else(|| {
                    RecorderError::Snapshot(format!("path {:?} leaves the document", path))
                })?;
            }
            return Ok(node);
        }
        Err(RecorderError::Snapshot(
            "target needs a selector, backendNodeId or path".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree() -> PageSnapshot {
        serde_json::from_value(json!({
            "tag": "html",
            "children": [
                {"tag": "head"},
                {"tag": "body", "children": [
                    {"tag": "input", "attributes": {"name": "q"}, "value": "rust"},
                    {"text": "hello"}
                ]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_tree_snapshot() {
        let page = tree().load().unwrap();
        let doc = &page.document;
        let body = doc.body().unwrap();
        let input = doc.element_children(body).next().unwrap();
        assert_eq!(doc.attribute(input, "name"), Some("q"));
        assert_eq!(doc.value(input), Some("rust"));
        assert_eq!(doc.text_content(body), "hello");

        let by_path = NodeTarget {
            path: Some(vec![0, 1, 0]),
            ..Default::default()
        };
        assert_eq!(by_path.resolve(&page).unwrap(), input);

        let by_selector = NodeTarget {
            selector: Some("input[name='q']".to_string()),
            ..Default::default()
        };
        assert_eq!(by_selector.resolve(&page).unwrap(), input);
        assert!(NodeTarget::default().resolve(&page).is_err());
    }

    #[test]
    fn test_text_root_is_rejected() {
        let root = TreeNode::Text {
            text: "x".to_string(),
        };
        assert!(matches!(
            document_from_tree(&root),
            Err(RecorderError::Snapshot(_))
        ));
    }

    #[test]
    fn test_cdp_snapshot() {
        let snapshot: PageSnapshot = serde_json::from_value(json!({
            "documents": [{
                "documentURL": 0,
                "nodes": {
                    "parentIndex": [-1, 0, 0, 2, 3, 4, 3],
                    "nodeType": [9, 10, 1, 1, 1, 3, 1],
                    "nodeName": [1, 2, 3, 4, 5, 6, 7],
                    "nodeValue": [-1, -1, -1, -1, -1, 8, -1],
                    "backendNodeId": [1, 2, 3, 4, 5, 6, 7],
                    "attributes": [[], [], [], [], [9, 10], [], [11, 12]],
                    "inputValue": {"index": [6], "value": [13]}
                },
                "layout": {"nodeIndex": [], "styles": [], "bounds": [], "text": []}
            }],
            "strings": [
                "https://example.test/", "#document", "html", "HTML", "BODY", "BUTTON",
                "#text", "INPUT", "Save", "id", "save", "name", "q", "typed"
            ]
        }))
        .unwrap();

        let page = snapshot.load().unwrap();
        let doc = &page.document;
        let button = page.backend_nodes[&5];
        assert_eq!(doc.tag_name(button), Some("button"));
        assert_eq!(doc.attribute(button, "id"), Some("save"));
        assert_eq!(doc.text_content(button), "Save");

        let input = page.backend_nodes[&7];
        assert_eq!(doc.value(input), Some("typed"));
        assert!(!page.backend_nodes.contains_key(&2));

        let target = NodeTarget {
            backend_node_id: Some(5),
            ..Default::default()
        };
        assert_eq!(target.resolve(&page).unwrap(), button);
    }
}
