//! DOM mutation watcher
//!
//! Turns observer records into [`MutationEvent`]s and reports whether the
//! batch added nodes, in which case interaction listeners need rebinding.

use crate::dom::{Document, MutationRecord, NodeId, ObserveOptions, ObserverId};
use crate::error::Result;
use crate::event::{MutationAction, MutationEvent};
use crate::extract::{classes_of, collapse_whitespace, collect_aria, collect_attributes, collect_test};
use crate::selector::SelectorSynthesizer;
use log::{debug, info};

const EXTRACTED_TEXT_LIMIT: usize = 200;

/// Result of draining one batch of records
#[derive(Debug, Default)]
pub struct MutationBatch {
    pub events: Vec<MutationEvent>,

    /// Nodes were added; listeners must be rebound
    pub rebind: bool,

    /// Nodes were added or removed
    pub churn: bool,
}

pub struct MutationWatcher {
    synthesizer: SelectorSynthesizer,
    observer: Option<ObserverId>,
}

impl MutationWatcher {
    pub fn new(synthesizer: SelectorSynthesizer) -> Self {
        Self {
            synthesizer,
            observer: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.observer.is_some()
    }

    /// Observe the whole document. Restarting replaces the previous
    /// observer, so repeated calls never register twice.
    pub fn start(&mut self, doc: &mut Document) -> Result<()> {
        self.stop(doc);
        let root = doc.document_element().unwrap_or_else(|| doc.root());
        let id = doc.observe(root, ObserveOptions::all())?;
        info!("Mutation watcher started ({})", id);
        self.observer = Some(id);
        Ok(())
    }

    pub fn stop(&mut self, doc: &mut Document) {
        if let Some(id) = self.observer.take() {
            doc.disconnect(id);
            info!("Mutation watcher stopped ({})", id);
        }
    }

    /// Drain queued records into events
    pub fn drain(&mut self, doc: &mut Document) -> MutationBatch {
        let Some(id) = self.observer else {
            return MutationBatch::default();
        };
        let records = doc.take_records(id);
        let doc: &Document = doc;
        self.convert(doc, &records)
    }

    pub fn convert(&self, doc: &Document, records: &[MutationRecord]) -> MutationBatch {
        let mut batch = MutationBatch::default();
        for record in records {
            match record {
                MutationRecord::ChildList {
                    added, removed, ..
                } => {
                    batch.rebind |= !added.is_empty();
                    batch.churn |= !added.is_empty() || !removed.is_empty();
                    for &node in added {
                        if doc.is_element(node) {
                            batch.events.push(self.structural(doc, node, MutationAction::Added));
                        }
                    }
                    for &node in removed {
                        if doc.is_element(node) {
                            batch.events.push(self.structural(doc, node, MutationAction::Removed));
                        }
                    }
                }
                MutationRecord::Attributes {
                    target,
                    name,
                    old_value,
                } => {
                    let mut event = self.described(doc, *target, MutationAction::AttributeChanged);
                    event.attribute = Some(name.clone());
                    event.old_value = old_value.clone();
                    event.new_value = doc.attribute(*target, name).map(str::to_string);
                    event.sanitize();
                    batch.events.push(event);
                }
                MutationRecord::CharacterData { target, old_value } => {
                    let scope = doc.parent_element(*target).unwrap_or(*target);
                    let mut event = self.described(doc, scope, MutationAction::TextChanged);
                    event.old_value = old_value.clone();
                    event.new_value = doc.text_data(*target).map(str::to_string);
                    event.sanitize();
                    batch.events.push(event);
                }
            }
        }
        debug!(
            "Converted {} records into {} mutation events",
            records.len(),
            batch.events.len()
        );
        batch
    }

    fn structural(&self, doc: &Document, node: NodeId, action: MutationAction) -> MutationEvent {
        let mut event = self.described(doc, node, action);
        let text: String = collapse_whitespace(&doc.text_content(node))
            .chars()
            .take(EXTRACTED_TEXT_LIMIT)
            .collect();
        event.extracted_text = Some(text);
        event.sanitize();
        event
    }

    /// Selector and identity fields of an element
    fn described(&self, doc: &Document, el: NodeId, action: MutationAction) -> MutationEvent {
        let selector = self.synthesizer.synthesize(doc, el);
        let mut event = MutationEvent::new(action, selector.css);
        event.xpath = Some(selector.xpath);
        event.element_id = doc.id_attr(el).map(str::to_string);
        event.classes = classes_of(doc, el);
        event.aria = collect_aria(doc, el);
        event.attributes = collect_attributes(doc, el);
        event.test = collect_test(doc, el);
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::SelectorOptions;

    fn watcher() -> MutationWatcher {
        MutationWatcher::new(SelectorSynthesizer::new(SelectorOptions::default()).unwrap())
    }

    #[test]
    fn test_added_and_removed_elements() {
        let mut doc = Document::with_body();
        let body = doc.body().unwrap();
        let list = doc.create_element("ul");
        doc.append_child(body, list).unwrap();
        doc.set_attribute(list, "id", "todo").unwrap();

        let mut w = watcher();
        w.start(&mut doc).unwrap();

        let item = doc.create_element("li");
        doc.set_attribute(item, "class", "item").unwrap();
        doc.set_text_content(item, "Buy milk").unwrap();
        doc.append_child(list, item).unwrap();

        let batch = w.drain(&mut doc);
        assert!(batch.rebind);
        assert!(batch.churn);
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].action, MutationAction::Added);
        assert_eq!(batch.events[0].selector, "#todo > li.item");
        assert_eq!(batch.events[0].extracted_text.as_deref(), Some("Buy milk"));

        doc.remove_child(list, item).unwrap();
        let batch = w.drain(&mut doc);
        assert!(!batch.rebind);
        assert!(batch.churn);
        assert_eq!(batch.events[0].action, MutationAction::Removed);
        assert_eq!(batch.events[0].selector, "li.item");
    }

    #[test]
    fn test_attribute_and_text_changes() {
        let mut doc = Document::with_body();
        let body = doc.body().unwrap();
        let status = doc.create_element("span");
        doc.append_child(body, status).unwrap();
        doc.set_attribute(status, "id", "status").unwrap();
        let text = doc.create_text("idle");
        doc.append_child(status, text).unwrap();

        let mut w = watcher();
        w.start(&mut doc).unwrap();
        doc.set_attribute(status, "class", "busy").unwrap();
        doc.set_text_data(text, "working").unwrap();

        let batch = w.drain(&mut doc);
        assert!(!batch.rebind);
        let attr = &batch.events[0];
        assert_eq!(attr.action, MutationAction::AttributeChanged);
        assert_eq!(attr.attribute.as_deref(), Some("class"));
        assert_eq!(attr.old_value, None);
        assert_eq!(attr.new_value.as_deref(), Some("busy"));

        let changed = &batch.events[1];
        assert_eq!(changed.action, MutationAction::TextChanged);
        assert_eq!(changed.selector, "#status");
        assert_eq!(changed.old_value.as_deref(), Some("idle"));
        assert_eq!(changed.new_value.as_deref(), Some("working"));
    }

    #[test]
    fn test_restart_is_idempotent_and_stop_detaches() {
        let mut doc = Document::with_body();
        let body = doc.body().unwrap();
        let mut w = watcher();
        w.start(&mut doc).unwrap();
        w.start(&mut doc).unwrap();

        let p = doc.create_element("p");
        doc.append_child(body, p).unwrap();
        assert_eq!(w.drain(&mut doc).events.len(), 1);

        w.stop(&mut doc);
        assert!(!w.is_active());
        let q = doc.create_element("p");
        doc.append_child(body, q).unwrap();
        assert!(w.drain(&mut doc).events.is_empty());
    }
}
