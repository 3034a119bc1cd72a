//! Canonical event records and wire envelopes
//!
//! Downstream consumers treat key presence as significant, so every record is
//! sanitized before it leaves the recorder: absent fields, empty strings and
//! empty maps never reach the wire.

use crate::activity::ActivityState;
use crate::notifications::Notification;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute-namespace bag (`aria`, `attributes`, `test`)
pub type AttributeBag = BTreeMap<String, String>;

/// Semantic action of an interaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Click,
    Input,
    Press,
}

impl Action {
    /// Map a native event type: `input`/`change` are inputs, `keydown` is a
    /// press, anything else is a click
    pub fn from_event_type(event_type: &str) -> Self {
        match event_type {
            "input" | "change" => Action::Input,
            "keydown" => Action::Press,
            _ => Action::Click,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Click => "click",
            Action::Input => "input",
            Action::Press => "press",
        }
    }
}

/// One user interaction, ready for replay or display
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    /// Synthesized stable selector
    pub selector: String,

    pub action: Action,

    /// Current element value (input actions only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Pressed key (press actions only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Absolute structural fallback selector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,

    /// Raw `id` of the element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,

    /// Non-generated classes, space separated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<String>,

    /// Visible text of buttons and menu items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_text: Option<String>,

    /// `name` of the form control
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_name: Option<String>,

    /// Label of the enclosing navigation landmark
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<String>,

    /// Page-level anchor paired with a widget-relative selector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_anchor: Option<String>,

    /// Open-ended derived values (table columns, widget labels, indices)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extracted_values: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria: Option<AttributeBag>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AttributeBag>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<AttributeBag>,
}

impl InteractionEvent {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            ..Default::default()
        }
    }

    /// Record a derived value unless an earlier extractor already did
    pub fn extract(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            return;
        }
        self.extracted_values
            .entry(key.to_string())
            .or_insert(value);
    }

    /// Drop empty fields; `value` keeps an empty string for input actions
    /// and is removed for every other action
    pub fn sanitize(&mut self) {
        if self.action == Action::Input {
            if self.value.is_none() {
                self.value = Some(String::new());
            }
        } else {
            self.value = None;
        }
        if self.action != Action::Press {
            self.key = None;
        }
        for field in [
            &mut self.key,
            &mut self.xpath,
            &mut self.element_id,
            &mut self.classes,
            &mut self.button_text,
            &mut self.input_name,
            &mut self.pagination,
            &mut self.parent_anchor,
        ] {
            clear_empty(field);
        }
        self.extracted_values.retain(|_, v| !v.is_empty());
        for bag in [&mut self.aria, &mut self.attributes, &mut self.test] {
            sanitize_bag(bag);
        }
    }

    /// Fields that identify a duplicate native event
    pub fn signature_fields(&self) -> [&str; 6] {
        [
            self.action.as_str(),
            &self.selector,
            self.element_id.as_deref().unwrap_or(""),
            self.value.as_deref().unwrap_or(""),
            self.key.as_deref().unwrap_or(""),
            self.parent_anchor.as_deref().unwrap_or(""),
        ]
    }
}

/// Kind of DOM change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationAction {
    Added,
    Removed,
    AttributeChanged,
    TextChanged,
}

/// One observed DOM change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationEvent {
    pub action: MutationAction,

    pub selector: String,

    /// Changed attribute name (attributeChanged only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,

    /// Collapsed text of an added or removed element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria: Option<AttributeBag>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AttributeBag>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<AttributeBag>,
}

impl MutationEvent {
    pub fn new(action: MutationAction, selector: String) -> Self {
        Self {
            action,
            selector,
            attribute: None,
            old_value: None,
            new_value: None,
            extracted_text: None,
            xpath: None,
            element_id: None,
            classes: None,
            aria: None,
            attributes: None,
            test: None,
        }
    }

    pub fn sanitize(&mut self) {
        for field in [
            &mut self.attribute,
            &mut self.old_value,
            &mut self.new_value,
            &mut self.extracted_text,
            &mut self.xpath,
            &mut self.element_id,
            &mut self.classes,
        ] {
            clear_empty(field);
        }
        for bag in [&mut self.aria, &mut self.attributes, &mut self.test] {
            sanitize_bag(bag);
        }
    }
}

fn clear_empty(field: &mut Option<String>) {
    if field.as_deref().is_some_and(str::is_empty) {
        *field = None;
    }
}

fn sanitize_bag(bag: &mut Option<AttributeBag>) {
    if let Some(map) = bag {
        map.retain(|_, v| !v.is_empty());
        if map.is_empty() {
            *bag = None;
        }
    }
}

/// Message handed to the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    #[serde(rename = "recording-event")]
    Recording { events: Vec<InteractionEvent> },

    #[serde(rename = "mutation-event")]
    Mutation { events: Vec<MutationEvent> },

    #[serde(rename = "activity-event")]
    Activity { data: ActivityState },

    #[serde(rename = "growl-event")]
    Growl { data: Notification },
}

impl Envelope {
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Recording { .. } => "recording-event",
            Envelope::Mutation { .. } => "mutation-event",
            Envelope::Activity { .. } => "activity-event",
            Envelope::Growl { .. } => "growl-event",
        }
    }

    /// Serialize for the wire, stripping nulls and empty objects
    pub fn to_payload(&self) -> serde_json::Result<serde_json::Value> {
        Ok(compact(serde_json::to_value(self)?))
    }
}

/// Recursively remove `null` members and empty objects
pub fn compact(value: serde_json::Value) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter_map(|(k, v)| match compact(v) {
                    Value::Null => None,
                    Value::Object(inner) if inner.is_empty() => None,
                    other => Some((k, other)),
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(compact).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_mapping() {
        assert_eq!(Action::from_event_type("input"), Action::Input);
        assert_eq!(Action::from_event_type("change"), Action::Input);
        assert_eq!(Action::from_event_type("keydown"), Action::Press);
        assert_eq!(Action::from_event_type("click"), Action::Click);
        assert_eq!(Action::from_event_type("mousedown"), Action::Click);
    }

    #[test]
    fn test_sanitize_strips_empty_fields() {
        let mut event = InteractionEvent::new(Action::Click);
        event.selector = "#save".to_string();
        event.value = Some("stale".to_string());
        event.element_id = Some(String::new());
        event.aria = Some(AttributeBag::new());
        event.test = Some(AttributeBag::from([("data-testid".to_string(), String::new())]));
        event.extracted_values.insert("columns".to_string(), String::new());
        event.sanitize();

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json, json!({"selector": "#save", "action": "click"}));
    }

    #[test]
    fn test_input_keeps_empty_value() {
        let mut event = InteractionEvent::new(Action::Input);
        event.selector = "input".to_string();
        event.key = Some("a".to_string());
        event.sanitize();
        assert_eq!(event.value.as_deref(), Some(""));
        assert_eq!(event.key, None);
    }

    #[test]
    fn test_extract_does_not_overwrite() {
        let mut event = InteractionEvent::default();
        event.extract("widget", "selectOneMenu");
        event.extract("widget", "other");
        event.extract("empty", "");
        assert_eq!(event.extracted_values.len(), 1);
        assert_eq!(event.extracted_values["widget"], "selectOneMenu");
    }

    #[test]
    fn test_envelope_wire_shape() {
        let mut event = MutationEvent::new(MutationAction::AttributeChanged, "#x".to_string());
        event.attribute = Some("class".to_string());
        let payload = Envelope::Mutation {
            events: vec![event],
        }
        .to_payload()
        .unwrap();
        assert_eq!(
            payload,
            json!({
                "type": "mutation-event",
                "events": [{"action": "attributeChanged", "selector": "#x", "attribute": "class"}]
            })
        );
    }

    #[test]
    fn test_compact_nested() {
        let value = json!({"a": null, "b": {"c": null}, "d": [{"e": null, "f": 1}], "g": 0});
        assert_eq!(compact(value), json!({"d": [{"f": 1}], "g": 0}));
    }
}
