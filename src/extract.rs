//! Attribute and text extractors
//!
//! Each extractor reads one aspect of a single element and writes only the
//! fields it can derive. The pipeline runs them in a fixed order and none of
//! them overwrites a field an earlier one already set.

use crate::dom::{Document, NodeId};
use crate::error::Result;
use crate::event::{AttributeBag, InteractionEvent};
use crate::selector::{stable_classes, SelectorList};

const GENERIC_ATTRIBUTES: [&str; 3] = ["type", "maxlength", "autocomplete"];
const FORM_CONTROLS: [&str; 3] = ["input", "select", "textarea"];

/// One enrichment step
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, doc: &Document, el: NodeId, event: &mut InteractionEvent);
}

/// Visible text of buttons and menu items
pub struct ButtonText;

impl Extractor for ButtonText {
    fn name(&self) -> &'static str {
        "button-text"
    }

    fn extract(&self, doc: &Document, el: NodeId, event: &mut InteractionEvent) {
        if event.button_text.is_some() {
            return;
        }
        let is_button = doc.tag_name(el) == Some("button")
            || matches!(doc.attribute(el, "role"), Some("button" | "menuitem"));
        if is_button {
            let text = collapse_whitespace(&doc.text_content(el));
            if !text.is_empty() {
                event.button_text = Some(text);
            }
        }
    }
}

/// Cell texts of the enclosing table row
pub struct TableRow {
    row: SelectorList,
    cell: SelectorList,
}

impl TableRow {
    pub fn new() -> Result<Self> {
        Ok(Self {
            row: SelectorList::parse("tr")?,
            cell: SelectorList::parse("td")?,
        })
    }
}

impl Extractor for TableRow {
    fn name(&self) -> &'static str {
        "table-row"
    }

    fn extract(&self, doc: &Document, el: NodeId, event: &mut InteractionEvent) {
        let Some(row) = self.row.closest(doc, el) else {
            return;
        };
        let columns: Vec<String> = self
            .cell
            .query_all(doc, row)
            .into_iter()
            .map(|td| doc.text_content(td).trim().to_string())
            .filter(|text| !text.is_empty())
            .collect();
        if !columns.is_empty() {
            if let Ok(json) = serde_json::to_string(&columns) {
                event.extract("columns", json);
            }
        }
        if let Some(parent) = doc.parent(row) {
            let index = doc
                .element_children(parent)
                .filter(|&sibling| doc.tag_name(sibling) == Some("tr"))
                .position(|sibling| sibling == row);
            if let Some(index) = index {
                event.extract("rowIndex", index.to_string());
            }
        }
    }
}

/// `name` of form controls
pub struct FieldName;

impl Extractor for FieldName {
    fn name(&self) -> &'static str {
        "field-name"
    }

    fn extract(&self, doc: &Document, el: NodeId, event: &mut InteractionEvent) {
        if event.input_name.is_some() || !is_form_control(doc, el) {
            return;
        }
        event.input_name = doc
            .attribute(el, "name")
            .filter(|name| !name.is_empty())
            .map(str::to_string);
    }
}

/// Label of the enclosing navigation landmark
pub struct Pagination {
    landmark: SelectorList,
}

impl Pagination {
    pub fn new() -> Result<Self> {
        Ok(Self {
            landmark: SelectorList::parse("nav, [role='navigation']")?,
        })
    }
}

impl Extractor for Pagination {
    fn name(&self) -> &'static str {
        "pagination"
    }

    fn extract(&self, doc: &Document, el: NodeId, event: &mut InteractionEvent) {
        if event.pagination.is_some() {
            return;
        }
        if let Some(nav) = self.landmark.closest(doc, el) {
            let label = doc
                .attribute(nav, "aria-label")
                .filter(|label| !label.is_empty())
                .unwrap_or("navigation");
            event.pagination = Some(label.to_string());
        }
    }
}

pub struct AriaBag;

impl Extractor for AriaBag {
    fn name(&self) -> &'static str {
        "aria"
    }

    fn extract(&self, doc: &Document, el: NodeId, event: &mut InteractionEvent) {
        if event.aria.is_none() {
            event.aria = collect_aria(doc, el);
        }
    }
}

pub struct AttributeBagExtractor;

impl Extractor for AttributeBagExtractor {
    fn name(&self) -> &'static str {
        "attributes"
    }

    fn extract(&self, doc: &Document, el: NodeId, event: &mut InteractionEvent) {
        if event.attributes.is_none() {
            event.attributes = collect_attributes(doc, el);
        }
    }
}

pub struct TestBag;

impl Extractor for TestBag {
    fn name(&self) -> &'static str {
        "test"
    }

    fn extract(&self, doc: &Document, el: NodeId, event: &mut InteractionEvent) {
        if event.test.is_none() {
            event.test = collect_test(doc, el);
        }
    }
}

/// The fixed-order extractor pipeline
pub struct ExtractorPipeline {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorPipeline {
    pub fn new() -> Result<Self> {
        Ok(Self {
            extractors: vec![
                Box::new(ButtonText),
                Box::new(TableRow::new()?),
                Box::new(FieldName),
                Box::new(Pagination::new()?),
                Box::new(AriaBag),
                Box::new(AttributeBagExtractor),
                Box::new(TestBag),
            ],
        })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    pub fn run(&self, doc: &Document, el: NodeId, event: &mut InteractionEvent) {
        for extractor in &self.extractors {
            extractor.extract(doc, el, event);
        }
    }
}

pub fn is_form_control(doc: &Document, el: NodeId) -> bool {
    doc.tag_name(el)
        .is_some_and(|tag| FORM_CONTROLS.contains(&tag))
}

/// Non-generated classes joined by spaces
pub fn classes_of(doc: &Document, el: NodeId) -> Option<String> {
    let classes = stable_classes(doc, el);
    (!classes.is_empty()).then(|| classes.join(" "))
}

/// `aria-*` attributes
pub fn collect_aria(doc: &Document, el: NodeId) -> Option<AttributeBag> {
    collect(doc, el, |name| name.starts_with("aria-"))
}

/// `data-testid` and `test-*` attributes
pub fn collect_test(doc: &Document, el: NodeId) -> Option<AttributeBag> {
    collect(doc, el, |name| name == "data-testid" || name.starts_with("test-"))
}

/// `type`, `maxlength`, `autocomplete` and `data-*` (except `data-testid`)
pub fn collect_attributes(doc: &Document, el: NodeId) -> Option<AttributeBag> {
    collect(doc, el, |name| {
        GENERIC_ATTRIBUTES.contains(&name) || (name.starts_with("data-") && name != "data-testid")
    })
}

fn collect(doc: &Document, el: NodeId, keep: impl Fn(&str) -> bool) -> Option<AttributeBag> {
    let bag: AttributeBag = doc
        .attributes(el)
        .iter()
        .filter(|a| keep(&a.name))
        .map(|a| (a.name.clone(), a.value.clone()))
        .collect();
    (!bag.is_empty()).then_some(bag)
}

/// Trim and collapse runs of whitespace to single spaces
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
