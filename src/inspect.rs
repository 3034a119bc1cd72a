//! Element inspection data for hover overlays

use crate::dom::{Document, NodeId};
use crate::event::AttributeBag;
use crate::extract::{collapse_whitespace, collect_aria};
use crate::selector::{absolute_xpath, SelectorSynthesizer};
use serde::{Deserialize, Serialize};

const TEXT_LIMIT: usize = 500;
const DATA_LIMIT: usize = 200;
const INSPECT_DEPTH: usize = 6;
const INSPECTED_ATTRIBUTES: [&str; 7] = [
    "name",
    "type",
    "maxlength",
    "autocomplete",
    "placeholder",
    "href",
    "value",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementInfo {
    pub tag: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub class_list: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    pub css: String,

    pub xpath: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria: Option<AttributeBag>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AttributeBag>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<AttributeBag>,
}

/// Describe an element; `None` for non-element nodes
pub fn inspect(doc: &Document, el: NodeId, synthesizer: &SelectorSynthesizer) -> Option<ElementInfo> {
    let tag = doc.tag_name(el)?.to_string();

    let text = truncate(&collapse_whitespace(&doc.text_content(el)), TEXT_LIMIT);

    let attributes: AttributeBag = INSPECTED_ATTRIBUTES
        .iter()
        .filter_map(|&name| {
            doc.attribute(el, name)
                .map(|value| (name.to_string(), value.to_string()))
        })
        .collect();

    let data: AttributeBag = doc
        .attributes(el)
        .iter()
        .filter(|a| a.name.starts_with("data-"))
        .map(|a| (a.name.clone(), truncate(&a.value, DATA_LIMIT)))
        .collect();

    Some(ElementInfo {
        tag,
        id: doc.id_attr(el).map(str::to_string),
        class_list: doc.class_list(el).into_iter().map(str::to_string).collect(),
        role: doc
            .attribute(el, "role")
            .filter(|r| !r.is_empty())
            .map(str::to_string),
        text: (!text.is_empty()).then_some(text),
        css: synthesizer.css_with_depth(doc, el, INSPECT_DEPTH),
        xpath: absolute_xpath(doc, el),
        aria: collect_aria(doc, el),
        attributes: (!attributes.is_empty()).then_some(attributes),
        data: (!data.is_empty()).then_some(data),
    })
}

fn truncate(value: &str, limit: usize) -> String {
    value.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::SelectorOptions;

    #[test]
    fn test_inspect_fields() {
        let mut doc = Document::with_body();
        let body = doc.body().unwrap();
        let link = doc.create_element("a");
        doc.append_child(body, link).unwrap();
        for (name, value) in [
            ("href", "/orders"),
            ("class", "nav-link active"),
            ("role", "tab"),
            ("aria-selected", "true"),
            ("data-section", "orders"),
        ] {
            doc.set_attribute(link, name, value).unwrap();
        }
        doc.set_text_content(link, "  My\n   orders ").unwrap();

        let synthesizer = SelectorSynthesizer::new(SelectorOptions::default()).unwrap();
        let info = inspect(&doc, link, &synthesizer).unwrap();
        assert_eq!(info.tag, "a");
        assert_eq!(info.id, None);
        assert_eq!(info.class_list, vec!["nav-link", "active"]);
        assert_eq!(info.role.as_deref(), Some("tab"));
        assert_eq!(info.text.as_deref(), Some("My orders"));
        assert_eq!(info.css, "html > body > a.nav-link.active[role='tab']");
        assert_eq!(info.xpath, "/html[1]/body[1]/a[1]");
        assert_eq!(info.attributes.unwrap()["href"], "/orders");
        assert_eq!(info.data.unwrap()["data-section"], "orders");
        assert_eq!(info.aria.unwrap()["aria-selected"], "true");
    }

    #[test]
    fn test_long_values_are_cut() {
        let mut doc = Document::with_body();
        let body = doc.body().unwrap();
        let div = doc.create_element("div");
        doc.append_child(body, div).unwrap();
        doc.set_attribute(div, "data-blob", &"x".repeat(300)).unwrap();
        doc.set_text_content(div, &"word ".repeat(200)).unwrap();

        let synthesizer = SelectorSynthesizer::new(SelectorOptions::default()).unwrap();
        let info = inspect(&doc, div, &synthesizer).unwrap();
        assert_eq!(info.text.unwrap().chars().count(), 500);
        assert_eq!(info.data.unwrap()["data-blob"].len(), 200);
        assert!(inspect(&doc, doc.root(), &synthesizer).is_none());
    }
}
