//! Composite widget catalog
//!
//! Custom widgets render their own DOM instead of native controls, and the
//! generic synthesizer would produce selectors tied to render order. Each row
//! in the catalog pairs a matcher with a dedicated selector strategy; rows are
//! evaluated in order and the first match wins.

use crate::dom::{Document, NodeId};
use crate::error::Result;
use crate::event::InteractionEvent;
use crate::selector::{escape_ident, quote_attr, stable_id, SelectorList, SelectorSynthesizer};
use log::debug;

/// Containers that end the ancestor walk of the synthesizer
pub const WIDGET_ROOTS: &str =
    ".ui-selectonemenu[role='combobox'], nav, [role='navigation'], table, [role='table']";

const SOM_ROOT: &str = ".ui-selectonemenu[role='combobox']";
const SOM_ANY_ROOT: &str = ".ui-selectonemenu";
const SOM_TRIGGER: &str = ".ui-selectonemenu-trigger";
const SOM_OPTION: &str = "li.ui-selectonemenu-item[role='option']";
const SOM_LIST: &str = "ul.ui-selectonemenu-items[role='listbox']";
const SOM_LIST_LOOSE: &str = "ul.ui-selectonemenu-items";
const SOM_LABEL: &str = ".ui-selectonemenu-label";
const SOM_PANEL: &str = ".ui-selectonemenu-panel";

const SELECT_ONE_MENU: &str = "selectOneMenu";

/// Selector strategy of a catalog row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetStrategy {
    SelectOneMenuTrigger,
    SelectOneMenuOption,
    SelectOneMenuRoot,
}

#[derive(Debug, Clone)]
pub struct WidgetRule {
    pub matcher: SelectorList,
    pub strategy: WidgetStrategy,
}

/// Ordered `(matcher, strategy)` table
#[derive(Debug, Clone)]
pub struct WidgetCatalog {
    rules: Vec<WidgetRule>,
    root: SelectorList,
    any_root: SelectorList,
    option: SelectorList,
    list: SelectorList,
    list_loose: SelectorList,
    label: SelectorList,
    panel: SelectorList,
}

impl WidgetCatalog {
    pub fn new() -> Result<Self> {
        let rules = vec![
            WidgetRule {
                matcher: SelectorList::parse(SOM_TRIGGER)?,
                strategy: WidgetStrategy::SelectOneMenuTrigger,
            },
            WidgetRule {
                matcher: SelectorList::parse(SOM_OPTION)?,
                strategy: WidgetStrategy::SelectOneMenuOption,
            },
            WidgetRule {
                matcher: SelectorList::parse(SOM_ROOT)?,
                strategy: WidgetStrategy::SelectOneMenuRoot,
            },
        ];
        Ok(Self {
            rules,
            root: SelectorList::parse(SOM_ROOT)?,
            any_root: SelectorList::parse(SOM_ANY_ROOT)?,
            option: SelectorList::parse(SOM_OPTION)?,
            list: SelectorList::parse(SOM_LIST)?,
            list_loose: SelectorList::parse(SOM_LIST_LOOSE)?,
            label: SelectorList::parse(SOM_LABEL)?,
            panel: SelectorList::parse(SOM_PANEL)?,
        })
    }

    pub fn rules(&self) -> &[WidgetRule] {
        &self.rules
    }

    /// First strategy whose matcher accepts the element
    pub fn strategy_for(&self, doc: &Document, el: NodeId) -> Option<WidgetStrategy> {
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(doc, el))
            .map(|rule| rule.strategy)
    }

    /// Apply the matching strategy, if any. Returns whether one applied.
    ///
    /// Strategies own `selector`, `parentAnchor` and the widget keys of
    /// `extractedValues`; other fields are left to the extractors.
    pub fn apply(
        &self,
        doc: &Document,
        el: NodeId,
        event: &mut InteractionEvent,
        synthesizer: &SelectorSynthesizer,
    ) -> bool {
        let Some(strategy) = self.strategy_for(doc, el) else {
            return false;
        };
        debug!("Widget strategy {:?} for {}", strategy, el);
        match strategy {
            WidgetStrategy::SelectOneMenuTrigger => self.trigger(doc, el, event, synthesizer),
            WidgetStrategy::SelectOneMenuOption => self.option(doc, el, event, synthesizer),
            WidgetStrategy::SelectOneMenuRoot => self.root(doc, el, event, synthesizer),
        }
        true
    }

    fn trigger(
        &self,
        doc: &Document,
        el: NodeId,
        event: &mut InteractionEvent,
        synthesizer: &SelectorSynthesizer,
    ) {
        let root = self
            .root
            .closest(doc, el)
            .or_else(|| self.any_root.closest(doc, el));
        event.selector = relative_to_root(doc, root, SOM_TRIGGER);

        if let Some(root) = root {
            event.extract("widget", SELECT_ONE_MENU);
            if let Some(id) = doc.id_attr(root) {
                event.extract("comboboxId", id);
            }
            if let Some(label) = self.label.query_first(doc, root) {
                event.extract("displayLabel", doc.text_content(label).trim());
            }
            if stable_id(doc, root).is_none() {
                event.parent_anchor = ambiguity_anchor(doc, &event.selector, root, synthesizer);
            }
        }
    }

    fn option(
        &self,
        doc: &Document,
        el: NodeId,
        event: &mut InteractionEvent,
        synthesizer: &SelectorSynthesizer,
    ) {
        let label = doc
            .attribute(el, "data-label")
            .map(str::to_string)
            .unwrap_or_else(|| doc.text_content(el).trim().to_string());
        let list = self.list.closest(doc, el);
        let list_selector = if list.is_some() {
            SOM_LIST
        } else {
            SOM_LIST_LOOSE
        };
        event.selector = format!(
            "{} li.ui-selectonemenu-item[role='option'][data-label={}]",
            list_selector,
            quote_attr(&label)
        );
        event.extract("widget", SELECT_ONE_MENU);
        event.extract("itemLabel", label);

        let container = list.or_else(|| self.list_loose.closest(doc, el));
        if let Some(list) = list {
            let items = self.option.query_all(doc, list);
            if let Some(index) = items.iter().position(|&item| item == el) {
                event.extract("itemIndex", index.to_string());
            }
            if let Some(id) = doc.id_attr(list) {
                event.extract("listboxId", id);
            }
        }

        let panel = container.and_then(|c| self.panel.closest(doc, c));
        if let Some(panel) = panel {
            if let Some(id) = doc.id_attr(panel) {
                let combobox = id.strip_suffix("_panel").unwrap_or(id);
                event.extract("comboboxId", combobox);
            }
        }

        if let Some(container) = panel.or(container) {
            event.parent_anchor = ambiguity_anchor(doc, &event.selector, container, synthesizer);
        }
    }

    fn root(
        &self,
        doc: &Document,
        el: NodeId,
        event: &mut InteractionEvent,
        synthesizer: &SelectorSynthesizer,
    ) {
        event.selector = relative_to_root(doc, Some(el), SOM_LABEL);
        event.extract("widget", SELECT_ONE_MENU);
        if let Some(label) = self.label.query_first(doc, el) {
            event.extract("displayLabel", doc.text_content(label).trim());
        }
        if let Some(id) = doc.id_attr(el) {
            event.extract("comboboxId", id);
        }
        // The container id is not a leaf control id
        event.element_id = None;
        if stable_id(doc, el).is_none() {
            event.parent_anchor = ambiguity_anchor(doc, &event.selector, el, synthesizer);
        }
    }
}

/// `#rootId part` when the root has a stable id, otherwise the id-free
/// `root part` form
fn relative_to_root(doc: &Document, root: Option<NodeId>, part: &str) -> String {
    match root.and_then(|r| stable_id(doc, r)) {
        Some(id) => format!("#{} {}", escape_ident(id), part),
        None => format!("{} {}", SOM_ROOT, part),
    }
}

/// Page-level anchor for a widget selector that matches more than one
/// element: the nearest ancestor with a stable id, otherwise the
/// synthesized selector of the container's parent
fn ambiguity_anchor(
    doc: &Document,
    selector: &str,
    container: NodeId,
    synthesizer: &SelectorSynthesizer,
) -> Option<String> {
    let matches = SelectorList::parse(selector)
        .map(|list| list.query_all(doc, doc.root()).len())
        .unwrap_or(0);
    if matches <= 1 {
        return None;
    }
    if let Some(id) = doc
        .inclusive_ancestors(container)
        .find_map(|n| stable_id(doc, n))
    {
        return Some(format!("#{}", escape_ident(id)));
    }
    doc.parent_element(container)
        .map(|parent| synthesizer.css(doc, parent))
}
