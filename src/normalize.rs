//! Event normalization
//!
//! Combines the synthesizer, the widget catalog and the extractor pipeline into
//! one canonical [`InteractionEvent`] per user action. Building is read-only
//! with respect to the document, so identical input gives identical output.

use crate::dom::{Document, NodeId};
use crate::error::Result;
use crate::event::{Action, InteractionEvent};
use crate::extract::{classes_of, ExtractorPipeline};
use crate::selector::{absolute_xpath, SelectorSynthesizer};
use crate::widgets::WidgetCatalog;

pub struct EventNormalizer {
    synthesizer: SelectorSynthesizer,
    widgets: WidgetCatalog,
    extractors: ExtractorPipeline,
}

impl EventNormalizer {
    pub fn new(synthesizer: SelectorSynthesizer) -> Result<Self> {
        Ok(Self {
            synthesizer,
            widgets: WidgetCatalog::new()?,
            extractors: ExtractorPipeline::new()?,
        })
    }

    pub fn synthesizer(&self) -> &SelectorSynthesizer {
        &self.synthesizer
    }

    /// Build the sanitized event for a resolved element
    ///
    /// `key` is only kept for `keydown`; the value of input actions is read
    /// from the element's current form value.
    pub fn build_event(
        &self,
        doc: &Document,
        el: NodeId,
        raw_type: &str,
        key: Option<&str>,
    ) -> InteractionEvent {
        let mut event = InteractionEvent::new(Action::from_event_type(raw_type));
        match event.action {
            Action::Input => event.value = doc.value(el).map(str::to_string),
            Action::Press => event.key = key.map(str::to_string),
            Action::Click => {}
        }

        event.element_id = doc.id_attr(el).map(str::to_string);
        event.classes = classes_of(doc, el);
        event.xpath = Some(absolute_xpath(doc, el));

        if !self.widgets.apply(doc, el, &mut event, &self.synthesizer) {
            event.selector = self.synthesizer.css(doc, el);
        }
        self.extractors.run(doc, el, &mut event);

        event.sanitize();
        event
    }
}
