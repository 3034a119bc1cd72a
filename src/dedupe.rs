//! Duplicate suppression for native events

use crate::event::InteractionEvent;
use sha2::{Digest, Sha256};

/// Suppresses an event whose signature equals the immediately preceding one
/// within a short window
#[derive(Debug, Clone)]
pub struct DedupeWindow {
    window_ms: i64,
    last: Option<(String, i64)>,
}

impl DedupeWindow {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms: i64::try_from(window_ms).unwrap_or(i64::MAX),
            last: None,
        }
    }

    /// SHA-256 hex digest over the signature fields
    pub fn signature(event: &InteractionEvent) -> String {
        let mut hasher = Sha256::new();
        for field in event.signature_fields() {
            hasher.update(field.as_bytes());
            hasher.update([0x1f]);
        }
        format!("{:x}", hasher.finalize())
    }

    /// Whether the event should be emitted; remembers it when it is
    pub fn admit(&mut self, event: &InteractionEvent, now_ms: i64) -> bool {
        let signature = Self::signature(event);
        if let Some((last, at)) = &self.last {
            if *last == signature && now_ms - at < self.window_ms {
                return false;
            }
        }
        self.last = Some((signature, now_ms));
        true
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Action;

    fn click(selector: &str) -> InteractionEvent {
        let mut event = InteractionEvent::new(Action::Click);
        event.selector = selector.to_string();
        event
    }

    #[test]
    fn test_duplicate_within_window_is_dropped() {
        let mut window = DedupeWindow::new(100);
        assert!(window.admit(&click("#a"), 1_000));
        assert!(!window.admit(&click("#a"), 1_050));
        assert!(window.admit(&click("#a"), 1_150));
    }

    #[test]
    fn test_only_immediately_preceding_counts() {
        let mut window = DedupeWindow::new(100);
        assert!(window.admit(&click("#a"), 0));
        assert!(window.admit(&click("#b"), 10));
        assert!(window.admit(&click("#a"), 20));
    }

    #[test]
    fn test_parent_anchor_is_part_of_signature() {
        let mut anchored = click(".trigger");
        anchored.parent_anchor = Some("#billing".to_string());
        assert_ne!(
            DedupeWindow::signature(&anchored),
            DedupeWindow::signature(&click(".trigger"))
        );
        assert_eq!(DedupeWindow::signature(&anchored).len(), 64);
    }

    #[test]
    fn test_field_boundaries_are_distinct() {
        let mut a = click("ab");
        a.element_id = Some("c".to_string());
        let mut b = click("a");
        b.element_id = Some("bc".to_string());
        assert_ne!(DedupeWindow::signature(&a), DedupeWindow::signature(&b));
    }
}
