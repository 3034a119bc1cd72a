//! Growl notification scraping
//!
//! Notification containers are picked up from the DOM once each; hosts that
//! see notifications through the framework can push them directly. The same
//! `(type, title, message)` is only reported once within the TTL.

use crate::dom::{Document, NodeId};
use crate::error::Result;
use crate::selector::SelectorList;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

const CONTAINER: &str = ".ui-growl-item-container";
const TITLE: &str = ".ui-growl-title";
const MESSAGE_PARAGRAPH: &str = ".ui-growl-message > p";
const MESSAGE: &str = ".ui-growl-message";
const RECENT_LIMIT: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warn,
    Error,
    Fatal,
}

impl Severity {
    /// Lenient mapping; unknown values are informational
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "warn" | "warning" => Severity::Warn,
            "error" => Severity::Error,
            "fatal" => Severity::Fatal,
            _ => Severity::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    /// Severity from a container's `ui-growl-*` class
    fn from_container(doc: &Document, container: NodeId) -> Self {
        [
            ("ui-growl-warn", Severity::Warn),
            ("ui-growl-error", Severity::Error),
            ("ui-growl-fatal", Severity::Fatal),
        ]
        .into_iter()
        .find(|(class, _)| doc.has_class(container, class))
        .map(|(_, severity)| severity)
        .unwrap_or(Severity::Info)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub timestamp: i64,
}

impl Notification {
    fn key(&self) -> String {
        format!("{}|{}|{}", self.severity.as_str(), self.title, self.message)
    }
}

pub struct NotificationScraper {
    ttl_ms: i64,
    seen: HashSet<NodeId>,
    recent: VecDeque<(String, i64)>,
    container: SelectorList,
    title: SelectorList,
    message_paragraph: SelectorList,
    message: SelectorList,
}

impl NotificationScraper {
    pub fn new(ttl_ms: u64) -> Result<Self> {
        Ok(Self {
            ttl_ms: i64::try_from(ttl_ms).unwrap_or(i64::MAX),
            seen: HashSet::new(),
            recent: VecDeque::new(),
            container: SelectorList::parse(CONTAINER)?,
            title: SelectorList::parse(TITLE)?,
            message_paragraph: SelectorList::parse(MESSAGE_PARAGRAPH)?,
            message: SelectorList::parse(MESSAGE)?,
        })
    }

    /// Report containers not seen before. Containers that left the document
    /// are forgotten.
    pub fn scan(&mut self, doc: &Document, now_ms: i64) -> Vec<Notification> {
        self.seen.retain(|&c| doc.is_connected(c));
        let fresh: Vec<NodeId> = self
            .container
            .query_all(doc, doc.root())
            .into_iter()
            .filter(|&c| self.seen.insert(c))
            .collect();

        fresh
            .into_iter()
            .filter_map(|container| {
                let notification = self.read(doc, container, now_ms);
                self.admit(notification)
            })
            .collect()
    }

    /// Number of containers currently remembered as reported
    pub fn tracked(&self) -> usize {
        self.seen.len()
    }

    /// Report a notification the host observed directly
    pub fn push(
        &mut self,
        severity: &str,
        title: &str,
        message: &str,
        now_ms: i64,
    ) -> Option<Notification> {
        self.admit(Notification {
            severity: Severity::parse(severity),
            title: title.trim().to_string(),
            message: message.trim().to_string(),
            timestamp: now_ms,
        })
    }

    fn read(&self, doc: &Document, container: NodeId, now_ms: i64) -> Notification {
        let text = |node: Option<NodeId>| {
            node.map(|n| doc.text_content(n).trim().to_string())
                .unwrap_or_default()
        };
        let message = self
            .message_paragraph
            .query_first(doc, container)
            .or_else(|| self.message.query_first(doc, container));
        Notification {
            severity: Severity::from_container(doc, container),
            title: text(self.title.query_first(doc, container)),
            message: text(message),
            timestamp: now_ms,
        }
    }

    fn admit(&mut self, notification: Notification) -> Option<Notification> {
        let now = notification.timestamp;
        self.recent.retain(|(_, at)| now.saturating_sub(*at) <= self.ttl_ms);
        let key = notification.key();
        if self.recent.iter().any(|(k, _)| *k == key) {
            return None;
        }
        self.recent.push_back((key, now));
        if self.recent.len() > RECENT_LIMIT {
            self.recent.pop_front();
        }
        Some(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn growl(doc: &mut Document, severity_class: &str, title: &str, message: &str) -> NodeId {
        let body = doc.body().unwrap();
        let container = doc.create_element("div");
        doc.append_child(body, container).unwrap();
        doc.set_attribute(
            container,
            "class",
            &format!("ui-growl-item-container ui-state-highlight {}", severity_class),
        )
        .unwrap();
        let title_el = doc.create_element("span");
        doc.append_child(container, title_el).unwrap();
        doc.set_attribute(title_el, "class", "ui-growl-title").unwrap();
        doc.set_text_content(title_el, title).unwrap();
        let message_el = doc.create_element("div");
        doc.append_child(container, message_el).unwrap();
        doc.set_attribute(message_el, "class", "ui-growl-message").unwrap();
        let p = doc.create_element("p");
        doc.append_child(message_el, p).unwrap();
        doc.set_text_content(p, message).unwrap();
        container
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(Severity::parse("warning"), Severity::Warn);
        assert_eq!(Severity::parse("ERROR"), Severity::Error);
        assert_eq!(Severity::parse("fatal"), Severity::Fatal);
        assert_eq!(Severity::parse("whatever"), Severity::Info);
        assert_eq!(serde_json::to_string(&Severity::Warn).unwrap(), "\"WARN\"");
    }

    #[test]
    fn test_scan_reads_each_container_once() {
        let mut doc = Document::with_body();
        growl(&mut doc, "ui-growl-error", " Saved failed ", "Disk full");
        let mut scraper = NotificationScraper::new(2_000).unwrap();

        let found = scraper.scan(&doc, 0);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Severity::Error);
        assert_eq!(found[0].title, "Saved failed");
        assert_eq!(found[0].message, "Disk full");

        assert!(scraper.scan(&doc, 5_000).is_empty());
    }

    #[test]
    fn test_removed_containers_are_forgotten() {
        let mut doc = Document::with_body();
        let mut scraper = NotificationScraper::new(2_000).unwrap();
        let first = growl(&mut doc, "ui-growl-info", "One", "a");
        let second = growl(&mut doc, "ui-growl-info", "Two", "b");
        assert_eq!(scraper.scan(&doc, 0).len(), 2);
        assert_eq!(scraper.tracked(), 2);

        doc.remove(first).unwrap();
        doc.remove(second).unwrap();
        assert!(scraper.scan(&doc, 100).is_empty());
        assert_eq!(scraper.tracked(), 0);
    }

    #[test]
    fn test_duplicates_suppressed_within_ttl() {
        let mut doc = Document::with_body();
        let mut scraper = NotificationScraper::new(2_000).unwrap();
        growl(&mut doc, "ui-growl-info", "Hi", "There");
        assert_eq!(scraper.scan(&doc, 0).len(), 1);

        growl(&mut doc, "ui-growl-info", "Hi", "There");
        assert!(scraper.scan(&doc, 1_000).is_empty());

        growl(&mut doc, "ui-growl-info", "Hi", "There");
        assert_eq!(scraper.scan(&doc, 3_500).len(), 1);
    }

    #[test]
    fn test_push_shares_dedupe() {
        let mut scraper = NotificationScraper::new(2_000).unwrap();
        let first = scraper.push("warn", "Session", "Expires soon", 10).unwrap();
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::json!({"type": "WARN", "title": "Session", "message": "Expires soon", "timestamp": 10})
        );
        assert!(scraper.push("warning", "Session", "Expires soon", 20).is_none());
    }
}
