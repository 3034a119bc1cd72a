//! Recorder context and host control surface
//!
//! The [`Recorder`] owns every piece of recording state. The host drives it:
//! it delivers native events through [`Recorder::dispatch`], calls
//! [`Recorder::pump`] after the document changed, and toggles capture and
//! mutation observation. Nothing in here returns an error to the host; failures
//! are logged and the affected event is dropped.

use crate::activity::{ActivityMonitor, ActivityState, PageMilestone, RequestKind};
use crate::clock::{Clock, SystemClock};
use crate::config::RecorderConfig;
use crate::dedupe::DedupeWindow;
use crate::dom::{Document, MutationRecord, NodeId, ObserveOptions, ObserverId};
use crate::error::Result;
use crate::event::{Envelope, InteractionEvent};
use crate::inspect::{inspect, ElementInfo};
use crate::normalize::EventNormalizer;
use crate::notifications::NotificationScraper;
use crate::resolve::InteractiveResolver;
use crate::selector::{SelectorSynthesizer, SynthesizedSelector};
use crate::transport::Transport;
use crate::watcher::MutationWatcher;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Event types the recorder listens for
pub const LISTENED_EVENTS: [&str; 4] = ["click", "input", "change", "keydown"];

/// A native DOM event as delivered by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeEvent {
    /// DOM event type (`click`, `input`, `change`, `keydown`, ...)
    pub kind: String,

    /// Raw event target
    pub target: NodeId,

    /// `KeyboardEvent.key` for keyboard events
    pub key: Option<String>,

    /// Whether the user agent (not a script) produced the event
    pub is_trusted: bool,
}

impl NativeEvent {
    pub fn new(kind: &str, target: NodeId) -> Self {
        Self {
            kind: kind.to_string(),
            target,
            key: None,
            is_trusted: true,
        }
    }

    pub fn click(target: NodeId) -> Self {
        Self::new("click", target)
    }

    pub fn input(target: NodeId) -> Self {
        Self::new("input", target)
    }

    pub fn keydown(target: NodeId, key: &str) -> Self {
        Self {
            key: Some(key.to_string()),
            ..Self::new("keydown", target)
        }
    }

    /// Mark as script-dispatched
    pub fn untrusted(mut self) -> Self {
        self.is_trusted = false;
        self
    }
}

/// Host-reported page signal for the activity timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "camelCase")]
pub enum ActivitySignal {
    RequestStarted { kind: RequestKind },
    RequestFinished { kind: RequestKind },
    AjaxQueueDepth { depth: u32 },
    Milestone { milestone: PageMilestone },
}

/// Elements that currently have interaction listeners attached
#[derive(Debug, Default)]
struct ListenerRegistry {
    bound: HashSet<NodeId>,
}

impl ListenerRegistry {
    /// Drop every registration and bind the current interactive set
    fn rebind(&mut self, doc: &Document, resolver: &InteractiveResolver) {
        self.bound.clear();
        self.bound.extend(resolver.interactive_in(doc, doc.root()));
        debug!("Bound listeners on {} elements", self.bound.len());
    }

    fn clear(&mut self) {
        self.bound.clear();
    }
}

pub struct Recorder {
    config: RecorderConfig,
    clock: Arc<dyn Clock>,
    transport: Box<dyn Transport>,
    resolver: InteractiveResolver,
    normalizer: EventNormalizer,
    dedupe: DedupeWindow,
    listeners: ListenerRegistry,
    capturing: bool,
    document_listener: bool,
    rebind_observer: Option<ObserverId>,
    watcher: MutationWatcher,
    activity: ActivityMonitor,
    notifications: NotificationScraper,
    replay_in_progress: bool,
}

impl Recorder {
    pub fn new(config: RecorderConfig, transport: impl Transport + 'static) -> Result<Self> {
        Self::with_clock(config, transport, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: RecorderConfig,
        transport: impl Transport + 'static,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let synthesizer = SelectorSynthesizer::new(config.selector_options())?;
        Ok(Self {
            resolver: InteractiveResolver::new()?,
            normalizer: EventNormalizer::new(synthesizer.clone())?,
            dedupe: DedupeWindow::new(config.dedupe_window_ms),
            listeners: ListenerRegistry::default(),
            capturing: false,
            document_listener: false,
            rebind_observer: None,
            watcher: MutationWatcher::new(synthesizer),
            activity: ActivityMonitor::new(clock.clone()),
            notifications: NotificationScraper::new(config.notification_ttl_ms)?,
            replay_in_progress: false,
            transport: Box::new(transport),
            clock,
            config,
        })
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Apply the configured start state to a document and report the
    /// initial activity state
    pub fn attach(&mut self, doc: &mut Document) {
        if self.config.capture_on_start {
            self.enable_capture(doc);
        }
        if self.config.observe_mutations {
            self.enable_mutations(doc);
        }
        if self.config.scrape_notifications {
            self.scan_notifications(doc);
        }
        let state = self.activity.dom_churn();
        self.send(Envelope::Activity { data: state });
        info!("Recorder attached");
    }

    // ===== CONTROL SURFACE =====

    /// Start interaction capture. Calling it again re-registers from scratch.
    pub fn enable_capture(&mut self, doc: &mut Document) {
        self.disable_capture(doc);
        self.listeners.rebind(doc, &self.resolver);
        self.document_listener = self.config.document_capture;

        let root = doc.document_element().unwrap_or_else(|| doc.root());
        match doc.observe(root, ObserveOptions::child_list_subtree()) {
            Ok(id) => self.rebind_observer = Some(id),
            Err(e) => warn!("Rebind observer not started: {}", e),
        }
        self.capturing = true;
        info!("Interaction capture enabled");
    }

    pub fn disable_capture(&mut self, doc: &mut Document) {
        if let Some(id) = self.rebind_observer.take() {
            doc.disconnect(id);
        }
        self.listeners.clear();
        self.document_listener = false;
        if self.capturing {
            self.capturing = false;
            info!("Interaction capture disabled");
        }
    }

    pub fn enable_mutations(&mut self, doc: &mut Document) {
        if let Err(e) = self.watcher.start(doc) {
            warn!("Mutation watcher not started: {}", e);
        }
    }

    pub fn disable_mutations(&mut self, doc: &mut Document) {
        self.watcher.stop(doc);
    }

    /// While set, every native event is ignored
    pub fn set_replay_in_progress(&mut self, in_progress: bool) {
        if self.replay_in_progress != in_progress {
            info!("Replay in progress: {}", in_progress);
        }
        self.replay_in_progress = in_progress;
    }

    /// The host replaced part of the DOM; attach listeners to new nodes
    pub fn notify_rerender(&mut self, doc: &Document) {
        if self.capturing {
            self.listeners.rebind(doc, &self.resolver);
        }
    }

    /// Correlate a driver-initiated action with the activity timeline
    pub fn mark_external_action(&mut self, seq: Option<u64>) -> u64 {
        let state = self.activity.mark_action(seq);
        let seq = state.action_seq;
        self.send(Envelope::Activity { data: state });
        seq
    }

    pub fn report_activity(&mut self, signal: ActivitySignal) {
        let state = match signal {
            ActivitySignal::RequestStarted { kind } => Some(self.activity.request_started(kind)),
            ActivitySignal::RequestFinished { kind } => Some(self.activity.request_finished(kind)),
            ActivitySignal::AjaxQueueDepth { depth } => self.activity.set_ajax_queue_depth(depth),
            ActivitySignal::Milestone { milestone } => Some(self.activity.milestone(milestone)),
        };
        if let Some(state) = state {
            self.send(Envelope::Activity { data: state });
        }
    }

    /// Report a notification the host saw through the UI framework
    pub fn push_notification(&mut self, severity: &str, title: &str, message: &str) {
        let now = self.clock.now_ms();
        if let Some(notification) = self.notifications.push(severity, title, message, now) {
            self.send(Envelope::Growl { data: notification });
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    pub fn is_observing_mutations(&self) -> bool {
        self.watcher.is_active()
    }

    pub fn is_bound(&self, node: NodeId) -> bool {
        self.listeners.bound.contains(&node)
    }

    pub fn activity(&self) -> &ActivityState {
        self.activity.state()
    }

    // ===== EVENTS =====

    /// Deliver a native event. Every listener on the capture path fires
    /// (bound elements, then the document); the dedupe window absorbs the
    /// repeats. Returns the number of emitted interaction events.
    pub fn dispatch(&mut self, doc: &Document, event: &NativeEvent) -> usize {
        if self.replay_in_progress || !self.capturing {
            return 0;
        }
        if !event.is_trusted {
            debug!("Ignoring untrusted {} on {}", event.kind, event.target);
            return 0;
        }
        if !LISTENED_EVENTS.contains(&event.kind.as_str()) {
            return 0;
        }
        if !doc.contains_node(event.target) {
            warn!("Dropping {}: unknown target {}", event.kind, event.target);
            return 0;
        }

        let mut listeners = doc
            .inclusive_ancestors(event.target)
            .filter(|node| self.listeners.bound.contains(node))
            .count();
        if self.document_listener && doc.is_connected(event.target) {
            listeners += 1;
        }

        let mut emitted = 0;
        for _ in 0..listeners {
            if let Some(recorded) = self.on_event(doc, event) {
                self.send(Envelope::Recording {
                    events: vec![recorded],
                });
                emitted += 1;
            }
        }
        emitted
    }

    fn on_event(&mut self, doc: &Document, event: &NativeEvent) -> Option<InteractionEvent> {
        let element = self.resolver.resolve(doc, event.target);
        let recorded =
            self.normalizer
                .build_event(doc, element, &event.kind, event.key.as_deref());
        if !self.dedupe.admit(&recorded, self.clock.now_ms()) {
            debug!("Suppressed duplicate {} on {}", event.kind, recorded.selector);
            return None;
        }
        debug!("Recorded {} on {}", recorded.action.as_str(), recorded.selector);
        Some(recorded)
    }

    /// Drain pending observer records: rebind listeners after additions,
    /// emit mutation events, record churn and scan for notifications.
    /// Returns the number of envelopes sent.
    pub fn pump(&mut self, doc: &mut Document) -> usize {
        let mut sent = 0;
        let mut rebind = false;
        let mut churn = false;

        if let Some(id) = self.rebind_observer {
            for record in doc.take_records(id) {
                if let MutationRecord::ChildList { added, removed, .. } = record {
                    rebind |= !added.is_empty();
                    churn |= !added.is_empty() || !removed.is_empty();
                }
            }
        }

        let batch = self.watcher.drain(doc);
        rebind |= batch.rebind;
        churn |= batch.churn;
        if !batch.events.is_empty() {
            self.send(Envelope::Mutation {
                events: batch.events,
            });
            sent += 1;
        }

        if rebind && self.capturing {
            self.listeners.rebind(doc, &self.resolver);
        }
        if churn {
            let state = self.activity.dom_churn();
            self.send(Envelope::Activity { data: state });
            sent += 1;
        }
        if self.config.scrape_notifications {
            sent += self.scan_notifications(doc);
        }
        sent
    }

    fn scan_notifications(&mut self, doc: &Document) -> usize {
        let found = self.notifications.scan(doc, self.clock.now_ms());
        let count = found.len();
        for notification in found {
            self.send(Envelope::Growl { data: notification });
        }
        count
    }

    // ===== HELPERS =====

    pub fn synthesize(&self, doc: &Document, node: NodeId) -> SynthesizedSelector {
        self.normalizer.synthesizer().synthesize(doc, node)
    }

    pub fn inspect(&self, doc: &Document, node: NodeId) -> Option<ElementInfo> {
        inspect(doc, node, self.normalizer.synthesizer())
    }

    fn send(&mut self, envelope: Envelope) {
        let kind = envelope.kind();
        let payload = match envelope.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Dropping {}: {}", kind, e);
                return;
            }
        };
        if let Err(e) = self.transport.send(payload) {
            warn!("Dropping {}: send failed: {}", kind, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::transport::MemoryTransport;
    use serde_json::Value;

    fn recorder(config: RecorderConfig) -> (Recorder, MemoryTransport, ManualClock) {
        let transport = MemoryTransport::new();
        let clock = ManualClock::new(1_000);
        let recorder =
            Recorder::with_clock(config, transport.clone(), Arc::new(clock.clone())).unwrap();
        (recorder, transport, clock)
    }

    fn of_type<'a>(payloads: &'a [Value], kind: &str) -> Vec<&'a Value> {
        payloads.iter().filter(|p| p["type"] == kind).collect()
    }

    fn page() -> (Document, NodeId) {
        let mut doc = Document::with_body();
        let body = doc.body().unwrap();
        let button = doc.create_element("button");
        doc.append_child(body, button).unwrap();
        doc.set_attribute(button, "id", "go").unwrap();
        (doc, button)
    }

    #[test]
    fn test_capture_path_duplicates_are_absorbed() {
        let (mut doc, button) = page();
        let (mut rec, transport, _) = recorder(RecorderConfig::default());
        rec.enable_capture(&mut doc);
        assert!(rec.is_bound(button));

        assert_eq!(rec.dispatch(&doc, &NativeEvent::click(button)), 1);
        let sent = transport.take();
        assert_eq!(of_type(&sent, "recording-event").len(), 1);
    }

    #[test]
    fn test_enable_twice_does_not_double_register() {
        let (mut doc, button) = page();
        let (mut rec, _, _) = recorder(RecorderConfig {
            dedupe_window_ms: 0,
            document_capture: false,
            ..Default::default()
        });
        rec.enable_capture(&mut doc);
        rec.enable_capture(&mut doc);
        assert_eq!(rec.dispatch(&doc, &NativeEvent::click(button)), 1);
    }

    #[test]
    fn test_disabled_and_replay_states_emit_nothing() {
        let (mut doc, button) = page();
        let (mut rec, transport, _) = recorder(RecorderConfig::default());
        assert_eq!(rec.dispatch(&doc, &NativeEvent::click(button)), 0);

        rec.enable_capture(&mut doc);
        rec.set_replay_in_progress(true);
        assert_eq!(rec.dispatch(&doc, &NativeEvent::click(button)), 0);
        rec.set_replay_in_progress(false);

        rec.disable_capture(&mut doc);
        rec.disable_capture(&mut doc);
        assert_eq!(rec.dispatch(&doc, &NativeEvent::click(button)), 0);
        assert!(transport.is_empty());
    }

    #[test]
    fn test_unlistened_event_types_are_ignored() {
        let (mut doc, button) = page();
        let (mut rec, _, _) = recorder(RecorderConfig::default());
        rec.enable_capture(&mut doc);
        assert_eq!(rec.dispatch(&doc, &NativeEvent::new("mouseover", button)), 0);
    }

    #[test]
    fn test_mark_external_action_emits_activity() {
        let (mut rec, transport, clock) = recorder(RecorderConfig::default());
        assert_eq!(rec.mark_external_action(None), 1);
        clock.advance(10);
        assert_eq!(rec.mark_external_action(Some(7)), 7);

        let sent = transport.take();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1]["type"], "activity-event");
        assert_eq!(sent[1]["data"]["actionSeq"], 7);
        assert_eq!(sent[1]["data"]["lastActionTs"], 1_010);
    }

    #[test]
    fn test_failing_transport_does_not_break_recording() {
        let (mut doc, button) = page();
        let mut rec = Recorder::new(RecorderConfig::default(), |_payload: Value| -> anyhow::Result<()> {
            anyhow::bail!("channel closed")
        })
        .unwrap();
        rec.enable_capture(&mut doc);
        assert_eq!(rec.dispatch(&doc, &NativeEvent::click(button)), 1);
    }

    #[test]
    fn test_pump_emits_mutations_and_growls() {
        let (mut doc, _) = page();
        let body = doc.body().unwrap();
        let (mut rec, transport, _) = recorder(RecorderConfig {
            observe_mutations: true,
            ..Default::default()
        });
        rec.attach(&mut doc);
        transport.take();

        let growl = doc.create_element("div");
        doc.set_attribute(growl, "class", "ui-growl-item-container ui-growl-warn")
            .unwrap();
        doc.append_child(body, growl).unwrap();

        assert_eq!(rec.pump(&mut doc), 3);
        let sent = transport.take();
        assert_eq!(of_type(&sent, "mutation-event").len(), 1);
        assert_eq!(of_type(&sent, "activity-event").len(), 1);
        let growls = of_type(&sent, "growl-event");
        assert_eq!(growls[0]["data"]["type"], "WARN");

        assert_eq!(rec.pump(&mut doc), 0);
    }

    #[test]
    fn test_activity_signals() {
        let (mut rec, transport, _) = recorder(RecorderConfig::default());
        rec.report_activity(ActivitySignal::RequestStarted {
            kind: RequestKind::Xhr,
        });
        rec.report_activity(ActivitySignal::AjaxQueueDepth { depth: 0 });
        rec.report_activity(ActivitySignal::AjaxQueueDepth { depth: 1 });
        assert_eq!(rec.activity().inflight_xhr, 1);
        assert_eq!(transport.take().len(), 2);
    }
}
