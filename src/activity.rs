//! Page activity timeline
//!
//! Tracks what a driver needs to decide whether the page has settled: the
//! last driver action, in-flight requests, the framework's AJAX queue depth
//! and page lifecycle milestones. The host reports requests and milestones
//! explicitly.

use crate::clock::Clock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityState {
    pub action_seq: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_action_ts: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_change_ts: Option<i64>,

    pub inflight_xhr: u32,

    pub inflight_fetch: u32,

    pub ajax_queue_depth: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_dom_content_loaded: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_load: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Xhr,
    Fetch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PageMilestone {
    DomContentLoaded,
    Load,
}

/// Owns the activity state; every change returns the state to emit
pub struct ActivityMonitor {
    clock: Arc<dyn Clock>,
    state: ActivityState,
}

impl ActivityMonitor {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: ActivityState::default(),
        }
    }

    pub fn state(&self) -> &ActivityState {
        &self.state
    }

    /// Correlate a driver action: use `seq` when given, otherwise increment
    pub fn mark_action(&mut self, seq: Option<u64>) -> ActivityState {
        self.state.action_seq = seq.unwrap_or_else(|| self.state.action_seq.wrapping_add(1));
        self.state.last_action_ts = Some(self.clock.now_ms());
        self.changed()
    }

    pub fn request_started(&mut self, kind: RequestKind) -> ActivityState {
        let counter = self.inflight(kind);
        *counter = counter.saturating_add(1);
        self.changed()
    }

    /// Finishing a request never drives the counter below zero
    pub fn request_finished(&mut self, kind: RequestKind) -> ActivityState {
        let counter = self.inflight(kind);
        *counter = counter.saturating_sub(1);
        self.changed()
    }

    /// Only an actual change of depth is reported
    pub fn set_ajax_queue_depth(&mut self, depth: u32) -> Option<ActivityState> {
        if self.state.ajax_queue_depth == depth {
            return None;
        }
        self.state.ajax_queue_depth = depth;
        Some(self.changed())
    }

    pub fn milestone(&mut self, milestone: PageMilestone) -> ActivityState {
        let now = Some(self.clock.now_ms());
        match milestone {
            PageMilestone::DomContentLoaded => self.state.last_dom_content_loaded = now,
            PageMilestone::Load => self.state.last_load = now,
        }
        self.changed()
    }

    /// Structural DOM churn observed
    pub fn dom_churn(&mut self) -> ActivityState {
        self.changed()
    }

    fn inflight(&mut self, kind: RequestKind) -> &mut u32 {
        match kind {
            RequestKind::Xhr => &mut self.state.inflight_xhr,
            RequestKind::Fetch => &mut self.state.inflight_fetch,
        }
    }

    fn changed(&mut self) -> ActivityState {
        self.state.last_change_ts = Some(self.clock.now_ms());
        self.state.clone()
    }
}
