//! HTTP service
//!
//! Exposes selector synthesis and event recording over page snapshots, for
//! drivers that keep the page in a remote browser and ship snapshots here.

use crate::clock::ManualClock;
use crate::config::RecorderConfig;
use crate::error::{RecorderError, Result};
use crate::inspect::ElementInfo;
use crate::recorder::{NativeEvent, Recorder};
use crate::selector::SelectorSynthesizer;
use crate::snapshot::{NodeTarget, PageSnapshot};
use crate::transport::MemoryTransport;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// Largest accepted request body
const MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;

/// Shared service state
#[derive(Debug, Clone, Default)]
pub struct ServiceState {
    /// Base configuration for every request
    pub config: RecorderConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorRequest {
    pub snapshot: PageSnapshot,
    pub target: NodeTarget,
    #[serde(default)]
    pub max_depth: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorResponse {
    pub css: String,
    pub xpath: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<ElementInfo>,
}

/// One native event to replay
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordStep {
    /// DOM event type
    #[serde(rename = "type")]
    pub kind: String,
    pub target: NodeTarget,
    #[serde(default)]
    pub key: Option<String>,
    /// Form value to set on the target before the event fires
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default = "default_trusted")]
    pub trusted: bool,
    /// Milliseconds elapsed since the previous step
    #[serde(default)]
    pub delay_ms: i64,
}

fn default_trusted() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRequest {
    pub snapshot: PageSnapshot,
    #[serde(default)]
    pub config: Option<RecorderConfig>,
    pub events: Vec<RecordStep>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordResponse {
    /// Envelopes in emission order
    pub envelopes: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn routes(
    state: Arc<ServiceState>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::json(&serde_json::json!({ "status": "ok" })));

    let state_filter = warp::any().map(move || state.clone());

    let selector = warp::path("selector")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(state_filter.clone())
        .and_then(handle_selector);

    let record = warp::path("record")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(state_filter)
        .and_then(handle_record);

    health.or(selector).or(record)
}

async fn handle_selector(
    req: SelectorRequest,
    state: Arc<ServiceState>,
) -> std::result::Result<impl Reply, Rejection> {
    log::debug!("Selector request for {:?}", req.target);
    Ok(respond(synthesize(&req, &state.config)))
}

async fn handle_record(
    req: RecordRequest,
    state: Arc<ServiceState>,
) -> std::result::Result<impl Reply, Rejection> {
    log::info!("Recording {} events", req.events.len());
    Ok(respond(record(req, &state.config)))
}

fn respond<T: Serialize>(result: Result<T>) -> warp::reply::WithStatus<warp::reply::Json> {
    match result {
        Ok(body) => warp::reply::with_status(warp::reply::json(&body), StatusCode::OK),
        Err(e) => {
            log::warn!("Request failed: {}", e);
            warp::reply::with_status(
                warp::reply::json(&ErrorResponse {
                    error: e.to_string(),
                }),
                StatusCode::BAD_REQUEST,
            )
        }
    }
}

/// Selectors and inspector data for one node of a snapshot
pub fn synthesize(req: &SelectorRequest, base: &RecorderConfig) -> Result<SelectorResponse> {
    let page = req.snapshot.load()?;
    let node = req.target.resolve(&page)?;
    let mut options = base.selector_options();
    if let Some(depth) = req.max_depth {
        options.max_depth = depth;
    }
    let synthesizer = SelectorSynthesizer::new(options)?;
    let selector = synthesizer.synthesize(&page.document, node);
    Ok(SelectorResponse {
        css: selector.css,
        xpath: selector.xpath,
        element: crate::inspect::inspect(&page.document, node, &synthesizer),
    })
}

/// Replay native events through a fresh recorder on a manual clock
pub fn record(req: RecordRequest, base: &RecorderConfig) -> Result<RecordResponse> {
    let mut page = req.snapshot.load()?;
    let targets = req
        .events
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let target = step.target.resolve(&page)?;
            if step.value.is_some() && !page.document.is_element(target) {
                return Err(RecorderError::Snapshot(format!(
                    "step {} sets a value on a non-element node",
                    i
                )));
            }
            Ok(target)
        })
        .collect::<Result<Vec<_>>>()?;

    let config = req.config.unwrap_or_else(|| base.clone());
    let transport = MemoryTransport::new();
    let clock = ManualClock::new(0);
    let mut recorder = Recorder::with_clock(config, transport.clone(), Arc::new(clock.clone()))?;
    recorder.attach(&mut page.document);

    for (step, target) in req.events.iter().zip(targets) {
        clock.advance(step.delay_ms.max(0));
        if let Some(value) = &step.value {
            page.document.set_value(target, value)?;
        }
        let mut event = NativeEvent::new(&step.kind, target);
        event.key = step.key.clone();
        event.is_trusted = step.trusted;
        recorder.dispatch(&page.document, &event);
        recorder.pump(&mut page.document);
    }

    Ok(RecordResponse {
        envelopes: transport.take(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot() -> serde_json::Value {
        json!({
            "tag": "html",
            "children": [{"tag": "body", "children": [
                {"tag": "button", "attributes": {"id": "save-btn"}, "children": [{"text": "Save"}]},
                {"tag": "input", "attributes": {"name": "q"}}
            ]}]
        })
    }

    #[test]
    fn test_synthesize_by_path() {
        let req: SelectorRequest = serde_json::from_value(json!({
            "snapshot": snapshot(),
            "target": {"path": [0, 0, 1]}
        }))
        .unwrap();
        let response = synthesize(&req, &RecorderConfig::default()).unwrap();
        assert_eq!(response.css, "html > body > input[name='q']");
        assert_eq!(response.xpath, "/html[1]/body[1]/input[1]");
        assert_eq!(response.element.unwrap().tag, "input");
    }

    #[test]
    fn test_record_filters_and_dedupes() {
        let req: RecordRequest = serde_json::from_value(json!({
            "snapshot": snapshot(),
            "events": [
                {"type": "click", "target": {"selector": "#save-btn"}},
                {"type": "click", "target": {"selector": "#save-btn"}, "delayMs": 20},
                {"type": "click", "target": {"selector": "#save-btn"}, "trusted": false, "delayMs": 500},
                {"type": "input", "target": {"selector": "input"}, "value": "abc", "delayMs": 500}
            ]
        }))
        .unwrap();
        let response = record(req, &RecorderConfig::default()).unwrap();
        let recorded: Vec<_> = response
            .envelopes
            .iter()
            .filter(|e| e["type"] == "recording-event")
            .collect();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0]["events"][0]["selector"], "#save-btn");
        assert_eq!(recorded[1]["events"][0]["value"], "abc");
    }

    #[test]
    fn test_value_on_text_node_is_rejected_up_front() {
        let req: RecordRequest = serde_json::from_value(json!({
            "snapshot": snapshot(),
            "events": [
                {"type": "click", "target": {"selector": "#save-btn"}},
                {"type": "input", "target": {"path": [0, 0, 0, 0]}, "value": "x"}
            ]
        }))
        .unwrap();
        let err = record(req, &RecorderConfig::default()).unwrap_err();
        assert!(err.to_string().contains("step 1"), "{}", err);
    }

    #[test]
    fn test_unknown_target_is_an_error() {
        let req: RecordRequest = serde_json::from_value(json!({
            "snapshot": snapshot(),
            "events": [{"type": "click", "target": {"selector": "#missing"}}]
        }))
        .unwrap();
        assert!(record(req, &RecorderConfig::default()).is_err());
    }
}
