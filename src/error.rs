use crate::dom::NodeId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid XPath '{expression}': {reason}")]
    InvalidXPath { expression: String, reason: String },

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Hierarchy error: {0}")]
    Hierarchy(String),

    #[error("Observer could not start: {0}")]
    ObserverStart(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RecorderError>;
