//! Recorder configuration

use crate::error::{RecorderError, Result};
use crate::selector::SelectorOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Recorder settings. Every field has a default, so a config file only
/// needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecorderConfig {
    /// Maximum pieces in an un-anchored CSS chain
    pub max_depth: usize,

    /// Anchor CSS chains on the nearest ancestor with a stable id
    pub anchor_on_ancestor_id: bool,

    /// Window in which an identical consecutive event is dropped
    pub dedupe_window_ms: u64,

    /// Also listen at the document level, in addition to bound elements
    pub document_capture: bool,

    /// Start capturing interactions when the recorder attaches to a document
    pub capture_on_start: bool,

    /// Emit mutation events (independent from interaction capture)
    pub observe_mutations: bool,

    /// Scan for growl notifications on every pump
    pub scrape_notifications: bool,

    /// Identical notifications within this window are reported once
    pub notification_ttl_ms: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            max_depth: 4,
            anchor_on_ancestor_id: true,
            dedupe_window_ms: 100,
            document_capture: true,
            capture_on_start: true,
            observe_mutations: false,
            scrape_notifications: true,
            notification_ttl_ms: 2_000,
        }
    }
}

impl RecorderConfig {
    pub fn selector_options(&self) -> SelectorOptions {
        SelectorOptions {
            max_depth: self.max_depth,
            anchor_on_ancestor_id: self.anchor_on_ancestor_id,
        }
    }

    /// `<config dir>/dom-recorder/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dom-recorder").join("config.json"))
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            RecorderError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
            .map_err(|e| RecorderError::Config(format!("Invalid {}: {}", path.display(), e)))
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Load from `path`, or from the default location when it exists,
    /// otherwise fall back to defaults
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path).await;
        }
        match Self::default_path() {
            Some(path) if tokio::fs::try_exists(&path).await.unwrap_or(false) => {
                Self::from_file(&path).await
            }
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = RecorderConfig::from_json(r#"{"maxDepth": 6, "observeMutations": true}"#).unwrap();
        assert_eq!(config.max_depth, 6);
        assert!(config.observe_mutations);
        assert_eq!(config.dedupe_window_ms, 100);
        assert!(config.document_capture);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(
            RecorderConfig::from_json("{\"maxDepth\": \"deep\"}"),
            Err(RecorderError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_from_file_round_trip() {
        let path = std::env::temp_dir().join(format!("dom-recorder-config-{}.json", std::process::id()));
        let config = RecorderConfig {
            dedupe_window_ms: 250,
            ..Default::default()
        };
        tokio::fs::write(&path, serde_json::to_string(&config).unwrap())
            .await
            .unwrap();

        let loaded = RecorderConfig::load(Some(&path)).await.unwrap();
        assert_eq!(loaded, config);
        tokio::fs::remove_file(&path).await.unwrap();

        assert!(matches!(
            RecorderConfig::from_file(&path).await,
            Err(RecorderError::Config(_))
        ));
    }
}
