//! What a stage hands back to the graph.

use super::StageStatus;
use crate::errors::FailureCause;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Result of one stage run.
///
/// A crew task's answer lives under the `raw` data key; model details go in
/// `metadata`. A failure carries its message and a [`FailureCause`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutput {
    /// Ok, skip or fail.
    pub status: StageStatus,

    /// Values downstream stages can read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<HashMap<String, serde_json::Value>>,

    /// Model, provider, token counts and similar run details.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Failure classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<FailureCause>,

    /// Why the stage did nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl StageOutput {
    fn with_status(status: StageStatus) -> Self {
        Self {
            status,
            data: None,
            metadata: HashMap::new(),
            error: None,
            cause: None,
            skip_reason: None,
        }
    }

    /// Success carrying `data`.
    #[must_use]
    pub fn ok(data: HashMap<String, serde_json::Value>) -> Self {
        Self {
            data: Some(data),
            ..Self::with_status(StageStatus::Ok)
        }
    }

    /// Success with nothing for downstream stages.
    #[must_use]
    pub fn ok_empty() -> Self {
        Self::with_status(StageStatus::Ok)
    }

    /// Success carrying the single value `key`.
    #[must_use]
    pub fn ok_value(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self::ok(HashMap::from([(key.into(), value)]))
    }

    /// Skipped, with a reason.
    #[must_use]
    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            skip_reason: Some(reason.into()),
            ..Self::with_status(StageStatus::Skip)
        }
    }

    /// Failure with [`FailureCause::Other`].
    #[must_use]
    pub fn fail(error: impl Into<String>) -> Self {
        Self::fail_with_cause(error, FailureCause::Other)
    }

    /// Failure with a known cause.
    #[must_use]
    pub fn fail_with_cause(error: impl Into<String>, cause: FailureCause) -> Self {
        Self {
            error: Some(error.into()),
            cause: Some(cause),
            ..Self::with_status(StageStatus::Fail)
        }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn add_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Ok or skip.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Fail.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    /// Copy of the data, empty when there is none. This is what downstream
    /// stages see.
    #[must_use]
    pub fn data_or_empty(&self) -> HashMap<String, serde_json::Value> {
        self.data.clone().unwrap_or_default()
    }

    /// Data value under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.as_ref().and_then(|d| d.get(key))
    }

    /// String value under `key`; `None` for missing or non-string values.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(serde_json::Value::as_str)
    }
}
