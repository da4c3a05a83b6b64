//! Run inputs shared by every stage.

use super::RunIdentity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The inputs of one run. Task templates are filled from `inputs`; the
/// snapshot does not change once execution starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextSnapshot {
    /// The run identity.
    pub run_id: RunIdentity,
    /// Template inputs, e.g. `topic`.
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
}

impl ContextSnapshot {
    /// Creates an empty snapshot with a fresh run identity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the run identity.
    #[must_use]
    pub fn with_run_id(mut self, run_id: RunIdentity) -> Self {
        self.run_id = run_id;
        self
    }

    /// Adds one template input.
    #[must_use]
    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }

    /// Replaces all template inputs.
    #[must_use]
    pub fn with_inputs(mut self, inputs: BTreeMap<String, String>) -> Self {
        self.inputs = inputs;
        self
    }

    /// A template input.
    #[must_use]
    pub fn input(&self, key: &str) -> Option<&str> {
        self.inputs.get(key).map(String::as_str)
    }
}
