//! Upstream outputs visible to a stage.

use crate::errors::UndeclaredDependencyError;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// Data of one finished stage, keyed by field (`raw`, `agent_role`, ...).
pub type OutputData = HashMap<String, Value>;

/// Outputs of the stages a stage declared as dependencies.
///
/// Reading any other stage is an [`UndeclaredDependencyError`], even when
/// that stage has already run.
#[derive(Debug, Clone, Default)]
pub struct StageInputs {
    stage_name: String,
    declared: BTreeSet<String>,
    outputs: HashMap<String, OutputData>,
}

impl StageInputs {
    /// Collects the outputs of `declared` stages from `completed`.
    #[must_use]
    pub fn from_completed(
        stage_name: impl Into<String>,
        declared: &BTreeSet<String>,
        completed: &HashMap<String, OutputData>,
    ) -> Self {
        let outputs = declared
            .iter()
            .filter_map(|dep| completed.get(dep).map(|data| (dep.clone(), data.clone())))
            .collect();
        Self {
            stage_name: stage_name.into(),
            declared: declared.clone(),
            outputs,
        }
    }

    /// Output of `stage`, `None` if it produced no data.
    ///
    /// # Errors
    ///
    /// Returns `UndeclaredDependencyError` if `stage` is not a declared
    /// dependency.
    pub fn get(&self, stage: &str) -> Result<Option<&OutputData>, UndeclaredDependencyError> {
        if !self.declared.contains(stage) {
            return Err(UndeclaredDependencyError::new(&self.stage_name, stage));
        }
        Ok(self.outputs.get(stage))
    }

    /// A string field of `stage`'s output.
    ///
    /// # Errors
    ///
    /// Same as [`StageInputs::get`].
    pub fn get_str(&self, stage: &str, key: &str) -> Result<Option<&str>, UndeclaredDependencyError> {
        Ok(self.get(stage)?.and_then(|data| data.get(key)).and_then(Value::as_str))
    }

    /// Declared dependencies, sorted.
    pub fn declared(&self) -> impl Iterator<Item = &str> {
        self.declared.iter().map(String::as_str)
    }
}
