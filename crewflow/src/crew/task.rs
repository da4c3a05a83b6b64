//! Task definitions and template interpolation.

use super::Agent;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// Replaces `{key}` placeholders with values from `inputs`.
///
/// Placeholders without a matching input are left as written.
#[must_use]
pub fn interpolate(template: &str, inputs: &BTreeMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            inputs
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// One unit of work for an agent.
#[derive(Debug, Clone)]
pub struct Task {
    /// Unique task name; also the stage name.
    pub name: String,
    /// Instruction template.
    pub description: String,
    /// Template describing the expected answer.
    pub expected_output: String,
    /// Agent performing the task.
    pub agent: Arc<Agent>,
    /// Tasks whose output this task receives.
    pub context: Vec<String>,
}

impl Task {
    /// Creates a task with no context.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        expected_output: impl Into<String>,
        agent: Arc<Agent>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            expected_output: expected_output.into(),
            agent,
            context: Vec::new(),
        }
    }

    /// Adds a task whose output this task receives.
    #[must_use]
    pub fn with_context(mut self, task: impl Into<String>) -> Self {
        self.context.push(task.into());
        self
    }

    /// The description with inputs filled in.
    #[must_use]
    pub fn render_description(&self, inputs: &BTreeMap<String, String>) -> String {
        interpolate(&self.description, inputs)
    }

    /// The expected output with inputs filled in.
    #[must_use]
    pub fn render_expected_output(&self, inputs: &BTreeMap<String, String>) -> String {
        interpolate(&self.expected_output, inputs)
    }
}
