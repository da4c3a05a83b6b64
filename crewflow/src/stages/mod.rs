//! The stage trait.
//!
//! Crew tasks are the stages of a research run (see [`crate::crew`]).

use crate::context::StageContext;
use crate::core::StageOutput;
use async_trait::async_trait;
use std::fmt::Debug;

/// One node of a stage graph.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Stage name, unique within a graph.
    fn name(&self) -> &str;

    /// Runs the stage.
    ///
    /// Failures are reported through the returned [`StageOutput`], never
    /// by panicking.
    async fn execute(&self, ctx: &StageContext) -> StageOutput;
}

/// Succeeds with no data. Used to wire graphs without a model.
#[derive(Debug, Clone)]
pub struct NoOpStage {
    name: String,
}

impl NoOpStage {
    /// Creates a stage called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Stage for NoOpStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &StageContext) -> StageOutput {
        StageOutput::ok_empty()
    }
}
