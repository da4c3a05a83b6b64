//! Run-level and stage-level contexts.
//!
//! Both add their identifying fields to every event before it reaches the
//! sink, so a sink never has to correlate events itself.

use super::{ContextSnapshot, RunIdentity, StageInputs};
use crate::events::{EventSink, NoOpEventSink};
use std::sync::Arc;
use uuid::Uuid;

/// Shared by [`PipelineContext`] and [`StageContext`].
pub trait ExecutionContext: Send + Sync {
    /// Uuid of the run, shared by every event it emits.
    fn pipeline_run_id(&self) -> Uuid;

    /// Graph name, when one was set.
    fn topology(&self) -> Option<&str>;

    /// Sends an event to the run's sink, enriched with context fields.
    fn try_emit_event(&self, event_type: &str, data: Option<serde_json::Value>);
}

/// One run: identity, topology name and event sink.
pub struct PipelineContext {
    run_id: RunIdentity,
    topology: Option<String>,
    event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("run_id", &self.run_id)
            .field("topology", &self.topology)
            .finish_non_exhaustive()
    }
}

impl PipelineContext {
    /// Creates a context whose events are discarded.
    #[must_use]
    pub fn new(run_id: RunIdentity) -> Self {
        Self {
            run_id,
            topology: None,
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Names the graph in every event.
    #[must_use]
    pub fn with_topology(mut self, topology: impl Into<String>) -> Self {
        self.topology = Some(topology.into());
        self
    }

    /// Routes events to `sink` instead of discarding them.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Run id and topic.
    #[must_use]
    pub fn run_id(&self) -> &RunIdentity {
        &self.run_id
    }

    /// Where events go.
    #[must_use]
    pub fn event_sink(&self) -> &Arc<dyn EventSink> {
        &self.event_sink
    }
}

impl ExecutionContext for PipelineContext {
    fn pipeline_run_id(&self) -> Uuid {
        self.run_id.pipeline_run_id
    }

    fn topology(&self) -> Option<&str> {
        self.topology.as_deref()
    }

    fn try_emit_event(&self, event_type: &str, data: Option<serde_json::Value>) {
        let mut enriched = data.unwrap_or_else(|| serde_json::json!({}));

        if let serde_json::Value::Object(ref mut map) = enriched {
            map.insert(
                "pipeline_run_id".to_string(),
                serde_json::json!(self.run_id.pipeline_run_id.to_string()),
            );
            if let Some(ref topic) = self.run_id.topic {
                map.insert("topic".to_string(), serde_json::json!(topic));
            }
            if let Some(ref topology) = self.topology {
                map.insert("topology".to_string(), serde_json::json!(topology));
            }
        }

        self.event_sink.try_emit(event_type, Some(enriched));
    }
}

/// What one stage sees while it runs.
pub struct StageContext {
    pipeline_ctx: Arc<PipelineContext>,
    stage_name: String,
    inputs: StageInputs,
    snapshot: ContextSnapshot,
}

impl StageContext {
    /// Context for `stage_name` within the run `pipeline_ctx`.
    #[must_use]
    pub fn new(
        pipeline_ctx: Arc<PipelineContext>,
        stage_name: impl Into<String>,
        inputs: StageInputs,
        snapshot: ContextSnapshot,
    ) -> Self {
        Self {
            pipeline_ctx,
            stage_name: stage_name.into(),
            inputs,
            snapshot,
        }
    }

    /// Name of the running stage.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// Outputs of the declared upstream stages.
    #[must_use]
    pub fn inputs(&self) -> &StageInputs {
        &self.inputs
    }

    /// Run inputs.
    #[must_use]
    pub fn snapshot(&self) -> &ContextSnapshot {
        &self.snapshot
    }

    /// The run this stage belongs to.
    #[must_use]
    pub fn pipeline_ctx(&self) -> &Arc<PipelineContext> {
        &self.pipeline_ctx
    }
}

impl ExecutionContext for StageContext {
    fn pipeline_run_id(&self) -> Uuid {
        self.pipeline_ctx.pipeline_run_id()
    }

    fn topology(&self) -> Option<&str> {
        self.pipeline_ctx.topology()
    }

    fn try_emit_event(&self, event_type: &str, data: Option<serde_json::Value>) {
        let mut enriched = data.unwrap_or_else(|| serde_json::json!({}));

        if let serde_json::Value::Object(ref mut map) = enriched {
            map.insert("stage".to_string(), serde_json::json!(&self.stage_name));
        }

        self.pipeline_ctx.try_emit_event(event_type, Some(enriched));
    }
}
