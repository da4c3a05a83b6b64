//! StageGraph execution engine.
//!
//! Stages run one at a time in topological order. Ties between stages that
//! become ready together are broken by insertion order, so two runs of the
//! same graph always execute stages in the same sequence.

use super::StageSpec;
use crate::context::{
    ContextSnapshot, ExecutionContext, OutputData, PipelineContext, StageContext, StageInputs,
};
use crate::core::{StageOutput, StageStatus};
use crate::errors::FailureCause;
use crate::observability::SpanTimer;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// The first stage that failed during a graph execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    /// Name of the failed stage.
    pub stage: String,
    /// The error reported by the stage.
    pub error: String,
    /// Why the stage failed.
    pub cause: FailureCause,
}

/// What a graph run produced.
#[derive(Debug)]
pub struct GraphExecutionResult {
    /// Per-stage outputs, for every stage that ran.
    pub outputs: HashMap<String, StageOutput>,
    /// Wall time of the whole run.
    pub duration_ms: f64,
    /// `true` when every stage ran without failing.
    pub success: bool,
    /// The failure that stopped execution, if any.
    pub failure: Option<StageFailure>,
}

impl GraphExecutionResult {
    /// Output of `stage`, if it ran.
    #[must_use]
    pub fn output(&self, stage: &str) -> Option<&StageOutput> {
        self.outputs.get(stage)
    }
}

/// Validated, ordered set of stages.
#[derive(Debug)]
pub struct StageGraph {
    name: String,
    stages: HashMap<String, StageSpec>,
    execution_order: Vec<String>,
}

impl StageGraph {
    /// `stages` must already be validated as acyclic with every dependency
    /// present; [`super::PipelineBuilder::build`] guarantees this.
    #[must_use]
    pub fn new(name: String, stages: HashMap<String, StageSpec>, stage_order: &[String]) -> Self {
        let execution_order = topological_sort(&stages, stage_order);

        Self {
            name,
            stages,
            execution_order,
        }
    }

    /// Graph name, used as the event topology.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Stage names in the order [`Self::execute`] runs them.
    #[must_use]
    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    /// Runs every stage in order.
    ///
    /// Each stage sees only the outputs of the stages it declared as
    /// dependencies. The first failing stage stops the run; no later stage
    /// executes and the failure is reported in the result.
    pub async fn execute(
        &self,
        ctx: Arc<PipelineContext>,
        snapshot: ContextSnapshot,
    ) -> GraphExecutionResult {
        let timer = SpanTimer::start(&self.name);
        let mut outputs: HashMap<String, StageOutput> = HashMap::new();
        let mut completed: HashMap<String, OutputData> = HashMap::new();

        ctx.try_emit_event(
            "pipeline.started",
            Some(serde_json::json!({
                "pipeline": &self.name,
                "stages": &self.execution_order,
            })),
        );

        for stage_name in &self.execution_order {
            let Some(spec) = self.stages.get(stage_name) else {
                continue;
            };

            let output = self
                .run_stage(spec, Arc::clone(&ctx), snapshot.clone(), &completed)
                .await;

            if let Some(failure) = stage_failure(stage_name, &output) {
                outputs.insert(stage_name.clone(), output);
                let duration_ms = timer.finish();
                warn!(
                    pipeline = %self.name,
                    stage = %failure.stage,
                    cause = %failure.cause,
                    error = %failure.error,
                    "Pipeline stopped at failed stage"
                );
                ctx.try_emit_event(
                    "pipeline.failed",
                    Some(serde_json::json!({
                        "pipeline": &self.name,
                        "stage": &failure.stage,
                        "error": &failure.error,
                        "cause": failure.cause,
                        "duration_ms": duration_ms,
                    })),
                );
                return GraphExecutionResult {
                    outputs,
                    duration_ms,
                    success: false,
                    failure: Some(failure),
                };
            }

            completed.insert(stage_name.clone(), output.data_or_empty());
            outputs.insert(stage_name.clone(), output);
        }

        let duration_ms = timer.finish();
        ctx.try_emit_event(
            "pipeline.completed",
            Some(serde_json::json!({
                "pipeline": &self.name,
                "duration_ms": duration_ms,
            })),
        );

        GraphExecutionResult {
            outputs,
            duration_ms,
            success: true,
            failure: None,
        }
    }

    async fn run_stage(
        &self,
        spec: &StageSpec,
        ctx: Arc<PipelineContext>,
        snapshot: ContextSnapshot,
        completed: &HashMap<String, OutputData>,
    ) -> StageOutput {
        let inputs = StageInputs::from_completed(&spec.name, &spec.dependencies, completed);
        let stage_ctx = StageContext::new(ctx, &spec.name, inputs, snapshot);

        stage_ctx.try_emit_event(
            "stage.started",
            Some(serde_json::json!({ "kind": spec.kind })),
        );
        debug!(pipeline = %self.name, stage = %spec.name, kind = %spec.kind, "Stage started");

        let timer = SpanTimer::start(&spec.name);
        let output = spec.runner.execute(&stage_ctx).await;
        let duration_ms = timer.finish();

        match output.status {
            StageStatus::Ok => stage_ctx.try_emit_event(
                "stage.completed",
                Some(serde_json::json!({ "duration_ms": duration_ms })),
            ),
            StageStatus::Skip => stage_ctx.try_emit_event(
                "stage.skipped",
                Some(serde_json::json!({ "reason": &output.skip_reason })),
            ),
            StageStatus::Fail | StageStatus::Pending | StageStatus::Running => stage_ctx
                .try_emit_event(
                    "stage.failed",
                    Some(serde_json::json!({
                        "error": &output.error,
                        "cause": output.cause.unwrap_or_default(),
                        "duration_ms": duration_ms,
                    })),
                ),
        }

        output
    }
}

/// Describes the failure of a stage, or `None` if the stage succeeded.
fn stage_failure(stage: &str, output: &StageOutput) -> Option<StageFailure> {
    match output.status {
        StageStatus::Ok | StageStatus::Skip => None,
        StageStatus::Fail => Some(StageFailure {
            stage: stage.to_string(),
            error: output
                .error
                .clone()
                .unwrap_or_else(|| format!("Stage '{stage}' failed")),
            cause: output.cause.unwrap_or_default(),
        }),
        StageStatus::Pending | StageStatus::Running => Some(StageFailure {
            stage: stage.to_string(),
            error: format!("Stage '{stage}' returned non-terminal status {}", output.status),
            cause: FailureCause::Other,
        }),
    }
}

/// Orders stages so each runs after its dependencies. At every step the
/// earliest-inserted ready stage goes next.
fn topological_sort(stages: &HashMap<String, StageSpec>, stage_order: &[String]) -> Vec<String> {
    let mut placed: HashSet<&str> = HashSet::with_capacity(stage_order.len());
    let mut order = Vec::with_capacity(stage_order.len());

    loop {
        let next = stage_order.iter().find(|name| {
            !placed.contains(name.as_str())
                && stages
                    .get(name.as_str())
                    .is_some_and(|spec| spec.dependencies.iter().all(|d| placed.contains(d.as_str())))
        });
        let Some(next) = next else { break };
        placed.insert(next);
        order.push(next.clone());
    }

    order
}
