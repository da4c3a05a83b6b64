//! Agents, tasks and crews.
//!
//! A [`Crew`] is an ordered set of [`Task`]s, each performed by an
//! [`Agent`]. Tasks become stages of a [`StageGraph`]; a task's `context`
//! list becomes its stage dependencies, so the only way one task sees
//! another's output is through a declared edge.

mod agent;
mod stage;
mod task;

pub use agent::Agent;
pub use stage::TaskStage;
pub use task::{interpolate, Task};

use crate::context::{ContextSnapshot, PipelineContext};
use crate::core::StageKind;
use crate::errors::{CrewflowError, FailureCause, Result};
use crate::llm::LlmClient;
use crate::pipeline::{PipelineBuilder, StageGraph, StageSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Output of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutput {
    /// Task name.
    pub name: String,
    /// Role of the agent that performed it.
    pub agent_role: String,
    /// The rendered task description.
    pub description: String,
    /// The model's answer.
    pub raw: String,
}

/// Output of a crew run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrewOutput {
    /// Per-task outputs in task order.
    pub tasks_output: Vec<TaskOutput>,
    /// Output of the last task.
    pub raw: String,
}

impl CrewOutput {
    /// Returns the output of a task by name.
    #[must_use]
    pub fn task(&self, name: &str) -> Option<&TaskOutput> {
        self.tasks_output.iter().find(|t| t.name == name)
    }
}

/// Builder for [`Crew`].
#[derive(Debug)]
pub struct CrewBuilder {
    name: String,
    client: Arc<dyn LlmClient>,
    temperature: Option<f32>,
    tasks: Vec<Task>,
}

impl CrewBuilder {
    /// Sets the sampling temperature for every task.
    #[must_use]
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Appends a task. Context tasks must be added first.
    #[must_use]
    pub fn task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    /// Compiles the tasks into a stage graph.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if a context edge names an unknown or later
    /// task, if two tasks share a name, or if there are no tasks.
    pub fn build(self) -> Result<Crew> {
        let mut builder = PipelineBuilder::new(self.name.clone());
        for task in &self.tasks {
            let runner = Arc::new(TaskStage::new(
                task.clone(),
                Arc::clone(&self.client),
                self.temperature,
            ));
            let spec = StageSpec::new(task.name.clone(), runner)
                .with_dependencies(task.context.iter().cloned())
                .with_kind(StageKind::Agent);
            builder.push(spec)?;
        }

        Ok(Crew {
            name: self.name,
            tasks: self.tasks,
            graph: builder.build()?,
        })
    }
}

/// A compiled set of tasks ready to run.
#[derive(Debug)]
pub struct Crew {
    name: String,
    tasks: Vec<Task>,
    graph: StageGraph,
}

impl Crew {
    /// Starts building a crew whose agents talk to `client`.
    #[must_use]
    pub fn builder(name: impl Into<String>, client: Arc<dyn LlmClient>) -> CrewBuilder {
        CrewBuilder {
            name: name.into(),
            client,
            temperature: None,
            tasks: Vec::new(),
        }
    }

    /// Returns the crew name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tasks in declaration order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Runs every task with `inputs` filling the templates.
    ///
    /// # Errors
    ///
    /// Returns `GenerationFailed` for the first task that fails, carrying
    /// the cause reported by its stage.
    pub async fn kickoff(
        &self,
        ctx: Arc<PipelineContext>,
        inputs: BTreeMap<String, String>,
    ) -> Result<CrewOutput> {
        let snapshot = ContextSnapshot::new()
            .with_run_id(ctx.run_id().clone())
            .with_inputs(inputs);

        let result = self.graph.execute(ctx, snapshot).await;
        if let Some(failure) = result.failure {
            return Err(CrewflowError::generation(
                failure.stage,
                failure.error,
                failure.cause,
            ));
        }

        let mut tasks_output = Vec::with_capacity(self.tasks.len());
        for task in &self.tasks {
            let output = result.output(&task.name);
            let field = |key: &str| output.and_then(|o| o.get_str(key)).map(str::to_string);
            let Some(raw) = field("raw") else {
                return Err(CrewflowError::generation(
                    &task.name,
                    "task finished without producing output",
                    FailureCause::MissingOutput,
                ));
            };
            tasks_output.push(TaskOutput {
                name: task.name.clone(),
                agent_role: field("agent_role").unwrap_or_else(|| task.agent.role.clone()),
                description: field("description").unwrap_or_default(),
                raw,
            });
        }

        let raw = tasks_output.last().map(|t| t.raw.clone()).unwrap_or_default();
        info!(
            crew = %self.name,
            tasks = tasks_output.len(),
            duration_ms = result.duration_ms,
            "Crew finished"
        );

        Ok(CrewOutput { tasks_output, raw })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunIdentity;
    use crate::errors::{ErrorKind, GraphErrorCode};
    use crate::events::CollectingEventSink;
    use crate::llm::{LlmError, ModelRef};
    use crate::testing::ScriptedLlm;

    fn agent(role: &str) -> Arc<Agent> {
        Arc::new(Agent::new(
            role,
            "goal",
            "backstory",
            ModelRef::new("ollama", "mistral:latest"),
        ))
    }

    fn two_task_crew(llm: Arc<ScriptedLlm>) -> Crew {
        Crew::builder("research-report", llm)
            .task(Task::new("research", "Research {topic}", "A report on {topic}", agent("Research Specialist")))
            .task(
                Task::new("writing", "Blog about {topic}", "A post", agent("Content Writer"))
                    .with_context("research"),
            )
            .build()
            .unwrap()
    }

    fn topic(value: &str) -> BTreeMap<String, String> {
        BTreeMap::from([("topic".to_string(), value.to_string())])
    }

    fn ctx() -> Arc<PipelineContext> {
        Arc::new(PipelineContext::new(RunIdentity::new()))
    }

    #[tokio::test]
    async fn test_kickoff_threads_research_into_writing() {
        let llm = Arc::new(ScriptedLlm::new().reply("REPORT").reply("POST"));
        let crew = two_task_crew(llm.clone());

        let output = crew.kickoff(ctx(), topic("Space Exploration")).await.unwrap();

        assert_eq!(output.raw, "POST");
        assert_eq!(output.tasks_output.len(), 2);
        let research = output.task("research").unwrap();
        assert_eq!(research.raw, "REPORT");
        assert_eq!(research.agent_role, "Research Specialist");
        assert_eq!(research.description, "Research Space Exploration");

        let requests = llm.requests();
        assert!(requests[0].prompt.starts_with("Research Space Exploration"));
        assert!(requests[1].prompt.ends_with("REPORT"));
    }

    #[tokio::test]
    async fn test_kickoff_stops_at_failed_task() {
        let llm = Arc::new(ScriptedLlm::new().fail(LlmError::Connection("http://localhost:11434".into())));
        let crew = two_task_crew(llm.clone());

        let err = crew.kickoff(ctx(), topic("AI")).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::GenerationFailed);
        assert_eq!(err.cause(), Some(FailureCause::Connection));
        assert!(matches!(err, CrewflowError::GenerationFailed { ref stage, .. } if stage == "research"));
        // The writing task never reached the model.
        assert_eq!(llm.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_kickoff_emits_agent_stage_events() {
        let sink = Arc::new(CollectingEventSink::new());
        let ctx = Arc::new(PipelineContext::new(RunIdentity::new()).with_event_sink(sink.clone()));
        let crew = two_task_crew(Arc::new(ScriptedLlm::new().reply("a").reply("b")));

        crew.kickoff(ctx, topic("AI")).await.unwrap();

        let started = sink.events_of_type("stage.started");
        assert_eq!(started.len(), 2);
        assert_eq!(started[0].1.as_ref().unwrap()["kind"], "agent");
    }

    #[test]
    fn test_build_rejects_forward_context() {
        let err = Crew::builder("bad", Arc::new(ScriptedLlm::new()))
            .task(Task::new("writing", "w", "w", agent("Writer")).with_context("research"))
            .task(Task::new("research", "r", "r", agent("Researcher")))
            .build()
            .unwrap_err();

        match err {
            CrewflowError::Validation(v) => assert_eq!(v.code, GraphErrorCode::UnknownDependency),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_build_rejects_empty_crew() {
        let err = Crew::builder("empty", Arc::new(ScriptedLlm::new())).build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
