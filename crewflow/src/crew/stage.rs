//! Stage adapter running a task through a model client.

use super::Task;
use crate::context::StageContext;
use crate::core::StageOutput;
use crate::errors::FailureCause;
use crate::llm::{LlmClient, LlmError, LlmRequest};
use crate::stages::Stage;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Runs one [`Task`] as a pipeline stage.
///
/// Produces `raw`, `agent_role` and `description` on success.
#[derive(Debug)]
pub struct TaskStage {
    task: Task,
    client: Arc<dyn LlmClient>,
    temperature: Option<f32>,
}

impl TaskStage {
    /// Creates a stage for `task`.
    #[must_use]
    pub fn new(task: Task, client: Arc<dyn LlmClient>, temperature: Option<f32>) -> Self {
        Self {
            task,
            client,
            temperature,
        }
    }

    /// Builds the user prompt.
    fn prompt(description: &str, expected_output: &str, context: &[&str]) -> String {
        let mut prompt = format!(
            "{description}\n\nThis is the expected criteria for your final answer: {expected_output}\n\
             You MUST return the actual complete content as the final answer, not a summary."
        );
        if !context.is_empty() {
            prompt.push_str("\n\nThis is the context you're working with:\n");
            prompt.push_str(&context.join("\n\n"));
        }
        prompt
    }
}

#[async_trait]
impl Stage for TaskStage {
    fn name(&self) -> &str {
        &self.task.name
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        let agent = &self.task.agent;
        if agent.llm.provider != self.client.provider() {
            let err = LlmError::UnsupportedProvider {
                requested: agent.llm.provider.clone(),
                served: self.client.provider().to_string(),
            };
            return StageOutput::fail_with_cause(err.to_string(), err.cause());
        }

        let inputs = &ctx.snapshot().inputs;
        let description = self.task.render_description(inputs);
        let expected_output = self.task.render_expected_output(inputs);

        let mut context = Vec::with_capacity(self.task.context.len());
        for upstream in &self.task.context {
            match ctx.inputs().get_str(upstream, "raw") {
                Ok(Some(raw)) => context.push(raw),
                Ok(None) => {
                    return StageOutput::fail_with_cause(
                        format!("context task '{upstream}' produced no output"),
                        FailureCause::MissingOutput,
                    );
                }
                Err(err) => return StageOutput::fail(err.to_string()),
            }
        }

        let request = LlmRequest::new(&agent.llm.name, Self::prompt(&description, &expected_output, &context))
            .with_system(agent.system_prompt())
            .with_temperature(self.temperature);

        debug!(
            stage = %self.task.name,
            role = %agent.role,
            model = %agent.llm,
            context_tasks = context.len(),
            "Sending task to model"
        );

        match self.client.generate(&request).await {
            Ok(response) if response.content.trim().is_empty() => StageOutput::fail_with_cause(
                format!("model '{}' returned an empty answer", response.model),
                FailureCause::MissingOutput,
            ),
            Ok(response) => StageOutput::ok(HashMap::from([
                ("raw".to_string(), serde_json::json!(response.content)),
                ("agent_role".to_string(), serde_json::json!(agent.role)),
                ("description".to_string(), serde_json::json!(description)),
            ]))
            .add_metadata("model", serde_json::json!(response.model))
            .add_metadata("latency_ms", serde_json::json!(response.latency_ms))
            .add_metadata("output_tokens", serde_json::json!(response.output_tokens)),
            Err(err) => StageOutput::fail_with_cause(err.to_string(), err.cause()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextSnapshot, PipelineContext, RunIdentity, StageInputs};
    use crate::crew::Agent;
    use crate::llm::ModelRef;
    use crate::testing::{assert_output_failed_with, ScriptedLlm};
    use std::collections::BTreeSet;

    fn task(provider: &str) -> Task {
        let agent = Arc::new(Agent::new(
            "Content Writer",
            "Create engaging blog posts based on research",
            "You are a skilled content writer.",
            ModelRef::new(provider, "mistral:latest"),
        ));
        Task::new("writing", "Blog about {topic}", "100 words on {topic}", agent)
            .with_context("research")
    }

    fn stage_ctx(research: Option<&str>) -> StageContext {
        let mut outputs = HashMap::new();
        if let Some(raw) = research {
            outputs.insert(
                "research".to_string(),
                HashMap::from([("raw".to_string(), serde_json::json!(raw))]),
            );
        }
        let declared = BTreeSet::from(["research".to_string()]);
        let inputs = StageInputs::from_completed("writing", &declared, &outputs);
        StageContext::new(
            Arc::new(PipelineContext::new(RunIdentity::new())),
            "writing",
            inputs,
            ContextSnapshot::new().with_input("topic", "Cybersecurity"),
        )
    }

    #[tokio::test]
    async fn test_task_stage_sends_persona_and_context() {
        let llm = Arc::new(ScriptedLlm::new().reply("Stay safe online."));
        let stage = TaskStage::new(task("ollama"), llm.clone(), Some(0.3));

        let output = stage.execute(&stage_ctx(Some("# Cybersecurity Research Report"))).await;

        assert_eq!(output.get_str("raw"), Some("Stay safe online."));
        assert_eq!(output.get_str("agent_role"), Some("Content Writer"));
        assert_eq!(output.get_str("description"), Some("Blog about Cybersecurity"));

        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.model, "mistral:latest");
        assert_eq!(request.temperature, Some(0.3));
        assert!(request.system.as_deref().unwrap().starts_with("You are Content Writer."));
        assert!(request.prompt.starts_with("Blog about Cybersecurity"));
        assert!(request.prompt.contains("100 words on Cybersecurity"));
        assert!(request.prompt.ends_with("# Cybersecurity Research Report"));
    }

    #[tokio::test]
    async fn test_task_stage_without_upstream_output() {
        let llm = Arc::new(ScriptedLlm::new().reply("unused"));
        let stage = TaskStage::new(task("ollama"), llm.clone(), None);

        let output = stage.execute(&stage_ctx(None)).await;

        assert_output_failed_with(&output, FailureCause::MissingOutput);
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn test_task_stage_provider_mismatch() {
        let llm = Arc::new(ScriptedLlm::new());
        let stage = TaskStage::new(task("openai"), llm.clone(), None);

        let output = stage.execute(&stage_ctx(Some("research"))).await;

        assert_output_failed_with(&output, FailureCause::Model);
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn test_task_stage_maps_client_errors() {
        let llm = Arc::new(ScriptedLlm::new().fail(LlmError::Timeout(600)));
        let stage = TaskStage::new(task("ollama"), llm, None);

        let output = stage.execute(&stage_ctx(Some("research"))).await;
        assert_output_failed_with(&output, FailureCause::Timeout);
    }

    #[tokio::test]
    async fn test_task_stage_rejects_blank_answer() {
        let llm = Arc::new(ScriptedLlm::new().reply("   \n"));
        let stage = TaskStage::new(task("ollama"), llm, None);

        let output = stage.execute(&stage_ctx(Some("research"))).await;
        assert_output_failed_with(&output, FailureCause::MissingOutput);
    }

    #[tokio::test]
    async fn test_task_stage_reading_undeclared_task_fails() {
        let llm = Arc::new(ScriptedLlm::new().reply("unused"));
        let stage = TaskStage::new(task("ollama").with_context("outline"), llm.clone(), None);

        let output = stage.execute(&stage_ctx(Some("research"))).await;

        assert_output_failed_with(&output, FailureCause::Other);
        let error = output.error.unwrap();
        assert!(error.contains("stage 'writing' attempted to access 'outline'"));
        assert!(llm.requests().is_empty());
    }

    #[test]
    fn test_prompt_without_context() {
        let prompt = TaskStage::prompt("Do it", "Done", &[]);
        assert!(!prompt.contains("context you're working with"));
    }
}
