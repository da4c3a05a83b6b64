//! The research report pipeline.
//!
//! One run checks the backend, asks a research agent for a structured
//! markdown report on a topic, asks a writing agent for a short blog post
//! based on that report, and writes the report to disk.

use crate::config::CrewflowConfig;
use crate::context::{PipelineContext, RunIdentity};
use crate::crew::{Agent, Crew, Task};
use crate::errors::{CrewflowError, FailureCause, Result};
use crate::events::{EventSink, LoggingEventSink};
use crate::llm::{LlmClient, ModelRef, OllamaClient};
use crate::probe::{AvailabilityProbe, BackendProbe};
use crate::report::ReportPersister;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Name of the research task and stage.
pub const RESEARCH_TASK: &str = "research";
/// Name of the writing task and stage.
pub const WRITING_TASK: &str = "writing";

const RESEARCH_DESCRIPTION: &str = "Research the topic '{topic}' and create a well-formatted markdown report with the following structure:

# {topic} Research Report

## 1. Overview
- Provide a clear, comprehensive overview of {topic}
- Include key characteristics and important aspects

## 2. Key Areas/Applications
- List and explain 3 major areas or applications related to {topic}
- Use bullet points and subheadings
- Include real-world examples

## 3. Current Trends/Developments
- Identify and explain 2 important current trends or recent developments
- Discuss implications and potential impact

## 4. Conclusion
- Summarize key findings
- Provide forward-looking insights

Use proper markdown formatting with headers, bullet points, and clear sections.";

const RESEARCH_EXPECTED: &str = "A well-formatted markdown research report about {topic} with proper headings, bullet points, and clear structure";

const WRITING_DESCRIPTION: &str = "Based on the research report, write a 100-word blog post about {topic} that is engaging and informative for general readers.";

const WRITING_EXPECTED: &str = "A 100-word engaging blog post about {topic}";

/// A non-empty, trimmed research topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    /// Validates a topic.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the topic is empty after trimming.
    pub fn new(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CrewflowError::InvalidInput("No topic provided".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the topic text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Topic {
    type Err = CrewflowError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Topic {
    type Error = CrewflowError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Run identifier, shared with every emitted event.
    pub run_id: Uuid,
    /// The researched topic.
    pub topic: Topic,
    /// The research stage output, as written to the report.
    pub research_content: String,
    /// The writing stage output.
    pub final_output: String,
    /// Where the report was written.
    pub report_path: PathBuf,
}

/// Generated content of a run, not yet written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchDraft {
    /// Run identifier, shared with every emitted event.
    pub run_id: Uuid,
    /// The researched topic.
    pub topic: Topic,
    /// The research stage output.
    pub research_content: String,
    /// The writing stage output.
    pub final_output: String,
    /// Where [`ResearchPipeline::publish`] writes the report.
    pub report_path: PathBuf,
}

/// Runs the two-stage research pipeline.
pub struct ResearchPipeline {
    probe: Arc<dyn BackendProbe>,
    client: Arc<dyn LlmClient>,
    persister: ReportPersister,
    model: ModelRef,
    backend_label: String,
    temperature: Option<f32>,
}

impl fmt::Debug for ResearchPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResearchPipeline")
            .field("client", &self.client)
            .field("persister", &self.persister)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ResearchPipeline {
    /// Creates a pipeline from its collaborators.
    #[must_use]
    pub fn new(
        probe: Arc<dyn BackendProbe>,
        client: Arc<dyn LlmClient>,
        persister: ReportPersister,
        model: ModelRef,
    ) -> Self {
        Self {
            probe,
            client,
            persister,
            model,
            backend_label: crate::config::ReportConfig::default().backend_label,
            temperature: None,
        }
    }

    /// Builds the pipeline against the configured Ollama instance.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a malformed model identifier and `Config`
    /// if the HTTP client cannot be created.
    pub fn from_config(config: &CrewflowConfig) -> Result<Self> {
        let model = config.backend.model_ref()?;
        let client = OllamaClient::new(&config.backend.base_url, config.backend.request_timeout())
            .map_err(|e| CrewflowError::Config(e.to_string()))?;
        let probe = AvailabilityProbe::from_config(config)?;

        Ok(Self::new(
            Arc::new(probe),
            Arc::new(client),
            ReportPersister::from_config(&config.report),
            model,
        )
        .with_backend_label(config.report.backend_label.clone())
        .with_temperature(config.backend.temperature))
    }

    /// Sets the `model` front-matter value.
    #[must_use]
    pub fn with_backend_label(mut self, label: impl Into<String>) -> Self {
        self.backend_label = label.into();
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Returns the model both agents run on.
    #[must_use]
    pub fn model(&self) -> &ModelRef {
        &self.model
    }

    /// Returns the backend probe.
    #[must_use]
    pub fn probe(&self) -> &Arc<dyn BackendProbe> {
        &self.probe
    }

    /// Returns the model client.
    #[must_use]
    pub fn client(&self) -> &Arc<dyn LlmClient> {
        &self.client
    }

    /// Returns the report persister.
    #[must_use]
    pub fn persister(&self) -> &ReportPersister {
        &self.persister
    }

    /// The research agent.
    #[must_use]
    pub fn research_agent(model: ModelRef) -> Agent {
        Agent::new(
            "Research Specialist",
            "Research and analyze any topic with excellent markdown formatting",
            "You are an expert researcher and technical writer who creates well-structured, \
             professionally formatted markdown reports on any topic. You excel at organizing \
             information with clear headings, bullet points, and logical flow.",
            model,
        )
    }

    /// The writing agent.
    #[must_use]
    pub fn writing_agent(model: ModelRef) -> Agent {
        Agent::new(
            "Content Writer",
            "Create engaging blog posts based on research",
            "You are a skilled content writer who transforms research into clear, engaging articles.",
            model,
        )
    }

    /// Builds the research crew: research first, then writing with the
    /// research output as context.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the task graph is rejected.
    pub fn crew(&self) -> Result<Crew> {
        let researcher = Arc::new(Self::research_agent(self.model.clone()));
        let writer = Arc::new(Self::writing_agent(self.model.clone()));

        Crew::builder("research-report", Arc::clone(&self.client))
            .with_temperature(self.temperature)
            .task(Task::new(
                RESEARCH_TASK,
                RESEARCH_DESCRIPTION,
                RESEARCH_EXPECTED,
                researcher,
            ))
            .task(
                Task::new(WRITING_TASK, WRITING_DESCRIPTION, WRITING_EXPECTED, writer)
                    .with_context(RESEARCH_TASK),
            )
            .build()
    }

    /// Runs the pipeline, logging stage events.
    ///
    /// # Errors
    ///
    /// See [`ResearchPipeline::run_observed`].
    pub async fn run(&self, topic: &Topic) -> Result<PipelineResult> {
        self.run_observed(topic, Arc::new(LoggingEventSink::default()))
            .await
    }

    /// Runs the pipeline, sending stage events to `sink`.
    ///
    /// # Errors
    ///
    /// See [`Self::draft`] and [`Self::publish`].
    pub async fn run_observed(
        &self,
        topic: &Topic,
        sink: Arc<dyn EventSink>,
    ) -> Result<PipelineResult> {
        let draft = self.draft(topic, sink).await?;
        self.publish(draft).await
    }

    /// Checks the backend and runs both stages without writing anything.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the topic cannot name a report file; checked
    ///   before the probe and before any model call.
    /// - `BackendUnavailable` if the probe is not ready; nothing is generated.
    /// - `GenerationFailed` if a stage fails or the research output is missing.
    pub async fn draft(&self, topic: &Topic, sink: Arc<dyn EventSink>) -> Result<ResearchDraft> {
        let report_path = self.persister.report_path(topic.as_str())?;

        let report = self.probe.probe().await;
        if !report.ready() {
            warn!(topic = %topic, status = %report.status, "Backend unavailable, not starting run");
            return Err(CrewflowError::BackendUnavailable {
                message: report.message,
            });
        }

        let identity = RunIdentity::new().with_topic(topic.as_str());
        let run_id = identity.pipeline_run_id;
        let ctx = Arc::new(
            PipelineContext::new(identity)
                .with_topology("research-report")
                .with_event_sink(sink),
        );
        info!(%run_id, topic = %topic, model = %self.model, "Research run started");

        let crew = self.crew()?;
        let inputs = BTreeMap::from([("topic".to_string(), topic.as_str().to_string())]);
        let output = crew.kickoff(ctx, inputs).await?;

        let research_content = output
            .task(RESEARCH_TASK)
            .map(|t| t.raw.clone())
            .filter(|raw| !raw.trim().is_empty())
            .ok_or_else(|| {
                CrewflowError::generation(
                    RESEARCH_TASK,
                    "research finished without producing a report",
                    FailureCause::MissingOutput,
                )
            })?;

        Ok(ResearchDraft {
            run_id,
            topic: topic.clone(),
            research_content,
            final_output: output.raw,
            report_path,
        })
    }

    /// Writes the research report of `draft`.
    ///
    /// # Errors
    ///
    /// `PersistFailed` if the report cannot be written.
    pub async fn publish(&self, draft: ResearchDraft) -> Result<PipelineResult> {
        self.persister
            .write_report(
                &draft.report_path,
                draft.topic.as_str(),
                &draft.research_content,
                &self.backend_label,
            )
            .await?;

        info!(run_id = %draft.run_id, path = %draft.report_path.display(), "Research run finished");

        Ok(PipelineResult {
            run_id: draft.run_id,
            topic: draft.topic,
            research_content: draft.research_content,
            final_output: draft.final_output,
            report_path: draft.report_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::events::CollectingEventSink;
    use crate::llm::LlmError;
    use crate::probe::{MockBackendProbe, ProbeReport, ProbeStatus};
    use crate::testing::{ScriptedLlm, StaticProbe};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn model() -> ModelRef {
        ModelRef::new("ollama", "mistral:latest")
    }

    fn pipeline(probe: Arc<dyn BackendProbe>, llm: Arc<ScriptedLlm>, dir: &Path) -> ResearchPipeline {
        let persister = ReportPersister::new(
            dir,
            "Research Specialist",
            "This report was generated using free local AI (Ollama + Mistral)",
        );
        ResearchPipeline::new(probe, llm, persister, model())
    }

    #[test]
    fn test_topic_validation() {
        assert_eq!(Topic::new("  Climate Change \n").unwrap().as_str(), "Climate Change");
        assert_eq!(Topic::new("").unwrap_err().kind(), ErrorKind::InvalidInput);
        assert_eq!(Topic::new("   ").unwrap_err().kind(), ErrorKind::InvalidInput);
        assert!("".parse::<Topic>().is_err());
        assert!(serde_json::from_str::<Topic>(r#""  ""#).is_err());
    }

    #[tokio::test]
    async fn test_successful_run() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(
            ScriptedLlm::new()
                .reply("# Space Exploration Research Report\n\n## 1. Overview")
                .reply("Space is big."),
        );
        let runner = pipeline(Arc::new(StaticProbe::ready()), llm.clone(), dir.path());
        let topic = Topic::new("Space Exploration").unwrap();

        let result = runner.run(&topic).await.unwrap();

        assert_eq!(result.final_output, "Space is big.");
        assert_eq!(
            result.report_path,
            dir.path().join("space_exploration_research_report.md")
        );

        let file = std::fs::read_to_string(&result.report_path).unwrap();
        assert!(file.contains("model: Ollama + Mistral (Free Local AI)\n"));
        assert!(file.contains(&result.research_content));
        assert!(!file.contains("Space is big."));

        let requests = llm.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].prompt.contains("# Space Exploration Research Report"));
        assert!(requests[0].prompt.contains("## 4. Conclusion"));
        assert!(requests[1].prompt.starts_with(
            "Based on the research report, write a 100-word blog post about Space Exploration"
        ));
        assert!(requests[1].prompt.ends_with("## 1. Overview"));
    }

    #[tokio::test]
    async fn test_unavailable_backend_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::new().reply("never"));
        let probe = Arc::new(StaticProbe::unavailable(ProbeStatus::NotInstalled, "not installed"));
        let runner = pipeline(probe.clone(), llm.clone(), dir.path());

        let err = runner.run(&Topic::new("AI").unwrap()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        assert_eq!(probe.calls(), 1);
        assert!(llm.requests().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unsafe_report_name_rejected_before_generation() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::new().reply("report").reply("post"));
        let probe = Arc::new(StaticProbe::ready());
        let runner = pipeline(probe.clone(), llm.clone(), dir.path());

        let err = runner.run(&Topic::new("AI/ML").unwrap()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(probe.calls(), 0);
        assert!(llm.requests().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_draft_writes_nothing_until_published() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::new().reply("# Quantum report").reply("Qubits!"));
        let runner = pipeline(Arc::new(StaticProbe::ready()), llm, dir.path());

        let draft = runner
            .draft(&Topic::new("Quantum Computing").unwrap(), Arc::new(CollectingEventSink::new()))
            .await
            .unwrap();

        assert_eq!(draft.report_path, dir.path().join("quantum_computing_research_report.md"));
        assert!(!draft.report_path.exists());

        let result = runner.publish(draft).await.unwrap();
        assert_eq!(result.final_output, "Qubits!");
        assert!(std::fs::read_to_string(&result.report_path).unwrap().contains("# Quantum report"));
    }

    #[tokio::test]
    async fn test_probe_is_consulted_once_per_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut probe = MockBackendProbe::new();
        probe
            .expect_probe()
            .times(1)
            .returning(|| ProbeReport::new(ProbeStatus::ModelMissing, "pull the model"));
        let runner = pipeline(Arc::new(probe), Arc::new(ScriptedLlm::new()), dir.path());

        let err = runner.run(&Topic::new("AI").unwrap()).await.unwrap_err();
        assert!(matches!(err, CrewflowError::BackendUnavailable { ref message } if message == "pull the model"));
    }

    #[tokio::test]
    async fn test_research_failure_skips_writing_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::new().fail(LlmError::ModelNotFound("mistral:latest".into())));
        let runner = pipeline(Arc::new(StaticProbe::ready()), llm.clone(), dir.path());

        let err = runner.run(&Topic::new("Cybersecurity").unwrap()).await.unwrap_err();

        assert_eq!(err.cause(), Some(FailureCause::Model));
        assert_eq!(err.remediation("mistral:latest").unwrap().steps[0], "ollama pull mistral:latest");
        assert_eq!(llm.requests().len(), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_writing_failure_reports_writing_stage() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(
            ScriptedLlm::new()
                .reply("report")
                .fail(LlmError::Connection("http://localhost:11434".into())),
        );
        let runner = pipeline(Arc::new(StaticProbe::ready()), llm, dir.path());

        let err = runner.run(&Topic::new("Biotechnology").unwrap()).await.unwrap_err();

        assert!(matches!(
            err,
            CrewflowError::GenerationFailed { ref stage, cause: FailureCause::Connection, .. } if stage == WRITING_TASK
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_blank_research_is_missing_output() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::new().reply("  ").reply("post"));
        let runner = pipeline(Arc::new(StaticProbe::ready()), llm.clone(), dir.path());

        let err = runner.run(&Topic::new("AI").unwrap()).await.unwrap_err();

        assert_eq!(err.cause(), Some(FailureCause::MissingOutput));
        // Writing never ran on an empty report.
        assert_eq!(llm.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_foreign_provider_is_model_failure() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::new().with_provider("openai").reply("x"));
        let runner = pipeline(Arc::new(StaticProbe::ready()), llm.clone(), dir.path());

        let err = runner.run(&Topic::new("AI").unwrap()).await.unwrap_err();

        assert_eq!(err.cause(), Some(FailureCause::Model));
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn test_rerun_overwrites_report() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(
            ScriptedLlm::new()
                .reply("first report")
                .reply("first post")
                .reply("second report")
                .reply("second post"),
        );
        let runner = pipeline(Arc::new(StaticProbe::ready()), llm, dir.path());
        let topic = Topic::new("Renewable Energy").unwrap();

        let first = runner.run(&topic).await.unwrap();
        let second = runner.run(&topic).await.unwrap();

        assert_eq!(first.report_path, second.report_path);
        assert_ne!(first.run_id, second.run_id);
        let file = std::fs::read_to_string(&second.report_path).unwrap();
        assert!(file.contains("second report"));
        assert!(!file.contains("first report"));
    }

    #[tokio::test]
    async fn test_run_observed_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::new().reply("report").reply("post"));
        let runner = pipeline(Arc::new(StaticProbe::ready()), llm, dir.path());
        let sink = Arc::new(CollectingEventSink::new());

        let result = runner
            .run_observed(&Topic::new("AI").unwrap(), sink.clone())
            .await
            .unwrap();

        let progress = sink.stage_progress();
        assert_eq!(progress.first(), Some(&("research".to_string(), "started".to_string())));
        assert_eq!(progress.last(), Some(&("writing".to_string(), "completed".to_string())));

        let (_, data) = &sink.events_of_type("pipeline.completed")[0];
        let data = data.as_ref().unwrap();
        assert_eq!(data["pipeline_run_id"], result.run_id.to_string());
        assert_eq!(data["topic"], "AI");
    }

    #[test]
    fn test_from_config() {
        let runner = ResearchPipeline::from_config(&CrewflowConfig::default()).unwrap();
        assert_eq!(runner.model().to_string(), "ollama/mistral:latest");
        assert_eq!(runner.client().provider(), "ollama");
        assert_eq!(runner.crew().unwrap().tasks().len(), 2);
    }
}
