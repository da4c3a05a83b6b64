//! Test doubles for the model client and the backend probe.

use crate::llm::{LlmClient, LlmError, LlmRequest, LlmResponse};
use crate::probe::{BackendProbe, ProbeReport, ProbeStatus};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A model client that answers from a script and records every request.
///
/// Replies are consumed in order; once the script is exhausted every call
/// fails with [`LlmError::Client`].
#[derive(Debug)]
pub struct ScriptedLlm {
    provider: String,
    models: Vec<String>,
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl Default for ScriptedLlm {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedLlm {
    /// Creates an `ollama` client with `mistral:latest` installed and an
    /// empty script.
    #[must_use]
    pub fn new() -> Self {
        Self {
            provider: "ollama".to_string(),
            models: vec!["mistral:latest".to_string()],
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queues a successful reply.
    #[must_use]
    pub fn reply(self, content: impl Into<String>) -> Self {
        self.replies.lock().push_back(Ok(content.into()));
        self
    }

    /// Queues a failure.
    #[must_use]
    pub fn fail(self, error: LlmError) -> Self {
        self.replies.lock().push_back(Err(error));
        self
    }

    /// Sets the provider the client claims to serve.
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Sets the installed models.
    #[must_use]
    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    /// Returns every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().push(request.clone());
        let next = self.replies.lock().pop_front();
        match next {
            Some(Ok(content)) => Ok(LlmResponse {
                content,
                model: request.model.clone(),
                provider: self.provider.clone(),
                input_tokens: None,
                output_tokens: None,
                latency_ms: 0.0,
            }),
            Some(Err(err)) => Err(err),
            None => Err(LlmError::Client("no scripted reply left".to_string())),
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        Ok(self.models.clone())
    }
}

/// A probe that always returns the same report and counts its calls.
#[derive(Debug)]
pub struct StaticProbe {
    report: ProbeReport,
    calls: AtomicUsize,
}

impl StaticProbe {
    /// A probe reporting a ready backend.
    #[must_use]
    pub fn ready() -> Self {
        Self::with_report(ProbeReport::new(ProbeStatus::Ready, "Backend is running"))
    }

    /// A probe reporting `status` with `message`.
    #[must_use]
    pub fn unavailable(status: ProbeStatus, message: impl Into<String>) -> Self {
        Self::with_report(ProbeReport::new(status, message))
    }

    fn with_report(report: ProbeReport) -> Self {
        Self {
            report,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of times the probe ran.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendProbe for StaticProbe {
    async fn probe(&self) -> ProbeReport {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.report.clone()
    }
}
