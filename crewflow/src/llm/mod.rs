//! Local model backend client.
//!
//! The crew layer talks to models only through [`LlmClient`]. Errors are
//! typed so that a failing stage can report a [`FailureCause`] without
//! looking at message text.

mod ollama;

pub use ollama::OllamaClient;

use crate::errors::{CrewflowError, FailureCause};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A provider-prefixed model identifier such as `ollama/mistral:latest`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRef {
    /// Backend provider (`ollama`).
    pub provider: String,
    /// Model name as the backend knows it (`mistral:latest`).
    pub name: String,
}

impl ModelRef {
    /// Creates a model reference.
    #[must_use]
    pub fn new(provider: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            name: name.into(),
        }
    }
}

impl FromStr for ModelRef {
    type Err = CrewflowError;

    /// Splits on the first `/`; the name may itself contain slashes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((provider, name)) if !provider.is_empty() && !name.is_empty() => {
                Ok(Self::new(provider, name))
            }
            _ => Err(CrewflowError::InvalidInput(format!(
                "model identifier '{s}' must look like 'provider/model'"
            ))),
        }
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.name)
    }
}

/// A single non-streaming generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmRequest {
    /// Model name without provider prefix.
    pub model: String,
    /// System prompt.
    pub system: Option<String>,
    /// User prompt.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

impl LlmRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            prompt: prompt.into(),
            temperature: None,
        }
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A completed generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Generated text.
    pub content: String,
    /// Model that produced the text.
    pub model: String,
    /// Provider that served the request.
    pub provider: String,
    /// Prompt tokens, when reported.
    pub input_tokens: Option<u64>,
    /// Completion tokens, when reported.
    pub output_tokens: Option<u64>,
    /// Wall-clock latency.
    pub latency_ms: f64,
}

/// Errors from a model backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    /// The backend refused or dropped the connection.
    #[error("cannot connect to backend at {0}")]
    Connection(String),

    /// The request exceeded its timeout.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// The backend does not have the model.
    #[error("model '{0}' not found")]
    ModelNotFound(String),

    /// Non-success HTTP status.
    #[error("backend returned {status}: {body}")]
    Backend {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("cannot parse backend response: {0}")]
    ResponseParsing(String),

    /// The model belongs to a provider this client does not serve.
    #[error("provider '{requested}' is not served by this client ({served})")]
    UnsupportedProvider {
        /// Provider named by the model identifier.
        requested: String,
        /// Provider this client serves.
        served: String,
    },

    /// Any other client-side failure.
    #[error("{0}")]
    Client(String),
}

impl LlmError {
    /// Maps the error onto the cause reported by a failing stage.
    #[must_use]
    pub fn cause(&self) -> FailureCause {
        match self {
            Self::Connection(_) => FailureCause::Connection,
            Self::Timeout(_) => FailureCause::Timeout,
            Self::ModelNotFound(_) | Self::UnsupportedProvider { .. } => FailureCause::Model,
            Self::Backend { .. } | Self::ResponseParsing(_) | Self::Client(_) => {
                FailureCause::Other
            }
        }
    }
}

/// A model backend.
#[async_trait]
pub trait LlmClient: Send + Sync + fmt::Debug {
    /// The provider prefix this client serves (`ollama`).
    fn provider(&self) -> &str;

    /// Runs one generation to completion.
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Lists the models the backend has installed.
    async fn list_models(&self) -> Result<Vec<String>, LlmError>;
}
