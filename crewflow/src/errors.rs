//! Error types for the crewflow pipeline.
//!
//! Every failure a run can hit is one of a small set of kinds. Generation
//! failures carry an explicit [`FailureCause`] taken from the backend
//! client's typed error, so callers never have to inspect message text.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for crewflow operations.
#[derive(Debug, Error)]
pub enum CrewflowError {
    /// Input was rejected before any work started.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The local backend is not running or lacks the required model.
    #[error("Backend unavailable: {message}")]
    BackendUnavailable {
        /// Diagnostic produced by the availability probe.
        message: String,
    },

    /// A generation stage failed.
    #[error("Generation failed in stage '{stage}': {message}")]
    GenerationFailed {
        /// The stage that failed.
        stage: String,
        /// The underlying error message.
        message: String,
        /// Why the stage failed.
        cause: FailureCause,
    },

    /// The report could not be written.
    #[error("Failed to write report to {}: {source}", path.display())]
    PersistFailed {
        /// Target path of the report.
        path: PathBuf,
        /// The io error.
        #[source]
        source: std::io::Error,
    },

    /// A pipeline validation error occurred.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// The coarse error kinds surfaced to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The backend probe failed.
    BackendUnavailable,
    /// Generation failed.
    GenerationFailed,
    /// The report could not be written.
    PersistFailed,
    /// Input or configuration was rejected.
    InvalidInput,
}

impl CrewflowError {
    /// Creates a generation failure.
    #[must_use]
    pub fn generation(
        stage: impl Into<String>,
        message: impl Into<String>,
        cause: FailureCause,
    ) -> Self {
        Self::GenerationFailed {
            stage: stage.into(),
            message: message.into(),
            cause,
        }
    }

    /// Returns the coarse kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            Self::GenerationFailed { .. } => ErrorKind::GenerationFailed,
            Self::PersistFailed { .. } => ErrorKind::PersistFailed,
            Self::InvalidInput(_) | Self::Validation(_) | Self::Config(_) => {
                ErrorKind::InvalidInput
            }
        }
    }

    /// Returns the failure cause for generation errors.
    #[must_use]
    pub fn cause(&self) -> Option<FailureCause> {
        match self {
            Self::GenerationFailed { cause, .. } => Some(*cause),
            _ => None,
        }
    }

    /// Returns setup guidance for errors the user can fix locally.
    ///
    /// `model` is the backend model name (without provider prefix) used in
    /// the suggested commands.
    #[must_use]
    pub fn remediation(&self, model: &str) -> Option<Remediation> {
        match self {
            Self::BackendUnavailable { .. } => Some(Remediation::new(
                "Quick fix guide",
                [
                    "Install Ollama: https://ollama.com/download".to_string(),
                    format!("Download model: ollama pull {model}"),
                    "Start service: ollama serve".to_string(),
                    "Re-run this command".to_string(),
                ],
            )),
            Self::GenerationFailed {
                cause: FailureCause::Connection | FailureCause::Timeout,
                ..
            } => Some(Remediation::new(
                "Connection issue - try",
                [
                    "ollama serve".to_string(),
                    "Wait 10 seconds, then re-run".to_string(),
                ],
            )),
            Self::GenerationFailed {
                cause: FailureCause::Model,
                ..
            } => Some(Remediation::new(
                "Model issue - try",
                [
                    format!("ollama pull {model}"),
                    "ollama list (to verify)".to_string(),
                ],
            )),
            _ => None,
        }
    }
}

/// Why a generation stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// The backend could not be reached.
    Connection,
    /// The backend did not answer in time.
    Timeout,
    /// The model is missing or not served by this backend.
    Model,
    /// A stage finished without producing its output.
    MissingOutput,
    /// Anything else.
    #[default]
    Other,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "connection"),
            Self::Timeout => write!(f, "timeout"),
            Self::Model => write!(f, "model"),
            Self::MissingOutput => write!(f, "missing_output"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// A titled list of steps shown to the user after a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remediation {
    /// Heading for the steps.
    pub title: String,
    /// Ordered steps.
    pub steps: Vec<String>,
}

impl Remediation {
    /// Creates a remediation.
    #[must_use]
    pub fn new(title: impl Into<String>, steps: impl IntoIterator<Item = String>) -> Self {
        Self {
            title: title.into(),
            steps: steps.into_iter().collect(),
        }
    }
}

/// Why a stage graph was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphErrorCode {
    /// A stage name is empty or whitespace.
    BlankName,
    /// A stage lists itself as a dependency.
    SelfDependency,
    /// Two stages share a name.
    DuplicateStage,
    /// A dependency names a stage that was not added first.
    UnknownDependency,
    /// The dependencies form a cycle.
    Cycle,
    /// The graph has no stages.
    Empty,
}

/// A stage graph failed validation.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// What was wrong.
    pub code: GraphErrorCode,
    /// Human-readable description.
    pub message: String,
    /// The stages involved, in the order they matter.
    pub stages: Vec<String>,
}

impl PipelineValidationError {
    /// Creates a validation error.
    #[must_use]
    pub fn new(code: GraphErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            stages: Vec::new(),
        }
    }

    /// A cycle along `path`, which starts and ends with the same stage.
    #[must_use]
    pub fn cycle(path: Vec<String>) -> Self {
        Self {
            code: GraphErrorCode::Cycle,
            message: format!("Cycle detected in pipeline: {}", path.join(" -> ")),
            stages: path,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }
}

/// A stage read the output of a stage it did not declare.
///
/// Stages report it as a failed [`crate::core::StageOutput`], so it reaches
/// callers as `GenerationFailed` naming the stage.
#[derive(Debug, Clone, Error)]
#[error("Undeclared dependency: stage '{stage}' attempted to access '{key}' which was not declared as a dependency")]
pub struct UndeclaredDependencyError {
    /// The stage attempting access.
    pub stage: String,
    /// The undeclared key.
    pub key: String,
}

impl UndeclaredDependencyError {
    /// Creates a new undeclared dependency error.
    #[must_use]
    pub fn new(stage: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            key: key.into(),
        }
    }
}

/// Convenience result alias.
pub type Result<T, E = CrewflowError> = std::result::Result<T, E>;
