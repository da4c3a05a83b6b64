//! Configuration for crewflow runs.
//!
//! Every field has a default, so an empty or missing file is a valid
//! configuration. Environment variables override file values.

use crate::errors::{CrewflowError, Result};
use crate::llm::ModelRef;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding [`BackendConfig::base_url`].
pub const ENV_OLLAMA_URL: &str = "CREWFLOW_OLLAMA_URL";
/// Environment variable overriding [`BackendConfig::model`].
pub const ENV_MODEL: &str = "CREWFLOW_MODEL";
/// Environment variable overriding [`ReportConfig::output_dir`].
pub const ENV_OUTPUT_DIR: &str = "CREWFLOW_OUTPUT_DIR";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrewflowConfig {
    /// Local backend connection.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Availability probe.
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Report output.
    #[serde(default)]
    pub report: ReportConfig,

    /// Log output.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Local backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend HTTP API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Provider-prefixed model identifier, e.g. `ollama/mistral:latest`.
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout. Local generation can take minutes.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Sampling temperature; the backend default applies when unset.
    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "ollama/mistral:latest".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    600
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            request_timeout_secs: default_request_timeout_secs(),
            temperature: None,
        }
    }
}

impl BackendConfig {
    /// Parses [`Self::model`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the identifier lacks a provider or name.
    pub fn model_ref(&self) -> Result<ModelRef> {
        self.model.parse()
    }

    /// Returns the request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Availability probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Inventory command.
    #[serde(default = "default_probe_program")]
    pub program: String,

    /// Arguments passed to the inventory command.
    #[serde(default = "default_probe_args")]
    pub args: Vec<String>,

    /// Substring that must appear in the inventory output. Defaults to the
    /// model part of [`BackendConfig::model`].
    #[serde(default)]
    pub required_model: Option<String>,

    /// `None` waits for the command indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_probe_program() -> String {
    "ollama".to_string()
}

fn default_probe_args() -> Vec<String> {
    vec!["list".to_string()]
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            program: default_probe_program(),
            args: default_probe_args(),
            required_model: None,
            timeout_secs: None,
        }
    }
}

/// Report file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Directory reports are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// `generated_by` front-matter value.
    #[serde(default = "default_generated_by")]
    pub generated_by: String,

    /// `model` front-matter value.
    #[serde(default = "default_backend_label")]
    pub backend_label: String,

    /// Footer line, written in italics.
    #[serde(default = "default_attribution")]
    pub attribution: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_generated_by() -> String {
    "Research Specialist".to_string()
}

fn default_backend_label() -> String {
    "Ollama + Mistral (Free Local AI)".to_string()
}

fn default_attribution() -> String {
    "This report was generated using free local AI (Ollama + Mistral)".to_string()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            generated_by: default_generated_by(),
            backend_label: default_backend_label(),
            attribution: default_attribution(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Emit JSON log lines instead of human-readable ones.
    #[serde(default)]
    pub json: bool,

    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "crewflow=info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            json: false,
            filter: default_filter(),
        }
    }
}

impl CrewflowConfig {
    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the text is not valid TOML for this schema.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| CrewflowError::Config(e.to_string()))
    }

    /// Loads configuration from an optional file, then applies environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    CrewflowError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };

        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Applies overrides from a variable lookup.
    #[must_use]
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(ENV_OLLAMA_URL) {
            self.backend.base_url = url;
        }
        if let Some(model) = non_empty(ENV_MODEL) {
            self.backend.model = model;
        }
        if let Some(dir) = non_empty(ENV_OUTPUT_DIR) {
            self.report.output_dir = PathBuf::from(dir);
        }
        self
    }

    /// Returns the substring the probe must find in the inventory output.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if no override is set and the model
    /// identifier is malformed.
    pub fn required_model(&self) -> Result<String> {
        match &self.probe.required_model {
            Some(model) => Ok(model.clone()),
            None => Ok(self.backend.model_ref()?.name),
        }
    }
}
