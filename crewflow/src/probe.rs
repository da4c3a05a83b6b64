//! Backend availability probe.
//!
//! Runs the backend's inventory command and looks for the required model in
//! its output. Every failure mode becomes a [`ProbeReport`]; nothing is
//! propagated to the caller.

use crate::config::CrewflowConfig;
use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

/// Outcome of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    /// The command succeeded and listed the required model.
    Ready,
    /// The command succeeded but the model is not installed.
    ModelMissing,
    /// The command could not be found.
    NotInstalled,
    /// The command did not finish within the timeout.
    TimedOut,
    /// The command could not be run or exited unsuccessfully.
    CommandFailed,
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::ModelMissing => write!(f, "model_missing"),
            Self::NotInstalled => write!(f, "not_installed"),
            Self::TimedOut => write!(f, "timed_out"),
            Self::CommandFailed => write!(f, "command_failed"),
        }
    }
}

/// Probe status plus a human-readable diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    /// Outcome.
    pub status: ProbeStatus,
    /// Diagnostic message.
    pub message: String,
}

impl ProbeReport {
    /// Creates a report.
    #[must_use]
    pub fn new(status: ProbeStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Returns true only when the backend is usable.
    #[must_use]
    pub fn ready(&self) -> bool {
        self.status == ProbeStatus::Ready
    }
}

/// A readiness check performed before generation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BackendProbe: Send + Sync {
    /// Checks the backend. Never fails.
    async fn probe(&self) -> ProbeReport;
}

/// Probe that shells out to the backend's inventory command.
#[derive(Debug, Clone)]
pub struct AvailabilityProbe {
    program: String,
    args: Vec<String>,
    required_model: String,
    timeout: Option<Duration>,
}

impl AvailabilityProbe {
    /// Creates a probe running `program args...` and looking for
    /// `required_model` in its stdout.
    #[must_use]
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
        required_model: impl Into<String>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            required_model: required_model.into(),
            timeout: None,
        }
    }

    /// Builds the probe described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the model identifier is malformed.
    pub fn from_config(config: &CrewflowConfig) -> Result<Self> {
        let probe = Self::new(
            config.probe.program.clone(),
            config.probe.args.clone(),
            config.required_model()?,
        );
        Ok(probe.with_timeout(config.probe.timeout_secs.map(Duration::from_secs)))
    }

    /// Bounds the command's runtime. `None` waits indefinitely.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the timeout.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the model substring the probe looks for.
    #[must_use]
    pub fn required_model(&self) -> &str {
        &self.required_model
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn run(&self) -> ProbeReport {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, command.output()).await {
                Ok(result) => result,
                Err(_) => {
                    return ProbeReport::new(
                        ProbeStatus::TimedOut,
                        format!(
                            "'{}' did not answer within {}s; the backend may be starting or stuck",
                            self.command_line(),
                            limit.as_secs_f64()
                        ),
                    );
                }
            },
            None => command.output().await,
        };

        let output = match output {
            Ok(output) => output,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return ProbeReport::new(
                    ProbeStatus::NotInstalled,
                    format!("'{}' is not installed or not on PATH", self.program),
                );
            }
            Err(err) => {
                return ProbeReport::new(
                    ProbeStatus::CommandFailed,
                    format!("cannot run '{}': {err}", self.command_line()),
                );
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return ProbeReport::new(
                ProbeStatus::CommandFailed,
                format!(
                    "'{}' failed ({}); the backend is not running or not accessible: {}",
                    self.command_line(),
                    output.status,
                    stderr.trim()
                ),
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.contains(&self.required_model) {
            ProbeReport::new(
                ProbeStatus::Ready,
                format!("Backend is running with {}", self.required_model),
            )
        } else {
            ProbeReport::new(
                ProbeStatus::ModelMissing,
                format!(
                    "Model '{}' is not installed; run 'ollama pull {}'",
                    self.required_model, self.required_model
                ),
            )
        }
    }
}

#[async_trait]
impl BackendProbe for AvailabilityProbe {
    async fn probe(&self) -> ProbeReport {
        let report = self.run().await;
        if report.ready() {
            info!(command = %self.command_line(), model = %self.required_model, "Backend ready");
        } else {
            warn!(
                command = %self.command_line(),
                status = %report.status,
                message = %report.message,
                "Backend not ready"
            );
        }
        report
    }
}
