//! Stage status and kind.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a stage does, reported in `stage.started` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Plain work with no model involved.
    #[default]
    Work,
    /// An agent persona talking to a model.
    Agent,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Work => write!(f, "work"),
            Self::Agent => write!(f, "agent"),
        }
    }
}

/// Where a stage is in its lifecycle.
///
/// Only `Ok`, `Skip` and `Fail` are valid results of a finished stage; the
/// graph treats any other status returned by a stage as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Finished and produced output.
    Ok,
    /// Finished without doing anything.
    Skip,
    /// Finished unsuccessfully.
    Fail,
    /// Not started.
    #[default]
    Pending,
    /// Started, not finished.
    Running,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Ok => "ok",
            Self::Skip => "skip",
            Self::Fail => "fail",
            Self::Pending => "pending",
            Self::Running => "running",
        };
        f.write_str(text)
    }
}

impl StageStatus {
    /// True for `Ok` and `Skip`.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Ok | Self::Skip)
    }

    /// True for `Fail`.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Fail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfinished_statuses_are_neither() {
        for status in [StageStatus::Pending, StageStatus::Running] {
            assert!(!status.is_success());
            assert!(!status.is_failure());
        }
        assert!(StageStatus::Skip.is_success());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&StageStatus::Ok).unwrap(), r#""ok""#);
        assert_eq!(serde_json::to_string(&StageKind::Agent).unwrap(), r#""agent""#);
        assert_eq!(StageKind::default().to_string(), "work");
        assert_eq!(StageStatus::Fail.to_string(), "fail");
    }
}
