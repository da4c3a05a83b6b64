//! Run identity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one research run. Every event of the run carries these
/// fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// Unique per run.
    pub pipeline_run_id: Uuid,

    /// The topic being researched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl Default for RunIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl RunIdentity {
    /// Creates an identity with a fresh run id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pipeline_run_id: Uuid::new_v4(),
            topic: None,
        }
    }

    /// Attaches the run's topic.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_run_gets_its_own_id() {
        assert_ne!(RunIdentity::new().pipeline_run_id, RunIdentity::new().pipeline_run_id);
    }

    #[test]
    fn test_topic_serialization() {
        let json = serde_json::to_value(RunIdentity::new()).unwrap();
        assert!(json.get("topic").is_none());

        let identity = RunIdentity::new().with_topic("Renewable Energy");
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["topic"], "Renewable Energy");
        assert_eq!(serde_json::from_value::<RunIdentity>(json).unwrap(), identity);
    }
}
