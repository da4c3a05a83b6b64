//! Agent personas.

use crate::llm::ModelRef;
use serde::{Deserialize, Serialize};

/// A named role with a goal and persona, bound to one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Role name, e.g. "Research Specialist".
    pub role: String,
    /// What the agent is trying to achieve.
    pub goal: String,
    /// Persona description.
    pub backstory: String,
    /// Model the agent runs on.
    pub llm: ModelRef,
}

impl Agent {
    /// Creates an agent.
    #[must_use]
    pub fn new(
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
        llm: ModelRef,
    ) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            llm,
        }
    }

    /// System prompt presenting the persona to the model.
    #[must_use]
    pub fn system_prompt(&self) -> String {
        format!(
            "You are {}. {}\nYour personal goal is: {}",
            self.role, self.backstory, self.goal
        )
    }
}
