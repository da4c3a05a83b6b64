//! A stage plus its place in the graph.

use crate::core::StageKind;
use crate::errors::{GraphErrorCode, PipelineValidationError};
use crate::stages::Stage;
use std::collections::BTreeSet;
use std::sync::Arc;

/// A stage with its name, dependencies and kind.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// Unique within a graph.
    pub name: String,
    /// What runs.
    pub runner: Arc<dyn Stage>,
    /// Stages whose outputs this stage reads.
    pub dependencies: BTreeSet<String>,
    /// Work or agent; reported in `stage.started` events.
    pub kind: StageKind,
}

impl StageSpec {
    /// A `Work` stage with no dependencies.
    #[must_use]
    pub fn new(name: impl Into<String>, runner: Arc<dyn Stage>) -> Self {
        Self {
            name: name.into(),
            runner,
            dependencies: BTreeSet::new(),
            kind: StageKind::Work,
        }
    }

    /// Replaces the dependency set.
    #[must_use]
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Adds one dependency.
    #[must_use]
    pub fn with_dependency(mut self, dep: impl Into<String>) -> Self {
        self.dependencies.insert(dep.into());
        self
    }

    /// Sets the kind.
    #[must_use]
    pub fn with_kind(mut self, kind: StageKind) -> Self {
        self.kind = kind;
        self
    }

    /// Checks what can be checked without the rest of the graph.
    ///
    /// # Errors
    ///
    /// `BlankName` or `SelfDependency`.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        if self.name.trim().is_empty() {
            return Err(PipelineValidationError::new(
                GraphErrorCode::BlankName,
                "Stage name cannot be empty",
            ));
        }
        if self.dependencies.contains(&self.name) {
            return Err(PipelineValidationError::new(
                GraphErrorCode::SelfDependency,
                format!("Stage '{}' cannot depend on itself", self.name),
            )
            .with_stages(vec![self.name.clone()]));
        }
        Ok(())
    }
}
