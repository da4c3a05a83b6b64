//! Validating graph builder.

use super::{StageGraph, StageSpec};
use crate::errors::{GraphErrorCode, PipelineValidationError};
use crate::stages::Stage;
use std::collections::HashMap;
use std::sync::Arc;

/// Collects stages and checks the graph as it grows.
///
/// A stage may only depend on stages added before it, so graphs built here
/// are acyclic by construction. The cycle check still runs on every push.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    stages: HashMap<String, StageSpec>,
    order: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnPath,
    Done,
}

impl PipelineBuilder {
    /// An empty builder for the graph called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Chaining form of [`Self::push`].
    ///
    /// # Errors
    ///
    /// See [`Self::push`].
    pub fn stage(
        mut self,
        name: impl Into<String>,
        runner: Arc<dyn Stage>,
        dependencies: &[&str],
    ) -> Result<Self, PipelineValidationError> {
        self.push(StageSpec::new(name, runner).with_dependencies(dependencies.iter().copied()))?;
        Ok(self)
    }

    /// Adds `spec` after the stages already pushed.
    ///
    /// # Errors
    ///
    /// Blank names, self dependencies, duplicate names, dependencies on
    /// stages not yet pushed and cycles.
    pub fn push(&mut self, spec: StageSpec) -> Result<(), PipelineValidationError> {
        spec.validate()?;

        if self.stages.contains_key(&spec.name) {
            return Err(PipelineValidationError::new(
                GraphErrorCode::DuplicateStage,
                format!("Stage '{}' is defined twice", spec.name),
            )
            .with_stages(vec![spec.name.clone()]));
        }

        if let Some(dep) = spec.dependencies.iter().find(|d| !self.stages.contains_key(*d)) {
            return Err(PipelineValidationError::new(
                GraphErrorCode::UnknownDependency,
                format!(
                    "Stage '{}' depends on '{dep}', which must be added first",
                    spec.name
                ),
            )
            .with_stages(vec![spec.name.clone(), dep.clone()]));
        }

        self.order.push(spec.name.clone());
        self.stages.insert(spec.name.clone(), spec);

        self.find_cycle()
            .map_or(Ok(()), |path| Err(PipelineValidationError::cycle(path)))
    }

    /// Freezes the builder into an executable graph.
    ///
    /// # Errors
    ///
    /// `Empty` when no stage was pushed.
    pub fn build(self) -> Result<StageGraph, PipelineValidationError> {
        if self.stages.is_empty() {
            return Err(PipelineValidationError::new(
                GraphErrorCode::Empty,
                format!("Pipeline '{}' has no stages", self.name),
            ));
        }
        Ok(StageGraph::new(self.name, self.stages, &self.order))
    }

    /// Graph name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stages pushed so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// `true` before the first push.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// First dependency cycle in push order, as a path that starts and ends
    /// on the same stage.
    fn find_cycle(&self) -> Option<Vec<String>> {
        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut path: Vec<&str> = Vec::new();
        self.order
            .iter()
            .find_map(|name| self.walk(name, &mut marks, &mut path))
    }

    fn walk<'a>(
        &'a self,
        name: &'a str,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        match marks.get(name) {
            Some(Mark::Done) => return None,
            Some(Mark::OnPath) => {
                let start = path.iter().position(|n| *n == name)?;
                let mut cycle: Vec<String> = path[start..].iter().map(|n| (*n).to_string()).collect();
                cycle.push(name.to_string());
                return Some(cycle);
            }
            None => {}
        }

        marks.insert(name, Mark::OnPath);
        path.push(name);
        let deps = self.stages.get(name).map(|s| &s.dependencies);
        let found = deps
            .into_iter()
            .flatten()
            .find_map(|dep| self.walk(dep, marks, path));
        path.pop();
        marks.insert(name, Mark::Done);
        found
    }
}
