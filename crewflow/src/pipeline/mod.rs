//! Pipeline building and execution.
//!
//! This module provides:
//! - Stage specifications
//! - A pipeline builder that validates dependencies and rejects cycles
//! - A sequential DAG executor

mod builder;
mod dag;
mod spec;

pub use builder::PipelineBuilder;
pub use dag::{GraphExecutionResult, StageFailure, StageGraph};
pub use spec::StageSpec;
