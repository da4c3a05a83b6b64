//! Context management for pipeline execution.
//!
//! This module provides:
//! - Run identity for correlating events of a single run
//! - Immutable context snapshots holding the run inputs
//! - Execution contexts handed to each stage
//! - Strict views over prior stage outputs

mod execution;
mod identity;
mod inputs;
mod snapshot;

pub use execution::{ExecutionContext, PipelineContext, StageContext};
pub use identity::RunIdentity;
pub use inputs::{OutputData, StageInputs};
pub use snapshot::ContextSnapshot;
