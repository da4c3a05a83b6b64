//! # Crewflow
//!
//! Turns a topic into a markdown research report and a short blog post
//! using agents backed by a local model server.
//!
//! Crewflow provides:
//!
//! - **Stage-based execution**: stages with explicit dependencies, run in a
//!   deterministic order
//! - **Agents and tasks**: personas bound to a model, with templated
//!   instructions and declared data-flow edges between tasks
//! - **Availability probe**: a readiness check run before any generation
//! - **Report persistence**: a front-matter markdown file per topic
//! - **Event-driven observability**: stage and pipeline events sent to an
//!   explicit sink
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use crewflow::prelude::*;
//!
//! let config = CrewflowConfig::load(None)?;
//! let pipeline = ResearchPipeline::from_config(&config)?;
//!
//! let result = pipeline.run(&Topic::new("Space Exploration")?).await?;
//! println!("{}", result.report_path.display());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod core;
pub mod crew;
pub mod errors;
pub mod events;
pub mod llm;
pub mod observability;
pub mod pipeline;
pub mod probe;
pub mod report;
pub mod research;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::CrewflowConfig;
    pub use crate::context::{
        ContextSnapshot, ExecutionContext, PipelineContext, RunIdentity, StageContext,
        StageInputs,
    };
    pub use crate::core::{StageKind, StageOutput, StageStatus};
    pub use crate::crew::{Agent, Crew, CrewOutput, Task, TaskOutput};
    pub use crate::errors::{
        CrewflowError, ErrorKind, FailureCause, GraphErrorCode, PipelineValidationError,
        Remediation,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::llm::{LlmClient, LlmRequest, LlmResponse, ModelRef, OllamaClient};
    pub use crate::pipeline::{PipelineBuilder, StageGraph, StageSpec};
    pub use crate::probe::{AvailabilityProbe, BackendProbe, ProbeReport, ProbeStatus};
    pub use crate::report::{report_filename, ReportPersister, REPORT_SUFFIX};
    pub use crate::research::{PipelineResult, ResearchDraft, ResearchPipeline, Topic};
    pub use crate::stages::Stage;
}
