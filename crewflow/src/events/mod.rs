//! Lifecycle events.
//!
//! Sinks are handed to a [`crate::context::PipelineContext`] explicitly;
//! there is no process-wide sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
