//! Testing utilities for crewflow pipelines.
//!
//! This module provides:
//! - A scripted model client that records every request
//! - A fixed-answer backend probe
//! - Assertions for stage outputs

mod assertions;
mod mocks;

pub use assertions::{assert_output_failed_with, assert_output_str, assert_output_succeeded};
pub use mocks::{ScriptedLlm, StaticProbe};
