//! Stage status, kind and output.

mod output;
#[cfg(test)]
mod output_tests;
mod status;

pub use output::StageOutput;
pub use status::{StageKind, StageStatus};
