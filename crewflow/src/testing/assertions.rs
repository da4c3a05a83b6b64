//! Test assertions for stage outputs.

use crate::core::StageOutput;
use crate::errors::FailureCause;

/// Asserts that the output indicates success.
pub fn assert_output_succeeded(output: &StageOutput) {
    assert!(
        output.is_success(),
        "Expected success, got status: {:?} ({:?})",
        output.status,
        output.error
    );
}

/// Asserts that the output failed with the given cause.
pub fn assert_output_failed_with(output: &StageOutput, cause: FailureCause) {
    assert!(
        output.is_failure(),
        "Expected failure, got status: {:?}",
        output.status
    );
    assert_eq!(
        output.cause,
        Some(cause),
        "Expected cause {cause}, got {:?} (error: {:?})",
        output.cause,
        output.error
    );
}

/// Asserts that the output holds `expected` under `key`.
pub fn assert_output_str(output: &StageOutput, key: &str, expected: &str) {
    assert_eq!(
        output.get_str(key),
        Some(expected),
        "Unexpected value for '{}'. Keys: {:?}",
        key,
        output.data.as_ref().map(|d| d.keys().collect::<Vec<_>>())
    );
}
