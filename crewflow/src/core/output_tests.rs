//! Tests for `StageOutput`.

#[cfg(test)]
mod tests {
    use crate::core::{StageOutput, StageStatus};
    use crate::errors::FailureCause;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_task_answer_with_model_metadata() {
        let output = StageOutput::ok(HashMap::from([
            ("raw".to_string(), serde_json::json!("## 1. Overview")),
            ("agent_role".to_string(), serde_json::json!("Research Specialist")),
        ]))
        .add_metadata("model", serde_json::json!("mistral:latest"))
        .add_metadata("latency_ms", serde_json::json!(1234.0));

        assert!(output.is_success());
        assert_eq!(output.get_str("raw"), Some("## 1. Overview"));
        assert_eq!(output.metadata["model"], "mistral:latest");
        assert_eq!(output.data_or_empty().len(), 2);
    }

    #[test]
    fn test_empty_output() {
        let output = StageOutput::ok_empty();
        assert_eq!(output.status, StageStatus::Ok);
        assert!(output.data.is_none());
        assert!(output.data_or_empty().is_empty());
        assert!(output.get_str("raw").is_none());
    }

    #[test]
    fn test_get_str_only_reads_strings() {
        let output = StageOutput::ok_value("output_tokens", serde_json::json!(87));
        assert_eq!(output.get("output_tokens"), Some(&serde_json::json!(87)));
        assert!(output.get_str("output_tokens").is_none());
    }

    #[test]
    fn test_skip_counts_as_success() {
        let output = StageOutput::skip("nothing to write");
        assert_eq!(output.status, StageStatus::Skip);
        assert!(output.is_success());
        assert_eq!(output.skip_reason.as_deref(), Some("nothing to write"));
    }

    #[test]
    fn test_fail_defaults_to_other_cause() {
        let output = StageOutput::fail("bad template");
        assert!(output.is_failure());
        assert_eq!(output.cause, Some(FailureCause::Other));
    }

    #[test]
    fn test_failure_serialization_keeps_cause() {
        let output = StageOutput::fail_with_cause("model 'x' not found", FailureCause::Model);
        let json = serde_json::to_value(&output).unwrap();

        assert_eq!(json["status"], "fail");
        assert_eq!(json["cause"], "model");
        assert!(json.get("data").is_none());

        let back: StageOutput = serde_json::from_value(json).unwrap();
        assert_eq!(back.cause, Some(FailureCause::Model));
        assert_eq!(back.error.as_deref(), Some("model 'x' not found"));
    }
}
