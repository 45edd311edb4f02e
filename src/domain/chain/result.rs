//! Step and chain results

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::StepError;
use super::options::ExecutionMode;

/// Version of the `ChainResult` and event stream layouts
pub const RESULT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    Skipped,
    Cancelled,
}

/// Outcome of one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_name: String,
    pub step_type: String,

    /// Resolved model key; unset when selection itself failed
    pub model: Option<String>,

    pub status: StepStatus,

    /// Opaque output locator (URL, path or mock locator)
    pub output: Option<String>,

    pub cost: f64,
    pub elapsed_ms: u64,
    pub error: Option<StepError>,

    /// Generator invocations made, 0 for dry runs and skipped steps
    pub attempts: u32,

    /// Backoff applied before each retry
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retry_delays_ms: Vec<u64>,

    /// Failed dependency that caused the skip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_because: Option<String>,
}

impl StepResult {
    fn base(step_name: &str, step_type: &str, model: Option<String>, status: StepStatus) -> Self {
        Self {
            step_name: step_name.to_string(),
            step_type: step_type.to_string(),
            model,
            status,
            output: None,
            cost: 0.0,
            elapsed_ms: 0,
            error: None,
            attempts: 0,
            retry_delays_ms: Vec::new(),
            skipped_because: None,
        }
    }

    pub fn succeeded(
        step_name: &str,
        step_type: &str,
        model: impl Into<String>,
        output: impl Into<String>,
        cost: f64,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            output: Some(output.into()),
            cost,
            elapsed_ms,
            ..Self::base(step_name, step_type, Some(model.into()), StepStatus::Succeeded)
        }
    }

    pub fn failed(
        step_name: &str,
        step_type: &str,
        model: Option<String>,
        error: StepError,
        elapsed_ms: u64,
    ) -> Self {
        let status = if error.is_cancelled() {
            StepStatus::Cancelled
        } else {
            StepStatus::Failed
        };

        Self {
            error: Some(error),
            elapsed_ms,
            ..Self::base(step_name, step_type, model, status)
        }
    }

    pub fn skipped(
        step_name: &str,
        step_type: &str,
        model: Option<String>,
        because: impl Into<String>,
    ) -> Self {
        Self {
            skipped_because: Some(because.into()),
            ..Self::base(step_name, step_type, model, StepStatus::Skipped)
        }
    }

    pub fn with_attempts(mut self, attempts: u32, retry_delays_ms: Vec<u64>) -> Self {
        self.attempts = attempts;
        self.retry_delays_ms = retry_delays_ms;
        self
    }

    pub fn success(&self) -> bool {
        self.status == StepStatus::Succeeded
    }

    pub fn retry_count(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

/// Outcome of a whole chain run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainResult {
    pub schema_version: u32,
    pub chain: String,
    pub mode: ExecutionMode,
    pub success: bool,
    pub cancelled: bool,

    /// One result per executed, failed or skipped step, in declaration order
    pub step_results: Vec<StepResult>,

    pub total_cost: f64,
    pub total_elapsed_ms: u64,

    /// Final namespace: `input` plus every successful step's output
    pub namespace: BTreeMap<String, Value>,
}

impl ChainResult {
    pub fn get_step(&self, name: &str) -> Option<&StepResult> {
        self.step_results.iter().find(|r| r.step_name == name)
    }

    pub fn output(&self, name: &str) -> Option<&str> {
        self.get_step(name).and_then(|r| r.output.as_deref())
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepResult> {
        self.step_results
            .iter()
            .filter(|r| r.status == StepStatus::Failed)
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.step_results.iter().filter(|r| r.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_result_constructors() {
        let ok = StepResult::succeeded("img", "generate_image", "flux-dev", "s3://img.png", 0.03, 4000)
            .with_attempts(2, vec![500]);
        assert!(ok.success());
        assert_eq!(ok.retry_count(), 1);

        let failed = StepResult::failed("vid", "generate_video", None, StepError::fatal("bad"), 10);
        assert_eq!(failed.status, StepStatus::Failed);
        assert_eq!(failed.error_message().as_deref(), Some("Fatal error: bad"));

        let cancelled = StepResult::failed(
            "vid",
            "generate_video",
            Some("kling-2".to_string()),
            StepError::cancelled("stop"),
            10,
        );
        assert_eq!(cancelled.status, StepStatus::Cancelled);
        assert!(!cancelled.success());

        let skipped = StepResult::skipped("up", "upscale_image", None, "img");
        assert_eq!(skipped.skipped_because.as_deref(), Some("img"));
        assert_eq!(skipped.attempts, 0);
    }

    #[test]
    fn test_step_result_serialization() {
        let result = StepResult::succeeded("img", "generate_image", "flux-dev", "s3://img.png", 0.03, 40);

        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["status"], json!("succeeded"));
        assert_eq!(json["output"], json!("s3://img.png"));
        assert!(json.get("retry_delays_ms").is_none());
        assert!(json.get("skipped_because").is_none());
    }
}
