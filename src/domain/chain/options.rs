//! Execution options and executor configuration

use serde::{Deserialize, Serialize};

use super::cancellation::CancellationSignal;
use super::entity::RetryConfig;

/// Whether generators are actually invoked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Live,
    DryRun,
}

impl ExecutionMode {
    pub fn is_dry_run(&self) -> bool {
        matches!(self, Self::DryRun)
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::DryRun => write!(f, "dry_run"),
        }
    }
}

/// What happens to the rest of the chain after a step fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop after the entry containing the failure
    #[default]
    FailFast,
    /// Skip dependents of failed steps, keep running the others
    ContinueOnError,
}

/// Per-run options
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    pub mode: ExecutionMode,
    pub failure_policy: FailurePolicy,
    pub cancellation: Option<CancellationSignal>,
}

impl ExecutionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dry_run() -> Self {
        Self::new().with_mode(ExecutionMode::DryRun)
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn continue_on_error(self) -> Self {
        self.with_failure_policy(FailurePolicy::ContinueOnError)
    }

    pub fn with_cancellation(mut self, signal: CancellationSignal) -> Self {
        self.cancellation = Some(signal);
        self
    }
}

fn default_max_parallel() -> usize {
    4
}

fn default_step_timeout_ms() -> u64 {
    300_000
}

fn default_cancel_grace_ms() -> u64 {
    5_000
}

/// Executor-wide defaults, loaded from the `executor` config section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Worker permits shared by the members of a parallel group
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,

    /// How long cancelled group workers get to wind down before being aborted
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            step_timeout_ms: default_step_timeout_ms(),
            cancel_grace_ms: default_cancel_grace_ms(),
            retry: RetryConfig::default(),
        }
    }
}

impl ExecutorConfig {
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub fn with_step_timeout_ms(mut self, ms: u64) -> Self {
        self.step_timeout_ms = ms;
        self
    }

    pub fn with_cancel_grace_ms(mut self, ms: u64) -> Self {
        self.cancel_grace_ms = ms;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_executor_config_defaults() {
        let config: ExecutorConfig = serde_json::from_value(json!({})).unwrap();

        assert_eq!(config, ExecutorConfig::default());
        assert_eq!(config.max_parallel, 4);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_max_parallel_at_least_one() {
        assert_eq!(ExecutorConfig::default().with_max_parallel(0).max_parallel, 1);
    }

    #[test]
    fn test_execution_options_builders() {
        let options = ExecutionOptions::dry_run().continue_on_error();

        assert!(options.mode.is_dry_run());
        assert_eq!(options.failure_policy, FailurePolicy::ContinueOnError);
        assert!(options.cancellation.is_none());
        assert_eq!(ExecutionMode::DryRun.to_string(), "dry_run");
    }
}
