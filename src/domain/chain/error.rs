//! Chain error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::entity::ReferenceKind;
use crate::domain::generator::GeneratorError;
use crate::domain::model::RegistryError;

/// A single problem found while validating a chain
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Violation {
    #[error("Chain has no steps")]
    EmptyChain,

    #[error("Parallel group at entry {entry} has no steps")]
    EmptyGroup { entry: usize },

    #[error("Step '{step}': name must contain only letters, digits, '_' or '-'")]
    InvalidStepName { step: String },

    #[error("Step '{step}': name is reserved for the initial input")]
    ReservedStepName { step: String },

    #[error("Step '{step}': duplicate step name")]
    DuplicateStepName { step: String },

    #[error("Step '{step}': unknown step type '{step_type}'")]
    UnknownStepType { step: String, step_type: String },

    #[error("Step '{step}': {error}")]
    UnknownModel { step: String, error: RegistryError },

    #[error("Step '{step}': model '{model}' does not support step type '{step_type}'")]
    IncompatibleModel {
        step: String,
        model: String,
        step_type: String,
    },

    #[error("Step '{step}': {via} references unknown step '{reference}'")]
    UnknownReference {
        step: String,
        reference: String,
        via: ReferenceKind,
    },

    #[error("Step '{step}': {via} references '{reference}', which does not run strictly earlier")]
    ForwardReference {
        step: String,
        reference: String,
        via: ReferenceKind,
    },

    #[error("Step '{step}': {via} references disabled step '{reference}'")]
    DisabledReference {
        step: String,
        reference: String,
        via: ReferenceKind,
    },
}

impl Violation {
    /// Name of the offending step, when the violation concerns one
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::EmptyChain | Self::EmptyGroup { .. } => None,
            Self::InvalidStepName { step }
            | Self::ReservedStepName { step }
            | Self::DuplicateStepName { step }
            | Self::UnknownStepType { step, .. }
            | Self::UnknownModel { step, .. }
            | Self::IncompatibleModel { step, .. }
            | Self::UnknownReference { step, .. }
            | Self::ForwardReference { step, .. }
            | Self::DisabledReference { step, .. } => Some(step),
        }
    }
}

/// Every violation found in a chain, reported together
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Invalid chain '{chain}' ({} violation(s)): {}", violations.len(), format_violations(violations))]
pub struct ConfigError {
    pub chain: String,
    pub violations: Vec<Violation>,
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConfigError {
    pub fn new(chain: impl Into<String>, violations: Vec<Violation>) -> Self {
        Self {
            chain: chain.into(),
            violations,
        }
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Violations concerning the named step
    pub fn for_step(&self, step: &str) -> Vec<&Violation> {
        self.violations
            .iter()
            .filter(|v| v.step() == Some(step))
            .collect()
    }
}

/// Terminal or transient failure of a single step
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepError {
    #[error("Retryable error: {message}")]
    Retryable { message: String },

    #[error("Fatal error: {message}")]
    Fatal { message: String },

    #[error("Timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Cancelled: {message}")]
    Cancelled { message: String },
}

impl StepError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Retryable {
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Short machine-readable kind, as used in stream events
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Retryable { .. } => "retryable",
            Self::Fatal { .. } => "fatal",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

impl From<GeneratorError> for StepError {
    fn from(error: GeneratorError) -> Self {
        match error {
            GeneratorError::Retryable(message) => Self::Retryable { message },
            GeneratorError::Fatal(message) => Self::Fatal { message },
            GeneratorError::InvalidInput(message) => Self::Fatal {
                message: format!("Invalid input: {}", message),
            },
        }
    }
}

impl From<RegistryError> for StepError {
    fn from(error: RegistryError) -> Self {
        Self::fatal(error.to_string())
    }
}
