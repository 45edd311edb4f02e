//! Generator error types

use thiserror::Error;

/// Failure reported by a generator invocation
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeneratorError {
    /// Transient failure (rate limit, overload, network); worth retrying
    #[error("Retryable generator error: {0}")]
    Retryable(String),

    #[error("Fatal generator error: {0}")]
    Fatal(String),

    /// The request itself was rejected; never retried
    #[error("Invalid generator input: {0}")]
    InvalidInput(String),
}

impl GeneratorError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Retryable(message.into())
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}
