use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Generator error: {generator} - {message}")]
    Generator { generator: String, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn generator(generator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Generator {
            generator: generator.into(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let error = DomainError::not_found("No generator for 'generate_image' / 'flux-dev'");
        assert_eq!(
            error.to_string(),
            "Not found: No generator for 'generate_image' / 'flux-dev'"
        );
    }

    #[test]
    fn test_generator_error() {
        let error = DomainError::generator("http", "connection refused");
        assert_eq!(error.to_string(), "Generator error: http - connection refused");
    }

    #[test]
    fn test_conflict_error() {
        let error = DomainError::conflict("Binding already registered");
        assert_eq!(error.to_string(), "Conflict: Binding already registered");
    }
}
