//! Model validation utilities

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::ModelDefinition;

/// Maximum length for model keys
pub const MAX_MODEL_KEY_LENGTH: usize = 100;

/// Model keys: alphanumeric plus `_`, `-` and `.`, starting alphanumeric
static MODEL_KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$").unwrap());

/// Capability tags are snake_case (e.g. "generate_image")
static CATEGORY_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").unwrap());

/// Model validation errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelValidationError {
    #[error("Model key cannot be empty")]
    EmptyKey,

    #[error("Model key too long: {length} characters (max {max})")]
    KeyTooLong { length: usize, max: usize },

    #[error("Invalid model key format '{key}': must be alphanumeric with '_', '-' or '.', starting alphanumeric")]
    InvalidKeyFormat { key: String },

    #[error("Model '{key}' must declare at least one category")]
    NoCategories { key: String },

    #[error("Model '{key}' has invalid category '{category}': must be snake_case")]
    InvalidCategory { key: String, category: String },

    #[error("Model '{key}' has a negative {field}")]
    NegativeValue { key: String, field: &'static str },
}

/// Validate a model key
pub fn validate_model_key(key: &str) -> Result<(), ModelValidationError> {
    if key.is_empty() {
        return Err(ModelValidationError::EmptyKey);
    }

    if key.len() > MAX_MODEL_KEY_LENGTH {
        return Err(ModelValidationError::KeyTooLong {
            length: key.len(),
            max: MAX_MODEL_KEY_LENGTH,
        });
    }

    if !MODEL_KEY_PATTERN.is_match(key) {
        return Err(ModelValidationError::InvalidKeyFormat {
            key: key.to_string(),
        });
    }

    Ok(())
}

/// Check whether a string is a well-formed capability tag
pub fn is_valid_category(category: &str) -> bool {
    CATEGORY_PATTERN.is_match(category)
}

/// Validate a complete model definition against the registry invariants
pub fn validate_model_definition(model: &ModelDefinition) -> Result<(), ModelValidationError> {
    validate_model_key(model.key())?;

    let key = model.key().to_string();

    if model.categories().is_empty() {
        return Err(ModelValidationError::NoCategories { key });
    }

    if let Some(category) = model.categories().iter().find(|c| !is_valid_category(c)) {
        return Err(ModelValidationError::InvalidCategory {
            key,
            category: category.clone(),
        });
    }

    if model.cost_estimate() < 0.0 {
        return Err(ModelValidationError::NegativeValue {
            key,
            field: "cost_estimate",
        });
    }

    if model.pricing().is_negative() {
        return Err(ModelValidationError::NegativeValue {
            key,
            field: "pricing",
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Pricing;

    #[test]
    fn test_valid_model_keys() {
        assert!(validate_model_key("flux-dev").is_ok());
        assert!(validate_model_key("cheap_model").is_ok());
        assert!(validate_model_key("sdxl.turbo").is_ok());
        assert!(validate_model_key("a").is_ok());
    }

    #[test]
    fn test_invalid_model_keys() {
        assert_eq!(validate_model_key(""), Err(ModelValidationError::EmptyKey));
        assert!(validate_model_key("-leading").is_err());
        assert!(validate_model_key("has spaces").is_err());
        assert!(validate_model_key("slash/key").is_err());

        let long_key = "a".repeat(101);
        assert!(matches!(
            validate_model_key(&long_key),
            Err(ModelValidationError::KeyTooLong { length: 101, max: 100 })
        ));
    }

    #[test]
    fn test_category_format() {
        assert!(is_valid_category("generate_image"));
        assert!(is_valid_category("tts"));
        assert!(!is_valid_category("Generate-Image"));
        assert!(!is_valid_category(""));
    }

    #[test]
    fn test_definition_requires_categories() {
        let model = ModelDefinition::new("orphan", "Orphan", "fal", "fal-ai/orphan");

        assert_eq!(
            validate_model_definition(&model),
            Err(ModelValidationError::NoCategories {
                key: "orphan".to_string()
            })
        );
    }

    #[test]
    fn test_definition_rejects_negative_values() {
        let model = ModelDefinition::new("m", "M", "fal", "e")
            .with_category("generate_image")
            .with_cost_estimate(-0.5);
        assert!(matches!(
            validate_model_definition(&model),
            Err(ModelValidationError::NegativeValue { field: "cost_estimate", .. })
        ));

        let model = ModelDefinition::new("m", "M", "fal", "e")
            .with_category("generate_image")
            .with_pricing(Pricing::flat(-1.0));
        assert!(matches!(
            validate_model_definition(&model),
            Err(ModelValidationError::NegativeValue { field: "pricing", .. })
        ));
    }

    #[test]
    fn test_valid_definition() {
        let model = ModelDefinition::new("flux-dev", "FLUX.1 [dev]", "fal", "fal-ai/flux/dev")
            .with_category("generate_image")
            .with_cost_estimate(0.025);

        assert!(validate_model_definition(&model).is_ok());
    }
}
