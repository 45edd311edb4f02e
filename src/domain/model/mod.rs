//! Model domain - Model metadata and the registry

mod entity;
mod registry;
mod validation;

pub use entity::{ModelDefinition, Pricing, PricingUnit, UnitPricing};
pub use registry::{ModelRegistry, RegistryError};
pub use validation::{
    is_valid_category, validate_model_definition, validate_model_key, ModelValidationError,
    MAX_MODEL_KEY_LENGTH,
};
