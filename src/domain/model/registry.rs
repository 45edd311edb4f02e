//! Model registry - single source of truth for model metadata
//!
//! Populated once at startup by a loader, then shared as `Arc<ModelRegistry>`.
//! Mutation requires `&mut self`, so a registry that has been shared can only be
//! read; concurrent readers need no locking.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use tracing::debug;

use super::validation::{validate_model_definition, ModelValidationError};
use super::ModelDefinition;

/// Registry lookup and registration errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistryError {
    #[error("Unknown model '{key}'. Available models: {}", format_available(.available))]
    UnknownModel { key: String, available: Vec<String> },

    #[error("Invalid model definition: {0}")]
    InvalidDefinition(#[from] ModelValidationError),
}

impl RegistryError {
    pub fn unknown_model(key: impl Into<String>, available: Vec<String>) -> Self {
        Self::UnknownModel {
            key: key.into(),
            available,
        }
    }
}

fn format_available(keys: &[String]) -> String {
    if keys.is_empty() {
        "(none registered)".to_string()
    } else {
        keys.join(", ")
    }
}

/// Append-only store of model definitions, keyed by model key
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    /// Definitions in registration order
    models: Vec<ModelDefinition>,

    /// Key to position in `models`
    index: HashMap<String, usize>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from definitions, failing on the first invalid one
    pub fn with_models(models: Vec<ModelDefinition>) -> Result<Self, RegistryError> {
        let mut registry = Self::new();

        for model in models {
            registry.register(model)?;
        }
        Ok(registry)
    }

    /// Register a definition, replacing any existing one with the same key
    ///
    /// A replaced definition keeps its original registration position.
    pub fn register(&mut self, model: ModelDefinition) -> Result<(), RegistryError> {
        validate_model_definition(&model)?;

        match self.index.get(model.key()) {
            Some(&position) => {
                debug!(model = %model.key(), "Replacing registered model");
                self.models[position] = model;
            }
            None => {
                debug!(model = %model.key(), categories = ?model.categories(), "Registering model");
                self.index.insert(model.key().to_string(), self.models.len());
                self.models.push(model);
            }
        }

        Ok(())
    }

    /// Get a definition by key
    pub fn get(&self, key: &str) -> Result<&ModelDefinition, RegistryError> {
        self.index
            .get(key)
            .map(|&position| &self.models[position])
            .ok_or_else(|| RegistryError::unknown_model(key, self.keys_owned()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// All definitions in registration order
    pub fn models(&self) -> &[ModelDefinition] {
        &self.models
    }

    /// All keys in registration order
    pub fn keys(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.key()).collect()
    }

    fn keys_owned(&self) -> Vec<String> {
        self.models.iter().map(|m| m.key().to_string()).collect()
    }

    /// Distinct categories, sorted
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = self
            .models
            .iter()
            .flat_map(|m| m.categories().iter().map(String::as_str))
            .collect();

        categories.sort_unstable();
        categories.dedup();
        categories
    }

    /// Whether any registered model serves the category
    pub fn has_category(&self, category: &str) -> bool {
        self.models.iter().any(|m| m.has_category(category))
    }

    /// Whether `key` is registered and tagged with `category`
    pub fn supports(&self, key: &str, category: &str) -> bool {
        self.get(key).is_ok_and(|m| m.has_category(category))
    }

    /// Definitions tagged with `category`, in registration order
    pub fn list_by_category(&self, category: &str) -> Vec<&ModelDefinition> {
        self.models
            .iter()
            .filter(|m| m.has_category(category))
            .collect()
    }

    /// Keys tagged with `category`, in registration order
    pub fn keys_for_category(&self, category: &str) -> Vec<&str> {
        self.list_by_category(category)
            .into_iter()
            .map(|m| m.key())
            .collect()
    }

    /// Model used when a step leaves `model` unset: the first one registered for the category
    pub fn default_for_category(&self, category: &str) -> Option<&ModelDefinition> {
        self.models.iter().find(|m| m.has_category(category))
    }

    /// Cost of `units` billable units on `key` according to its declared pricing
    pub fn estimate_cost(&self, key: &str, units: f64) -> Result<f64, RegistryError> {
        Ok(self.get(key)?.pricing().cost_for(units))
    }

    /// Category to keys, computed from the current definitions
    pub fn category_map(&self) -> BTreeMap<String, Vec<String>> {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for model in &self.models {
            for category in model.categories() {
                map.entry(category.clone())
                    .or_default()
                    .push(model.key().to_string());
            }
        }

        map
    }

    /// Category to (key to cost estimate)
    pub fn cost_map(&self) -> BTreeMap<String, BTreeMap<String, f64>> {
        self.category_view(|m| m.cost_estimate())
    }

    /// Category to (key to processing time estimate in milliseconds)
    pub fn processing_time_map(&self) -> BTreeMap<String, BTreeMap<String, u64>> {
        self.category_view(|m| m.processing_time_estimate_ms())
    }

    fn category_view<T>(
        &self,
        value: impl Fn(&ModelDefinition) -> T,
    ) -> BTreeMap<String, BTreeMap<String, T>> {
        let mut map: BTreeMap<String, BTreeMap<String, T>> = BTreeMap::new();

        for model in &self.models {
            for category in model.categories() {
                map.entry(category.clone())
                    .or_default()
                    .insert(model.key().to_string(), value(model));
            }
        }

        map
    }
}
