//! Generator lookup table keyed by self-declared bindings

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::generator::{Generator, GeneratorBinding, GeneratorResolver};
use crate::domain::DomainError;

/// Resolves `(step type, model)` pairs to registered generators
///
/// Lookup order: exact binding, then the step type wildcard, then the model
/// wildcard, then a catch-all generator.
#[derive(Debug, Default)]
pub struct GeneratorTable {
    entries: HashMap<GeneratorBinding, Arc<dyn Generator>>,
}

impl GeneratorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every binding a generator declares
    ///
    /// Fails without registering anything if one of them is already taken.
    pub fn register(&mut self, generator: Arc<dyn Generator>) -> Result<(), DomainError> {
        let bindings = generator.bindings();

        if bindings.is_empty() {
            return Err(DomainError::validation(format!(
                "Generator '{}' declares no bindings",
                generator.name()
            )));
        }

        if let Some((binding, existing)) = bindings
            .iter()
            .find_map(|b| self.entries.get(b).map(|existing| (b, existing)))
        {
            return Err(DomainError::conflict(format!(
                "Binding {} of generator '{}' is already served by '{}'",
                binding,
                generator.name(),
                existing.name()
            )));
        }

        info!(
            generator = %generator.name(),
            bindings = bindings.len(),
            "Registering generator"
        );

        for binding in bindings {
            self.entries.insert(binding, generator.clone());
        }

        Ok(())
    }

    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Result<Self, DomainError> {
        self.register(generator)?;
        Ok(self)
    }

    pub fn lookup(&self, step_type: &str, model: &str) -> Option<Arc<dyn Generator>> {
        [
            GeneratorBinding::exact(step_type, model),
            GeneratorBinding::step_type(step_type),
            GeneratorBinding::model(model),
            GeneratorBinding::any(),
        ]
        .iter()
        .find_map(|binding| self.entries.get(binding))
        .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered bindings, sorted
    pub fn bindings(&self) -> Vec<&GeneratorBinding> {
        let mut bindings: Vec<_> = self.entries.keys().collect();
        bindings.sort();
        bindings
    }
}

#[async_trait]
impl GeneratorResolver for GeneratorTable {
    async fn resolve(&self, step_type: &str, model: &str) -> Result<Arc<dyn Generator>, DomainError> {
        let generator = self.lookup(step_type, model).ok_or_else(|| {
            DomainError::not_found(format!(
                "No generator registered for step type '{}' and model '{}'",
                step_type, model
            ))
        })?;

        debug!(
            step_type = %step_type,
            model = %model,
            generator = %generator.name(),
            "Resolved generator"
        );

        Ok(generator)
    }
}
