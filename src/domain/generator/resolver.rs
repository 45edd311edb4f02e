//! Generator resolution for `(step type, model)` pairs

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

use super::Generator;
use crate::domain::DomainError;

/// Resolves the generator serving a `(step type, model)` pair
#[async_trait]
pub trait GeneratorResolver: Send + Sync + Debug {
    async fn resolve(&self, step_type: &str, model: &str) -> Result<Arc<dyn Generator>, DomainError>;
}

/// Resolver that always returns the same generator
///
/// Useful for testing or when one adapter fronts every model.
#[derive(Debug)]
pub struct StaticGeneratorResolver {
    generator: Arc<dyn Generator>,
}

impl StaticGeneratorResolver {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl GeneratorResolver for StaticGeneratorResolver {
    async fn resolve(&self, _step_type: &str, _model: &str) -> Result<Arc<dyn Generator>, DomainError> {
        Ok(self.generator.clone())
    }
}
