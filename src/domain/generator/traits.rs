//! Generator trait

use async_trait::async_trait;
use std::fmt::Debug;

use super::{GenerationOutput, GenerationRequest, GeneratorBinding, GeneratorError};

/// Adapter to an external generative service
#[async_trait]
pub trait Generator: Send + Sync + Debug {
    /// Identifier used in logs and lookup errors
    fn name(&self) -> &str;

    /// `(step type, model)` pairs this generator serves
    fn bindings(&self) -> Vec<GeneratorBinding>;

    async fn invoke(&self, request: GenerationRequest) -> Result<GenerationOutput, GeneratorError>;
}
