//! Model catalog loader
//!
//! A catalog is a document with a `models` array of model definitions:
//!
//! ```toml
//! [[models]]
//! key = "flux-dev"
//! name = "FLUX.1 [dev]"
//! provider = "fal"
//! endpoint = "fal-ai/flux/dev"
//! categories = ["generate_image"]
//! cost_estimate = 0.025
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use super::format::{read_document, DocumentFormat};
use crate::domain::model::{ModelDefinition, ModelRegistry};
use crate::domain::DomainError;

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    models: Vec<ModelDefinition>,
}

/// Parse catalog content without registering anything
pub fn parse_catalog(content: &str, format: DocumentFormat) -> Result<Vec<ModelDefinition>, DomainError> {
    let document: CatalogDocument = format.parse(content)?;
    Ok(document.models)
}

/// Register every model of a catalog file, returning how many were registered
///
/// Stops at the first invalid definition; models registered before it stay.
pub fn load_catalog(path: impl AsRef<Path>, registry: &mut ModelRegistry) -> Result<usize, DomainError> {
    let path = path.as_ref();
    let (format, content) = read_document(path)?;

    let models = parse_catalog(&content, format).map_err(|e| {
        DomainError::configuration(format!("Catalog '{}': {}", path.display(), e))
    })?;
    let count = models.len();

    for model in models {
        registry.register(model).map_err(|e| {
            DomainError::configuration(format!("Catalog '{}': {}", path.display(), e))
        })?;
    }

    info!(path = %path.display(), models = count, "Loaded model catalog");
    Ok(count)
}
