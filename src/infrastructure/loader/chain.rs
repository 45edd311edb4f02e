//! Chain document loader

use std::path::Path;

use tracing::info;

use super::format::{read_document, DocumentFormat};
use crate::domain::chain::Chain;
use crate::domain::DomainError;

pub fn parse_chain(content: &str, format: DocumentFormat) -> Result<Chain, DomainError> {
    format.parse(content)
}

/// Read a chain document; the chain still has to be validated against a registry
pub fn load_chain(path: impl AsRef<Path>) -> Result<Chain, DomainError> {
    let path = path.as_ref();
    let (format, content) = read_document(path)?;

    let chain = parse_chain(&content, format)
        .map_err(|e| DomainError::configuration(format!("Chain '{}': {}", path.display(), e)))?;

    info!(
        path = %path.display(),
        chain = %chain.name(),
        steps = chain.step_count(),
        "Loaded chain"
    );
    Ok(chain)
}
