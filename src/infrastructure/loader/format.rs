//! Document formats accepted by the loaders

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::domain::DomainError;

/// Serialization format of a catalog or chain document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Toml,
}

impl DocumentFormat {
    /// Format implied by the file extension
    pub fn from_path(path: &Path) -> Result<Self, DomainError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(Self::Toml),
            _ => Err(DomainError::configuration(format!(
                "Unsupported document '{}': expected a .json or .toml file",
                path.display()
            ))),
        }
    }

    pub(crate) fn parse<T: DeserializeOwned>(&self, content: &str) -> Result<T, DomainError> {
        match self {
            Self::Json => serde_json::from_str(content)
                .map_err(|e| DomainError::configuration(format!("Invalid JSON: {}", e))),
            Self::Toml => toml::from_str(content)
                .map_err(|e| DomainError::configuration(format!("Invalid TOML: {}", e))),
        }
    }
}

pub(crate) fn read_document(path: &Path) -> Result<(DocumentFormat, String), DomainError> {
    let format = DocumentFormat::from_path(path)?;
    let content = std::fs::read_to_string(path).map_err(|e| {
        DomainError::configuration(format!("Failed to read '{}': {}", path.display(), e))
    })?;

    Ok((format, content))
}
