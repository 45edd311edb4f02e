//! Generator request, response and binding types

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::model::ModelDefinition;

/// A `(step type, model)` pair a generator serves; `None` matches anything
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GeneratorBinding {
    pub step_type: Option<String>,
    pub model: Option<String>,
}

impl GeneratorBinding {
    pub fn exact(step_type: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            step_type: Some(step_type.into()),
            model: Some(model.into()),
        }
    }

    /// Every model of a step type
    pub fn step_type(step_type: impl Into<String>) -> Self {
        Self {
            step_type: Some(step_type.into()),
            model: None,
        }
    }

    /// Every step type of a model
    pub fn model(model: impl Into<String>) -> Self {
        Self {
            step_type: None,
            model: Some(model.into()),
        }
    }

    pub fn any() -> Self {
        Self {
            step_type: None,
            model: None,
        }
    }

    pub fn matches(&self, step_type: &str, model: &str) -> bool {
        self.step_type.as_deref().is_none_or(|t| t == step_type)
            && self.model.as_deref().is_none_or(|m| m == model)
    }
}

impl fmt::Display for GeneratorBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {})",
            self.step_type.as_deref().unwrap_or("*"),
            self.model.as_deref().unwrap_or("*")
        )
    }
}

/// Fully resolved input of one generator invocation
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub step_name: String,
    pub step_type: String,
    pub model: ModelDefinition,

    /// Interpolated parameters with model defaults merged underneath
    pub parameters: BTreeMap<String, Value>,
}

impl GenerationRequest {
    pub fn new(
        step_name: impl Into<String>,
        step_type: impl Into<String>,
        model: ModelDefinition,
        parameters: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            step_name: step_name.into(),
            step_type: step_type.into(),
            model,
            parameters,
        }
    }

    pub fn parameter(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }
}

/// Result of a successful invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutput {
    /// Opaque locator of the produced media
    pub output: String,
    pub cost: f64,

    /// Time reported by the service; the executor measures it when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

impl GenerationOutput {
    pub fn new(output: impl Into<String>, cost: f64) -> Self {
        Self {
            output: output.into(),
            cost,
            elapsed_ms: None,
        }
    }

    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = Some(elapsed_ms);
        self
    }
}
