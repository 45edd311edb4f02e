//! Observability configuration

use serde::Deserialize;

/// Prometheus metrics configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and record pipeline metrics
    #[serde(default)]
    pub enabled: bool,
}

impl MetricsConfig {
    pub fn enabled() -> Self {
        Self { enabled: true }
    }
}
