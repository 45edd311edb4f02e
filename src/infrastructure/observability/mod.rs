//! Observability infrastructure - Prometheus metrics

mod config;
mod emitter;
mod metrics;

pub use config::MetricsConfig;
pub use emitter::MetricsStreamEmitter;
pub use metrics::{init_metrics, record_run, record_step, PrometheusMetrics, StepMetricParams};
