//! Prometheus metrics infrastructure

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use super::config::MetricsConfig;

/// Handle used to render the collected metrics
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    /// Metrics in the Prometheus text exposition format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Install the global Prometheus recorder
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::debug!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            register_default_metrics();
            tracing::info!("Prometheus metrics initialized");

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

fn register_default_metrics() {
    gauge!("genai_pipeline_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Parameters for step metrics
pub struct StepMetricParams<'a> {
    pub chain: &'a str,
    pub step_type: &'a str,
    pub model: &'a str,
    /// `succeeded`, `skipped` or the error kind
    pub status: &'a str,
    pub duration: Duration,
    pub cost: f64,
}

/// Record the outcome of one step
pub fn record_step(params: StepMetricParams) {
    let labels = [
        ("chain", params.chain.to_string()),
        ("step_type", params.step_type.to_string()),
        ("model", params.model.to_string()),
        ("status", params.status.to_string()),
    ];

    counter!("pipeline_steps_total", &labels).increment(1);
    histogram!("pipeline_step_duration_seconds", &labels).record(params.duration.as_secs_f64());

    if params.cost > 0.0 {
        gauge!("pipeline_step_cost_total", &labels).increment(params.cost);
    }
}

/// Record the outcome of a whole chain run
pub fn record_run(chain: &str, success: bool, cancelled: bool, duration: Duration) {
    let status = match (success, cancelled) {
        (_, true) => "cancelled",
        (true, false) => "success",
        (false, false) => "error",
    };
    let labels = [("chain", chain.to_string()), ("status", status.to_string())];

    counter!("pipeline_runs_total", &labels).increment(1);
    histogram!("pipeline_run_duration_seconds", &labels).record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_disabled() {
        assert!(init_metrics(&MetricsConfig::default()).is_none());
    }

    #[test]
    fn test_record_step_and_run() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_step(StepMetricParams {
                chain: "promo",
                step_type: "generate_image",
                model: "flux-dev",
                status: "succeeded",
                duration: Duration::from_millis(1500),
                cost: 0.03,
            });
            record_run("promo", true, false, Duration::from_secs(2));
        });

        let rendered = handle.render();
        assert!(rendered.contains("pipeline_steps_total"));
        assert!(rendered.contains("model=\"flux-dev\""));
        assert!(rendered.contains("pipeline_step_cost_total"));
        assert!(rendered.contains("pipeline_runs_total"));
        assert!(rendered.contains("status=\"success\""));
    }
}
