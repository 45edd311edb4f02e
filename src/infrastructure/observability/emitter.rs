//! Stream emitter decorator recording pipeline metrics

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::metrics::{record_run, record_step, StepMetricParams};
use crate::domain::stream::{EventKind, PipelineEvent, StreamEmitter};

/// Labels remembered between a step's start and its outcome
#[derive(Debug, Clone, Default)]
struct StepLabels {
    step_type: String,
    model: String,
}

/// Records metrics for every event, then forwards it to the inner emitter
#[derive(Debug)]
pub struct MetricsStreamEmitter {
    inner: Arc<dyn StreamEmitter>,
    chain: Mutex<String>,
    steps: Mutex<HashMap<String, StepLabels>>,
}

impl MetricsStreamEmitter {
    pub fn new(inner: Arc<dyn StreamEmitter>) -> Self {
        Self {
            inner,
            chain: Mutex::new(String::new()),
            steps: Mutex::new(HashMap::new()),
        }
    }

    fn chain(&self) -> String {
        self.chain.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn labels(&self, step: &str) -> StepLabels {
        self.steps
            .lock()
            .ok()
            .and_then(|steps| steps.get(step).cloned())
            .unwrap_or_default()
    }

    fn record(&self, event: &PipelineEvent) {
        match &event.kind {
            EventKind::PipelineStart { chain, .. } => {
                if let Ok(mut current) = self.chain.lock() {
                    *current = chain.clone();
                }
                if let Ok(mut steps) = self.steps.lock() {
                    steps.clear();
                }
            }
            EventKind::StepStart {
                step,
                step_type,
                model,
                ..
            } => {
                if let Ok(mut steps) = self.steps.lock() {
                    steps.insert(
                        step.clone(),
                        StepLabels {
                            step_type: step_type.clone(),
                            model: model.clone().unwrap_or_default(),
                        },
                    );
                }
            }
            EventKind::StepComplete {
                step,
                cost,
                duration_ms,
                ..
            } => {
                let labels = self.labels(step);
                record_step(StepMetricParams {
                    chain: &self.chain(),
                    step_type: &labels.step_type,
                    model: &labels.model,
                    status: "succeeded",
                    duration: Duration::from_millis(*duration_ms),
                    cost: *cost,
                });
            }
            EventKind::StepError {
                step,
                step_type,
                kind,
                ..
            } => {
                let labels = self.labels(step);
                record_step(StepMetricParams {
                    chain: &self.chain(),
                    step_type,
                    model: &labels.model,
                    status: kind,
                    duration: Duration::ZERO,
                    cost: 0.0,
                });
            }
            EventKind::StepSkipped { step, .. } => {
                let labels = self.labels(step);
                record_step(StepMetricParams {
                    chain: &self.chain(),
                    step_type: &labels.step_type,
                    model: &labels.model,
                    status: "skipped",
                    duration: Duration::ZERO,
                    cost: 0.0,
                });
            }
            EventKind::PipelineComplete {
                success,
                cancelled,
                total_duration_ms,
                ..
            } => {
                record_run(
                    &self.chain(),
                    *success,
                    *cancelled,
                    Duration::from_millis(*total_duration_ms),
                );
            }
        }
    }
}

impl StreamEmitter for MetricsStreamEmitter {
    fn emit(&self, event: PipelineEvent) {
        self.record(&event);
        self.inner.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chain::ExecutionMode;
    use crate::domain::stream::RecordingEmitter;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn test_records_and_forwards() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let inner = Arc::new(RecordingEmitter::new());
        let emitter = MetricsStreamEmitter::new(inner.clone());

        metrics::with_local_recorder(&recorder, || {
            emitter.emit(PipelineEvent::new(EventKind::PipelineStart {
                chain: "promo".to_string(),
                step_count: 2,
                mode: ExecutionMode::Live,
            }));
            emitter.emit(PipelineEvent::new(EventKind::StepStart {
                index: 0,
                step: "img".to_string(),
                step_type: "generate_image".to_string(),
                model: Some("flux-dev".to_string()),
            }));
            emitter.emit(PipelineEvent::new(EventKind::StepComplete {
                index: 0,
                step: "img".to_string(),
                cost: 0.03,
                output: "s3://img.png".to_string(),
                duration_ms: 4_000,
            }));
            emitter.emit(PipelineEvent::new(EventKind::StepError {
                index: 1,
                step: "vid".to_string(),
                step_type: "image_to_video".to_string(),
                message: "Timed out after 10ms".to_string(),
                kind: "timeout".to_string(),
            }));
            emitter.emit(PipelineEvent::new(EventKind::PipelineComplete {
                success: false,
                cancelled: false,
                total_cost: 0.03,
                total_duration_ms: 4_010,
                step_results: 2,
            }));
        });

        assert_eq!(inner.events().len(), 5);

        let rendered = handle.render();
        assert!(rendered.contains("chain=\"promo\""));
        assert!(rendered.contains("model=\"flux-dev\""));
        assert!(rendered.contains("status=\"timeout\""));
        assert!(rendered.contains("status=\"error\""));
    }
}
