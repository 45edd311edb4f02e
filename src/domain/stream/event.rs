//! Pipeline progress events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::chain::ExecutionMode;

/// Version of the event layout, bumped on incompatible changes
pub const SCHEMA_VERSION: u32 = 1;

/// One line of the progress stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub schema_version: u32,
    pub timestamp: DateTime<Utc>,

    #[serde(flatten)]
    pub kind: EventKind,
}

impl PipelineEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            timestamp: Utc::now(),
            kind,
        }
    }

    /// Wire tag of the event
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Step the event concerns, if any
    pub fn step(&self) -> Option<&str> {
        match &self.kind {
            EventKind::StepStart { step, .. }
            | EventKind::StepComplete { step, .. }
            | EventKind::StepError { step, .. }
            | EventKind::StepSkipped { step, .. } => Some(step),
            EventKind::PipelineStart { .. } | EventKind::PipelineComplete { .. } => None,
        }
    }
}

/// Event payloads; `index` is the step's 0-based position in declaration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    PipelineStart {
        chain: String,
        step_count: usize,
        mode: ExecutionMode,
    },
    StepStart {
        index: usize,
        step: String,
        #[serde(rename = "type")]
        step_type: String,
        model: Option<String>,
    },
    StepComplete {
        index: usize,
        step: String,
        cost: f64,
        output: String,
        duration_ms: u64,
    },
    StepError {
        index: usize,
        step: String,
        #[serde(rename = "type")]
        step_type: String,
        message: String,
        kind: String,
    },
    StepSkipped {
        index: usize,
        step: String,
        reason: String,
    },
    PipelineComplete {
        success: bool,
        cancelled: bool,
        total_cost: f64,
        total_duration_ms: u64,
        step_results: usize,
    },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PipelineStart { .. } => "pipeline_start",
            Self::StepStart { .. } => "step_start",
            Self::StepComplete { .. } => "step_complete",
            Self::StepError { .. } => "step_error",
            Self::StepSkipped { .. } => "step_skipped",
            Self::PipelineComplete { .. } => "pipeline_complete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_format() {
        let event = PipelineEvent::new(EventKind::StepStart {
            index: 0,
            step: "img".to_string(),
            step_type: "generate_image".to_string(),
            model: Some("flux-dev".to_string()),
        });

        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["schema_version"], json!(1));
        assert_eq!(json["event"], json!("step_start"));
        assert_eq!(json["type"], json!("generate_image"));
        assert_eq!(json["model"], json!("flux-dev"));
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_event_round_trip() {
        let event = PipelineEvent::new(EventKind::PipelineComplete {
            success: false,
            cancelled: true,
            total_cost: 0.5,
            total_duration_ms: 1200,
            step_results: 3,
        });

        let line = serde_json::to_string(&event).unwrap();
        let back: PipelineEvent = serde_json::from_str(&line).unwrap();

        assert_eq!(back, event);
        assert_eq!(back.name(), "pipeline_complete");
        assert_eq!(back.step(), None);
    }
}
