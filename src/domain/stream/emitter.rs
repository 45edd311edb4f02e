//! Stream emitter trait and the null implementation

use std::fmt::Debug;

use super::PipelineEvent;

/// Observer of executor lifecycle points
///
/// `emit` is called from the driving task and must not block; implementations
/// that do I/O hand events off to a background task.
pub trait StreamEmitter: Send + Sync + Debug {
    fn emit(&self, event: PipelineEvent);
}

/// Emitter that discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStreamEmitter;

impl StreamEmitter for NullStreamEmitter {
    fn emit(&self, _event: PipelineEvent) {}
}
