//! Stream domain - progress events emitted while a chain runs

mod emitter;
mod event;

pub use emitter::{NullStreamEmitter, StreamEmitter};
pub use event::{EventKind, PipelineEvent, SCHEMA_VERSION};

#[cfg(test)]
pub use emitter::mock::RecordingEmitter;
