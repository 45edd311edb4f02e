//! JSON Lines event stream
//!
//! `emit` only pushes onto an unbounded channel; a background task serializes
//! events and writes one JSON object per line. The task finishes, returning the
//! writer, once every clone of the emitter has been dropped.

use std::io;
use std::path::Path;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::domain::stream::{PipelineEvent, StreamEmitter};

#[derive(Debug, Clone)]
pub struct JsonlStreamEmitter {
    tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl JsonlStreamEmitter {
    /// Start the writer task over `writer`
    pub fn spawn<W>(writer: W) -> (Self, JoinHandle<io::Result<W>>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(write_events(rx, writer));

        (Self { tx }, handle)
    }

    /// Start the writer task over a newly created file
    pub async fn create(path: impl AsRef<Path>) -> io::Result<(Self, JoinHandle<io::Result<tokio::fs::File>>)> {
        let file = tokio::fs::File::create(path).await?;
        Ok(Self::spawn(file))
    }

    /// Start the writer task over standard error
    pub fn stderr() -> (Self, JoinHandle<io::Result<tokio::io::Stderr>>) {
        Self::spawn(tokio::io::stderr())
    }
}

impl StreamEmitter for JsonlStreamEmitter {
    fn emit(&self, event: PipelineEvent) {
        if self.tx.send(event).is_err() {
            warn!("Event stream writer has stopped, dropping event");
        }
    }
}

async fn write_events<W>(mut rx: mpsc::UnboundedReceiver<PipelineEvent>, mut writer: W) -> io::Result<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(event) = rx.recv().await {
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');

        writer.write_all(&line).await?;
        writer.flush().await?;
    }

    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stream::EventKind;

    #[tokio::test]
    async fn test_writes_one_event_per_line() {
        let (emitter, handle) = JsonlStreamEmitter::spawn(Vec::new());

        emitter.emit(PipelineEvent::new(EventKind::StepStart {
            index: 0,
            step: "img".to_string(),
            step_type: "generate_image".to_string(),
            model: Some("flux-dev".to_string()),
        }));
        emitter.emit(PipelineEvent::new(EventKind::StepSkipped {
            index: 1,
            step: "vid".to_string(),
            reason: "dependency 'img' did not succeed".to_string(),
        }));
        drop(emitter);

        let written = handle.await.unwrap().unwrap();
        let text = String::from_utf8(written).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);

        let first: PipelineEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.name(), "step_start");

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["event"], "step_skipped");
        assert_eq!(second["schema_version"], 1);
    }

    #[tokio::test]
    async fn test_clones_share_writer() {
        let (emitter, handle) = JsonlStreamEmitter::spawn(Vec::new());
        let clone = emitter.clone();

        for e in [&emitter, &clone] {
            e.emit(PipelineEvent::new(EventKind::PipelineComplete {
                success: true,
                cancelled: false,
                total_cost: 0.0,
                total_duration_ms: 0,
                step_results: 0,
            }));
        }
        drop(emitter);
        drop(clone);

        let written = handle.await.unwrap().unwrap();
        assert_eq!(String::from_utf8(written).unwrap().lines().count(), 2);
    }
}
