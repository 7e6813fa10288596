//! Human-readable output produced while talking to the daemon.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Source tag attached to every chunk this crate emits.
pub const DAEMON_SOURCE: &str = "daemon";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
}

/// One line of output for the user's output window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputChunk {
    pub source: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

impl OutputChunk {
    #[must_use]
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            source: DAEMON_SOURCE.to_string(),
            text: text.into(),
            severity: None,
        }
    }

    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            severity: Some(Severity::Error),
            ..Self::info(text)
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Some(Severity::Error)
    }
}

/// Append-only destination for [`OutputChunk`]s.
///
/// Shared with other writers; implementations must accept concurrent appends.
pub trait OutputSink: Send + Sync {
    fn append(&self, chunk: OutputChunk);
}

/// Forwards chunks over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<OutputChunk>,
}

impl ChannelSink {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutputChunk>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl OutputSink for ChannelSink {
    fn append(&self, chunk: OutputChunk) {
        if self.tx.send(chunk).is_err() {
            tracing::trace!("Output receiver dropped, discarding chunk");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chunk_serialization() {
        let chunk = OutputChunk::error("Could not update the package index.");
        assert_eq!(
            serde_json::to_value(&chunk).unwrap(),
            json!({
                "source": "daemon",
                "text": "Could not update the package index.",
                "severity": "error"
            })
        );

        let info = serde_json::to_value(OutputChunk::info("done")).unwrap();
        assert!(info.get("severity").is_none());
    }

    #[test]
    fn test_channel_sink_preserves_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.append(OutputChunk::info("first"));
        sink.append(OutputChunk::error("second"));

        assert_eq!(rx.try_recv().unwrap().text, "first");
        let second = rx.try_recv().unwrap();
        assert_eq!(second.text, "second");
        assert!(second.is_error());
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.append(OutputChunk::info("ignored"));
    }
}
