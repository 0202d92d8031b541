//! Outbound events and the sink they are delivered to.
//!
//! The runner knows nothing about how events reach a client. It hands every
//! event to an [`EventSink`]; a transport (websocket, CLI, test harness)
//! implements the sink.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Which stream an output fragment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// The program's standard output.
    Stdout,
    /// The program's standard error (and relayed compiler output).
    Stderr,
    /// Messages authored by the runner itself.
    System,
}

impl StreamKind {
    /// Get the wire name for this stream.
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
            StreamKind::System => "system",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal status carried by a completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Error,
}

impl RunStatus {
    /// Derive a status from a process exit code.
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => RunStatus::Success,
            _ => RunStatus::Error,
        }
    }

    /// Check if this is a success status.
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Success)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Error => write!(f, "error"),
        }
    }
}

/// Events emitted by the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// Passive markup to be rendered instead of executed.
    Render {
        /// The original source, verbatim.
        content: String,
    },
    /// A decoded output fragment.
    Output {
        /// Text, possibly a partial line.
        fragment: String,
        /// Origin of the fragment.
        stream: StreamKind,
    },
    /// A hint for fixing a failure.
    Suggestion {
        /// Suggestion text.
        text: String,
    },
    /// The run is over. Always the last event of a run.
    Completion {
        /// Terminal status.
        status: RunStatus,
    },
}

impl RunEvent {
    /// Create an output event.
    pub fn output(fragment: impl Into<String>, stream: StreamKind) -> Self {
        RunEvent::Output {
            fragment: fragment.into(),
            stream,
        }
    }

    /// Create a runner-authored output event.
    pub fn system(fragment: impl Into<String>) -> Self {
        Self::output(fragment, StreamKind::System)
    }

    /// Check if this is a completion event.
    pub fn is_completion(&self) -> bool {
        matches!(self, RunEvent::Completion { .. })
    }
}

/// An event addressed to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Session the event belongs to.
    pub session_id: String,
    /// Run that produced the event.
    pub run_id: String,
    /// The event itself.
    #[serde(flatten)]
    pub event: RunEvent,
}

/// Destination for runner events.
///
/// Implementations must be cheap and non-blocking; relays call `emit` for
/// every fragment they read.
pub trait EventSink: Send + Sync {
    /// Deliver one event.
    fn emit(&self, event: SessionEvent);
}

impl<F> EventSink for F
where
    F: Fn(SessionEvent) + Send + Sync,
{
    fn emit(&self, event: SessionEvent) {
        self(event)
    }
}

/// Event sink backed by an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver that observes it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Event receiver dropped, discarding event");
        }
    }
}

/// Emitter bound to one run, shared by the supervisor and its workers.
#[derive(Clone)]
pub(crate) struct RunEmitter {
    sink: std::sync::Arc<dyn EventSink>,
    session_id: String,
    run_id: String,
}

impl RunEmitter {
    pub(crate) fn new(
        sink: std::sync::Arc<dyn EventSink>,
        session_id: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Self {
        Self {
            sink,
            session_id: session_id.into(),
            run_id: run_id.into(),
        }
    }

    pub(crate) fn emit(&self, event: RunEvent) {
        self.sink.emit(SessionEvent {
            session_id: self.session_id.clone(),
            run_id: self.run_id.clone(),
            event,
        });
    }

    pub(crate) fn session_id(&self) -> &str {
        &self.session_id
    }

    pub(crate) fn run_id(&self) -> &str {
        &self.run_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_exit_code() {
        assert_eq!(RunStatus::from_exit_code(Some(0)), RunStatus::Success);
        assert_eq!(RunStatus::from_exit_code(Some(1)), RunStatus::Error);
        assert_eq!(RunStatus::from_exit_code(Some(-1)), RunStatus::Error);
        // Killed by a signal: no exit code.
        assert_eq!(RunStatus::from_exit_code(None), RunStatus::Error);
    }

    #[test]
    fn test_event_wire_format() {
        let event = SessionEvent {
            session_id: "s1".to_string(),
            run_id: "abcd1234".to_string(),
            event: RunEvent::output("hi\n", StreamKind::Stdout),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "output");
        assert_eq!(json["fragment"], "hi\n");
        assert_eq!(json["stream"], "stdout");
        assert_eq!(json["session_id"], "s1");

        let completion = RunEvent::Completion {
            status: RunStatus::Error,
        };
        let json = serde_json::to_value(&completion).unwrap();
        assert_eq!(json["type"], "completion");
        assert_eq!(json["status"], "error");
    }

    #[test]
    fn test_event_roundtrip_from_client_json() {
        let json = r#"{"session_id":"s","run_id":"r","type":"render","content":"<div>hi</div>"}"#;
        let event: SessionEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event.event,
            RunEvent::Render {
                content: "<div>hi</div>".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::new();
        let emitter = RunEmitter::new(std::sync::Arc::new(sink), "s1", "r1");
        emitter.emit(RunEvent::system("hello"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.session_id, "s1");
        assert_eq!(event.run_id, "r1");
        assert_eq!(event.event, RunEvent::system("hello"));
    }

    #[test]
    fn test_closure_sink() {
        let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let captured = seen.clone();
        let sink = move |event: SessionEvent| captured.lock().push(event);
        sink.emit(SessionEvent {
            session_id: "s".into(),
            run_id: "r".into(),
            event: RunEvent::Completion {
                status: RunStatus::Success,
            },
        });
        assert_eq!(seen.lock().len(), 1);
        assert!(seen.lock()[0].event.is_completion());
    }
}
