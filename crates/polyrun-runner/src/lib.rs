//! Multi-language code execution engine.
//!
//! A [`CodeRunner`] takes a [`RunRequest`] (session id, language label,
//! source text), writes the source into a per-run workspace, compiles it if
//! the language needs it, and runs it as a child process. Output is streamed
//! to an [`EventSink`] fragment by fragment as it arrives, so interactive
//! programs can prompt before they block on input. Input for a running
//! program is delivered with [`CodeRunner::send_input`].
//!
//! Markup content (HTML, CSS, SVG and friends) is never executed; it is
//! returned as a single render event.
//!
//! # Supervision
//!
//! Each run has an idle watchdog: if neither output nor input is seen for
//! the configured idle timeout, the process is killed. Compilation has its
//! own wall-clock limit. Every executed run ends with exactly one
//! completion event.
//!
//! # Isolation
//!
//! Runs are confined to a private scratch directory under the workspace
//! root, and nothing more. There is no filesystem, network or resource
//! isolation beyond what the host user already has.
//!
//! # Example
//!
//! ```no_run
//! use polyrun_runner::{ChannelSink, CodeRunner, RunRequest, RunnerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (sink, mut events) = ChannelSink::new();
//!     let runner = CodeRunner::new(RunnerConfig::default(), sink);
//!
//!     let handle = tokio::spawn({
//!         let runner = runner.clone();
//!         async move {
//!             runner
//!                 .run(RunRequest::new("demo", "python", "print('hi')"))
//!                 .await
//!         }
//!     });
//!
//!     while let Some(event) = events.recv().await {
//!         println!("{}", serde_json::to_string(&event).unwrap());
//!         if event.event.is_completion() {
//!             break;
//!         }
//!     }
//!     let report = handle.await.unwrap();
//!     println!("{:?}", report.outcome);
//! }
//! ```

mod config;
mod diagnostics;
mod error;
mod event;
mod markup;
mod registry;
mod relay;
mod runner;
mod toolchain;
mod watchdog;
mod workspace;

pub use config::{
    DEFAULT_COMPILE_TIMEOUT, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_CAPTURE_BYTES,
    DEFAULT_POLL_INTERVAL, RunnerConfig,
};
pub use diagnostics::{
    Diagnostic, DiagnosticFamily, DiagnosticParser, DiagnosticRule, RegexRule, TraceRule, suggest,
};
pub use error::{Result, RunnerError};
pub use event::{ChannelSink, EventSink, RunEvent, RunStatus, SessionEvent, StreamKind};
pub use markup::{is_markup, is_markup_label, should_render};
pub use registry::{ActiveProcess, ActivityClock, SessionRegistry};
pub use relay::{CaptureBuffer, Utf8Decoder};
pub use runner::{CodeRunner, InputRequest, RunOutcome, RunPhase, RunReport, RunRequest};
pub use toolchain::{ExecutionPlan, Language, ToolchainBinaries};
pub use watchdog::WatchdogVerdict;
pub use workspace::{UNBUFFER_SHIM_FILE, Workspace};
