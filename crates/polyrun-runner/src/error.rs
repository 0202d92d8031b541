//! Error types for runner operations.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while preparing or supervising a run.
///
/// None of these escape [`CodeRunner::run`](crate::CodeRunner::run): each one
/// is turned into output events, a `completion(error)` event, and the
/// [`RunOutcome`](crate::RunOutcome) of the report.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The language label matched no supported toolchain.
    #[error("Language '{0}' is not supported yet")]
    UnsupportedLanguage(String),

    /// The workspace directory or one of its files could not be written.
    #[error("Error writing workspace file {path}: {source}")]
    Workspace {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The compiler exited with a non-zero status.
    #[error("Compilation failed with exit code {code:?}")]
    Compile { code: Option<i32>, output: String },

    /// The compiler did not finish within the compile timeout.
    #[error("Compilation timed out after {0:?}")]
    CompileTimeout(Duration),

    /// A toolchain binary could not be started.
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;
