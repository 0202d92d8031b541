//! Session registry and input injection.
//!
//! The registry is the only state shared across runs. It maps a session
//! identifier to the run currently attached to it. Locks are held only for
//! map access, never across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

/// Last time a run produced output or received input.
///
/// Shared by the stdout relay, the stderr relay, input injection and the
/// watchdog. Every access goes through the mutex.
#[derive(Debug, Clone)]
pub struct ActivityClock {
    last: Arc<Mutex<Instant>>,
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityClock {
    /// Create a clock that starts now.
    pub fn new() -> Self {
        Self {
            last: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Record activity.
    pub fn touch(&self) {
        *self.last.lock() = Instant::now();
    }

    /// Time of the last recorded activity.
    pub fn last(&self) -> Instant {
        *self.last.lock()
    }

    /// Time elapsed since the last recorded activity.
    pub fn idle_for(&self) -> Duration {
        self.last().elapsed()
    }
}

/// Input handle of a live process. `None` once the run has finished.
pub(crate) type SharedStdin = Arc<tokio::sync::Mutex<Option<ChildStdin>>>;

/// A live process attached to a session.
#[derive(Debug, Clone)]
pub struct ActiveProcess {
    /// Run that owns the process.
    pub run_id: String,
    /// OS process id, if the platform reported one.
    pub pid: Option<u32>,
    /// When the process was spawned.
    pub started_at: Instant,
    stdin: SharedStdin,
    activity: ActivityClock,
    terminate: Arc<Notify>,
}

impl ActiveProcess {
    pub(crate) fn new(
        run_id: impl Into<String>,
        pid: Option<u32>,
        stdin: SharedStdin,
        activity: ActivityClock,
        terminate: Arc<Notify>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            pid,
            started_at: Instant::now(),
            stdin,
            activity,
            terminate,
        }
    }

    /// The run's activity clock.
    pub fn activity(&self) -> &ActivityClock {
        &self.activity
    }

    /// Ask the run's watchdog to kill the process.
    pub fn request_termination(&self) {
        self.terminate.notify_one();
    }
}

/// Shared map from session identifier to its active process.
///
/// Cloning yields another handle to the same map.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<HashMap<String, ActiveProcess>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a process to a session.
    ///
    /// Returns the entry it replaced, if the session already had one.
    pub fn insert(&self, session_id: &str, entry: ActiveProcess) -> Option<ActiveProcess> {
        self.inner.lock().insert(session_id.to_string(), entry)
    }

    /// Detach the session's process, but only if it still belongs to `run_id`.
    pub fn remove_if_run(&self, session_id: &str, run_id: &str) -> bool {
        let mut map = self.inner.lock();
        match map.get(session_id) {
            Some(entry) if entry.run_id == run_id => {
                map.remove(session_id);
                true
            }
            _ => false,
        }
    }

    /// Get a snapshot of the session's entry.
    pub fn get(&self, session_id: &str) -> Option<ActiveProcess> {
        self.inner.lock().get(session_id).cloned()
    }

    /// Check whether a session has a live process.
    pub fn is_active(&self, session_id: &str) -> bool {
        self.inner.lock().contains_key(session_id)
    }

    /// Sessions that currently have a live process.
    pub fn active_sessions(&self) -> Vec<String> {
        let mut sessions: Vec<String> = self.inner.lock().keys().cloned().collect();
        sessions.sort();
        sessions
    }

    /// Number of live processes.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if no process is live.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Request termination of the session's process.
    ///
    /// Returns false if the session has no live process.
    pub fn terminate(&self, session_id: &str) -> bool {
        match self.get(session_id) {
            Some(entry) => {
                debug!(session_id = %session_id, run_id = %entry.run_id, "Termination requested");
                entry.request_termination();
                true
            }
            None => false,
        }
    }

    /// Write a line of input to the session's process.
    ///
    /// A trailing newline is appended unless `text` already ends with one.
    /// Returns whether the input was delivered. A session without a live
    /// process is a silent no-op.
    pub async fn send_input(&self, session_id: &str, text: &str, write_timeout: Duration) -> bool {
        let Some(entry) = self.get(session_id) else {
            trace!(session_id = %session_id, "No active process, dropping input");
            return false;
        };

        entry.activity.touch();

        let mut line = text.to_string();
        if !line.ends_with('\n') {
            line.push('\n');
        }

        let stdin = entry.stdin.clone();
        let write = async move {
            let mut guard = stdin.lock().await;
            let Some(pipe) = guard.as_mut() else {
                return Ok(false);
            };
            pipe.write_all(line.as_bytes()).await?;
            pipe.flush().await?;
            Ok::<_, std::io::Error>(true)
        };

        match tokio::time::timeout(write_timeout, write).await {
            Ok(Ok(delivered)) => {
                if delivered {
                    entry.activity.touch();
                }
                delivered
            }
            Ok(Err(e)) => {
                debug!(session_id = %session_id, error = %e, "Input write failed");
                false
            }
            Err(_) => {
                warn!(
                    session_id = %session_id,
                    timeout = ?write_timeout,
                    "Input write timed out, process is not reading its input"
                );
                false
            }
        }
    }
}
