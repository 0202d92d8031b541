//! Runner configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::toolchain::ToolchainBinaries;

/// Default idle window before a run is killed.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(150);

/// Default wall-clock limit for compilation.
pub const DEFAULT_COMPILE_TIMEOUT: Duration = Duration::from_secs(15);

/// Default watchdog polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default stderr capture cap for diagnostics.
pub const DEFAULT_MAX_CAPTURE_BYTES: usize = 64 * 1024;

/// Configuration for the code runner.
///
/// Only the idle and compile timeouts are part of the external contract; the
/// rest tune internal polling and grace periods.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Idle window: time with neither output nor input before the process is killed.
    pub idle_timeout: Duration,

    /// Wall-clock limit for the compile step.
    pub compile_timeout: Duration,

    /// How often the watchdog checks the activity clock.
    pub poll_interval: Duration,

    /// How long to wait for stream relays to drain after the process ends.
    pub relay_grace: Duration,

    /// Upper bound on a single input write.
    pub input_write_timeout: Duration,

    /// Maximum number of stderr bytes kept for diagnostics.
    pub max_capture_bytes: usize,

    /// Directory under which per-run workspaces are created.
    pub workspace_root: PathBuf,

    /// Leave workspaces on disk after the run for external cleanup.
    pub keep_workspaces: bool,

    /// Toolchain binary names.
    pub toolchains: ToolchainBinaries,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            compile_timeout: DEFAULT_COMPILE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            relay_grace: Duration::from_secs(2),
            input_write_timeout: Duration::from_secs(5),
            max_capture_bytes: DEFAULT_MAX_CAPTURE_BYTES,
            workspace_root: Self::default_workspace_root(),
            keep_workspaces: false,
            toolchains: ToolchainBinaries::default(),
        }
    }
}

impl RunnerConfig {
    /// Create a new runner configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// The default workspace root: `<temp dir>/polyrun`.
    pub fn default_workspace_root() -> PathBuf {
        std::env::temp_dir().join("polyrun")
    }

    /// Set the idle timeout.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the compile timeout.
    pub fn with_compile_timeout(mut self, timeout: Duration) -> Self {
        self.compile_timeout = timeout;
        self
    }

    /// Set the watchdog polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the relay drain grace period.
    pub fn with_relay_grace(mut self, grace: Duration) -> Self {
        self.relay_grace = grace;
        self
    }

    /// Set the input write timeout.
    pub fn with_input_write_timeout(mut self, timeout: Duration) -> Self {
        self.input_write_timeout = timeout;
        self
    }

    /// Set the stderr capture cap.
    pub fn with_max_capture_bytes(mut self, bytes: usize) -> Self {
        self.max_capture_bytes = bytes;
        self
    }

    /// Set the workspace root directory.
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        self
    }

    /// Keep workspaces after runs finish.
    pub fn with_keep_workspaces(mut self, keep: bool) -> Self {
        self.keep_workspaces = keep;
        self
    }

    /// Set the toolchain binaries.
    pub fn with_toolchains(mut self, toolchains: ToolchainBinaries) -> Self {
        self.toolchains = toolchains;
        self
    }
}
