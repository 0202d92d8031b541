//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Root configuration.
///
/// Every field of every section is optional so that a layer only overrides
/// what it actually sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolyrunConfig {
    /// Runner tuning (`[runner]`).
    #[serde(skip_serializing_if = "RunnerSection::is_empty")]
    pub runner: RunnerSection,

    /// Toolchain binary overrides (`[toolchains]`).
    #[serde(skip_serializing_if = "ToolchainsSection::is_empty")]
    pub toolchains: ToolchainsSection,
}

impl PolyrunConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: PolyrunConfig) {
        self.runner.merge(other.runner);
        self.toolchains.merge(other.toolchains);
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        self.runner.validate()?;
        self.toolchains.validate()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Runner Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Runner section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSection {
    /// Seconds with neither output nor input before a program is killed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout_secs: Option<u64>,

    /// Wall-clock limit for the compile step, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile_timeout_secs: Option<u64>,

    /// Watchdog poll interval in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,

    /// How long to wait for output relays to drain after exit, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_grace_ms: Option<u64>,

    /// Upper bound on a single input write, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_write_timeout_ms: Option<u64>,

    /// Maximum stderr bytes kept for diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_capture_bytes: Option<usize>,

    /// Directory under which run workspaces are created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Leave workspaces on disk after each run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_workspaces: Option<bool>,
}

impl RunnerSection {
    /// Check if no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Idle timeout, if set.
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }

    /// Compile timeout, if set.
    pub fn compile_timeout(&self) -> Option<Duration> {
        self.compile_timeout_secs.map(Duration::from_secs)
    }

    /// Watchdog poll interval, if set.
    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_ms.map(Duration::from_millis)
    }

    /// Relay drain grace period, if set.
    pub fn relay_grace(&self) -> Option<Duration> {
        self.relay_grace_ms.map(Duration::from_millis)
    }

    /// Input write timeout, if set.
    pub fn input_write_timeout(&self) -> Option<Duration> {
        self.input_write_timeout_ms.map(Duration::from_millis)
    }

    fn merge(&mut self, other: RunnerSection) {
        if other.idle_timeout_secs.is_some() {
            self.idle_timeout_secs = other.idle_timeout_secs;
        }
        if other.compile_timeout_secs.is_some() {
            self.compile_timeout_secs = other.compile_timeout_secs;
        }
        if other.poll_interval_ms.is_some() {
            self.poll_interval_ms = other.poll_interval_ms;
        }
        if other.relay_grace_ms.is_some() {
            self.relay_grace_ms = other.relay_grace_ms;
        }
        if other.input_write_timeout_ms.is_some() {
            self.input_write_timeout_ms = other.input_write_timeout_ms;
        }
        if other.max_capture_bytes.is_some() {
            self.max_capture_bytes = other.max_capture_bytes;
        }
        if other.workspace_root.is_some() {
            self.workspace_root = other.workspace_root;
        }
        if other.keep_workspaces.is_some() {
            self.keep_workspaces = other.keep_workspaces;
        }
    }

    fn validate(&self) -> Result<()> {
        let non_zero = [
            ("runner.idle_timeout_secs", self.idle_timeout_secs),
            ("runner.compile_timeout_secs", self.compile_timeout_secs),
            ("runner.poll_interval_ms", self.poll_interval_ms),
            ("runner.input_write_timeout_ms", self.input_write_timeout_ms),
            (
                "runner.max_capture_bytes",
                self.max_capture_bytes.map(|b| b as u64),
            ),
        ];
        for (field, value) in non_zero {
            if value == Some(0) {
                return Err(ConfigError::Invalid {
                    field: field.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        if let Some(root) = &self.workspace_root
            && root.as_os_str().is_empty()
        {
            return Err(ConfigError::Invalid {
                field: "runner.workspace_root".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Toolchain Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Toolchain binary overrides. Each value is a program name looked up on
/// `PATH`, or an absolute path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainsSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_compiler: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpp_compiler: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub javac: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub java: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub php: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rscript: Option<String>,
}

impl ToolchainsSection {
    /// Check if no override is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// All overrides as `(key, value)` pairs, in declaration order.
    pub fn entries(&self) -> [(&'static str, Option<&str>); 8] {
        [
            ("c_compiler", self.c_compiler.as_deref()),
            ("cpp_compiler", self.cpp_compiler.as_deref()),
            ("python", self.python.as_deref()),
            ("javac", self.javac.as_deref()),
            ("java", self.java.as_deref()),
            ("node", self.node.as_deref()),
            ("php", self.php.as_deref()),
            ("rscript", self.rscript.as_deref()),
        ]
    }

    fn merge(&mut self, other: ToolchainsSection) {
        let slots = [
            (&mut self.c_compiler, other.c_compiler),
            (&mut self.cpp_compiler, other.cpp_compiler),
            (&mut self.python, other.python),
            (&mut self.javac, other.javac),
            (&mut self.java, other.java),
            (&mut self.node, other.node),
            (&mut self.php, other.php),
            (&mut self.rscript, other.rscript),
        ];
        for (slot, value) in slots {
            if value.is_some() {
                *slot = value;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        for (key, value) in self.entries() {
            if value.is_some_and(|v| v.trim().is_empty()) {
                return Err(ConfigError::Invalid {
                    field: format!("toolchains.{key}"),
                    reason: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}
