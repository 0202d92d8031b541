//! Per-run workspace directories.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, RunnerError};
use crate::toolchain::ExecutionPlan;

/// Companion translation unit compiled into native programs.
///
/// Disables stdio buffering before `main` runs so prompts without a trailing
/// newline reach the relay immediately.
pub const UNBUFFER_SHIM_FILE: &str = "polyrun_unbuffer.c";

const UNBUFFER_SHIM_SOURCE: &str = r#"#include <stdio.h>

__attribute__((constructor))
static void polyrun_unbuffer(void) {
    setvbuf(stdout, NULL, _IONBF, 0);
    setvbuf(stderr, NULL, _IONBF, 0);
}
"#;

/// An isolated directory owned by a single run.
#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
    source_path: PathBuf,
}

impl Workspace {
    /// Directory name for a run: `<sanitized session>_<run id>`.
    pub fn dir_name(session_id: &str, run_id: &str) -> String {
        format!("{}_{}", sanitize(session_id), sanitize(run_id))
    }

    /// Create the workspace directory under `root`.
    ///
    /// The directory is created empty; call [`Workspace::write_source`] next.
    pub fn create(root: &Path, session_id: &str, run_id: &str, source_file: &str) -> Result<Self> {
        let dir = root.join(Self::dir_name(session_id, run_id));
        fs::create_dir_all(&dir).map_err(|source| RunnerError::Workspace {
            path: dir.clone(),
            source,
        })?;
        restrict_permissions(&dir);

        Ok(Self {
            source_path: dir.join(source_file),
            dir,
        })
    }

    /// Write the program source.
    pub fn write_source(&self, code: &str) -> Result<()> {
        fs::write(&self.source_path, code).map_err(|source| RunnerError::Workspace {
            path: self.source_path.clone(),
            source,
        })
    }

    /// Write native helper files and splice them into the compile command.
    pub fn prepare_helpers(&self, plan: &mut ExecutionPlan) -> Result<()> {
        if !plan.language.is_native() {
            return Ok(());
        }

        let shim = self.dir.join(UNBUFFER_SHIM_FILE);
        fs::write(&shim, UNBUFFER_SHIM_SOURCE).map_err(|source| RunnerError::Workspace {
            path: shim.clone(),
            source,
        })?;

        if !plan.splice_compile_source(UNBUFFER_SHIM_FILE) {
            tracing::warn!(
                dir = %self.dir.display(),
                "Compile command has no source argument, unbuffer shim not linked"
            );
        }
        Ok(())
    }

    /// The workspace directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the program source.
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Remove the workspace, or leave it for external cleanup.
    ///
    /// Failures are logged and otherwise ignored.
    pub fn cleanup(self, keep: bool) {
        if keep {
            tracing::debug!(dir = %self.dir.display(), "Leaving workspace for external cleanup");
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.dir) {
            tracing::warn!(dir = %self.dir.display(), error = %e, "Failed to remove workspace");
        }
    }
}

/// Replace anything outside `[A-Za-z0-9_-]` so identifiers cannot escape the root.
fn sanitize(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "anon".to_string()
    } else {
        cleaned
    }
}

#[cfg(unix)]
fn restrict_permissions(dir: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) = fs::set_permissions(dir, fs::Permissions::from_mode(0o700)) {
        tracing::warn!(dir = %dir.display(), error = %e, "Could not restrict workspace permissions");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(dir: &Path) {
    tracing::debug!(dir = %dir.display(), "Owner-only permissions not supported on this platform");
}
