//! CLI command handlers.

pub mod config;
pub mod detect;
pub mod languages;
pub mod run;

use std::path::Path;

use polyrun_runner::Language;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Idle timeout override from the command line, in seconds.
    pub idle_timeout_secs: Option<u64>,
    /// Compile timeout override from the command line, in seconds.
    pub compile_timeout_secs: Option<u64>,
}

/// File extensions that name markup content.
const MARKUP_EXTENSIONS: &[&str] = &["html", "htm", "css", "svg", "xml", "jsp"];

/// Language label implied by a file's extension.
pub fn label_for_path(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    if MARKUP_EXTENSIONS.contains(&ext.as_str()) {
        return Some(ext);
    }
    Language::from_extension(&ext).map(|lang| lang.name().to_lowercase())
}
