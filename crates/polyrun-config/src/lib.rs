//! Configuration system for the polyrun code runner.
//!
//! Provides TOML-based configuration with:
//! - Runner tuning (`[runner]`): idle and compile timeouts, polling, capture limits,
//!   workspace location
//! - Toolchain binary overrides (`[toolchains]`)
//! - Config file layering (XDG user config + project-local overrides)
//!
//! Every field is optional. Unset fields fall back to the runner's defaults.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    project_config_path, save_config, xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
