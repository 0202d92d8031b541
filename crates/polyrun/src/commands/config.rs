//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use clap::{Args, Subcommand};
use console::style;

use polyrun_config::{LoadedConfig, PolyrunConfig, RunnerSection, ToolchainsSection};
use polyrun_runner::{RunnerConfig, ToolchainBinaries};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration and which files it came from
    Show,

    /// Show the user configuration file path
    Path,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./polyrun.toml) instead of user config
        #[arg(long)]
        local: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Path => cmd_path(ctx),
        ConfigCommand::Init { local, force } => cmd_init(local, force, ctx),
    }
}

/// Load all config layers and apply command-line overrides on top.
pub fn effective_config(ctx: &Context) -> Result<LoadedConfig> {
    let mut loaded = polyrun_config::load_config(None)?;
    for warning in &loaded.warnings {
        tracing::warn!("{warning}");
    }

    let overrides = PolyrunConfig {
        runner: RunnerSection {
            idle_timeout_secs: ctx.idle_timeout_secs,
            compile_timeout_secs: ctx.compile_timeout_secs,
            ..RunnerSection::default()
        },
        ..PolyrunConfig::default()
    };
    overrides
        .validate()
        .context("invalid command-line override")?;
    loaded.config.merge(overrides);
    Ok(loaded)
}

/// Build the runner configuration, falling back to runner defaults for
/// anything the config leaves unset.
pub fn runner_config(config: &PolyrunConfig) -> Result<RunnerConfig> {
    let section = &config.runner;
    let mut runner = RunnerConfig::default();

    if let Some(timeout) = section.idle_timeout() {
        runner = runner.with_idle_timeout(timeout);
    }
    if let Some(timeout) = section.compile_timeout() {
        runner = runner.with_compile_timeout(timeout);
    }
    if let Some(interval) = section.poll_interval() {
        runner = runner.with_poll_interval(interval);
    }
    if let Some(grace) = section.relay_grace() {
        runner = runner.with_relay_grace(grace);
    }
    if let Some(timeout) = section.input_write_timeout() {
        runner = runner.with_input_write_timeout(timeout);
    }
    if let Some(bytes) = section.max_capture_bytes {
        runner = runner.with_max_capture_bytes(bytes);
    }
    if let Some(root) = &section.workspace_root {
        // Native artifacts are run by path, so the root must be absolute.
        let root = if root.is_absolute() {
            root.clone()
        } else {
            std::env::current_dir()
                .context("failed to resolve relative workspace_root")?
                .join(root)
        };
        runner = runner.with_workspace_root(root);
    }
    if let Some(keep) = section.keep_workspaces {
        runner = runner.with_keep_workspaces(keep);
    }

    Ok(runner.with_toolchains(toolchain_binaries(&config.toolchains)))
}

fn toolchain_binaries(section: &ToolchainsSection) -> ToolchainBinaries {
    let defaults = ToolchainBinaries::default();
    let pick = |value: &Option<String>, default: String| value.clone().unwrap_or(default);
    ToolchainBinaries {
        c_compiler: pick(&section.c_compiler, defaults.c_compiler),
        cpp_compiler: pick(&section.cpp_compiler, defaults.cpp_compiler),
        python: pick(&section.python, defaults.python),
        javac: pick(&section.javac, defaults.javac),
        java: pick(&section.java, defaults.java),
        node: pick(&section.node, defaults.node),
        php: pick(&section.php, defaults.php),
        rscript: pick(&section.rscript, defaults.rscript),
    }
}

/// A config file with every value spelled out at its default.
fn default_file_contents() -> PolyrunConfig {
    let runner = RunnerConfig::default();
    let tools = runner.toolchains.clone();
    PolyrunConfig {
        runner: RunnerSection {
            idle_timeout_secs: Some(runner.idle_timeout.as_secs()),
            compile_timeout_secs: Some(runner.compile_timeout.as_secs()),
            poll_interval_ms: Some(runner.poll_interval.as_millis() as u64),
            relay_grace_ms: Some(runner.relay_grace.as_millis() as u64),
            input_write_timeout_ms: Some(runner.input_write_timeout.as_millis() as u64),
            max_capture_bytes: Some(runner.max_capture_bytes),
            workspace_root: None,
            keep_workspaces: Some(runner.keep_workspaces),
        },
        toolchains: ToolchainsSection {
            c_compiler: Some(tools.c_compiler),
            cpp_compiler: Some(tools.cpp_compiler),
            python: Some(tools.python),
            javac: Some(tools.javac),
            java: Some(tools.java),
            node: Some(tools.node),
            php: Some(tools.php),
            rscript: Some(tools.rscript),
        },
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = effective_config(ctx)?;
    let runner = runner_config(&loaded.config)?;

    if ctx.json_output {
        let value = serde_json::json!({
            "sources": loaded.sources.iter().map(|s| serde_json::json!({
                "path": s.path.display().to_string(),
                "loaded": s.loaded,
            })).collect::<Vec<_>>(),
            "warnings": loaded.warnings,
            "runner": {
                "idle_timeout_secs": runner.idle_timeout.as_secs(),
                "compile_timeout_secs": runner.compile_timeout.as_secs(),
                "poll_interval_ms": runner.poll_interval.as_millis() as u64,
                "relay_grace_ms": runner.relay_grace.as_millis() as u64,
                "input_write_timeout_ms": runner.input_write_timeout.as_millis() as u64,
                "max_capture_bytes": runner.max_capture_bytes,
                "workspace_root": runner.workspace_root.display().to_string(),
                "keep_workspaces": runner.keep_workspaces,
            },
            "toolchains": {
                "c_compiler": runner.toolchains.c_compiler,
                "cpp_compiler": runner.toolchains.cpp_compiler,
                "python": runner.toolchains.python,
                "javac": runner.toolchains.javac,
                "java": runner.toolchains.java,
                "node": runner.toolchains.node,
                "php": runner.toolchains.php,
                "rscript": runner.toolchains.rscript,
            },
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}\n", style("polyrun configuration").bold());

    println!("Config file search order (later overrides earlier):");
    for source in &loaded.sources {
        let status = if source.loaded {
            style("✓ loaded").green()
        } else {
            style("· not found").dim()
        };
        println!("  {} {}", status, source.path.display());
    }
    println!();

    println!("Runner:");
    println!("  idle timeout:     {:?}", runner.idle_timeout);
    println!("  compile timeout:  {:?}", runner.compile_timeout);
    println!("  poll interval:    {:?}", runner.poll_interval);
    println!("  relay grace:      {:?}", runner.relay_grace);
    println!("  input timeout:    {:?}", runner.input_write_timeout);
    println!("  capture limit:    {} bytes", runner.max_capture_bytes);
    println!("  workspace root:   {}", runner.workspace_root.display());
    println!("  keep workspaces:  {}", runner.keep_workspaces);
    println!();

    let tools = &runner.toolchains;
    println!("Toolchains:");
    for (key, value) in [
        ("c_compiler", &tools.c_compiler),
        ("cpp_compiler", &tools.cpp_compiler),
        ("python", &tools.python),
        ("javac", &tools.javac),
        ("java", &tools.java),
        ("node", &tools.node),
        ("php", &tools.php),
        ("rscript", &tools.rscript),
    ] {
        println!("  {:<14} {}", key, style(value).cyan());
    }

    if !loaded.warnings.is_empty() {
        println!("\nWarnings:");
        for w in &loaded.warnings {
            println!("  ⚠ {}", w);
        }
    }

    if ctx.verbose {
        println!("\n---\nMerged file config:\n");
        println!("{}", loaded.config.to_toml()?);
    }

    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    let Some(path) = polyrun_config::xdg_config_path() else {
        bail!("could not determine the user config directory");
    };
    if ctx.json_output {
        println!(
            "{}",
            serde_json::json!({ "path": path.display().to_string(), "exists": path.is_file() })
        );
    } else {
        println!("{}", path.display());
    }
    Ok(())
}

fn cmd_init(local: bool, force: bool, ctx: &Context) -> Result<()> {
    let path: PathBuf = if local {
        polyrun_config::project_config_path(None)
    } else {
        polyrun_config::xdg_config_path()
            .context("could not determine the user config directory")?
    };

    if path.exists() && !force {
        bail!(
            "config file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }

    polyrun_config::save_config(&default_file_contents(), &path)?;
    tracing::info!(path = %path.display(), "Wrote default config");

    if ctx.json_output {
        println!("{}", serde_json::json!({ "path": path.display().to_string() }));
    } else {
        println!("Created {}", path.display());
    }
    Ok(())
}
