//! polyrun - run programs in many languages with live, interactive I/O
//!
//! Main entry point for the polyrun CLI.

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{config, detect, languages, run};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// polyrun - run programs in many languages with live, interactive I/O
#[derive(Parser)]
#[command(name = "polyrun")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Idle timeout in seconds (no output and no input)
    #[arg(long, global = true, env = "POLYRUN_IDLE_TIMEOUT")]
    pub idle_timeout: Option<u64>,

    /// Compile timeout in seconds
    #[arg(long, global = true, env = "POLYRUN_COMPILE_TIMEOUT")]
    pub compile_timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a source file, streaming its output and forwarding terminal input
    Run(run::RunArgs),

    /// List supported languages and their toolchain commands
    Languages(languages::LanguagesArgs),

    /// Report whether a file would be rendered as markup or executed
    Detect(detect::DetectArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Console (human-readable, stderr) + rotating JSON file.
    // Program output owns stdout, so the console layer never writes there.
    let filter = if cli.verbose {
        "polyrun=debug,polyrun_runner=debug,polyrun_config=debug,info"
    } else {
        "polyrun=info,polyrun_runner=info,warn"
    };
    let console_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let log_dir = polyrun_config::xdg_config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| std::path::PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "polyrun.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "polyrun=trace,polyrun_runner=trace,polyrun_config=trace,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        idle_timeout_secs: cli.idle_timeout,
        compile_timeout_secs: cli.compile_timeout,
    };

    match cli.command {
        Commands::Run(args) => run::run(args, &ctx).await,
        Commands::Languages(args) => languages::run(args, &ctx).await.map(|_| ExitCode::SUCCESS),
        Commands::Detect(args) => detect::run(args, &ctx).await.map(|_| ExitCode::SUCCESS),
        Commands::Config(args) => config::run(args, &ctx).await.map(|_| ExitCode::SUCCESS),
    }
}
