//! Detect command - show how a file would be handled.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;

use polyrun_runner::{Language, should_render};

use super::Context;

/// Arguments for the detect command.
#[derive(Args, Debug)]
pub struct DetectArgs {
    /// File to inspect
    pub file: PathBuf,

    /// Language label (inferred from the file extension when omitted)
    #[arg(short, long)]
    pub language: Option<String>,
}

/// How a request would be dispatched.
#[derive(Debug, PartialEq, Eq)]
enum Verdict {
    Render,
    Execute(Language),
    Unsupported,
}

fn classify(label: &str, code: &str) -> Verdict {
    if should_render(label, code) {
        return Verdict::Render;
    }
    match Language::resolve(label) {
        Some(language) => Verdict::Execute(language),
        None => Verdict::Unsupported,
    }
}

/// Run the detect command.
pub async fn run(args: DetectArgs, ctx: &Context) -> Result<()> {
    let code = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let label = args
        .language
        .or_else(|| super::label_for_path(&args.file))
        .unwrap_or_default();

    let verdict = classify(&label, &code);

    if ctx.json_output {
        let (action, language) = match verdict {
            Verdict::Render => ("render", None),
            Verdict::Execute(lang) => ("execute", Some(lang)),
            Verdict::Unsupported => ("unsupported", None),
        };
        println!(
            "{}",
            serde_json::json!({
                "file": args.file.display().to_string(),
                "label": label,
                "action": action,
                "language": language,
            })
        );
        return Ok(());
    }

    match verdict {
        Verdict::Render => println!("render: content is markup and will not be executed"),
        Verdict::Execute(lang) => println!("execute: {} ({})", lang.name(), lang.source_filename()),
        Verdict::Unsupported => println!("unsupported: no toolchain for label '{label}'"),
    }
    Ok(())
}
