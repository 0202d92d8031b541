//! Languages command - list supported toolchains.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use console::style;

use polyrun_runner::{ExecutionPlan, Language};

use super::Context;

/// Arguments for the languages command.
#[derive(Args, Debug)]
pub struct LanguagesArgs {}

/// Run the languages command.
pub async fn run(_args: LanguagesArgs, ctx: &Context) -> Result<()> {
    let loaded = super::config::effective_config(ctx)?;
    let runner = super::config::runner_config(&loaded.config)?;
    let placeholder = Path::new("<workspace>");

    let plans: Vec<ExecutionPlan> = Language::ALL
        .iter()
        .map(|lang| ExecutionPlan::new(*lang, &runner.toolchains, placeholder))
        .collect();

    if ctx.json_output {
        let value: Vec<_> = plans
            .iter()
            .map(|plan| {
                serde_json::json!({
                    "language": plan.language,
                    "name": plan.language.name(),
                    "source_file": plan.source_file,
                    "compile": plan.compile,
                    "run": plan.run,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", style("Supported languages").bold());
    println!();
    for plan in &plans {
        println!(
            "  {:<12} {}",
            style(plan.language.name()).cyan(),
            plan.source_file
        );
        if let Some(compile) = &plan.compile {
            println!("    compile: {}", compile.join(" "));
        }
        println!("    run:     {}", plan.run.join(" "));
    }
    println!();
    println!(
        "Markup ({}) is rendered, never executed.",
        style("html, css, svg, xml").dim()
    );
    Ok(())
}
