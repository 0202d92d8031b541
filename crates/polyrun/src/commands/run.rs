//! Run command - execute a source file with live I/O.
//!
//! Events from the runner are printed as they arrive. Lines typed on the
//! terminal are forwarded to the running program.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context as _, Result, anyhow};
use clap::Args;
use console::style;
use tokio::sync::mpsc;

use polyrun_runner::{
    ChannelSink, CodeRunner, RunEvent, RunRequest, RunStatus, SessionEvent, StreamKind,
};

use super::Context;

const INPUT_WAIT: Duration = Duration::from_millis(10);

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Source file to run
    pub file: PathBuf,

    /// Language label (inferred from the file extension when omitted)
    #[arg(short, long)]
    pub language: Option<String>,

    /// Session identifier
    #[arg(short, long)]
    pub session: Option<String>,
}

/// Run the run command.
pub async fn run(args: RunArgs, ctx: &Context) -> Result<ExitCode> {
    let code = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let language = match args.language {
        Some(language) => language,
        None => super::label_for_path(&args.file).ok_or_else(|| {
            anyhow!(
                "cannot infer the language of {}; pass --language",
                args.file.display()
            )
        })?,
    };
    let session = args
        .session
        .unwrap_or_else(|| format!("cli-{}", std::process::id()));

    let loaded = super::config::effective_config(ctx)?;
    let (sink, mut events) = ChannelSink::new();
    let runner = CodeRunner::new(super::config::runner_config(&loaded.config)?, sink);

    tracing::debug!(file = %args.file.display(), language = %language, session = %session, "Starting run");

    let mut run = tokio::spawn({
        let runner = runner.clone();
        let request = RunRequest::new(&session, language, code);
        async move { runner.run(request).await }
    });
    let forwarder = forward_terminal_input(runner, session);

    let printer = Printer::new(ctx);
    let report = loop {
        tokio::select! {
            biased;
            Some(event) = events.recv() => printer.print(&event)?,
            report = &mut run => {
                // The run emits everything before it returns.
                while let Ok(event) = events.try_recv() {
                    printer.print(&event)?;
                }
                break report?;
            }
        }
    };
    forwarder.abort();

    if ctx.verbose && !ctx.json_output {
        eprintln!(
            "{} {:?} in {:?}",
            style("finished:").dim(),
            report.outcome,
            report.duration
        );
    }
    Ok(exit_code(report.status()))
}

fn exit_code(status: Option<RunStatus>) -> ExitCode {
    match status {
        Some(RunStatus::Error) => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    }
}

/// Forward terminal lines to the session.
///
/// Reading happens on a plain thread: a blocking read on a runtime thread
/// would keep the runtime from shutting down while the terminal is idle.
fn forward_terminal_input(runner: CodeRunner, session: String) -> tokio::task::JoinHandle<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            // Piped input can arrive before the program is spawned; hold it until then.
            while !runner.registry().is_active(&session) {
                tokio::time::sleep(INPUT_WAIT).await;
            }
            if !runner.send_input(&session, &line).await {
                tracing::debug!(session = %session, "Input dropped, no running program");
            }
        }
    })
}

/// Writes events to the terminal.
struct Printer {
    json: bool,
    verbose: bool,
}

impl Printer {
    fn new(ctx: &Context) -> Self {
        Self {
            json: ctx.json_output,
            verbose: ctx.verbose,
        }
    }

    fn print(&self, event: &SessionEvent) -> Result<()> {
        if self.json {
            let mut out = std::io::stdout().lock();
            writeln!(out, "{}", serde_json::to_string(event)?)?;
            out.flush()?;
            return Ok(());
        }

        match &event.event {
            RunEvent::Render { content } => {
                let mut out = std::io::stdout().lock();
                write!(out, "{content}")?;
                if !content.ends_with('\n') {
                    writeln!(out)?;
                }
                out.flush()?;
            }
            RunEvent::Output { fragment, stream } => match stream {
                StreamKind::Stdout => {
                    let mut out = std::io::stdout().lock();
                    write!(out, "{fragment}")?;
                    out.flush()?;
                }
                StreamKind::Stderr => {
                    let mut err = std::io::stderr().lock();
                    write!(err, "{}", style(fragment).red().for_stderr())?;
                    err.flush()?;
                }
                StreamKind::System => {
                    let mut err = std::io::stderr().lock();
                    write!(err, "{}", style(fragment).yellow().for_stderr())?;
                    err.flush()?;
                }
            },
            RunEvent::Suggestion { text } => {
                eprintln!("{} {}", style("hint:").cyan().bold().for_stderr(), text);
            }
            RunEvent::Completion { status } => {
                if self.verbose {
                    eprintln!("{} {}", style("status:").dim().for_stderr(), status);
                }
            }
        }
        Ok(())
    }
}
