//! The code runner: drives one run from request to completion.
//!
//! ```text
//! request ──► markup? ──yes──► render
//!               │no
//!               ▼
//!          resolve language ──none──► Unsupported
//!               ▼
//!          write workspace ──err──► WriteFailed
//!               ▼
//!          Compiling (if needed) ──fail/timeout──► Finished(error)
//!               ▼
//!          Running ──exit──► Finished(status from exit code)
//!               └──watchdog──► Finished(error)
//! ```
//!
//! Every path except `render` ends with exactly one completion event.

use std::fmt;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RunnerConfig;
use crate::diagnostics::{Diagnostic, DiagnosticFamily, DiagnosticParser};
use crate::error::{Result, RunnerError};
use crate::event::{EventSink, RunEmitter, RunEvent, RunStatus, StreamKind};
use crate::markup;
use crate::registry::{ActiveProcess, ActivityClock, SessionRegistry};
use crate::relay::{CaptureBuffer, relay_stream};
use crate::toolchain::{ExecutionPlan, Language};
use crate::watchdog::{Watchdog, WatchdogVerdict};
use crate::workspace::Workspace;

/// Inbound execution request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Caller-supplied session identifier.
    pub session_id: String,
    /// Free-form language label.
    pub language: String,
    /// Program source.
    pub code: String,
}

impl RunRequest {
    /// Create a request.
    pub fn new(
        session_id: impl Into<String>,
        language: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            language: language.into(),
            code: code.into(),
        }
    }
}

/// Inbound input for a running program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRequest {
    /// Session the input is addressed to.
    pub session_id: String,
    /// One line of input, without the line terminator.
    pub text: String,
}

/// Supervisor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Pending,
    Compiling,
    Running,
    Finished(RunStatus),
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Pending => write!(f, "pending"),
            RunPhase::Compiling => write!(f, "compiling"),
            RunPhase::Running => write!(f, "running"),
            RunPhase::Finished(status) => write!(f, "finished({status})"),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Content was markup and was rendered instead of executed.
    Rendered,
    /// No toolchain matched the language label.
    Unsupported,
    /// The workspace could not be written.
    WriteFailed,
    /// The compiler reported errors.
    CompileFailed,
    /// The compiler exceeded the compile timeout.
    CompileTimedOut,
    /// A toolchain binary could not be started.
    SpawnFailed,
    /// The process exited on its own. `None` means it was killed by a signal.
    Exited { code: Option<i32> },
    /// The watchdog killed the process after the idle window.
    IdleTimeout,
    /// The process was killed on request.
    Terminated,
}

impl RunOutcome {
    /// Status carried by the completion event. `None` for rendered content,
    /// which emits no completion.
    pub fn status(&self) -> Option<RunStatus> {
        match self {
            RunOutcome::Rendered => None,
            RunOutcome::Exited { code } => Some(RunStatus::from_exit_code(*code)),
            _ => Some(RunStatus::Error),
        }
    }
}

/// Summary returned to the in-process caller once a run is over.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub session_id: String,
    pub run_id: String,
    /// Resolved language, if any.
    pub language: Option<Language>,
    pub outcome: RunOutcome,
    /// Diagnostic emitted for the failure, if one was extracted.
    pub diagnostic: Option<Diagnostic>,
    pub duration: Duration,
}

impl RunReport {
    /// Completion status, `None` for rendered content.
    pub fn status(&self) -> Option<RunStatus> {
        self.outcome.status()
    }

    /// Exit code of the program, if it exited on its own.
    pub fn exit_code(&self) -> Option<i32> {
        match self.outcome {
            RunOutcome::Exited { code } => code,
            _ => None,
        }
    }
}

/// How the running phase ended.
enum Termination {
    Exited(Option<ExitStatus>),
    Watchdog(WatchdogVerdict),
}

/// Multi-language code runner.
///
/// Cheap to clone; clones share the session registry, event sink and
/// diagnostic parser.
#[derive(Clone)]
pub struct CodeRunner {
    config: Arc<RunnerConfig>,
    sink: Arc<dyn EventSink>,
    registry: SessionRegistry,
    parser: Arc<DiagnosticParser>,
}

impl CodeRunner {
    /// Create a runner that delivers events to `sink`.
    pub fn new(config: RunnerConfig, sink: impl EventSink + 'static) -> Self {
        Self {
            config: Arc::new(config),
            sink: Arc::new(sink),
            registry: SessionRegistry::new(),
            parser: Arc::new(DiagnosticParser::new()),
        }
    }

    /// Replace the diagnostic parser.
    pub fn with_diagnostic_parser(mut self, parser: DiagnosticParser) -> Self {
        self.parser = Arc::new(parser);
        self
    }

    /// Get the runner configuration.
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Get the session registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Write a line of input to the session's running program.
    ///
    /// Silently does nothing (returning false) if the session has no live process.
    pub async fn send_input(&self, session_id: &str, text: &str) -> bool {
        self.registry
            .send_input(session_id, text, self.config.input_write_timeout)
            .await
    }

    /// Route an [`InputRequest`] to input injection.
    pub async fn handle_input(&self, input: &InputRequest) -> bool {
        self.send_input(&input.session_id, &input.text).await
    }

    /// Kill the session's running program.
    ///
    /// The run unwinds through its normal finish sequence and completes with
    /// status `error`. Returns false if the session has no live process.
    pub fn terminate(&self, session_id: &str) -> bool {
        self.registry.terminate(session_id)
    }

    /// Execute a request to completion.
    ///
    /// Events are emitted as the run progresses; the returned report
    /// summarizes the same run for the caller.
    ///
    /// The session's registry entry is removed before the completion event
    /// is emitted, so input sent after a caller observes completion is
    /// always a no-op rather than a write to a closed pipe.
    pub async fn run(&self, request: RunRequest) -> RunReport {
        let started = Instant::now();
        let run_id = new_run_id();
        let emitter = RunEmitter::new(self.sink.clone(), &request.session_id, &run_id);

        info!(
            session_id = %request.session_id,
            run_id = %run_id,
            language = %request.language,
            code_len = request.code.len(),
            "Run requested"
        );
        log_phase(&emitter, RunPhase::Pending);

        if markup::should_render(&request.language, &request.code) {
            debug!(run_id = %run_id, "Content is markup, rendering instead of executing");
            emitter.emit(RunEvent::Render {
                content: request.code,
            });
            return self.report(&emitter, None, RunOutcome::Rendered, None, started);
        }

        let Some(language) = Language::resolve(&request.language) else {
            let err = RunnerError::UnsupportedLanguage(request.language.clone());
            warn!(run_id = %run_id, language = %request.language, "Unsupported language");
            emitter.emit(RunEvent::system(format!("Error: {err}.\n")));
            return self.finish(&emitter, None, RunOutcome::Unsupported, None, started);
        };

        let (workspace, plan) = match self.prepare_workspace(&request, &run_id, language) {
            Ok(prepared) => prepared,
            Err(err) => {
                warn!(run_id = %run_id, error = %err, "Workspace preparation failed");
                emitter.emit(RunEvent::system(format!("{err}\n")));
                return self.finish(&emitter, Some(language), RunOutcome::WriteFailed, None, started);
            }
        };

        let report = self.execute(&emitter, language, &workspace, &plan, started).await;
        workspace.cleanup(self.config.keep_workspaces);
        report
    }

    fn prepare_workspace(
        &self,
        request: &RunRequest,
        run_id: &str,
        language: Language,
    ) -> Result<(Workspace, ExecutionPlan)> {
        let workspace = Workspace::create(
            &self.config.workspace_root,
            &request.session_id,
            run_id,
            language.source_filename(),
        )?;

        let mut plan = ExecutionPlan::new(language, &self.config.toolchains, workspace.dir());
        let written = workspace
            .write_source(&request.code)
            .and_then(|_| workspace.prepare_helpers(&mut plan));
        if let Err(err) = written {
            workspace.cleanup(self.config.keep_workspaces);
            return Err(err);
        }

        debug!(
            run_id = %run_id,
            dir = %workspace.dir().display(),
            "Workspace ready"
        );
        Ok((workspace, plan))
    }

    /// Compile (if needed) and run inside a prepared workspace.
    async fn execute(
        &self,
        emitter: &RunEmitter,
        language: Language,
        workspace: &Workspace,
        plan: &ExecutionPlan,
        started: Instant,
    ) -> RunReport {
        let family = DiagnosticFamily::from(language);

        if plan.needs_compile() {
            log_phase(emitter, RunPhase::Compiling);
            if let Err(err) = self.compile(plan, workspace.dir()).await {
                let (outcome, diagnostic) = self.compile_failure(emitter, family, err);
                return self.finish(emitter, Some(language), outcome, diagnostic, started);
            }
        }

        log_phase(emitter, RunPhase::Running);
        let (outcome, diagnostic) = self.supervise(emitter, family, plan, workspace.dir()).await;
        self.registry
            .remove_if_run(emitter.session_id(), emitter.run_id());
        self.finish(emitter, Some(language), outcome, diagnostic, started)
    }

    /// Run the compile command under the compile timeout.
    async fn compile(&self, plan: &ExecutionPlan, dir: &Path) -> Result<()> {
        let Some((program, args)) = plan.compile.as_deref().and_then(|cmd| cmd.split_first())
        else {
            return Ok(());
        };

        debug!(command = ?plan.compile, "Compiling");
        let child = Command::new(program)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                program: program.clone(),
                source,
            })?;

        // On timeout the child is dropped with the future and killed.
        let output = tokio::time::timeout(self.config.compile_timeout, child.wait_with_output())
            .await
            .map_err(|_| RunnerError::CompileTimeout(self.config.compile_timeout))??;

        if output.status.success() {
            return Ok(());
        }

        let mut text = String::from_utf8_lossy(&output.stderr).into_owned();
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&stdout);
        }

        Err(RunnerError::Compile {
            code: output.status.code(),
            output: text,
        })
    }

    /// Report a compile failure and pick the run outcome.
    fn compile_failure(
        &self,
        emitter: &RunEmitter,
        family: DiagnosticFamily,
        err: RunnerError,
    ) -> (RunOutcome, Option<Diagnostic>) {
        warn!(run_id = %emitter.run_id(), error = %err, "Compilation failed");
        match err {
            RunnerError::Compile { output, .. } => {
                emitter.emit(RunEvent::system("Compilation failed:\n"));
                if !output.is_empty() {
                    emitter.emit(RunEvent::output(output.clone(), StreamKind::Stderr));
                }
                (RunOutcome::CompileFailed, self.parser.parse(family, &output))
            }
            RunnerError::CompileTimeout(limit) => (
                RunOutcome::CompileTimedOut,
                Some(
                    Diagnostic::new(None, format!("Compilation timed out after {limit:?}"))
                        .with_suggestion(
                            "Very large programs may need a longer compile timeout.",
                        ),
                ),
            ),
            RunnerError::Spawn { program, source } => {
                (RunOutcome::SpawnFailed, Some(spawn_diagnostic(&program, &source)))
            }
            other => (
                RunOutcome::CompileFailed,
                Some(Diagnostic::new(None, other.to_string())),
            ),
        }
    }

    /// Spawn the program and supervise it until it exits or is killed.
    async fn supervise(
        &self,
        emitter: &RunEmitter,
        family: DiagnosticFamily,
        plan: &ExecutionPlan,
        dir: &Path,
    ) -> (RunOutcome, Option<Diagnostic>) {
        let Some((program, args)) = plan.run.split_first() else {
            return (
                RunOutcome::SpawnFailed,
                Some(Diagnostic::new(None, "empty run command")),
            );
        };

        let spawned = Command::new(program)
            .args(args)
            .current_dir(dir)
            .envs(plan.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(source) => {
                warn!(run_id = %emitter.run_id(), program = %program, error = %source, "Spawn failed");
                return (RunOutcome::SpawnFailed, Some(spawn_diagnostic(program, &source)));
            }
        };

        let pid = child.id();
        info!(
            session_id = %emitter.session_id(),
            run_id = %emitter.run_id(),
            pid = ?pid,
            "Process started"
        );

        // Register before any relay starts so input can be routed immediately.
        let stdin = Arc::new(tokio::sync::Mutex::new(child.stdin.take()));
        let activity = ActivityClock::new();
        let terminate = Arc::new(Notify::new());
        let entry = ActiveProcess::new(
            emitter.run_id(),
            pid,
            stdin.clone(),
            activity.clone(),
            terminate.clone(),
        );
        if let Some(previous) = self.registry.insert(emitter.session_id(), entry) {
            info!(
                session_id = %emitter.session_id(),
                superseded_run = %previous.run_id,
                "Session already had a running program, terminating it"
            );
            previous.request_termination();
        }

        let capture = CaptureBuffer::new(self.config.max_capture_bytes);
        let relays: Vec<JoinHandle<usize>> = [
            child.stdout.take().map(|out| {
                tokio::spawn(relay_stream(
                    out,
                    StreamKind::Stdout,
                    emitter.clone(),
                    activity.clone(),
                    None,
                ))
            }),
            child.stderr.take().map(|err| {
                tokio::spawn(relay_stream(
                    err,
                    StreamKind::Stderr,
                    emitter.clone(),
                    activity.clone(),
                    Some(capture.clone()),
                ))
            }),
        ]
        .into_iter()
        .flatten()
        .collect();

        let mut watchdog = Watchdog::new(
            activity,
            self.config.idle_timeout,
            self.config.poll_interval,
            terminate,
        )
        .spawn();

        let termination = tokio::select! {
            biased;
            status = child.wait() => Termination::Exited(exit_status(emitter, status)),
            verdict = &mut watchdog => match verdict {
                Ok(verdict) => Termination::Watchdog(verdict),
                Err(e) => {
                    // A failed watchdog is not a kill request; the program runs on unsupervised.
                    warn!(
                        run_id = %emitter.run_id(),
                        error = %e,
                        "Watchdog task failed, waiting for the process without idle supervision"
                    );
                    Termination::Exited(exit_status(emitter, child.wait().await))
                }
            },
        };

        match &termination {
            Termination::Exited(_) => watchdog.abort(),
            Termination::Watchdog(verdict) => {
                info!(run_id = %emitter.run_id(), verdict = ?verdict, "Killing process");
                if let Err(e) = child.kill().await {
                    warn!(run_id = %emitter.run_id(), error = %e, "Failed to kill process");
                }
            }
        }

        // Close our end of the input pipe; late input becomes a no-op.
        stdin.lock().await.take();

        self.join_relays(emitter, relays).await;

        match termination {
            Termination::Watchdog(WatchdogVerdict::IdleTimeout { .. }) => {
                emitter.emit(RunEvent::system(format!(
                    "\n[Process killed: no output or input for {:?}]\n",
                    self.config.idle_timeout
                )));
                (RunOutcome::IdleTimeout, None)
            }
            Termination::Watchdog(WatchdogVerdict::Terminated) => {
                emitter.emit(RunEvent::system("\n[Process terminated]\n"));
                (RunOutcome::Terminated, None)
            }
            Termination::Exited(status) => {
                let code = status.and_then(|s| s.code());
                debug!(run_id = %emitter.run_id(), code = ?code, "Process exited");
                if code == Some(0) {
                    return (RunOutcome::Exited { code }, None);
                }
                let diagnostic = self
                    .parser
                    .parse(family, &capture.contents())
                    .or_else(|| Some(exit_diagnostic(status)));
                (RunOutcome::Exited { code }, diagnostic)
            }
        }
    }

    /// Wait for the relays to drain, aborting any that outlive the grace period.
    async fn join_relays(&self, emitter: &RunEmitter, relays: Vec<JoinHandle<usize>>) {
        let deadline = tokio::time::Instant::now() + self.config.relay_grace;
        for mut relay in relays {
            match tokio::time::timeout_at(deadline, &mut relay).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(run_id = %emitter.run_id(), error = %e, "Relay task failed"),
                Err(_) => {
                    warn!(
                        run_id = %emitter.run_id(),
                        "Relay still open after grace period, a child process may hold the stream"
                    );
                    relay.abort();
                }
            }
        }
    }

    /// Emit diagnostics and the completion event, then build the report.
    fn finish(
        &self,
        emitter: &RunEmitter,
        language: Option<Language>,
        outcome: RunOutcome,
        diagnostic: Option<Diagnostic>,
        started: Instant,
    ) -> RunReport {
        if let Some(diagnostic) = &diagnostic {
            emitter.emit(RunEvent::system(format!("{diagnostic}\n")));
            if let Some(text) = &diagnostic.suggestion {
                emitter.emit(RunEvent::Suggestion { text: text.clone() });
            }
        }

        let status = outcome.status().unwrap_or(RunStatus::Error);
        log_phase(emitter, RunPhase::Finished(status));
        emitter.emit(RunEvent::Completion { status });

        self.report(emitter, language, outcome, diagnostic, started)
    }

    fn report(
        &self,
        emitter: &RunEmitter,
        language: Option<Language>,
        outcome: RunOutcome,
        diagnostic: Option<Diagnostic>,
        started: Instant,
    ) -> RunReport {
        let duration = started.elapsed();
        info!(
            session_id = %emitter.session_id(),
            run_id = %emitter.run_id(),
            outcome = ?outcome,
            duration_ms = duration.as_millis() as u64,
            "Run finished"
        );
        RunReport {
            session_id: emitter.session_id().to_string(),
            run_id: emitter.run_id().to_string(),
            language,
            outcome,
            diagnostic,
            duration,
        }
    }
}

fn log_phase(emitter: &RunEmitter, phase: RunPhase) {
    debug!(
        session_id = %emitter.session_id(),
        run_id = %emitter.run_id(),
        phase = %phase,
        "Run phase"
    );
}

/// Short unique run identifier.
fn new_run_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

fn exit_status(
    emitter: &RunEmitter,
    status: std::io::Result<ExitStatus>,
) -> Option<ExitStatus> {
    status
        .inspect_err(|e| {
            warn!(run_id = %emitter.run_id(), error = %e, "Failed to wait for process");
        })
        .ok()
}

fn spawn_diagnostic(program: &str, source: &std::io::Error) -> Diagnostic {
    Diagnostic::new(None, format!("Failed to start '{program}': {source}")).with_suggestion(
        format!(
            "Make sure '{program}' is installed and on PATH, or set its location under [toolchains]."
        ),
    )
}

/// Diagnostic for a failed exit with nothing useful on stderr.
fn exit_diagnostic(status: Option<ExitStatus>) -> Diagnostic {
    let Some(status) = status else {
        return Diagnostic::new(None, "Process ended abnormally");
    };
    if let Some(code) = status.code() {
        return Diagnostic::new(None, format!("Process exited with code {code}"));
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            let diagnostic =
                Diagnostic::new(None, format!("Process terminated by signal {signal}"));
            return match signal {
                11 => diagnostic.with_suggestion(
                    "Segmentation fault: the program accessed invalid memory. Check pointers and array bounds.",
                ),
                _ => diagnostic,
            };
        }
    }

    Diagnostic::new(None, "Process ended abnormally")
}
