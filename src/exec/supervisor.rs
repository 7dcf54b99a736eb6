// src/exec/supervisor.rs

//! Process supervisor: one child process at a time, from spawn to cleanup.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::process::Child;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::artifact::TempArtifactManager;
use crate::config::{ConfigFile, ExecutorConfig};
use crate::errors::{Result, ScriptvisorError};
use crate::exec::drain::{DrainedOutput, StreamDrain, StreamKind};
use crate::exec::process::{build_command, terminate};
use crate::outcome::{OutcomeClassifier, Signal};
use crate::output::{LiveSink, LogBuffer, Severity, strip_ansi};
use crate::types::{
    ExecutionError, ExitInfo, ProcessStatus, RenderedScript, RunOutcome, RunState,
    SupervisorState,
};

const BANNER_WIDTH: usize = 42;

/// Error classification state of one run.
///
/// The first error signature is held as a candidate until the run is over:
/// a transient signature anywhere in the run's output, before or after it,
/// cancels it.
#[derive(Debug, Default)]
struct ErrorWatch {
    candidate: Option<ExecutionError>,
    transient_seen: bool,
}

/// Everything that exists only while a child is running.
struct ActiveRun {
    child: Child,
    drain: StreamDrain,
    task: String,
    script_id: String,
    started: Instant,
}

/// Runs rendered scripts as child processes and supervises them.
///
/// The supervisor exclusively owns the child handle, the tracked temp
/// artifact and the [`RunState`]. [`start`](Self::start) always begins with
/// [`stop`](Self::stop), so at most one child is alive per instance, and
/// `stop` can be called from any state to get back to
/// [`SupervisorState::Idle`] with everything released.
pub struct Supervisor {
    config: ExecutorConfig,
    classifier: OutcomeClassifier,
    artifacts: TempArtifactManager,
    log: LogBuffer,
    sink: Arc<dyn LiveSink>,
    active: Option<ActiveRun>,
    watch: ErrorWatch,
    run_state: RunState,
    state: SupervisorState,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("state", &self.state)
            .field("run_state", &self.run_state)
            .field("artifact", &self.artifacts.current())
            .field("pid", &self.pid())
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    pub fn new(
        config: ExecutorConfig,
        classifier: OutcomeClassifier,
        sink: Arc<dyn LiveSink>,
    ) -> Self {
        let log = LogBuffer::new();
        let artifacts = TempArtifactManager::from_config(&config).with_log(log.clone());
        Self {
            config,
            classifier,
            artifacts,
            log,
            sink,
            active: None,
            watch: ErrorWatch::default(),
            run_state: RunState::default(),
            state: SupervisorState::Idle,
        }
    }

    pub fn from_config(cfg: &ConfigFile, sink: Arc<dyn LiveSink>) -> Result<Self> {
        let classifier = OutcomeClassifier::from_config(&cfg.classifier)?;
        Ok(Self::new(cfg.executor.clone(), classifier, sink))
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn run_state(&self) -> &RunState {
        &self.run_state
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn classifier(&self) -> &OutcomeClassifier {
        &self.classifier
    }

    /// Shared handle to the log buffer of the current run.
    pub fn log_buffer(&self) -> LogBuffer {
        self.log.clone()
    }

    /// Buffered log text since the last drain; empties the buffer.
    pub fn drain_log(&self) -> String {
        self.log.drain()
    }

    /// Path of the tracked script artifact, while one exists.
    pub fn current_artifact(&self) -> Option<&Path> {
        self.artifacts.current()
    }

    pub fn artifacts(&self) -> &TempArtifactManager {
        &self.artifacts
    }

    pub fn artifacts_mut(&mut self) -> &mut TempArtifactManager {
        &mut self.artifacts
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// OS process id of the running child.
    pub fn pid(&self) -> Option<u32> {
        self.active.as_ref().and_then(|run| run.child.id())
    }

    /// Materialize `script` and launch it with `working_dir` as the child's
    /// current directory.
    ///
    /// Any run still active is stopped first. Fails only when the run cannot
    /// be attempted at all (artifact write or spawn failure); the artifact
    /// is cleaned up in that case.
    pub async fn start(&mut self, script: &RenderedScript, working_dir: &Path) -> Result<()> {
        if self.active.is_some() {
            warn!(
                task = %script.task(),
                "start requested while a previous run is active; stopping it first"
            );
        }
        self.stop().await;

        self.run_state = RunState::default();
        self.watch = ErrorWatch::default();
        self.log.clear();
        self.log.event(Severity::Info, &"=".repeat(BANNER_WIDTH));
        self.log.event(Severity::Info, "starting new task execution");
        self.log
            .event(Severity::Info, &format!("task: {}", script.task().replace('"', "\\\"")));

        let path = match self.artifacts.materialize(script.source(), true) {
            Ok(path) => path,
            Err(e) => {
                error!(task = %script.task(), error = %e, "failed to write script artifact");
                self.log
                    .event(Severity::Error, &format!("failed to create script file: {e}"));
                self.run_state.ended = true;
                return Err(e);
            }
        };

        let child = match self.spawn(&path, working_dir) {
            Ok(child) => child,
            Err(e) => {
                error!(
                    task = %script.task(),
                    working_dir = ?working_dir,
                    error = %e,
                    "failed to spawn script process"
                );
                self.log
                    .event(Severity::Error, &format!("failed to start script process: {e}"));
                self.artifacts.cleanup_current();
                self.run_state.ended = true;
                return Err(e);
            }
        };

        self.attach(child, script, &path);
        Ok(())
    }

    fn spawn(&self, path: &Path, working_dir: &Path) -> Result<Child> {
        build_command(&self.config, path, working_dir)
            .spawn()
            .map_err(|source| ScriptvisorError::SpawnFailure {
                program: self.config.interpreter.clone(),
                source,
            })
    }

    fn attach(&mut self, mut child: Child, script: &RenderedScript, path: &Path) {
        let pid = child.id();
        let drain = StreamDrain::attach(child.stdout.take(), child.stderr.take());

        info!(
            task = %script.task(),
            script_id = %script.id(),
            pid,
            artifact = ?path,
            "script process started"
        );

        self.active = Some(ActiveRun {
            child,
            drain,
            task: script.task().to_string(),
            script_id: script.id().to_string(),
            started: Instant::now(),
        });
        self.state = SupervisorState::Running;
    }

    /// Stop the active run, if any, and release everything it holds.
    ///
    /// Requests a graceful exit, kills the child after
    /// `[executor].stop_timeout_ms`, removes the tracked artifact and marks
    /// the run as ended and not successful. Never fails: termination
    /// problems are logged. Safe to call in every state.
    pub async fn stop(&mut self) {
        if let Some(mut run) = self.active.take() {
            self.state = SupervisorState::Stopped;

            let pending = run.drain.drain_once();
            self.consume(pending);
            run.drain.abort();
            self.settle_error();

            match terminate(&mut run.child, self.config.stop_timeout()).await {
                Ok(()) => {
                    info!(task = %run.task, script_id = %run.script_id, "script process stopped");
                    self.log.event(Severity::Info, "script process stopped");
                }
                Err(e) => {
                    warn!(task = %run.task, error = %e, "failed to stop script process");
                    self.log
                        .event(Severity::Warning, &format!("error while stopping script process: {e}"));
                }
            }
        }

        self.artifacts.cleanup_current();
        self.run_state.stopped();
        self.state = SupervisorState::Idle;
    }

    /// Whether the child has exited, and how.
    pub fn poll(&mut self) -> ProcessStatus {
        let Some(run) = self.active.as_mut() else {
            return ProcessStatus::Idle;
        };

        match run.child.try_wait() {
            Ok(Some(status)) => ProcessStatus::Exited(status.into()),
            Ok(None) => ProcessStatus::Running,
            Err(e) => {
                warn!(task = %run.task, error = %e, "failed to query child status; treating as exited");
                ProcessStatus::Exited(ExitInfo {
                    code: None,
                    success: false,
                })
            }
        }
    }

    /// Drain whatever output is queued right now. Returns the number of
    /// lines processed.
    pub fn pump(&mut self) -> usize {
        let Some(run) = self.active.as_mut() else {
            return 0;
        };
        let output = run.drain.drain_once();
        let lines = output.line_count();
        self.consume(output);
        lines
    }

    /// Drive the active run until the child exits.
    ///
    /// Every tick drains both streams, mirrors the lines to the live sink,
    /// appends them to the log buffer and classifies them. Process exit is
    /// the only terminal condition; a final drain runs after it.
    pub async fn supervise(&mut self) -> RunOutcome {
        if self.active.is_none() {
            return self.outcome(None);
        }

        let interval = self.config.poll_interval();
        let exit = loop {
            self.pump();
            match self.poll() {
                ProcessStatus::Running => sleep(interval).await,
                ProcessStatus::Exited(exit) => break Some(exit),
                ProcessStatus::Idle => break None,
            }
        };

        self.finish_run(exit).await
    }

    /// `start` followed by `supervise`.
    pub async fn run(&mut self, script: &RenderedScript, working_dir: &Path) -> Result<RunOutcome> {
        self.start(script, working_dir).await?;
        Ok(self.supervise().await)
    }

    async fn finish_run(&mut self, exit: Option<ExitInfo>) -> RunOutcome {
        let Some(run) = self.active.take() else {
            return self.outcome(exit);
        };
        let ActiveRun {
            child,
            drain,
            task,
            started,
            ..
        } = run;

        let rest = drain.finish(self.config.drain_grace()).await;
        self.consume(rest);
        drop(child);
        self.settle_error();

        self.artifacts.cleanup_current();

        if let Some(exit) = exit {
            if !exit.success && !self.run_state.succeeded && self.run_state.last_error.is_none() {
                let message = match exit.code {
                    Some(code) => format!("process exited with code {code}"),
                    None => "process terminated by a signal".to_string(),
                };
                self.log.event(Severity::Error, &message);
                self.run_state.last_error = Some(ExecutionError {
                    kind: "NonZeroExit".to_string(),
                    message,
                    raw_log: String::new(),
                });
            }
        }

        self.run_state.ended = true;
        self.state = if self.run_state.succeeded {
            SupervisorState::Completed
        } else {
            SupervisorState::Failed
        };

        info!(
            task = %task,
            exit_code = exit.and_then(|e| e.code),
            succeeded = self.run_state.succeeded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "script process finished"
        );
        self.log.event(Severity::Info, "task execution finished");
        self.log.event(Severity::Info, &"=".repeat(BANNER_WIDTH));

        self.outcome(exit)
    }

    fn outcome(&self, exit: Option<ExitInfo>) -> RunOutcome {
        RunOutcome {
            succeeded: self.run_state.succeeded,
            error: self.run_state.last_error.clone(),
            exit_code: exit.and_then(|e| e.code),
        }
    }

    fn consume(&mut self, output: DrainedOutput) {
        if output.is_empty() {
            return;
        }

        for line in &output.stdout {
            self.sink.stdout_line(line);
            self.log.append_line(line);
        }
        for line in &output.stderr {
            self.sink.stderr_line(line);
            self.log.append_line(line);
        }

        self.classify(&output.stdout, StreamKind::Stdout);
        self.classify(&output.stderr, StreamKind::Stderr);
    }

    /// Classify one tick's worth of lines from one stream.
    fn classify(&mut self, lines: &[String], stream: StreamKind) {
        if lines.is_empty() {
            return;
        }
        let chunk = lines.join("\n");
        let text = strip_ansi(&chunk);

        if !self.run_state.succeeded && self.classifier.on_completion_marker(&text) {
            debug!(stream = stream.as_str(), "completion marker seen");
            self.run_state.succeeded = true;
        }

        match self.classifier.assess(&text) {
            Signal::Error(err) => {
                if self.watch.transient_seen || self.watch.candidate.is_some() {
                    return;
                }
                debug!(
                    stream = stream.as_str(),
                    kind = %err.kind,
                    "error signature in output; held until the run ends"
                );
                self.watch.candidate = Some(err);
            }
            Signal::Transient => {
                if let Some(dropped) = self.watch.candidate.take() {
                    debug!(
                        stream = stream.as_str(),
                        kind = %dropped.kind,
                        "transient network condition in output; dropping earlier error"
                    );
                } else {
                    debug!(stream = stream.as_str(), "transient network condition in output; still waiting");
                }
                self.watch.transient_seen = true;
            }
            Signal::Clean => {}
        }
    }

    /// Turn the held error candidate, if any, into the run's error.
    fn settle_error(&mut self) {
        let Some(err) = std::mem::take(&mut self.watch).candidate else {
            return;
        };
        if self.run_state.last_error.is_some() {
            return;
        }

        warn!(kind = %err.kind, message = %err.message, "runtime error detected in script output");
        self.log
            .event(Severity::Error, &format!("script error detected: {err}"));
        self.run_state.last_error = Some(err);
    }
}
