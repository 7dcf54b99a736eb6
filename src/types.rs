// src/types.rs

//! Data types shared by the supervisor, the classifier and the callers.

use std::fmt;

use chrono::Utc;

/// Final source text of one run, after the planner output was embedded in
/// the wrapper program. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedScript {
    id: String,
    task: String,
    source: String,
}

impl RenderedScript {
    /// Build a rendered script; the id is `<task>_<unix millis>`.
    pub fn new(task: impl Into<String>, source: impl Into<String>) -> Self {
        let task = task.into();
        let id = format!("{}_{}", task, Utc::now().timestamp_millis());
        Self {
            id,
            task,
            source: source.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Unrecovered runtime error recognised in the script output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionError {
    /// Error class, e.g. `ValueError`.
    pub kind: String,
    pub message: String,
    /// Output chunk the error was recognised in.
    pub raw_log: String,
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Per-run state, reset at the start of every run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    pub ended: bool,
    pub succeeded: bool,
    pub last_error: Option<ExecutionError>,
}

impl RunState {
    /// State after `stop()`: ended, not successful, error kept.
    pub(crate) fn stopped(&mut self) {
        self.ended = true;
        self.succeeded = false;
    }
}

/// Lifecycle of a supervisor instance.
///
/// `Idle -> Running -> {Completed | Failed | Stopped} -> Idle`. `stop()`
/// always converges to `Idle`; `Completed` and `Failed` are kept until the
/// next `start()` or `stop()` so callers can inspect them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Running,
    Completed,
    Failed,
    Stopped,
}

/// Terminal status of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub success: bool,
}

impl From<std::process::ExitStatus> for ExitInfo {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
            success: status.success(),
        }
    }
}

/// Answer of `Supervisor::poll`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// No child process is attached to the supervisor.
    Idle,
    Running,
    Exited(ExitInfo),
}

/// Result of a run as handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub succeeded: bool,
    pub error: Option<ExecutionError>,
    /// Exit code of the child, when it exited normally.
    pub exit_code: Option<i32>,
}

impl RunOutcome {
    /// The `(succeeded, error)` pair callers of the planner loop expect.
    pub fn into_tuple(self) -> (bool, Option<ExecutionError>) {
        (self.succeeded, self.error)
    }
}
