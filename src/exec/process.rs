// src/exec/process.rs

//! Launching and stopping the interpreter process.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::ExecutorConfig;

/// Build the interpreter command for a materialized script.
///
/// - stdout/stderr are piped for the drain engine, stdin is closed.
/// - Output is forced unbuffered and UTF-8 encoded through the environment.
/// - The child stays in our process group: no `process_group(0)`, no new
///   session. A Ctrl-C in the operator's terminal therefore reaches the
///   script as well, instead of leaving it running in the background.
/// - `kill_on_drop` covers paths where the handle is dropped without `stop`.
pub fn build_command(cfg: &ExecutorConfig, script_path: &Path, working_dir: &Path) -> Command {
    let mut cmd = Command::new(&cfg.interpreter);
    cmd.args(&cfg.interpreter_args)
        .arg(script_path)
        .current_dir(working_dir)
        .env("PYTHONUNBUFFERED", "1")
        .env("PYTHONIOENCODING", "utf-8")
        .envs(&cfg.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Ask the child to exit, wait up to `grace`, then kill it.
///
/// Returns an error only when the process could be neither waited on nor
/// killed; callers log it and carry on.
pub async fn terminate(child: &mut Child, grace: Duration) -> std::io::Result<()> {
    if let Ok(Some(status)) = child.try_wait() {
        debug!(?status, "child already exited before termination");
        return Ok(());
    }

    if request_graceful_exit(child) {
        match timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(?status, "child exited after termination request");
                return Ok(());
            }
            Ok(Err(e)) => {
                warn!(error = %e, "waiting for terminated child failed; killing");
            }
            Err(_) => {
                debug!(grace_ms = grace.as_millis() as u64, "child ignored termination request; killing");
            }
        }
    }

    child.kill().await
}

/// Send SIGTERM to the child only. The child shares our process group, so
/// signalling the group would hit the supervisor as well.
#[cfg(unix)]
fn request_graceful_exit(child: &Child) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };

    // SAFETY: `kill` has no memory-safety preconditions; `pid` belongs to a
    // child we have not reaped yet, so it cannot have been recycled.
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc != 0 {
        warn!(
            pid,
            error = %std::io::Error::last_os_error(),
            "failed to send SIGTERM to child"
        );
        return false;
    }
    true
}

/// No portable graceful signal outside unix; go straight to kill.
#[cfg(not(unix))]
fn request_graceful_exit(_child: &Child) -> bool {
    false
}
