// tests/supervisor_lifecycle.rs
#![cfg(unix)]

use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::tempdir;
use tokio::sync::mpsc;

use scriptvisor::errors::ScriptvisorError;
use scriptvisor::exec::Supervisor;
use scriptvisor::exec::drain::MAX_LINE_BYTES;
use scriptvisor::types::{ProcessStatus, SupervisorState};
use scriptvisor_test_utils::builders::{ConfigFileBuilder, sh_script};
use scriptvisor_test_utils::sink::MemorySink;
use scriptvisor_test_utils::{init_tracing, list_dir, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn supervisor(artifacts: &Path, sink: &MemorySink) -> Result<Supervisor, Box<dyn Error>> {
    let cfg = ConfigFileBuilder::new().with_temp_dir(artifacts).build();
    Ok(Supervisor::from_config(&cfg, Arc::new(sink.clone()))?)
}

#[tokio::test]
async fn stop_when_idle_changes_nothing_on_disk() -> TestResult {
    init_tracing();
    let artifacts = tempdir()?;
    let sink = MemorySink::new();
    let mut sup = supervisor(artifacts.path(), &sink)?;

    sup.stop().await;
    sup.stop().await;

    assert_eq!(sup.state(), SupervisorState::Idle);
    assert!(sup.run_state().ended);
    assert!(!sup.run_state().succeeded);
    assert!(!sup.is_running());
    assert_eq!(sup.poll(), ProcessStatus::Idle);
    assert!(sup.drain_log().is_empty());
    assert!(list_dir(artifacts.path()).is_empty());
    Ok(())
}

#[tokio::test]
async fn completion_sentinel_marks_run_successful() -> TestResult {
    init_tracing();
    let artifacts = tempdir()?;
    let workdir = tempdir()?;
    let sink = MemorySink::new();
    let mut sup = supervisor(artifacts.path(), &sink)?;

    let script = sh_script("open settings", "echo 'step one'\necho 'finish task'\n");
    let outcome = with_timeout(sup.run(&script, workdir.path())).await?;

    assert!(outcome.succeeded);
    assert_eq!(outcome.error, None);
    assert_eq!(outcome.exit_code, Some(0));
    assert_eq!(sup.state(), SupervisorState::Completed);
    assert!(sup.run_state().ended);

    assert_eq!(sink.stdout(), vec!["step one", "finish task"]);
    let log = sup.drain_log();
    assert!(log.contains("step one\n"));
    assert!(log.contains("finish task\n"));
    assert!(log.contains(&"=".repeat(42)));
    assert!(log.contains("task: open settings"));

    assert!(sup.current_artifact().is_none());
    assert!(list_dir(artifacts.path()).is_empty());
    Ok(())
}

#[tokio::test]
async fn error_signature_on_stderr_is_reported() -> TestResult {
    init_tracing();
    let artifacts = tempdir()?;
    let sink = MemorySink::new();
    let mut sup = supervisor(artifacts.path(), &sink)?;

    let script = sh_script(
        "boom",
        "echo 'Traceback (most recent call last):' >&2\necho 'ValueError: bad thing' >&2\nexit 1\n",
    );
    let outcome = with_timeout(sup.run(&script, artifacts.path())).await?;

    assert!(!outcome.succeeded);
    assert_eq!(outcome.exit_code, Some(1));
    let err = outcome.error.ok_or("expected an execution error")?;
    assert_eq!(err.kind, "ValueError");
    assert_eq!(err.message, "bad thing");
    assert!(err.raw_log.contains("ValueError: bad thing"));

    assert_eq!(sup.state(), SupervisorState::Failed);
    assert_eq!(
        sink.stderr(),
        vec!["Traceback (most recent call last):", "ValueError: bad thing"]
    );
    assert!(list_dir(artifacts.path()).is_empty());
    Ok(())
}

#[tokio::test]
async fn transient_network_error_is_not_an_error() -> TestResult {
    init_tracing();
    let artifacts = tempdir()?;
    let sink = MemorySink::new();
    let mut sup = supervisor(artifacts.path(), &sink)?;

    let script = sh_script(
        "retry",
        "echo \"ConnectionError: HTTPSConnectionPool(host='api', port=443): Max retries exceeded\"\nexit 0\n",
    );
    let outcome = with_timeout(sup.run(&script, artifacts.path())).await?;

    assert!(!outcome.succeeded);
    assert_eq!(outcome.error, None);
    assert_eq!(outcome.exit_code, Some(0));
    Ok(())
}

#[tokio::test]
async fn transient_signature_in_a_later_tick_cancels_earlier_error() -> TestResult {
    init_tracing();
    let artifacts = tempdir()?;
    let sink = MemorySink::new();
    let mut sup = supervisor(artifacts.path(), &sink)?;

    // The pause puts the two lines into different drain ticks.
    let script = sh_script(
        "split retry",
        "echo 'NewConnectionError: Failed to establish a new connection' >&2\nsleep 0.2\necho \"MaxRetryError: HTTPSConnectionPool(host='api', port=443)\" >&2\nexit 0\n",
    );
    let outcome = with_timeout(sup.run(&script, artifacts.path())).await?;

    assert_eq!(outcome.error, None);
    assert_eq!(sup.run_state().last_error, None);
    assert!(!sup.drain_log().contains("script error detected"));
    Ok(())
}

#[tokio::test]
async fn error_after_transient_signature_is_ignored() -> TestResult {
    init_tracing();
    let artifacts = tempdir()?;
    let sink = MemorySink::new();
    let mut sup = supervisor(artifacts.path(), &sink)?;

    let script = sh_script(
        "retry then fail",
        "echo 'ConnectTimeoutError: timed out'\nsleep 0.2\necho 'ValueError: after retry'\nexit 0\n",
    );
    let outcome = with_timeout(sup.run(&script, artifacts.path())).await?;

    assert_eq!(outcome.error, None);
    Ok(())
}

#[tokio::test]
async fn stopping_a_run_keeps_the_error_it_printed() -> TestResult {
    init_tracing();
    let artifacts = tempdir()?;
    let sink = MemorySink::new();
    let mut sup = supervisor(artifacts.path(), &sink)?;

    sup.start(
        &sh_script("fails then hangs", "echo 'RuntimeError: stuck'\nexec sleep 5\n"),
        artifacts.path(),
    )
    .await?;

    let deadline = Instant::now() + Duration::from_secs(3);
    while sink.stdout().is_empty() && Instant::now() < deadline {
        sup.pump();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(sink.stdout(), vec!["RuntimeError: stuck"]);
    assert_eq!(sup.run_state().last_error, None);

    sup.stop().await;

    let err = sup
        .run_state()
        .last_error
        .clone()
        .ok_or("expected the held error")?;
    assert_eq!(err.kind, "RuntimeError");
    assert_eq!(sup.state(), SupervisorState::Idle);
    Ok(())
}

#[tokio::test]
async fn nonzero_exit_without_signature_is_still_a_failure() -> TestResult {
    init_tracing();
    let artifacts = tempdir()?;
    let sink = MemorySink::new();
    let mut sup = supervisor(artifacts.path(), &sink)?;

    let outcome = with_timeout(sup.run(&sh_script("quiet", "exit 3\n"), artifacts.path())).await?;

    assert!(!outcome.succeeded);
    assert_eq!(outcome.exit_code, Some(3));
    let err = outcome.error.ok_or("expected a synthesized error")?;
    assert_eq!(err.kind, "NonZeroExit");
    assert!(err.message.contains('3'));
    Ok(())
}

#[tokio::test]
async fn first_error_wins() -> TestResult {
    init_tracing();
    let artifacts = tempdir()?;
    let sink = MemorySink::new();
    let mut sup = supervisor(artifacts.path(), &sink)?;

    let script = sh_script(
        "two errors",
        "echo 'KeyError: first'\nsleep 0.2\necho 'TypeError: second'\n",
    );
    let outcome = with_timeout(sup.run(&script, artifacts.path())).await?;

    let err = outcome.error.ok_or("expected an execution error")?;
    assert_eq!(err.kind, "KeyError");
    assert_eq!(err.message, "first");
    Ok(())
}

#[tokio::test]
async fn start_then_stop_kills_child_and_removes_artifact() -> TestResult {
    init_tracing();
    let artifacts = tempdir()?;
    let sink = MemorySink::new();
    let mut sup = supervisor(artifacts.path(), &sink)?;

    let script = sh_script("long", "echo started\nexec sleep 5\n");
    sup.start(&script, artifacts.path()).await?;

    assert!(sup.is_running());
    assert!(sup.pid().is_some());
    assert_eq!(sup.state(), SupervisorState::Running);
    assert_eq!(sup.poll(), ProcessStatus::Running);
    let artifact = sup
        .current_artifact()
        .ok_or("expected a tracked artifact")?
        .to_path_buf();
    assert!(artifact.is_absolute());
    assert!(artifact.exists());

    let started = Instant::now();
    with_timeout(sup.stop()).await;
    assert!(started.elapsed() < Duration::from_secs(4));

    assert_eq!(sup.state(), SupervisorState::Idle);
    assert!(sup.run_state().ended);
    assert!(!sup.run_state().succeeded);
    assert!(!sup.is_running());
    assert_eq!(sup.poll(), ProcessStatus::Idle);
    assert!(!artifact.exists());
    assert!(list_dir(artifacts.path()).is_empty());
    Ok(())
}

#[tokio::test]
async fn child_ignoring_sigterm_is_killed_after_timeout() -> TestResult {
    init_tracing();
    let artifacts = tempdir()?;
    let sink = MemorySink::new();
    let cfg = ConfigFileBuilder::new()
        .with_temp_dir(artifacts.path())
        .with_stop_timeout_ms(200)
        .build();
    let mut sup = Supervisor::from_config(&cfg, Arc::new(sink.clone()))?;

    let script = sh_script(
        "stubborn",
        "trap '' TERM\necho ready\nwhile true; do sleep 0.1; done\n",
    );
    sup.start(&script, artifacts.path()).await?;
    // Let the shell install its trap before we signal it.
    tokio::time::sleep(Duration::from_millis(300)).await;

    with_timeout(sup.stop()).await;

    assert_eq!(sup.state(), SupervisorState::Idle);
    assert!(list_dir(artifacts.path()).is_empty());
    Ok(())
}

#[tokio::test]
async fn start_while_running_replaces_previous_run() -> TestResult {
    init_tracing();
    let artifacts = tempdir()?;
    let sink = MemorySink::new();
    let mut sup = supervisor(artifacts.path(), &sink)?;

    sup.start(&sh_script("first", "exec sleep 5\n"), artifacts.path())
        .await?;
    let first = sup
        .current_artifact()
        .ok_or("expected a tracked artifact")?
        .to_path_buf();

    let second = sh_script("second", "echo 'finish task'\n");
    sup.start(&second, artifacts.path()).await?;
    assert!(!first.exists());
    assert_eq!(list_dir(artifacts.path()).len(), 1);

    let outcome = with_timeout(sup.supervise()).await;
    assert!(outcome.succeeded);
    assert!(list_dir(artifacts.path()).is_empty());
    Ok(())
}

#[tokio::test]
async fn spawn_failure_cleans_up_artifact() -> TestResult {
    init_tracing();
    let artifacts = tempdir()?;
    let cfg = ConfigFileBuilder::new()
        .with_temp_dir(artifacts.path())
        .with_interpreter("/nonexistent/scriptvisor-interpreter", &[])
        .build();
    let mut sup = Supervisor::from_config(&cfg, Arc::new(MemorySink::new()))?;

    let result = sup
        .start(&sh_script("nope", "echo hi\n"), artifacts.path())
        .await;

    assert!(matches!(result, Err(ScriptvisorError::SpawnFailure { .. })));
    assert_eq!(sup.state(), SupervisorState::Idle);
    assert!(sup.run_state().ended);
    assert!(!sup.run_state().succeeded);
    assert!(list_dir(artifacts.path()).is_empty());
    assert!(sup.drain_log().contains("failed to start script process"));
    Ok(())
}

#[tokio::test]
async fn child_runs_in_requested_working_dir() -> TestResult {
    init_tracing();
    let artifacts = tempdir()?;
    let workdir = tempdir()?;
    let sink = MemorySink::new();
    let mut sup = supervisor(artifacts.path(), &sink)?;

    let outcome = with_timeout(sup.run(&sh_script("where", "pwd -P\n"), workdir.path())).await?;

    assert_eq!(outcome.exit_code, Some(0));
    let expected = std::fs::canonicalize(workdir.path())?;
    assert_eq!(sink.stdout(), vec![expected.display().to_string()]);
    Ok(())
}

#[tokio::test]
async fn configured_env_reaches_the_child() -> TestResult {
    init_tracing();
    let artifacts = tempdir()?;
    let sink = MemorySink::new();
    let cfg = ConfigFileBuilder::new()
        .with_temp_dir(artifacts.path())
        .with_env("SCRIPTVISOR_TEST_VALUE", "forty-two")
        .build();
    let mut sup = Supervisor::from_config(&cfg, Arc::new(sink.clone()))?;

    let script = sh_script(
        "env",
        "echo \"$SCRIPTVISOR_TEST_VALUE $PYTHONUNBUFFERED $PYTHONIOENCODING\"\n",
    );
    with_timeout(sup.run(&script, artifacts.path())).await?;

    assert_eq!(sink.stdout(), vec!["forty-two 1 utf-8"]);
    Ok(())
}

#[tokio::test]
async fn both_streams_are_drained_without_blocking_the_child() -> TestResult {
    init_tracing();
    let artifacts = tempdir()?;
    let sink = MemorySink::new();
    let mut sup = supervisor(artifacts.path(), &sink)?;

    // Far more than a pipe buffer on either stream.
    let script = sh_script(
        "chatty",
        "i=0\nwhile [ $i -lt 3000 ]; do\n  echo \"out line $i padding padding padding\"\n  echo \"err line $i padding padding padding\" >&2\n  i=$((i+1))\ndone\necho 'finish task'\n",
    );
    let outcome = with_timeout(sup.run(&script, artifacts.path())).await?;

    assert!(outcome.succeeded);
    let stdout = sink.stdout();
    let stderr = sink.stderr();
    assert_eq!(stdout.len(), 3001);
    assert_eq!(stderr.len(), 3000);
    assert_eq!(stdout[0], "out line 0 padding padding padding");
    assert_eq!(stderr[2999], "err line 2999 padding padding padding");
    Ok(())
}

#[tokio::test]
async fn ansi_sequences_reach_the_sink_but_not_the_log() -> TestResult {
    init_tracing();
    let artifacts = tempdir()?;
    let sink = MemorySink::new();
    let mut sup = supervisor(artifacts.path(), &sink)?;

    let script = sh_script("colour", "printf '\\033[31mred\\033[0m\\n'\n");
    with_timeout(sup.run(&script, artifacts.path())).await?;

    assert_eq!(sink.stdout(), vec!["\x1b[31mred\x1b[0m"]);
    let log = sup.drain_log();
    assert!(log.contains("red\n"));
    assert!(!log.contains('\x1b'));
    Ok(())
}

#[tokio::test]
async fn log_forwarder_receives_lines_and_drain_empties_buffer() -> TestResult {
    init_tracing();
    let artifacts = tempdir()?;
    let sink = MemorySink::new();
    let mut sup = supervisor(artifacts.path(), &sink)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    sup.log_buffer().set_forwarder(tx);

    with_timeout(sup.run(&sh_script("fwd", "echo forwarded\n"), artifacts.path())).await?;

    let mut forwarded = Vec::new();
    while let Ok(entry) = rx.try_recv() {
        forwarded.push(entry);
    }
    assert!(forwarded.iter().any(|e| e == "forwarded"));
    assert!(forwarded.iter().any(|e| e.contains("starting new task execution")));

    assert!(!sup.drain_log().is_empty());
    assert!(sup.drain_log().is_empty());
    Ok(())
}

#[tokio::test]
async fn dropping_the_supervisor_removes_the_artifact() -> TestResult {
    init_tracing();
    let artifacts = tempdir()?;
    let sink = MemorySink::new();
    let mut sup = supervisor(artifacts.path(), &sink)?;

    sup.start(&sh_script("dropped", "exec sleep 5\n"), artifacts.path())
        .await?;
    assert_eq!(list_dir(artifacts.path()).len(), 1);

    drop(sup);

    assert!(list_dir(artifacts.path()).is_empty());
    Ok(())
}

#[tokio::test]
async fn prompt_without_newline_reaches_the_sink_while_running() -> TestResult {
    init_tracing();
    let artifacts = tempdir()?;
    let sink = MemorySink::new();
    let mut sup = supervisor(artifacts.path(), &sink)?;

    sup.start(
        &sh_script("prompt", "printf 'Continue? [y/N] '\nexec sleep 5\n"),
        artifacts.path(),
    )
    .await?;

    let deadline = Instant::now() + Duration::from_secs(3);
    while sink.stdout().is_empty() && Instant::now() < deadline {
        sup.pump();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(sink.stdout(), vec!["Continue? [y/N] "]);
    assert!(sup.is_running());
    sup.stop().await;
    Ok(())
}

#[tokio::test]
async fn overlong_line_is_split_into_bounded_pieces() -> TestResult {
    init_tracing();
    let artifacts = tempdir()?;
    let sink = MemorySink::new();
    let mut sup = supervisor(artifacts.path(), &sink)?;

    let total = MAX_LINE_BYTES * 2 + 100;
    let script = sh_script(
        "long line",
        &format!("head -c {total} /dev/zero | tr '\\0' 'a'\necho\necho 'finish task'\n"),
    );
    let outcome = with_timeout(sup.run(&script, artifacts.path())).await?;

    assert!(outcome.succeeded);
    let stdout = sink.stdout();
    let (pieces, rest) = stdout.split_at(stdout.len() - 1);
    assert_eq!(rest, ["finish task"]);
    assert_eq!(pieces.len(), 3);
    assert!(pieces.iter().all(|p| p.len() <= MAX_LINE_BYTES));
    assert!(pieces.iter().all(|p| p.bytes().all(|b| b == b'a')));
    assert_eq!(pieces.iter().map(String::len).sum::<usize>(), total);
    Ok(())
}
