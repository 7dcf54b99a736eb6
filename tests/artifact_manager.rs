// tests/artifact_manager.rs

use std::error::Error;
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::time::{Duration, SystemTime};

use tempfile::tempdir;

use scriptvisor::artifact::{TempArtifactManager, debug_name_prefix, write_debug_copy};
use scriptvisor::errors::ScriptvisorError;
use scriptvisor_test_utils::{init_tracing, list_dir};

type TestResult = Result<(), Box<dyn Error>>;

fn manager(dir: &Path) -> TempArtifactManager {
    TempArtifactManager::new(dir, "scriptvisor", "py")
}

/// Create `name` in `dir` with a modification time `age` in the past.
fn touch_aged(dir: &Path, name: &str, age: Duration) -> Result<(), Box<dyn Error>> {
    let file = File::create(dir.join(name))?;
    file.set_modified(SystemTime::now() - age)?;
    Ok(())
}

#[test]
fn tracked_artifact_is_written_and_removed() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let mut artifacts = manager(dir.path());

    let path = artifacts.materialize("print('hi')\n", true)?;

    assert!(path.is_absolute());
    assert_eq!(path.parent(), Some(dir.path()));
    let name = path.file_name().and_then(|n| n.to_str()).ok_or("bad name")?;
    assert!(name.starts_with("scriptvisor_"));
    assert!(name.ends_with(".py"));
    assert!(artifacts.is_artifact_name(name));
    assert_eq!(fs::read_to_string(&path)?, "print('hi')\n");
    assert_eq!(artifacts.current(), Some(path.as_path()));

    artifacts.cleanup_current();
    assert!(!path.exists());
    assert_eq!(artifacts.current(), None);

    // Nothing tracked: a second cleanup is a no-op.
    artifacts.cleanup_current();
    Ok(())
}

#[test]
fn second_tracked_artifact_is_refused() -> TestResult {
    let dir = tempdir()?;
    let mut artifacts = manager(dir.path());

    let first = artifacts.materialize("a = 1\n", true)?;
    let result = artifacts.materialize("b = 2\n", true);

    match result {
        Err(ScriptvisorError::ArtifactInUse(path)) => assert_eq!(path, first),
        other => panic!("expected ArtifactInUse, got {other:?}"),
    }
    assert_eq!(list_dir(dir.path()).len(), 1);
    Ok(())
}

#[test]
fn untracked_artifacts_leave_the_current_one_alone() -> TestResult {
    let dir = tempdir()?;
    let mut artifacts = manager(dir.path());

    let tracked = artifacts.materialize("a = 1\n", true)?;
    let mut untracked = Vec::new();
    for i in 0..5 {
        untracked.push(artifacts.materialize(&format!("n = {i}\n"), false)?);
    }

    assert_eq!(artifacts.current(), Some(tracked.as_path()));
    // Same millisecond or not, every artifact gets its own file.
    assert_eq!(list_dir(dir.path()).len(), 6);
    for (i, path) in untracked.iter().enumerate() {
        assert_eq!(fs::read_to_string(path)?, format!("n = {i}\n"));
    }

    artifacts.cleanup_current();
    assert_eq!(list_dir(dir.path()).len(), 5);
    Ok(())
}

#[test]
fn missing_directory_is_an_artifact_write_error() -> TestResult {
    let dir = tempdir()?;
    let mut artifacts = manager(&dir.path().join("does/not/exist"));

    let result = artifacts.materialize("x = 1\n", true);

    assert!(matches!(result, Err(ScriptvisorError::ArtifactWrite { .. })));
    assert_eq!(artifacts.current(), None);
    Ok(())
}

#[test]
fn cleanup_tolerates_an_already_deleted_file() -> TestResult {
    let dir = tempdir()?;
    let mut artifacts = manager(dir.path());

    let path = artifacts.materialize("x = 1\n", true)?;
    fs::remove_file(&path)?;

    artifacts.cleanup_current();
    assert_eq!(artifacts.current(), None);
    Ok(())
}

#[test]
fn drop_removes_tracked_artifact() -> TestResult {
    let dir = tempdir()?;
    let path = {
        let mut artifacts = manager(dir.path());
        artifacts.materialize("x = 1\n", true)?
    };

    assert!(!path.exists());
    Ok(())
}

#[test]
fn sweep_removes_only_old_matching_files() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let hour = Duration::from_secs(3600);

    touch_aged(dir.path(), "scriptvisor_20240101_000000_000.py", Duration::from_secs(7200))?;
    touch_aged(dir.path(), "scriptvisor_20240101_000000_001.py", Duration::from_secs(10))?;
    touch_aged(dir.path(), "other_20240101_000000_000.py", Duration::from_secs(7200))?;
    touch_aged(dir.path(), "scriptvisor_20240101_000000_000.txt", Duration::from_secs(7200))?;
    touch_aged(dir.path(), "scriptvisor.py", Duration::from_secs(7200))?;

    let removed = manager(dir.path()).sweep_orphans(hour);

    assert_eq!(removed, 1);
    assert_eq!(
        list_dir(dir.path()),
        vec![
            "other_20240101_000000_000.py",
            "scriptvisor.py",
            "scriptvisor_20240101_000000_000.txt",
            "scriptvisor_20240101_000000_001.py",
        ]
    );
    Ok(())
}

#[test]
fn sweep_never_touches_the_current_artifact() -> TestResult {
    let dir = tempdir()?;
    let mut artifacts = manager(dir.path());

    let path = artifacts.materialize("x = 1\n", true)?;
    OpenOptions::new()
        .write(true)
        .open(&path)?
        .set_modified(SystemTime::now() - Duration::from_secs(7200))?;

    assert_eq!(artifacts.sweep_orphans(Duration::from_secs(1)), 0);
    assert!(path.exists());
    Ok(())
}

#[test]
fn sweep_of_missing_directory_removes_nothing() {
    let artifacts = TempArtifactManager::new("/nonexistent/scriptvisor", "scriptvisor", "py");
    assert_eq!(artifacts.sweep_orphans(Duration::from_secs(1)), 0);
}

#[test]
fn debug_name_prefix_is_sanitized_and_truncated() {
    assert_eq!(
        debug_name_prefix("open the settings app and turn on wifi please", 30),
        "open_the_settings_app_and_turn"
    );
    assert_eq!(debug_name_prefix("a/b\\c:d", 30), "a_b_c_d");
    assert_eq!(debug_name_prefix("", 30), "task");
    assert_eq!(debug_name_prefix("短い名前", 2), "短い");
}

#[test]
fn debug_copy_creates_directory_and_file() -> TestResult {
    init_tracing();
    let root = tempdir()?;
    let dir = root.path().join("generated_scripts");

    let path = write_debug_copy(&dir, "send a message", "print(1)\n", "py", 30)
        .ok_or("debug copy was not written")?;

    assert_eq!(path.parent(), Some(dir.as_path()));
    let name = path.file_name().and_then(|n| n.to_str()).ok_or("bad name")?;
    assert!(name.starts_with("send_a_message_"));
    assert!(name.ends_with(".py"));
    assert_eq!(fs::read_to_string(&path)?, "print(1)\n");
    Ok(())
}

#[test]
fn debug_copy_failure_is_not_fatal() -> TestResult {
    let root = tempdir()?;
    let blocker = root.path().join("not_a_dir");
    fs::write(&blocker, "")?;

    assert_eq!(write_debug_copy(&blocker, "task", "x", "py", 30), None);
    Ok(())
}
