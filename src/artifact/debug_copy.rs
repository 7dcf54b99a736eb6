// src/artifact/debug_copy.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{debug, warn};

/// Keep a copy of a rendered script for post-hoc inspection.
///
/// The file is `<dir>/<task prefix>_<YYYYMMDD_HHMMSS_ffffff>.<ext>`, where the
/// task prefix is the task name cut to `max_name_len` characters with
/// anything but letters, digits, `-` and `_` replaced by `_`.
///
/// Best effort: failures are logged and yield `None`, the run goes on.
pub fn write_debug_copy(
    dir: &Path,
    task: &str,
    source: &str,
    extension: &str,
    max_name_len: usize,
) -> Option<PathBuf> {
    match try_write_debug_copy(dir, task, source, extension, max_name_len) {
        Ok(path) => {
            debug!(path = ?path, "wrote debug copy of rendered script");
            Some(path)
        }
        Err(e) => {
            let error = format!("{e:#}");
            warn!(dir = ?dir, %error, "failed to write debug copy of rendered script");
            None
        }
    }
}

fn try_write_debug_copy(
    dir: &Path,
    task: &str,
    source: &str,
    extension: &str,
    max_name_len: usize,
) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating dir {:?}", dir))?;

    let stamp = Local::now().format("%Y%m%d_%H%M%S_%6f");
    let path = dir.join(format!(
        "{}_{stamp}.{extension}",
        debug_name_prefix(task, max_name_len)
    ));
    fs::write(&path, source).with_context(|| format!("writing file {:?}", path))?;
    Ok(path)
}

/// File-name-safe, length-bounded prefix derived from a task name.
pub fn debug_name_prefix(task: &str, max_len: usize) -> String {
    let prefix: String = task
        .chars()
        .take(max_len)
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if prefix.is_empty() {
        "task".to_string()
    } else {
        prefix
    }
}
