// src/record.rs

//! Append-only JSON log of task executions.

use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One executed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub goal: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_seconds: f64,
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl ExecutionRecord {
    pub fn new(
        goal: impl Into<String>,
        start: DateTime<Local>,
        end: DateTime<Local>,
        succeeded: bool,
        error_kind: Option<String>,
    ) -> Self {
        let millis = (end - start).num_milliseconds().max(0);
        // Two decimals are enough for a human-read log.
        let duration_seconds = (millis as f64 / 10.0).round() / 100.0;
        Self {
            goal: goal.into(),
            start_time: start.format(TIME_FORMAT).to_string(),
            end_time: end.format(TIME_FORMAT).to_string(),
            duration_seconds,
            succeeded,
            error_kind,
        }
    }
}

/// Append `record` to the JSON array in `path`.
///
/// A missing, unreadable or non-array file starts a fresh array. Failures
/// are logged and otherwise ignored; the record is diagnostics only.
pub fn append_record(path: &Path, record: &ExecutionRecord) {
    if let Err(e) = try_append(path, record) {
        let error = format!("{e:#}");
        warn!(path = ?path, %error, "failed to write execution record");
    }
}

fn try_append(path: &Path, record: &ExecutionRecord) -> Result<()> {
    let mut entries = read_entries(path);
    entries.push(serde_json::to_value(record).context("serializing execution record")?);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating record directory {:?}", parent))?;
    }
    let text = serde_json::to_string_pretty(&Value::Array(entries))
        .context("serializing execution records")?;
    fs::write(path, text).with_context(|| format!("writing execution records {:?}", path))?;

    debug!(path = ?path, goal = %record.goal, "execution record appended");
    Ok(())
}

fn read_entries(path: &Path) -> Vec<Value> {
    let Ok(text) = fs::read_to_string(path) else {
        return Vec::new();
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Array(entries)) => entries,
        Ok(_) | Err(_) => {
            warn!(path = ?path, "execution record file is not a JSON array; starting over");
            Vec::new()
        }
    }
}

/// All records currently in `path`; entries that do not parse are skipped.
pub fn load_records(path: &Path) -> Vec<ExecutionRecord> {
    read_entries(path)
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect()
}
