// src/output/format.rs

use std::borrow::Cow;
use std::sync::LazyLock;

use chrono::Local;
use regex::Regex;

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("static ANSI pattern is valid")
});

/// Severity shown in the lifecycle prefix of log buffer entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// Remove terminal escape sequences so the buffer stays plain text.
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    ANSI_ESCAPE.replace_all(text, "")
}

/// Prefix a lifecycle message the way the automation runtime prefixes its
/// own log lines: `YYYY-MM-DD HH:MM:SS [info       ] message`.
pub fn format_log_line(severity: Severity, message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("{timestamp} [{:<9}  ] {message}", severity.as_str())
}
