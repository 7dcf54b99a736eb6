// src/output/sink.rs

use std::io::Write;

/// Live destination for child output, for an operator watching the run.
///
/// Lines arrive exactly as the child wrote them (escape sequences kept),
/// without the trailing newline.
pub trait LiveSink: Send + Sync {
    fn stdout_line(&self, line: &str);
    fn stderr_line(&self, line: &str);
}

/// Mirrors child stdout to our stdout and child stderr to our stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl LiveSink for ConsoleSink {
    fn stdout_line(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }

    fn stderr_line(&self, line: &str) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{line}");
    }
}
