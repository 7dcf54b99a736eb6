use std::sync::{Arc, Mutex};

use scriptvisor::exec::StreamKind;
use scriptvisor::output::LiveSink;

/// Live sink that keeps every line in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<(StreamKind, String)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stdout(&self) -> Vec<String> {
        self.of(StreamKind::Stdout)
    }

    pub fn stderr(&self) -> Vec<String> {
        self.of(StreamKind::Stderr)
    }

    fn of(&self, kind: StreamKind) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, line)| line.clone())
            .collect()
    }
}

impl LiveSink for MemorySink {
    fn stdout_line(&self, line: &str) {
        self.lines
            .lock()
            .unwrap()
            .push((StreamKind::Stdout, line.to_string()));
    }

    fn stderr_line(&self, line: &str) {
        self.lines
            .lock()
            .unwrap()
            .push((StreamKind::Stderr, line.to_string()));
    }
}
