// src/output/buffer.rs

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use super::format::{Severity, format_log_line, strip_ansi};

/// Plain-text output of the current run.
///
/// Cloning gives another handle to the same buffer, so a caller can keep a
/// handle and `drain()` it while the supervisor is appending. It holds only
/// what arrived since the last drain, not a full history.
#[derive(Clone, Default)]
pub struct LogBuffer {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    text: String,
    forwarder: Option<mpsc::UnboundedSender<String>>,
}

impl fmt::Debug for LogBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("LogBuffer")
            .field("len", &inner.text.len())
            .field("forwarding", &inner.forwarder.is_some())
            .finish()
    }
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also send every appended entry to `tx`. Entries are dropped silently
    /// once the receiving side is gone.
    pub fn set_forwarder(&self, tx: mpsc::UnboundedSender<String>) {
        self.lock().forwarder = Some(tx);
    }

    /// Append one line of child output, with escape sequences removed.
    pub fn append_line(&self, line: &str) {
        let clean = strip_ansi(line);
        let mut inner = self.lock();
        inner.text.push_str(&clean);
        inner.text.push('\n');
        if let Some(tx) = &inner.forwarder {
            let _ = tx.send(clean.into_owned());
        }
    }

    /// Append a timestamped lifecycle entry.
    pub fn event(&self, severity: Severity, message: &str) {
        self.append_line(&format_log_line(severity, message));
    }

    /// Return the buffered text and empty the buffer.
    pub fn drain(&self) -> String {
        std::mem::take(&mut self.lock().text)
    }

    /// Copy of the buffered text, leaving it in place.
    pub fn snapshot(&self) -> String {
        self.lock().text.clone()
    }

    pub fn clear(&self) {
        self.lock().text.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lock().text.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the string half-written
        // in a way that matters for a log, so keep using it.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
