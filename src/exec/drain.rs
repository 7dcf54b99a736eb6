// src/exec/drain.rs

//! Stream drain engine.
//!
//! Each output stream of the child gets one reader task that pushes decoded
//! lines into its own unbounded queue. The supervisor's loop calls
//! [`StreamDrain::drain_once`] every tick to collect whatever arrived, so the
//! child never blocks on a full pipe and a quiet stream never holds up the
//! other one.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Longest line forwarded in one piece; longer output is split.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// How long a partial line may wait for the rest of it.
pub const PARTIAL_LINE_FLUSH: Duration = Duration::from_millis(250);

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

/// Lines collected in one drain pass, in arrival order per stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainedOutput {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl DrainedOutput {
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.stdout.len() + self.stderr.len()
    }

    fn extend(&mut self, other: DrainedOutput) {
        self.stdout.extend(other.stdout);
        self.stderr.extend(other.stderr);
    }
}

/// Reader tasks plus the queues they feed.
#[derive(Debug)]
pub struct StreamDrain {
    stdout_rx: mpsc::UnboundedReceiver<String>,
    stderr_rx: mpsc::UnboundedReceiver<String>,
    readers: Vec<JoinHandle<()>>,
}

impl StreamDrain {
    /// Start one reader per available pipe. A missing pipe simply never
    /// yields lines.
    pub fn attach(stdout: Option<ChildStdout>, stderr: Option<ChildStderr>) -> Self {
        let (stdout_tx, stdout_rx) = mpsc::unbounded_channel();
        let (stderr_tx, stderr_rx) = mpsc::unbounded_channel();

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = stdout {
            readers.push(spawn_reader(stdout, StreamKind::Stdout, stdout_tx));
        }
        if let Some(stderr) = stderr {
            readers.push(spawn_reader(stderr, StreamKind::Stderr, stderr_tx));
        }

        Self {
            stdout_rx,
            stderr_rx,
            readers,
        }
    }

    /// Take everything currently queued, without waiting.
    pub fn drain_once(&mut self) -> DrainedOutput {
        DrainedOutput {
            stdout: drain_queue(&mut self.stdout_rx),
            stderr: drain_queue(&mut self.stderr_rx),
        }
    }

    /// Final pass after the child exited.
    ///
    /// Waits up to `grace` for both readers to reach end-of-stream, so lines
    /// written just before exit are not lost. A grandchild still holding a
    /// pipe open would keep a reader alive forever; such readers are
    /// aborted once the grace period is over.
    pub async fn finish(mut self, grace: Duration) -> DrainedOutput {
        let mut collected = DrainedOutput::default();
        let readers = std::mem::take(&mut self.readers);

        for mut reader in readers {
            // Keep the queues moving while waiting.
            collected.extend(self.drain_once());
            if timeout(grace, &mut reader).await.is_err() {
                warn!(
                    grace_ms = grace.as_millis() as u64,
                    "output pipe still open after child exit; abandoning reader"
                );
                reader.abort();
            }
        }

        collected.extend(self.drain_once());
        collected
    }

    /// Stop the readers without collecting anything further.
    pub fn abort(self) {
        drop(self);
    }
}

impl Drop for StreamDrain {
    fn drop(&mut self) {
        for reader in &self.readers {
            reader.abort();
        }
    }
}

fn drain_queue(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Ok(line) = rx.try_recv() {
        lines.push(line);
    }
    lines
}

fn spawn_reader<R>(
    stream: R,
    kind: StreamKind,
    tx: mpsc::UnboundedSender<String>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        read_lines(BufReader::new(stream), kind, &tx).await;
        debug!(stream = kind.as_str(), "output reader reached end of stream");
    })
}

/// Split `reader` into lines and send each one.
///
/// A line is also cut at [`MAX_LINE_BYTES`], and a partial line is sent on
/// its own once the stream has been quiet for [`PARTIAL_LINE_FLUSH`], so
/// prompts without a trailing newline still show up.
async fn read_lines<R>(
    mut reader: BufReader<R>,
    kind: StreamKind,
    tx: &mpsc::UnboundedSender<String>,
) where
    R: AsyncRead + Unpin,
{
    let mut pending: Vec<u8> = Vec::with_capacity(256);

    loop {
        let read = if pending.is_empty() {
            reader.fill_buf().await
        } else {
            match timeout(PARTIAL_LINE_FLUSH, reader.fill_buf()).await {
                Ok(read) => read,
                Err(_) => {
                    if !send_pending(tx, &mut pending) {
                        return;
                    }
                    continue;
                }
            }
        };

        let (used, line_done) = match read {
            Ok([]) => break,
            Ok(available) => {
                let room = MAX_LINE_BYTES - pending.len();
                let window = &available[..available.len().min(room)];
                match window.iter().position(|&b| b == b'\n') {
                    Some(newline) => {
                        pending.extend_from_slice(&window[..=newline]);
                        (newline + 1, true)
                    }
                    None => {
                        pending.extend_from_slice(window);
                        (window.len(), pending.len() >= MAX_LINE_BYTES)
                    }
                }
            }
            Err(e) => {
                debug!(stream = kind.as_str(), error = %e, "read error on child output");
                break;
            }
        };
        reader.consume(used);

        if line_done && !send_pending(tx, &mut pending) {
            return;
        }
    }

    if !pending.is_empty() {
        send_pending(tx, &mut pending);
    }
}

/// Decode and send the buffered bytes. False once the receiver is gone.
fn send_pending(tx: &mpsc::UnboundedSender<String>, pending: &mut Vec<u8>) -> bool {
    let line = decode_line(pending);
    pending.clear();
    tx.send(line).is_ok()
}

/// Decode one raw line, replacing invalid UTF-8 and dropping the terminator.
fn decode_line(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    text.trim_end_matches(['\n', '\r']).to_string()
}
