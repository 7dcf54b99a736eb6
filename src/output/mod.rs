// src/output/mod.rs

//! Where drained output goes.
//!
//! - [`buffer`] holds the plain-text log of the current run.
//! - [`sink`] mirrors lines to the operator's console in real time.
//! - [`format`] strips escape sequences and builds the timestamped prefix
//!   used for lifecycle entries.

pub mod buffer;
pub mod format;
pub mod sink;

pub use buffer::LogBuffer;
pub use format::{Severity, format_log_line, strip_ansi};
pub use sink::{ConsoleSink, LiveSink};
