// src/exec/mod.rs

//! Process execution layer.
//!
//! This module runs rendered scripts with `tokio::process::Command` and
//! watches them until they exit.
//!
//! - [`process`] builds the interpreter command and implements graceful
//!   termination with a forced kill as fallback.
//! - [`drain`] owns the per-stream reader tasks and the queues the
//!   supervisor drains every tick.
//! - [`supervisor`] ties artifacts, process, drain, log buffer and
//!   classifier together into the `start` / `supervise` / `stop` lifecycle.

pub mod drain;
pub mod process;
pub mod supervisor;

pub use drain::{DrainedOutput, StreamDrain, StreamKind};
pub use supervisor::Supervisor;
