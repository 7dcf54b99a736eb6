// src/engine/mod.rs

//! Orchestration on top of the supervisor.
//!
//! - [`ScriptRunner`] renders a [`RunRequest`], keeps a debug copy and runs
//!   it; it also offers the static syntax check.
//! - [`TaskPipeline`] asks a [`Planner`](crate::plan::Planner) for the
//!   workflow and script, runs the result and appends an execution record.

pub mod pipeline;
pub mod request;
pub mod runner;

pub use pipeline::TaskPipeline;
pub use request::RunRequest;
pub use runner::ScriptRunner;
