// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `scriptvisor`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "scriptvisor",
    version,
    about = "Render generated automation scripts, run them as child processes and supervise their output.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Scriptvisor.toml` in the current working directory. When the
    /// default file does not exist, built-in defaults are used.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SCRIPTVISOR_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Render the planner output for a task and run it to completion.
    Run(RunArgs),

    /// Render the planner output and check it for syntax errors without
    /// running anything.
    Check(PlanArgs),

    /// Delete leftover script artifacts from the temp directory.
    Sweep {
        /// Only delete artifacts older than this many seconds.
        ///
        /// Defaults to `[executor].orphan_max_age_secs`.
        #[arg(long, value_name = "SECS")]
        older_than: Option<u64>,
    },
}

/// Inputs shared by `run` and `check`: where the planner output lives.
#[derive(Debug, Clone, Args)]
pub struct PlanArgs {
    /// Natural-language task description the script was generated for.
    #[arg(long, value_name = "TEXT")]
    pub task: String,

    /// File holding the generated script (raw, or a full planner response
    /// containing a `<labeled_python_script>` block).
    #[arg(long, value_name = "FILE")]
    pub script: PathBuf,

    /// Optional file holding the workflow the script was derived from.
    #[arg(long, value_name = "FILE")]
    pub workflow: Option<PathBuf>,

    /// Optional JSON object file with variables exposed to the script.
    #[arg(long, value_name = "FILE")]
    pub vars: Option<PathBuf>,

    /// Optional JSON object file with device mappings exposed to the script.
    #[arg(long, value_name = "FILE")]
    pub devices: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    /// Working directory for the child process.
    ///
    /// Defaults to `[executor].working_dir`.
    #[arg(long, value_name = "DIR")]
    pub workdir: Option<PathBuf>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
