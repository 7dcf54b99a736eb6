// src/logging.rs

//! Diagnostics of the supervisor itself.
//!
//! The child's stdout is mirrored onto ours, so diagnostics always go to
//! stderr. `--log-level` sets one level for everything; otherwise
//! `SCRIPTVISOR_LOG` is read as `EnvFilter` directives, so a single layer
//! can be turned up (`scriptvisor::exec=debug,info` shows classifier and
//! reader events without the rest). Nothing set means `info`.

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

/// Environment variable consulted when no `--log-level` is given.
pub const LOG_ENV_VAR: &str = "SCRIPTVISOR_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV_VAR).ok();
    let filter = build_filter(cli_level, env.as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}

/// Filter for a CLI level and a raw `SCRIPTVISOR_LOG` value. An invalid
/// environment value is an error.
pub fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    if let Some(level) = cli_level {
        return Ok(EnvFilter::new(directive(level)));
    }

    match env.map(str::trim) {
        Some(directives) if !directives.is_empty() => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid {LOG_ENV_VAR} value {directives:?}")),
        _ => Ok(EnvFilter::new(DEFAULT_DIRECTIVE)),
    }
}

fn directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
