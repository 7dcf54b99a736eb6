// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Only conditions that prevent a run from being attempted at all end up
//! here. Script failures observed while a run is in progress are carried in
//! [`crate::types::RunOutcome`] instead.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptvisorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid pattern: {0}")]
    RegexError(#[from] regex::Error),

    #[error("failed to write script artifact {path:?}: {source}")]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a tracked script artifact is still present: {0:?}")]
    ArtifactInUse(PathBuf),

    #[error("failed to spawn '{program}': {source}")]
    SpawnFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ScriptvisorError>;
