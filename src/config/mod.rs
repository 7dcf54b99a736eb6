// src/config/mod.rs

//! Configuration loading and validation for scriptvisor.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate settings before anything is spawned (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, resolve};
pub use model::{
    ClassifierConfig, ConfigFile, ExecutorConfig, OutputConfig, RawConfigFile, TemplateConfig,
};
