// src/artifact/mod.rs

//! Files written on behalf of a run.
//!
//! - [`manager`] owns the transient script files that are actually executed:
//!   creation, tracking, cleanup and the startup orphan sweep.
//! - [`debug_copy`] keeps a persistent copy of each rendered script for
//!   later inspection.

pub mod debug_copy;
pub mod manager;

pub use debug_copy::{debug_name_prefix, write_debug_copy};
pub use manager::TempArtifactManager;
