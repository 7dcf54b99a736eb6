// src/render/mod.rs

//! Embedding generated code into the wrapper program.

pub mod template;

pub use template::{DEFAULT_TEMPLATE, RenderInput, ScriptTemplate};
