// src/outcome/mod.rs

//! Outcome classification of script output.
//!
//! Success is signalled only by the completion sentinel. Error detection is
//! a loose regex match over the output (an ordered list of
//! [`MatchRule`]s), used to annotate the result; it never ends a run early.

pub mod classifier;
pub mod rules;

pub use classifier::{OutcomeClassifier, Signal};
pub use rules::MatchRule;
