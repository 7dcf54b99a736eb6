// src/outcome/classifier.rs

use crate::config::ClassifierConfig;
use crate::errors::Result;
use crate::types::ExecutionError;

use super::rules::MatchRule;

/// What a chunk of output says about the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Nothing recognised.
    Clean,
    /// Error-shaped output caused by a recoverable network condition.
    Transient,
    /// Unrecovered runtime error.
    Error(ExecutionError),
}

/// Scans drained output for the completion sentinel and for runtime error
/// signatures.
///
/// The classifier is stateless; the supervisor decides what to keep (the
/// first error wins, success is sticky).
#[derive(Debug, Clone)]
pub struct OutcomeClassifier {
    sentinel: String,
    rules: Vec<MatchRule>,
}

impl OutcomeClassifier {
    pub fn new(sentinel: impl Into<String>, rules: Vec<MatchRule>) -> Self {
        Self {
            sentinel: sentinel.into(),
            rules,
        }
    }

    /// Transient literals first, then the error pattern.
    pub fn from_config(cfg: &ClassifierConfig) -> Result<Self> {
        let mut rules = cfg
            .transient_signatures
            .iter()
            .map(|sig| MatchRule::transient_literal(sig))
            .collect::<Result<Vec<_>>>()?;
        rules.push(MatchRule::error(&cfg.error_pattern)?);
        Ok(Self::new(cfg.completion_sentinel.clone(), rules))
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    pub fn rules(&self) -> &[MatchRule] {
        &self.rules
    }

    /// True iff `text` contains the completion sentinel.
    pub fn on_completion_marker(&self, text: &str) -> bool {
        text.contains(&self.sentinel)
    }

    /// Runtime error recognised in `text`, unless a transient condition is
    /// present as well.
    pub fn on_error_signature(&self, text: &str) -> Option<ExecutionError> {
        match self.assess(text) {
            Signal::Error(err) => Some(err),
            Signal::Clean | Signal::Transient => None,
        }
    }

    pub fn assess(&self, text: &str) -> Signal {
        if self
            .rules
            .iter()
            .any(|rule| rule.is_transient() && rule.is_match(text))
        {
            return Signal::Transient;
        }

        self.rules
            .iter()
            .filter(|rule| !rule.is_transient())
            .find_map(|rule| rule.capture(text))
            .map_or(Signal::Clean, |(kind, message)| {
                Signal::Error(ExecutionError {
                    kind: kind.to_string(),
                    message: message.trim_end().to_string(),
                    raw_log: text.to_string(),
                })
            })
    }
}

impl Default for OutcomeClassifier {
    fn default() -> Self {
        // The default config is validated by construction.
        Self::from_config(&ClassifierConfig::default())
            .expect("default classifier patterns are valid")
    }
}
