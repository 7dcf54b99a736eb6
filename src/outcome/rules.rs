// src/outcome/rules.rs

use regex::Regex;

use crate::errors::Result;

/// One content-sniffing rule.
///
/// A transient rule marks output as a recoverable condition (e.g. a network
/// retry); a non-transient rule recognises an unrecovered error and must
/// capture the error kind in group 1 and the message in group 2.
#[derive(Debug, Clone)]
pub struct MatchRule {
    pattern: Regex,
    transient: bool,
}

impl MatchRule {
    pub fn error(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            transient: false,
        })
    }

    pub fn transient(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            transient: true,
        })
    }

    /// Transient rule matching a literal substring.
    pub fn transient_literal(needle: &str) -> Result<Self> {
        Self::transient(&regex::escape(needle))
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// `(kind, message)` of the first match, if any.
    pub(crate) fn capture<'t>(&self, text: &'t str) -> Option<(&'t str, &'t str)> {
        let caps = self.pattern.captures(text)?;
        let kind = caps.get(1).map_or("", |m| m.as_str());
        let message = caps.get(2).map_or("", |m| m.as_str());
        Some((kind, message))
    }
}
