// src/config/validate.rs

use regex::Regex;

use crate::config::model::{
    ClassifierConfig, ConfigFile, ExecutorConfig, OutputConfig, RawConfigFile,
};
use crate::errors::{Result, ScriptvisorError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::ScriptvisorError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(
            raw.executor,
            raw.classifier,
            raw.output,
            raw.template,
        ))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_executor(&cfg.executor)?;
    validate_classifier(&cfg.classifier)?;
    validate_output(&cfg.output)?;
    Ok(())
}

fn validate_executor(exec: &ExecutorConfig) -> Result<()> {
    if exec.interpreter.trim().is_empty() {
        return Err(ScriptvisorError::ConfigError(
            "[executor].interpreter must not be empty".to_string(),
        ));
    }

    if exec.poll_interval_ms == 0 {
        return Err(ScriptvisorError::ConfigError(
            "[executor].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    if exec.orphan_max_age_secs == 0 {
        return Err(ScriptvisorError::ConfigError(
            "[executor].orphan_max_age_secs must be >= 1 (got 0); a zero age would sweep artifacts of running siblings"
                .to_string(),
        ));
    }

    validate_name_part("[executor].artifact_prefix", &exec.artifact_prefix)?;
    validate_name_part("[executor].artifact_extension", &exec.artifact_extension)?;

    if exec.artifact_extension.contains('.') {
        return Err(ScriptvisorError::ConfigError(format!(
            "[executor].artifact_extension must not contain '.' (got '{}')",
            exec.artifact_extension
        )));
    }

    Ok(())
}

fn validate_name_part(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ScriptvisorError::ConfigError(format!(
            "{field} must not be empty"
        )));
    }
    if value.contains(['/', '\\', '*', '?']) {
        return Err(ScriptvisorError::ConfigError(format!(
            "{field} must be a plain file name fragment (got '{value}')"
        )));
    }
    Ok(())
}

fn validate_classifier(cls: &ClassifierConfig) -> Result<()> {
    if cls.completion_sentinel.is_empty() {
        return Err(ScriptvisorError::ConfigError(
            "[classifier].completion_sentinel must not be empty".to_string(),
        ));
    }

    if cls.transient_signatures.iter().any(|s| s.is_empty()) {
        return Err(ScriptvisorError::ConfigError(
            "[classifier].transient_signatures must not contain empty strings".to_string(),
        ));
    }

    let re = Regex::new(&cls.error_pattern)?;
    // captures_len counts the implicit whole-match group.
    if re.captures_len() < 3 {
        return Err(ScriptvisorError::ConfigError(format!(
            "[classifier].error_pattern needs two capture groups (kind, message); got {} in '{}'",
            re.captures_len() - 1,
            cls.error_pattern
        )));
    }

    Ok(())
}

fn validate_output(out: &OutputConfig) -> Result<()> {
    if out.debug_name_max_len == 0 {
        return Err(ScriptvisorError::ConfigError(
            "[output].debug_name_max_len must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}
