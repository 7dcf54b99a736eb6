// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Raw configuration as read from a TOML file, before validation.
///
/// ```toml
/// [executor]
/// interpreter = "python3"
/// interpreter_args = ["-u"]
/// working_dir = "."
///
/// [classifier]
/// completion_sentinel = "finish task"
///
/// [output]
/// debug_dir = "generated_scripts"
///
/// [template]
/// runtime_path = "../automation-runtime"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub template: TemplateConfig,
}

/// Validated configuration.
///
/// Obtain one through [`ConfigFile::try_from`] (or
/// [`crate::config::load_and_validate`]); [`ConfigFile::default`] is always
/// valid.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub executor: ExecutorConfig,
    pub classifier: ClassifierConfig,
    pub output: OutputConfig,
    pub template: TemplateConfig,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        executor: ExecutorConfig,
        classifier: ClassifierConfig,
        output: OutputConfig,
        template: TemplateConfig,
    ) -> Self {
        Self {
            executor,
            classifier,
            output,
            template,
        }
    }
}

/// `[executor]` section: how scripts are materialized, launched and stopped.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Interpreter binary that runs the rendered script.
    pub interpreter: String,

    /// Arguments placed before the script path (`-u` keeps Python unbuffered).
    pub interpreter_args: Vec<String>,

    /// Extra environment variables for the child, on top of the inherited
    /// environment and the forced UTF-8/unbuffered settings.
    pub env: BTreeMap<String, String>,

    /// Working directory of the child, so relative paths inside the
    /// generated script resolve against the project root.
    pub working_dir: PathBuf,

    /// Directory for transient script artifacts. `None` = platform temp dir.
    pub temp_dir: Option<PathBuf>,

    /// Artifact file names are `<artifact_prefix>_<timestamp>.<artifact_extension>`.
    pub artifact_prefix: String,
    pub artifact_extension: String,

    /// Sleep between drain ticks.
    pub poll_interval_ms: u64,

    /// How long `stop()` waits after the graceful termination request
    /// before killing the child.
    pub stop_timeout_ms: u64,

    /// How long the final drain waits for the output pipes to close after
    /// the child exited.
    pub drain_grace_ms: u64,

    /// Minimum age for leftover artifacts removed by the orphan sweep.
    pub orphan_max_age_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            interpreter_args: vec!["-u".to_string()],
            env: BTreeMap::new(),
            working_dir: PathBuf::from("."),
            temp_dir: None,
            artifact_prefix: "scriptvisor".to_string(),
            artifact_extension: "py".to_string(),
            poll_interval_ms: 50,
            stop_timeout_ms: 2000,
            drain_grace_ms: 2000,
            orphan_max_age_secs: 3600,
        }
    }
}

impl ExecutorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }

    pub fn orphan_max_age(&self) -> Duration {
        Duration::from_secs(self.orphan_max_age_secs)
    }

    /// Effective artifact directory.
    pub fn artifact_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// `[classifier]` section: completion and error detection on the output.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Marker whose presence in the output is the only success signal.
    pub completion_sentinel: String,

    /// Literal substrings of network failures the script recovers from.
    /// Output containing any of them is never classified as an error.
    pub transient_signatures: Vec<String>,

    /// Regex for unrecovered runtime errors. Group 1 is the error kind,
    /// group 2 the message.
    pub error_pattern: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            completion_sentinel: "finish task".to_string(),
            transient_signatures: vec![
                "HTTPSConnectionPool".to_string(),
                "ConnectTimeout".to_string(),
                "ConnectTimeoutError".to_string(),
                "MaxRetryError".to_string(),
            ],
            error_pattern: r"(\w+Error): (.*)".to_string(),
        }
    }
}

/// `[output]` section: side artifacts kept for post-hoc inspection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where a copy of every rendered script is kept. `None` disables it.
    pub debug_dir: Option<PathBuf>,

    /// Task names are truncated to this many characters in debug copy names.
    pub debug_name_max_len: usize,

    /// Append-only JSON execution record. `None` disables it.
    pub records_path: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            debug_dir: Some(PathBuf::from("generated_scripts")),
            debug_name_max_len: 30,
            records_path: Some(PathBuf::from("execution_records.json")),
        }
    }
}

/// `[template]` section: the wrapper program around generated scripts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Path of the host automation runtime, appended to the wrapper's
    /// import path.
    pub runtime_path: String,

    /// Optional file replacing the built-in wrapper template.
    pub path: Option<PathBuf>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            runtime_path: "automation_runtime".to_string(),
            path: None,
        }
    }
}
