#![allow(dead_code)]

use std::path::Path;

use scriptvisor::config::{ConfigFile, RawConfigFile};
use scriptvisor::types::RenderedScript;

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from a configuration suited to tests: scripts are run with `sh`,
/// timings are short, and the debug copy and execution record are off.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.executor.interpreter = "sh".to_string();
        config.executor.interpreter_args = vec![];
        config.executor.artifact_prefix = "scriptvisor_test".to_string();
        config.executor.artifact_extension = "sh".to_string();
        config.executor.poll_interval_ms = 10;
        config.executor.stop_timeout_ms = 500;
        config.executor.drain_grace_ms = 1000;
        config.output.debug_dir = None;
        config.output.records_path = None;
        Self { config }
    }

    /// Directory artifacts are written to. Tests always set this to a
    /// tempdir so they can inspect it.
    pub fn with_temp_dir(mut self, dir: &Path) -> Self {
        self.config.executor.temp_dir = Some(dir.to_path_buf());
        self
    }

    pub fn with_working_dir(mut self, dir: &Path) -> Self {
        self.config.executor.working_dir = dir.to_path_buf();
        self
    }

    pub fn with_interpreter(mut self, program: &str, args: &[&str]) -> Self {
        self.config.executor.interpreter = program.to_string();
        self.config.executor.interpreter_args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.config
            .executor
            .env
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_stop_timeout_ms(mut self, ms: u64) -> Self {
        self.config.executor.stop_timeout_ms = ms;
        self
    }

    pub fn with_sentinel(mut self, sentinel: &str) -> Self {
        self.config.classifier.completion_sentinel = sentinel.to_string();
        self
    }

    pub fn with_transient(mut self, signature: &str) -> Self {
        self.config
            .classifier
            .transient_signatures
            .push(signature.to_string());
        self
    }

    pub fn with_debug_dir(mut self, dir: &Path) -> Self {
        self.config.output.debug_dir = Some(dir.to_path_buf());
        self
    }

    pub fn with_records_path(mut self, path: &Path) -> Self {
        self.config.output.records_path = Some(path.to_path_buf());
        self
    }

    /// Use the template file at `path` instead of the built-in one.
    pub fn with_template_file(mut self, path: &Path) -> Self {
        self.config.template.path = Some(path.to_path_buf());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Shell script for a task, ready for the supervisor.
pub fn sh_script(task: &str, body: &str) -> RenderedScript {
    RenderedScript::new(task, body)
}

/// Template that emits the script body alone, so rendered requests run
/// under `sh`.
pub const SH_TEMPLATE: &str = "{script_content}\n";

/// Write [`SH_TEMPLATE`] into `dir` and return its path.
pub fn write_sh_template(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("template.sh");
    std::fs::write(&path, SH_TEMPLATE).expect("failed to write test template");
    path
}
