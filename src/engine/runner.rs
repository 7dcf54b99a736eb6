// src/engine/runner.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::artifact::write_debug_copy;
use crate::config::{ConfigFile, OutputConfig};
use crate::errors::Result;
use crate::exec::Supervisor;
use crate::output::LiveSink;
use crate::render::ScriptTemplate;
use crate::syntax::{SyntaxReport, syntax_check};
use crate::types::{RenderedScript, RunOutcome};

use super::request::RunRequest;

/// Front door for running generated scripts.
///
/// Renders a [`RunRequest`] into the wrapper program, keeps a debug copy,
/// and hands the result to its [`Supervisor`]. Construction sweeps artifacts
/// left behind by crashed earlier processes.
#[derive(Debug)]
pub struct ScriptRunner {
    template: ScriptTemplate,
    supervisor: Supervisor,
    output: OutputConfig,
    working_dir: PathBuf,
}

impl ScriptRunner {
    pub fn from_config(cfg: &ConfigFile, sink: Arc<dyn LiveSink>) -> Result<Self> {
        let template = ScriptTemplate::from_config(&cfg.template)?;
        let supervisor = Supervisor::from_config(cfg, sink)?;

        let swept = supervisor
            .artifacts()
            .sweep_orphans(cfg.executor.orphan_max_age());
        if swept > 0 {
            info!(swept, "removed orphaned artifacts at startup");
        }

        Ok(Self {
            template,
            supervisor,
            output: cfg.output.clone(),
            working_dir: cfg.executor.working_dir.clone(),
        })
    }

    pub fn render(&self, req: &RunRequest) -> RenderedScript {
        RenderedScript::new(&req.task_name, self.template.render(&req.render_input()))
    }

    /// Render `req` exactly as it would run and check the result statically.
    ///
    /// The rendered text goes through an untracked artifact that is removed
    /// right after the check, so an active run is not disturbed. Fails only
    /// if the artifact cannot be written.
    pub fn check_syntax(&mut self, req: &RunRequest) -> Result<SyntaxReport> {
        let script = self.render(req);
        self.check_rendered(&script)
    }

    pub fn check_rendered(&mut self, script: &RenderedScript) -> Result<SyntaxReport> {
        let path = self
            .supervisor
            .artifacts_mut()
            .materialize(script.source(), false)?;

        let report = match fs::read_to_string(&path) {
            Ok(text) => syntax_check(&text),
            Err(e) => {
                warn!(path = ?path, error = %e, "cannot read back check artifact; checking rendered text");
                syntax_check(script.source())
            }
        };

        if let Err(e) = fs::remove_file(&path) {
            warn!(path = ?path, error = %e, "failed to remove syntax check artifact");
        }

        match &report.error {
            None => debug!(task = %script.task(), "syntax check passed"),
            Some(issue) => info!(
                task = %script.task(),
                line = issue.line,
                column = issue.column,
                message = %issue.message,
                "syntax check failed"
            ),
        }
        Ok(report)
    }

    /// Render and run `req` in the configured working directory.
    pub async fn execute(&mut self, req: &RunRequest) -> Result<RunOutcome> {
        let working_dir = self.working_dir.clone();
        self.execute_in(req, &working_dir).await
    }

    /// Render and run `req` with `working_dir` as the child's current
    /// directory. Returns once the child has exited and its output is
    /// drained.
    pub async fn execute_in(&mut self, req: &RunRequest, working_dir: &Path) -> Result<RunOutcome> {
        let script = self.render(req);

        if let Some(dir) = &self.output.debug_dir {
            write_debug_copy(
                dir,
                script.task(),
                script.source(),
                self.supervisor.artifacts().extension(),
                self.output.debug_name_max_len,
            );
        }

        self.supervisor.run(&script, working_dir).await
    }

    /// Stop whatever is running and remove its artifact.
    pub async fn stop(&mut self) {
        self.supervisor.stop().await;
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn supervisor_mut(&mut self) -> &mut Supervisor {
        &mut self.supervisor
    }

    pub fn template(&self) -> &ScriptTemplate {
        &self.template
    }

    pub fn drain_log(&self) -> String {
        self.supervisor.drain_log()
    }
}
