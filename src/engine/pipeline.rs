// src/engine/pipeline.rs

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::errors::Result;
use crate::plan::{Planner, label_workflow};
use crate::record::{ExecutionRecord, append_record};
use crate::types::RunOutcome;

use super::request::RunRequest;
use super::runner::ScriptRunner;

/// Plan, label, run and record one task.
pub struct TaskPipeline<P: Planner> {
    planner: P,
    runner: ScriptRunner,
    records_path: Option<PathBuf>,
    request: RunRequest,
}

impl<P: Planner> TaskPipeline<P> {
    pub fn new(planner: P, runner: ScriptRunner, records_path: Option<PathBuf>) -> Self {
        Self {
            planner,
            runner,
            records_path,
            request: RunRequest::default(),
        }
    }

    /// Variables and device mappings carried into every rendered script.
    pub fn with_template_data(mut self, request: RunRequest) -> Self {
        self.request = request;
        self
    }

    pub fn runner(&self) -> &ScriptRunner {
        &self.runner
    }

    pub fn runner_mut(&mut self) -> &mut ScriptRunner {
        &mut self.runner
    }

    pub fn into_runner(self) -> ScriptRunner {
        self.runner
    }

    /// Build the run request for `task` from the planner's output.
    pub async fn plan(&mut self, task: &str) -> Result<RunRequest> {
        info!(task = %task, "generating workflow");
        let workflow = self.planner.generate_workflow(task.to_string()).await?;
        let labeled_workflow = label_workflow(&workflow);

        info!(task = %task, "converting workflow to code");
        let script = self
            .planner
            .workflow_to_code(task.to_string(), labeled_workflow.clone())
            .await?;

        Ok(RunRequest::new(task, script)
            .with_workflow(labeled_workflow)
            .with_variables(self.request.variables.clone())
            .with_device_mappings(self.request.device_mappings.clone()))
    }

    /// Run `task` end to end and append an execution record.
    pub async fn execute_task(&mut self, task: &str) -> Result<RunOutcome> {
        let working_dir = self.runner.supervisor().config().working_dir.clone();
        self.execute_task_in(task, &working_dir).await
    }

    pub async fn execute_task_in(&mut self, task: &str, working_dir: &Path) -> Result<RunOutcome> {
        let started = Local::now();
        let request = self.plan(task).await?;
        let result = self.runner.execute_in(&request, working_dir).await;
        let finished = Local::now();

        if let Some(path) = &self.records_path {
            let (succeeded, error_kind) = match &result {
                Ok(outcome) => (
                    outcome.succeeded,
                    outcome.error.as_ref().map(|e| e.kind.clone()),
                ),
                Err(_) => (false, Some("LaunchFailure".to_string())),
            };
            let record = ExecutionRecord::new(task, started, finished, succeeded, error_kind);
            append_record(path, &record);
        }

        result
    }
}
