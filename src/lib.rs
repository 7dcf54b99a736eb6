// src/lib.rs

pub mod artifact;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod outcome;
pub mod output;
pub mod plan;
pub mod record;
pub mod render;
pub mod syntax;
pub mod types;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::artifact::TempArtifactManager;
use crate::cli::{CliArgs, Command, PlanArgs, RunArgs};
use crate::config::{ConfigFile, resolve};
use crate::engine::{RunRequest, ScriptRunner, TaskPipeline};
use crate::output::ConsoleSink;
use crate::plan::FilePlanner;

/// High-level entry point used by `main.rs`.
///
/// Returns whether the requested operation succeeded; `main` maps `false`
/// to a non-zero exit status.
pub async fn run(args: CliArgs) -> Result<bool> {
    let cfg = resolve(args.config.as_deref())?;

    match args.command {
        Command::Run(run_args) => run_task(&cfg, run_args).await,
        Command::Check(plan) => check_task(&cfg, plan).await,
        Command::Sweep { older_than } => {
            sweep(&cfg, older_than);
            Ok(true)
        }
    }
}

async fn run_task(cfg: &ConfigFile, args: RunArgs) -> Result<bool> {
    let RunArgs { plan, workdir } = args;
    let working_dir = workdir.unwrap_or_else(|| cfg.executor.working_dir.clone());
    let mut pipeline = build_pipeline(cfg, &plan)?;

    // Dropping the pipeline future on Ctrl-C leaves the child running until
    // `stop` below; `kill_on_drop` covers the case where we never get there.
    let finished = tokio::select! {
        result = pipeline.execute_task_in(&plan.task, &working_dir) => Some(result),
        _ = interrupted() => None,
    };

    let Some(result) = finished else {
        warn!(task = %plan.task, "interrupted; stopping script");
        pipeline.runner_mut().stop().await;
        return Ok(false);
    };

    let outcome = result.with_context(|| format!("running task {:?}", plan.task))?;
    match &outcome.error {
        None if outcome.succeeded => info!(task = %plan.task, "task completed"),
        None => warn!(
            task = %plan.task,
            exit_code = outcome.exit_code,
            "script exited without reporting completion"
        ),
        Some(err) => error!(
            task = %plan.task,
            kind = %err.kind,
            message = %err.message,
            exit_code = outcome.exit_code,
            "task failed"
        ),
    }
    Ok(outcome.succeeded)
}

async fn check_task(cfg: &ConfigFile, plan: PlanArgs) -> Result<bool> {
    let mut pipeline = build_pipeline(cfg, &plan)?;
    let request = pipeline.plan(&plan.task).await?;
    let report = pipeline.runner_mut().check_syntax(&request)?;

    match &report.error {
        None => println!("syntax ok"),
        Some(issue) => {
            println!("{issue}");
            println!("    {}", issue.source_snippet.trim_end());
        }
    }
    Ok(report.ok)
}

fn sweep(cfg: &ConfigFile, older_than: Option<u64>) {
    let threshold = older_than
        .map(Duration::from_secs)
        .unwrap_or_else(|| cfg.executor.orphan_max_age());
    let manager = TempArtifactManager::from_config(&cfg.executor);
    let removed = manager.sweep_orphans(threshold);
    println!(
        "removed {removed} artifact(s) older than {}s from {}",
        threshold.as_secs(),
        manager.dir().display()
    );
}

fn build_pipeline(cfg: &ConfigFile, plan: &PlanArgs) -> Result<TaskPipeline<FilePlanner>> {
    let template_data = RunRequest::default()
        .with_variables(load_json_map(plan.vars.as_deref())?)
        .with_device_mappings(load_json_map(plan.devices.as_deref())?);

    let runner = ScriptRunner::from_config(cfg, Arc::new(ConsoleSink))?;
    let planner = FilePlanner::new(plan.script.clone(), plan.workflow.clone());
    let records_path: Option<PathBuf> = cfg.output.records_path.clone();

    Ok(TaskPipeline::new(planner, runner, records_path).with_template_data(template_data))
}

/// Read a JSON object file into a map; no file means an empty map.
fn load_json_map(path: Option<&Path>) -> Result<BTreeMap<String, Value>> {
    let Some(path) = path else {
        return Ok(BTreeMap::new());
    };
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading JSON file {:?}", path))?;
    let map = serde_json::from_str(&text)
        .with_context(|| format!("{:?} must contain a JSON object", path))?;
    Ok(map)
}

/// Resolves on Ctrl-C. If the handler cannot be installed it never resolves.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
