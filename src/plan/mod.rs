// src/plan/mod.rs

//! Planner seam and the text handling around planner output.
//!
//! The crate never talks to an LLM itself. A [`Planner`] produces the
//! workflow text for a task and then the script for the labeled workflow;
//! the pipeline in [`crate::engine`] only consumes those strings.
//!
//! - [`labels`] numbers workflow steps.
//! - [`response`] pulls tagged sections out of a raw model response.
//! - [`FilePlanner`] serves planner output saved on disk, which is what the
//!   CLI uses.

pub mod labels;
pub mod response;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use anyhow::Context;
use tracing::debug;

use crate::errors::Result;

pub use labels::label_workflow;
pub use response::extract_tag_content;

/// Tag wrapping the workflow in a planner response.
pub const WORKFLOW_TAG: &str = "workflow";
/// Tag wrapping the labeled script in a planner response.
pub const SCRIPT_TAG: &str = "labeled_python_script";

/// Producer of workflow and script text for a task.
///
/// Production planners call a model; tests provide canned answers.
pub trait Planner: Send {
    /// Natural-language workflow for `task`.
    fn generate_workflow(
        &mut self,
        task: String,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;

    /// Script implementing the labeled workflow.
    fn workflow_to_code(
        &mut self,
        task: String,
        labeled_workflow: String,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;
}

/// Planner backed by files holding earlier planner responses.
///
/// Each file may be a raw model response (the tagged section is extracted)
/// or the bare text. Without a workflow file the workflow is empty.
#[derive(Debug, Clone)]
pub struct FilePlanner {
    workflow_path: Option<PathBuf>,
    script_path: PathBuf,
}

impl FilePlanner {
    pub fn new(script_path: impl Into<PathBuf>, workflow_path: Option<PathBuf>) -> Self {
        Self {
            workflow_path,
            script_path: script_path.into(),
        }
    }
}

impl Planner for FilePlanner {
    fn generate_workflow(
        &mut self,
        _task: String,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        let path = self.workflow_path.clone();
        Box::pin(async move {
            let Some(path) = path else {
                return Ok(String::new());
            };
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading workflow file {:?}", path))?;
            Ok(tagged_or_whole(&text, WORKFLOW_TAG))
        })
    }

    fn workflow_to_code(
        &mut self,
        _task: String,
        _labeled_workflow: String,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        let path = self.script_path.clone();
        Box::pin(async move {
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading script file {:?}", path))?;
            Ok(tagged_or_whole(&text, SCRIPT_TAG))
        })
    }
}

/// The tagged section if present, otherwise the whole text.
pub fn tagged_or_whole(text: &str, tag: &str) -> String {
    match extract_tag_content(text, tag) {
        Some(content) => content,
        None => {
            debug!(tag, "no tagged section in planner output; using it whole");
            text.to_string()
        }
    }
}
