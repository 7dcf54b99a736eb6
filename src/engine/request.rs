// src/engine/request.rs

use std::collections::BTreeMap;

use serde_json::Value;

use crate::render::RenderInput;

/// Everything needed to render and run one generated script.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunRequest {
    /// Script body as produced by the planner.
    pub source_text: String,
    /// Labeled copy of the script, embedded for the runtime's step tracking.
    pub labeled_code: String,
    pub labeled_workflow: String,
    pub task_name: String,
    pub variables: BTreeMap<String, Value>,
    pub device_mappings: BTreeMap<String, Value>,
}

impl RunRequest {
    /// Request whose labeled code is the source itself.
    pub fn new(task_name: impl Into<String>, source_text: impl Into<String>) -> Self {
        let source_text = source_text.into();
        Self {
            labeled_code: source_text.clone(),
            source_text,
            task_name: task_name.into(),
            ..Self::default()
        }
    }

    pub fn with_labeled_code(mut self, labeled_code: impl Into<String>) -> Self {
        self.labeled_code = labeled_code.into();
        self
    }

    pub fn with_workflow(mut self, labeled_workflow: impl Into<String>) -> Self {
        self.labeled_workflow = labeled_workflow.into();
        self
    }

    pub fn with_variables(mut self, variables: BTreeMap<String, Value>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_device_mappings(mut self, device_mappings: BTreeMap<String, Value>) -> Self {
        self.device_mappings = device_mappings;
        self
    }

    pub fn render_input(&self) -> RenderInput<'_> {
        RenderInput {
            scripts: &self.source_text,
            labeled_code: &self.labeled_code,
            labeled_workflow: &self.labeled_workflow,
            task: &self.task_name,
            variables: &self.variables,
            device_mappings: &self.device_mappings,
        }
    }
}
