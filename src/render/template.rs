// src/render/template.rs

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde_json::Value;

use crate::config::TemplateConfig;
use crate::errors::Result;

/// Wrapper program the generated script body is embedded into.
///
/// Placeholders are `{name}`; see [`ScriptTemplate::render`] for the list.
pub const DEFAULT_TEMPLATE: &str = r#"# -*- coding: utf-8 -*-
import sys
import os

sys.path.append("{runtime_path}")

from automation.agent import Agent
from automation.task import Task
from automation.config import AgentConfig, AgentArgParser


class DynamicTask(Task):
    def __init__(self):
        super().__init__()
        self.task_id = "generated_task"
        self.description = """{task_description}
"""
        self.code_script_labeled = """{code_script_labeled}
"""
        self.NL_script_labeled = """{NL_script_labeled}
"""
        self.variables = {variable_mapping}
        self.device_mappings = {device_mappings}

    def main(self, agent):
        device_manager, data, fm, user = agent.device_manager, agent.data, agent.fm, agent.user
{script_content}


if __name__ == '__main__':
    yaml_file = os.path.join("{runtime_path}", 'config.yaml')
    parser = AgentArgParser((AgentConfig,))
    config = parser.parse_yaml_file(yaml_file=yaml_file)[0]
    agent = Agent(config)
    task = DynamicTask()
    agent.task.execute_task(task)
"#;

/// Indentation of the script body inside `main`.
const BODY_INDENT: &str = "        ";

/// Inputs embedded into the wrapper program.
#[derive(Debug, Clone, Copy)]
pub struct RenderInput<'a> {
    pub scripts: &'a str,
    pub labeled_code: &'a str,
    pub labeled_workflow: &'a str,
    pub task: &'a str,
    pub variables: &'a BTreeMap<String, Value>,
    pub device_mappings: &'a BTreeMap<String, Value>,
}

/// The fixed wrapper program plus the runtime location it imports from.
#[derive(Debug, Clone)]
pub struct ScriptTemplate {
    text: String,
    runtime_path: String,
}

impl ScriptTemplate {
    pub fn new(text: impl Into<String>, runtime_path: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            runtime_path: runtime_path.into(),
        }
    }

    /// Built-in template, or the file named by `[template].path`.
    pub fn from_config(cfg: &TemplateConfig) -> Result<Self> {
        let text = match &cfg.path {
            Some(path) => load_template(path)?,
            None => DEFAULT_TEMPLATE.to_string(),
        };
        Ok(Self::new(text, cfg.runtime_path.clone()))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Produce the final source text.
    ///
    /// Placeholders:
    /// - `{runtime_path}`: runtime location with forward slashes
    /// - `{task_description}`: task with `"` escaped
    /// - `{code_script_labeled}`, `{NL_script_labeled}`: labeled code and
    ///   workflow with `"""` escaped so the triple-quoted literal stays closed
    /// - `{script_content}`: script lines indented into the `main` body
    /// - `{variable_mapping}`, `{device_mappings}`: dict literals
    ///
    /// Substitution is a single pass, so placeholder-like text inside the
    /// inserted values is left alone.
    pub fn render(&self, input: &RenderInput<'_>) -> String {
        let runtime_path = self.runtime_path.replace('\\', "/");
        let values: BTreeMap<&str, String> = BTreeMap::from([
            ("runtime_path", runtime_path),
            ("task_description", escape_double_quotes(input.task)),
            ("code_script_labeled", escape_triple_quotes(input.labeled_code)),
            ("NL_script_labeled", escape_triple_quotes(input.labeled_workflow)),
            ("script_content", indent_body(input.scripts)),
            ("variable_mapping", python_dict_literal(input.variables)),
            ("device_mappings", python_dict_literal(input.device_mappings)),
        ]);
        substitute(&self.text, &values)
    }
}

impl Default for ScriptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE, TemplateConfig::default().runtime_path)
    }
}

fn load_template(path: &Path) -> Result<String> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading template file {:?}", path))?;
    Ok(text)
}

/// Replace every known `{name}` in one left-to-right pass.
fn substitute(template: &str, values: &BTreeMap<&str, String>) -> String {
    let mut out = String::with_capacity(template.len() + 256);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let key = &after[..close];
            values.get(key).map(|value| (value, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn escape_double_quotes(text: &str) -> String {
    text.replace('"', "\\\"")
}

pub fn escape_triple_quotes(text: &str) -> String {
    text.replace(r#"""""#, r#"\"\"\""#)
}

/// Indent each script line into the `main` body. An empty script becomes
/// `pass` so the wrapper stays valid.
pub fn indent_body(scripts: &str) -> String {
    let lines: Vec<String> = scripts
        .lines()
        .map(|line| format!("{BODY_INDENT}{line}"))
        .collect();
    if lines.iter().all(|line| line.trim().is_empty()) {
        return format!("{BODY_INDENT}pass");
    }
    lines.join("\n")
}

/// Render a map as a Python dict literal.
pub fn python_dict_literal(map: &BTreeMap<String, Value>) -> String {
    let entries: Vec<String> = map
        .iter()
        .map(|(k, v)| format!("{}: {}", python_str(k), python_literal(v)))
        .collect();
    format!("{{{}}}", entries.join(", "))
}

fn python_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => python_str(s),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(python_literal).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(obj) => {
            let entries: Vec<String> = obj
                .iter()
                .map(|(k, v)| format!("{}: {}", python_str(k), python_literal(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
    }
}

/// Single-quoted string literal; the JSON escapes of `serde_json` are valid
/// Python escapes as well.
fn python_str(s: &str) -> String {
    let json = Value::String(s.to_string()).to_string();
    let inner = &json[1..json.len() - 1];
    format!("'{}'", inner.replace('\'', "\\'"))
}
