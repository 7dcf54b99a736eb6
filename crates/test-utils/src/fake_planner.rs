use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use scriptvisor::errors::Result;
use scriptvisor::plan::Planner;

/// A fake planner that:
/// - answers every task with the same canned workflow and script
/// - records the labeled workflow it was asked to convert.
#[derive(Debug, Clone)]
pub struct FakePlanner {
    workflow: String,
    script: String,
    received: Arc<Mutex<Vec<String>>>,
}

impl FakePlanner {
    pub fn new(workflow: &str, script: &str) -> Self {
        Self {
            workflow: workflow.to_string(),
            script: script.to_string(),
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Labeled workflows passed to `workflow_to_code`, in call order.
    pub fn received(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.received)
    }
}

impl Planner for FakePlanner {
    fn generate_workflow(
        &mut self,
        _task: String,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        let workflow = self.workflow.clone();
        Box::pin(async move { Ok(workflow) })
    }

    fn workflow_to_code(
        &mut self,
        _task: String,
        labeled_workflow: String,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        let script = self.script.clone();
        let received = Arc::clone(&self.received);
        Box::pin(async move {
            received.lock().unwrap().push(labeled_workflow);
            Ok(script)
        })
    }
}
