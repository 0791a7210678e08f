//! Per-run execution context: the topic, bound variables, and every output so far.

use crate::template::TemplateVars;
use docweave_core::{Error, Result, TaskNodeId};
use std::collections::HashMap;
use std::path::PathBuf;

/// Separator placed between dependency outputs in a resolved context.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// One completed task's result. Written once.
#[derive(Clone, Debug)]
pub struct TaskOutput {
    pub node_id: TaskNodeId,
    pub text: String,
    pub written_to: PathBuf,
}

/// Created at run start, dropped at run end.
#[derive(Debug)]
pub struct ExecutionContext {
    pub vars: TemplateVars,
    outputs: HashMap<TaskNodeId, TaskOutput>,
    order: Vec<TaskNodeId>,
}

impl ExecutionContext {
    pub fn new(vars: TemplateVars) -> Self {
        Self {
            vars,
            outputs: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.vars.topic
    }

    pub fn record(&mut self, output: TaskOutput) -> Result<()> {
        if self.outputs.contains_key(&output.node_id) {
            return Err(Error::Internal(format!(
                "output for task '{}' recorded twice",
                output.node_id
            )));
        }
        self.order.push(output.node_id.clone());
        self.outputs.insert(output.node_id.clone(), output);
        Ok(())
    }

    pub fn output(&self, id: &TaskNodeId) -> Option<&TaskOutput> {
        self.outputs.get(id)
    }

    /// Outputs in the order they were recorded.
    pub fn outputs(&self) -> impl Iterator<Item = &TaskOutput> {
        self.order.iter().filter_map(|id| self.outputs.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Concatenate the outputs of `deps` in the order given.
    pub fn resolve_context(&self, deps: &[TaskNodeId]) -> Result<String> {
        let mut blocks = Vec::with_capacity(deps.len());
        for dep in deps {
            let output = self.outputs.get(dep).ok_or_else(|| {
                Error::Internal(format!("dependency '{}' has no output yet", dep))
            })?;
            blocks.push(output.text.as_str());
        }
        Ok(blocks.join(CONTEXT_SEPARATOR))
    }
}
