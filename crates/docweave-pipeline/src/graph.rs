//! Task Graph - an ordered list of task nodes whose dependencies point backwards.
//!
//! A dependency may only name a node added earlier, so declaration order is
//! a topological order and cycles cannot be expressed. Everything that can
//! be checked without calling a model is checked in `add_task`.

use crate::agents::AgentRegistry;
use docweave_core::{AgentId, Error, Result, TaskNodeId};
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// What a caller supplies to add a task.
#[derive(Clone, Debug)]
pub struct TaskSpec {
    pub id: String,
    pub description_template: String,
    pub expected_output_template: String,
    pub agent: String,
    pub dependencies: Vec<String>,
    /// Path relative to the output directory.
    pub output_sink: PathBuf,
}

impl TaskSpec {
    pub fn new(id: &str, agent: &str, sink: &str) -> Self {
        Self {
            id: id.into(),
            description_template: String::new(),
            expected_output_template: String::new(),
            agent: agent.into(),
            dependencies: Vec::new(),
            output_sink: PathBuf::from(sink),
        }
    }

    pub fn describe(mut self, description: &str, expected_output: &str) -> Self {
        self.description_template = description.into();
        self.expected_output_template = expected_output.into();
        self
    }

    pub fn after(mut self, deps: &[&str]) -> Self {
        self.dependencies = deps.iter().map(|d| d.to_string()).collect();
        self
    }
}

#[derive(Clone, Debug)]
pub struct TaskNode {
    pub id: TaskNodeId,
    pub description_template: String,
    pub expected_output_template: String,
    pub agent: AgentId,
    /// In declared order; context is concatenated in this order.
    pub dependencies: Vec<TaskNodeId>,
    pub output_sink: PathBuf,
}

/// Agent ids and template variables are checked against the shared registry
/// while nodes are added.
pub struct TaskGraph {
    registry: Arc<AgentRegistry>,
    nodes: Vec<TaskNode>,
    index: HashMap<TaskNodeId, usize>,
    sinks: HashSet<PathBuf>,
}

impl TaskGraph {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self {
            registry,
            nodes: Vec::new(),
            index: HashMap::new(),
            sinks: HashSet::new(),
        }
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn add_task(&mut self, spec: TaskSpec) -> Result<TaskNodeId> {
        let id = TaskNodeId::new(spec.id.as_str());
        if spec.id.trim().is_empty() {
            return Err(Error::config("task id must not be empty"));
        }
        if self.index.contains_key(&id) {
            return Err(Error::config(format!("task '{}' is already declared", id)));
        }

        let mut dependencies = Vec::with_capacity(spec.dependencies.len());
        for dep in &spec.dependencies {
            let dep_id = TaskNodeId::new(dep.as_str());
            // Self references land here too: the node is not in the index yet.
            if !self.index.contains_key(&dep_id) {
                return Err(Error::dependency(id.as_str(), dep.as_str()));
            }
            if dependencies.contains(&dep_id) {
                return Err(Error::config(format!(
                    "task '{}' lists dependency '{}' twice",
                    id, dep
                )));
            }
            dependencies.push(dep_id);
        }

        let agent = AgentId::new(spec.agent.as_str());
        if !self.registry.contains(&agent) {
            return Err(Error::config(format!(
                "task '{}' names unregistered agent '{}'",
                id, agent
            )));
        }

        let output_sink = check_sink(&id, &spec.output_sink)?;
        if self.sinks.contains(&output_sink) {
            return Err(Error::config(format!(
                "task '{}' writes to '{}', which another task already uses",
                id,
                output_sink.display()
            )));
        }

        let owner = format!("task '{}'", id);
        let vars = self.registry.variables();
        vars.check(&owner, &spec.description_template)?;
        vars.check(&owner, &spec.expected_output_template)?;

        self.index.insert(id.clone(), self.nodes.len());
        self.sinks.insert(output_sink.clone());
        self.nodes.push(TaskNode {
            id: id.clone(),
            description_template: spec.description_template,
            expected_output_template: spec.expected_output_template,
            agent,
            dependencies,
            output_sink,
        });
        Ok(id)
    }

    /// Declaration order.
    pub fn topological_order(&self) -> Vec<TaskNodeId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.iter()
    }

    pub fn node(&self, id: &TaskNodeId) -> Option<&TaskNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn dependencies_of(&self, id: &TaskNodeId) -> Option<&[TaskNodeId]> {
        self.node(id).map(|n| n.dependencies.as_slice())
    }

    pub fn agent_of(&self, id: &TaskNodeId) -> Option<&AgentId> {
        self.node(id).map(|n| &n.agent)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check that `order` lists every node exactly once, each after its
    /// dependencies.
    pub fn validate_order(&self, order: &[TaskNodeId]) -> Result<()> {
        if order.len() != self.nodes.len() {
            return Err(Error::config(format!(
                "order has {} entries, graph has {} nodes",
                order.len(),
                self.nodes.len()
            )));
        }
        let mut done: HashSet<&TaskNodeId> = HashSet::new();
        for id in order {
            let node = self
                .node(id)
                .ok_or_else(|| Error::config(format!("order names unknown task '{}'", id)))?;
            if let Some(dep) = node.dependencies.iter().find(|d| !done.contains(d)) {
                return Err(Error::dependency(id.as_str(), dep.as_str()));
            }
            if !done.insert(id) {
                return Err(Error::config(format!("order lists task '{}' twice", id)));
            }
        }
        Ok(())
    }
}

/// Returns the sink with `.` components dropped, so `./a.txt` and `a.txt`
/// are the same sink.
fn check_sink(id: &TaskNodeId, sink: &Path) -> Result<PathBuf> {
    let escapes = sink
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    let normalized: PathBuf = sink
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    if normalized.as_os_str().is_empty() || escapes || sink.file_name().is_none() {
        return Err(Error::config(format!(
            "task '{}' has output sink '{}'; sinks must be relative paths inside the output directory",
            id,
            sink.display()
        )));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentSpec, ModelBinding};
    use crate::template::VarSet;
    use docweave_core::ModelConfig;
    use docweave_llm::{MockBehavior, ScriptedProvider};

    fn registry() -> Arc<AgentRegistry> {
        let provider = Arc::new(ScriptedProvider::constant(MockBehavior::Echo));
        let mut reg = AgentRegistry::single_model(
            ModelBinding::new(ModelConfig::default(), provider),
            VarSet::default(),
        );
        reg.register(AgentSpec::new("writer", "Writer", "Write about {topic}", ""))
            .unwrap();
        Arc::new(reg)
    }

    #[test]
    fn declaration_order_is_topological() {
        let reg = registry();
        let mut g = TaskGraph::new(reg);
        g.add_task(TaskSpec::new("a", "writer", "a.txt")).unwrap();
        g.add_task(TaskSpec::new("b", "writer", "b.txt").after(&["a"])).unwrap();
        g.add_task(TaskSpec::new("c", "writer", "c.txt").after(&["a", "b"])).unwrap();

        let order = g.topological_order();
        assert_eq!(order.len(), 3);
        g.validate_order(&order).unwrap();
        assert_eq!(
            g.dependencies_of(&"c".into()).unwrap(),
            &[TaskNodeId::new("a"), TaskNodeId::new("b")]
        );
        assert_eq!(g.agent_of(&"b".into()).unwrap().as_str(), "writer");
    }

    #[test]
    fn forward_and_self_references_rejected() {
        let reg = registry();
        let mut g = TaskGraph::new(reg);
        let err = g
            .add_task(TaskSpec::new("a", "writer", "a.txt").after(&["b"]))
            .unwrap_err();
        assert!(matches!(err, Error::CyclicOrUnknownDependency { .. }));

        let err = g
            .add_task(TaskSpec::new("a", "writer", "a.txt").after(&["a"]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::CyclicOrUnknownDependency { ref node, ref dependency } if node == "a" && dependency == "a"
        ));
        assert!(g.is_empty());
    }

    #[test]
    fn bad_sinks_rejected() {
        let reg = registry();
        let mut g = TaskGraph::new(reg);
        for sink in ["../escape.txt", "/abs.txt", ""] {
            assert!(g.add_task(TaskSpec::new("x", "writer", sink)).is_err(), "{sink}");
        }
        g.add_task(TaskSpec::new("a", "writer", "same.txt")).unwrap();
        assert!(g.add_task(TaskSpec::new("b", "writer", "same.txt")).is_err());
    }

    #[test]
    fn dot_prefixed_sink_is_the_same_sink() {
        let reg = registry();
        let mut g = TaskGraph::new(reg);
        g.add_task(TaskSpec::new("a", "writer", "a.txt")).unwrap();
        let err = g.add_task(TaskSpec::new("b", "writer", "./a.txt")).unwrap_err();
        assert!(matches!(err, Error::Configuration(m) if m.contains("already uses")));

        g.add_task(TaskSpec::new("c", "writer", "./nested/./c.txt")).unwrap();
        assert_eq!(g.node(&"c".into()).unwrap().output_sink, PathBuf::from("nested/c.txt"));
        assert!(g.add_task(TaskSpec::new("d", "writer", "./.")).is_err());
    }

    #[test]
    fn unknown_agent_and_duplicate_id_rejected() {
        let reg = registry();
        let mut g = TaskGraph::new(reg);
        assert!(g.add_task(TaskSpec::new("a", "nobody", "a.txt")).is_err());
        g.add_task(TaskSpec::new("a", "writer", "a.txt")).unwrap();
        assert!(g.add_task(TaskSpec::new("a", "writer", "a2.txt")).is_err());
    }

    #[test]
    fn undeclared_template_variable_fails_at_construction() {
        let reg = registry();
        let mut g = TaskGraph::new(reg);
        let err = g
            .add_task(TaskSpec::new("a", "writer", "a.txt").describe("Write {topic} for {audience}", ""))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(m) if m.contains("audience")));
    }

    #[test]
    fn validate_order_catches_misordering() {
        let reg = registry();
        let mut g = TaskGraph::new(reg);
        g.add_task(TaskSpec::new("a", "writer", "a.txt")).unwrap();
        g.add_task(TaskSpec::new("b", "writer", "b.txt").after(&["a"])).unwrap();
        let reversed = vec![TaskNodeId::new("b"), TaskNodeId::new("a")];
        assert!(g.validate_order(&reversed).is_err());
        let repeated = vec![TaskNodeId::new("a"), TaskNodeId::new("a")];
        assert!(g.validate_order(&repeated).is_err());
    }
}
