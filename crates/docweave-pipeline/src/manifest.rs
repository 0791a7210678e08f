//! Run manifest - structured metadata for every pipeline run.

use chrono::{DateTime, Utc};
use docweave_core::Result;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RunManifest {
    pub run_id: String,
    pub topic: String,
    pub output_dir: String,
    pub started: DateTime<Utc>,
    pub ended: Option<DateTime<Utc>>,
    pub outcome: Outcome,
    pub total_tokens: usize,
    pub total_wall_ms: u64,
    /// In execution order.
    pub nodes: Vec<NodeStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exports: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pending,
    Success,
    Failure,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NodeStatus {
    pub id: String,
    pub agent: String,
    pub sink: String,
    pub status: NodeState,
    pub tokens: usize,
    pub wall_ms: u64,
    pub started: Option<DateTime<Utc>>,
    pub ended: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `Pending -> Running -> {Completed | Failed}`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunManifest {
    pub fn new(run_id: &str, topic: &str, output_dir: &str) -> Self {
        Self {
            run_id: run_id.into(),
            topic: topic.into(),
            output_dir: output_dir.into(),
            started: Utc::now(),
            ended: None,
            outcome: Outcome::Pending,
            total_tokens: 0,
            total_wall_ms: 0,
            nodes: Vec::new(),
            exports: Vec::new(),
        }
    }

    pub fn add_node(&mut self, id: &str, agent: &str, sink: &str) {
        self.nodes.push(NodeStatus {
            id: id.into(),
            agent: agent.into(),
            sink: sink.into(),
            status: NodeState::Pending,
            tokens: 0,
            wall_ms: 0,
            started: None,
            ended: None,
            error: None,
        });
    }

    pub fn node(&self, id: &str) -> Option<&NodeStatus> {
        self.nodes.iter().find(|n| n.id == id)
    }

    fn node_mut(&mut self, id: &str) -> Option<&mut NodeStatus> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn start_node(&mut self, id: &str) {
        if let Some(node) = self.node_mut(id) {
            node.status = NodeState::Running;
            node.started = Some(Utc::now());
        }
    }

    pub fn complete_node(&mut self, id: &str, tokens: usize) {
        self.end_node(id, NodeState::Completed, tokens, None);
    }

    pub fn fail_node(&mut self, id: &str, error: &str) {
        self.end_node(id, NodeState::Failed, 0, Some(error.to_string()));
    }

    fn end_node(&mut self, id: &str, state: NodeState, tokens: usize, error: Option<String>) {
        if let Some(node) = self.node_mut(id) {
            let ended = Utc::now();
            node.status = state;
            node.tokens = tokens;
            node.error = error;
            node.ended = Some(ended);
            if let Some(start) = node.started {
                node.wall_ms = (ended - start).num_milliseconds().max(0) as u64;
            }
        }
    }

    pub fn count(&self, state: NodeState) -> usize {
        self.nodes.iter().filter(|n| n.status == state).count()
    }

    pub fn finalize(&mut self, outcome: Outcome) {
        let ended = Utc::now();
        self.outcome = outcome;
        self.ended = Some(ended);
        self.total_tokens = self.nodes.iter().map(|n| n.tokens).sum();
        self.total_wall_ms = (ended - self.started).num_milliseconds().max(0) as u64;
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// One-line summary for the log.
    pub fn summary_line(&self) -> String {
        format!(
            "{} | {} | {}/{} completed | {} tokens | {} ms",
            self.run_id,
            self.outcome,
            self.count(NodeState::Completed),
            self.nodes.len(),
            self.total_tokens,
            self.total_wall_ms,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_lifecycle() {
        let mut m = RunManifest::new("20260101T000000", "Login system", "outputs");
        m.add_node("requirements", "requirement_analyst", "01_requirements.txt");
        m.add_node("requirements_review", "technical_reviewer", "01a_requirements_review.txt");

        m.start_node("requirements");
        assert_eq!(m.node("requirements").unwrap().status, NodeState::Running);

        m.complete_node("requirements", 5000);
        assert_eq!(m.node("requirements").unwrap().tokens, 5000);
        assert_eq!(m.count(NodeState::Pending), 1);

        m.finalize(Outcome::Success);
        assert_eq!(m.outcome, Outcome::Success);
        assert_eq!(m.total_tokens, 5000);
        assert!(m.ended.is_some());
    }

    #[test]
    fn failed_node_keeps_error() {
        let mut m = RunManifest::new("r", "t", "outputs");
        m.add_node("a", "agent", "a.txt");
        m.start_node("a");
        m.fail_node("a", "rate limited");
        let node = m.node("a").unwrap();
        assert_eq!(node.status, NodeState::Failed);
        assert_eq!(node.error.as_deref(), Some("rate limited"));
    }

    #[test]
    fn manifest_yaml_roundtrip() {
        let mut m = RunManifest::new("42-test", "Test", "outputs");
        m.add_node("a", "agent", "a.txt");
        let yaml = m.to_yaml().unwrap();
        assert!(yaml.contains("42-test"));
        assert!(yaml.contains("pending"));
        let back = RunManifest::from_yaml(&yaml).unwrap();
        assert_eq!(back.nodes[0].sink, "a.txt");
    }

    #[test]
    fn summary_line_format() {
        let mut m = RunManifest::new("42-test", "Test purpose", "outputs");
        m.add_node("a", "agent", "a.txt");
        m.finalize(Outcome::Failure);
        let line = m.summary_line();
        assert!(line.contains("42-test"));
        assert!(line.contains("failure"));
        assert!(line.contains("0/1 completed"));
    }
}
