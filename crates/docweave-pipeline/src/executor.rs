//! Pipeline Executor - walks the task graph in declaration order.
//!
//! For every node the executor (code, not the model) prepares everything the
//! agent sees:
//! - SYSTEM: who the agent is (role, persona, goal with the topic filled in)
//! - CONTEXT: the outputs of the node's dependencies, in declared order
//! - TASK: the description and the expected-output criteria
//!
//! One request per node, awaited before the next node starts. The first
//! failure ends the run; nothing after it executes.

use crate::agents::Agent;
use crate::context::{ExecutionContext, TaskOutput};
use crate::export::{self, ExportSpec};
use crate::graph::{TaskGraph, TaskNode};
use crate::manifest::{Outcome, RunManifest};
use crate::resource::ResourceDriver;
use crate::template::{render, TemplateVars};
use chrono::Utc;
use docweave_core::{path_within, Error, Result};
use docweave_llm::{LlmMessage, LlmRequest};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// What a finished run hands back.
#[derive(Debug)]
pub struct RunReport {
    pub manifest: RunManifest,
    pub context: ExecutionContext,
}

/// The prompt pair prepared for one node.
#[derive(Clone, Debug, PartialEq)]
pub struct NodePrompt {
    pub system: String,
    pub user: String,
}

pub struct Executor {
    graph: TaskGraph,
    driver: Arc<dyn ResourceDriver>,
    exports: Vec<ExportSpec>,
    manifest_path: Option<PathBuf>,
}

impl Executor {
    pub fn new(graph: TaskGraph, driver: Arc<dyn ResourceDriver>) -> Self {
        Self {
            graph,
            driver,
            exports: Vec::new(),
            manifest_path: None,
        }
    }

    /// Attach post-processing exports. Each must read an existing node's
    /// sink and write to a path no node writes to.
    pub fn with_exports(mut self, exports: Vec<ExportSpec>) -> Result<Self> {
        for spec in &exports {
            if !self.graph.nodes().any(|n| n.output_sink == spec.source) {
                return Err(Error::config(format!(
                    "export '{}' reads '{}', which no task writes",
                    spec.document.display(),
                    spec.source.display()
                )));
            }
            if self.graph.nodes().any(|n| n.output_sink == spec.document) {
                return Err(Error::config(format!(
                    "export '{}' would overwrite a task output",
                    spec.document.display()
                )));
            }
        }
        self.exports = exports;
        Ok(self)
    }

    /// Also write the run manifest as YAML to `path` after every node. The
    /// path must be outside the driver's location; `run` rejects it otherwise.
    pub fn with_manifest(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = Some(path.into());
        self
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn exports(&self) -> &[ExportSpec] {
        &self.exports
    }

    /// Run every node. Returns the first error after recording it in the
    /// manifest; later nodes stay `Pending`.
    pub async fn run(&self, vars: TemplateVars) -> Result<RunReport> {
        vars.covers(self.graph.registry().variables())?;
        if let Some(path) = &self.manifest_path {
            // prepare() clears the output location.
            if path_within(path, Path::new(&self.driver.location())) {
                return Err(Error::config(format!(
                    "manifest {} must not live inside the output directory {}",
                    path.display(),
                    self.driver.location()
                )));
            }
        }

        let run_id = Utc::now().format("%Y%m%dT%H%M%S").to_string();
        let mut manifest = RunManifest::new(&run_id, &vars.topic, &self.driver.location());
        for node in self.graph.nodes() {
            manifest.add_node(
                node.id.as_str(),
                node.agent.as_str(),
                &node.output_sink.display().to_string(),
            );
        }
        self.write_manifest(&manifest).await?;

        self.driver.prepare().await?;

        info!(
            run_id = %run_id,
            nodes = self.graph.len(),
            output = %self.driver.location(),
            "run started"
        );

        let mut context = ExecutionContext::new(vars);
        for node in self.graph.nodes() {
            if let Err(e) = self.execute_node(node, &mut context, &mut manifest).await {
                manifest.fail_node(node.id.as_str(), &e.to_string());
                error!(run_id = %run_id, node = %node.id, error = %e, "node failed - aborting run");
                manifest.finalize(Outcome::Failure);
                if let Err(write_err) = self.write_manifest(&manifest).await {
                    error!(error = %write_err, "could not write final manifest");
                }
                return Err(e);
            }
            self.write_manifest(&manifest).await?;
        }

        manifest.finalize(Outcome::Success);
        self.write_manifest(&manifest).await?;
        info!(run_id = %run_id, summary = %manifest.summary_line(), "run complete");

        Ok(RunReport { manifest, context })
    }

    /// Produce every attached export from the files the run wrote.
    pub async fn export(&self, report: &mut RunReport) -> Result<Vec<PathBuf>> {
        let written = export::export_all(self.driver.as_ref(), &self.exports).await?;
        report.manifest.exports = written.iter().map(|p| p.display().to_string()).collect();
        self.write_manifest(&report.manifest).await?;
        Ok(written)
    }

    async fn execute_node(
        &self,
        node: &TaskNode,
        context: &mut ExecutionContext,
        manifest: &mut RunManifest,
    ) -> Result<()> {
        manifest.start_node(node.id.as_str());
        let started = Instant::now();

        let registry = self.graph.registry();
        let agent = registry.resolve(&node.agent)?;
        let binding = registry.binding(agent)?;
        info!(node = %node.id, agent = %agent.id, "executing node");

        let resolved = context.resolve_context(&node.dependencies)?;
        let prompt = build_prompt(agent, node, &resolved, &context.vars)?;
        debug!(
            node = %node.id,
            context_bytes = resolved.len(),
            delegation = agent.allow_delegation,
            "prompt prepared"
        );

        let request = LlmRequest {
            model: binding.config.model.clone(),
            messages: vec![LlmMessage::user(prompt.user)],
            max_tokens: Some(binding.config.max_tokens),
            temperature: Some(binding.config.temperature),
            system: Some(prompt.system),
        };

        let completion = binding.provider.complete(request).await.map_err(|e| {
            Error::external_call(node.id.as_str(), agent.id.as_str(), e.to_string())
        })?;

        let written_to = self
            .driver
            .write(&node.output_sink, completion.text.as_bytes())
            .await?;

        let tokens = completion
            .usage
            .as_ref()
            .map(|u| (u.input_tokens + u.output_tokens) as usize)
            .unwrap_or(completion.text.len() / 4);

        info!(
            node = %node.id,
            bytes = completion.text.len(),
            tokens,
            wall_ms = started.elapsed().as_millis() as u64,
            path = %written_to.display(),
            "node completed"
        );

        context.record(TaskOutput {
            node_id: node.id.clone(),
            text: completion.text,
            written_to,
        })?;
        manifest.complete_node(node.id.as_str(), tokens);
        Ok(())
    }

    async fn write_manifest(&self, manifest: &RunManifest) -> Result<()> {
        let Some(path) = &self.manifest_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, manifest.to_yaml()?).await?;
        Ok(())
    }

    /// Human-readable listing of agents, nodes and exports (dry run).
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let registry = self.graph.registry();
        let _ = writeln!(out, "Agents ({}):", registry.len());
        for agent in registry.agents() {
            let _ = writeln!(
                out,
                "  {:<22} {} [model={}, delegation={}]",
                agent.id,
                agent.role,
                agent.model,
                if agent.allow_delegation { "on" } else { "off" }
            );
        }
        let _ = writeln!(out, "\nTasks ({}):", self.graph.len());
        for (i, node) in self.graph.nodes().enumerate() {
            let deps: Vec<&str> = node.dependencies.iter().map(|d| d.as_str()).collect();
            let _ = writeln!(
                out,
                "  {:>2}. {:<20} -> {:<30} agent={}{}",
                i + 1,
                node.id,
                node.output_sink.display(),
                node.agent,
                if deps.is_empty() {
                    String::new()
                } else {
                    format!(" after [{}]", deps.join(", "))
                }
            );
        }
        if !self.exports.is_empty() {
            let _ = writeln!(out, "\nExports ({}):", self.exports.len());
            for spec in &self.exports {
                let _ = writeln!(
                    out,
                    "  {} -> {} \"{}\"",
                    spec.source.display(),
                    spec.document.display(),
                    spec.title
                );
            }
        }
        out
    }
}

/// Build the system and user messages for one node.
pub fn build_prompt(
    agent: &Agent,
    node: &TaskNode,
    resolved_context: &str,
    vars: &TemplateVars,
) -> Result<NodePrompt> {
    let role = render(&agent.role, vars)?;
    let persona = render(&agent.persona, vars)?;
    let goal = render(&agent.goal_template, vars)?;
    let description = render(&node.description_template, vars)?;
    let expected = render(&node.expected_output_template, vars)?;

    let mut system = format!("You are {}.", role.trim_end_matches('.'));
    if !persona.trim().is_empty() {
        system.push_str("\n\n");
        system.push_str(persona.trim());
    }
    let _ = write!(system, "\n\nYour personal goal is: {}", goal.trim());

    let mut task = description.trim().to_string();
    if !expected.trim().is_empty() {
        let _ = write!(
            task,
            "\n\nThis is the expected criteria for your final answer: {}\n\
             You MUST return the actual complete content as the final answer, not a summary.",
            expected.trim()
        );
    }

    let user = if resolved_context.is_empty() {
        task
    } else {
        format!("{}\n\n---\n\n{}", resolved_context, task)
    };

    Ok(NodePrompt { system, user })
}
