//! docweave-pipeline - sequential multi-agent document pipeline
//!
//! Agents are registered against model bindings, tasks form a graph whose
//! dependencies only point backwards, and the executor walks that graph one
//! node at a time, writing one text file per node. The executor is code;
//! agents do the writing.

pub mod agents;
pub mod catalog;
pub mod context;
pub mod executor;
pub mod export;
pub mod graph;
pub mod manifest;
pub mod resource;
pub mod template;

pub use agents::{Agent, AgentRegistry, AgentSpec, ModelBinding};
pub use context::{ExecutionContext, TaskOutput};
pub use executor::{build_prompt, Executor, NodePrompt, RunReport};
pub use export::{classify_line, format_document, Block, Document, ExportSpec};
pub use graph::{TaskGraph, TaskNode, TaskSpec};
pub use manifest::{NodeState, Outcome, RunManifest};
pub use resource::{LocalFsDriver, ResourceDriver};
pub use template::{render, TemplateVars, VarSet};
