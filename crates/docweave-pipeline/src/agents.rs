//! Agent Registry - named actors bound to a model configuration.
//!
//! The registry owns the model bindings handed to it at construction; there
//! is no process-wide client. Agents are immutable once registered.

use crate::template::VarSet;
use docweave_core::{AgentId, Error, ModelConfig, Result};
use docweave_llm::{provider_for, LlmProvider};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A model configuration plus the client that serves it.
#[derive(Clone)]
pub struct ModelBinding {
    pub config: ModelConfig,
    pub provider: Arc<dyn LlmProvider>,
}

impl ModelBinding {
    pub fn new(config: ModelConfig, provider: Arc<dyn LlmProvider>) -> Self {
        Self { config, provider }
    }

    /// Build the real provider client for `config`.
    pub fn connect(config: ModelConfig, api_key: &str) -> Result<Self> {
        let provider = provider_for(&config, api_key)
            .map_err(|e| Error::config(format!("cannot create {} client: {}", config.provider, e)))?;
        Ok(Self { config, provider })
    }
}

impl std::fmt::Debug for ModelBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBinding")
            .field("config", &self.config)
            .field("provider", &self.provider.name())
            .finish()
    }
}

/// What a caller supplies to register an agent.
#[derive(Clone, Debug)]
pub struct AgentSpec {
    pub id: String,
    pub role: String,
    pub goal_template: String,
    pub persona: String,
    pub allow_delegation: bool,
    /// Key into the registry's model table.
    pub model: String,
}

impl AgentSpec {
    pub fn new(id: &str, role: &str, goal_template: &str, persona: &str) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            goal_template: goal_template.into(),
            persona: persona.into(),
            allow_delegation: false,
            model: docweave_core::config::DEFAULT_MODEL_KEY.into(),
        }
    }

    pub fn delegating(mut self, allow: bool) -> Self {
        self.allow_delegation = allow;
        self
    }

    pub fn on_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// A registered agent.
#[derive(Clone, Debug)]
pub struct Agent {
    pub id: AgentId,
    pub role: String,
    pub goal_template: String,
    pub persona: String,
    /// Carried and reported; no cross-agent calls are made.
    pub allow_delegation: bool,
    pub model: String,
}

pub struct AgentRegistry {
    models: BTreeMap<String, ModelBinding>,
    variables: VarSet,
    agents: Vec<Agent>,
    index: HashMap<AgentId, usize>,
}

impl AgentRegistry {
    pub fn new(models: BTreeMap<String, ModelBinding>, variables: VarSet) -> Self {
        Self {
            models,
            variables,
            agents: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Registry whose only model is bound under the default key.
    pub fn single_model(binding: ModelBinding, variables: VarSet) -> Self {
        let mut models = BTreeMap::new();
        models.insert(docweave_core::config::DEFAULT_MODEL_KEY.to_string(), binding);
        Self::new(models, variables)
    }

    pub fn register(&mut self, spec: AgentSpec) -> Result<AgentId> {
        let id = AgentId::new(spec.id.as_str());
        if spec.id.trim().is_empty() {
            return Err(Error::config("agent id must not be empty"));
        }
        if self.index.contains_key(&id) {
            return Err(Error::config(format!("agent '{}' is already registered", id)));
        }
        if !self.models.contains_key(&spec.model) {
            return Err(Error::config(format!(
                "agent '{}' names unknown model configuration '{}'",
                id, spec.model
            )));
        }
        let owner = format!("agent '{}'", id);
        self.variables.check(&owner, &spec.goal_template)?;
        self.variables.check(&owner, &spec.persona)?;
        self.variables.check(&owner, &spec.role)?;

        tracing::debug!(agent = %id, model = %spec.model, "registered agent");
        self.index.insert(id.clone(), self.agents.len());
        self.agents.push(Agent {
            id: id.clone(),
            role: spec.role,
            goal_template: spec.goal_template,
            persona: spec.persona,
            allow_delegation: spec.allow_delegation,
            model: spec.model,
        });
        Ok(id)
    }

    pub fn resolve(&self, id: &AgentId) -> Result<&Agent> {
        self.index
            .get(id)
            .map(|&i| &self.agents[i])
            .ok_or_else(|| Error::config(format!("agent '{}' is not registered", id)))
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.index.contains_key(id)
    }

    /// The model binding an agent was registered against.
    pub fn binding(&self, agent: &Agent) -> Result<&ModelBinding> {
        self.models.get(&agent.model).ok_or_else(|| {
            Error::config(format!("model configuration '{}' is not bound", agent.model))
        })
    }

    pub fn variables(&self) -> &VarSet {
        &self.variables
    }

    /// Agents in registration order.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
