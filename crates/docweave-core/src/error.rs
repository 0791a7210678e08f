//! Error types for docweave

use thiserror::Error;

/// Every failure a pipeline run can surface.
///
/// `Configuration` and `CyclicOrUnknownDependency` are raised while the
/// registry and graph are being built, before any node runs. `ExternalCall`
/// aborts a run in progress. `Export` happens after all nodes completed and
/// never touches the per-node outputs.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("task '{node}' depends on '{dependency}', which is not declared before it")]
    CyclicOrUnknownDependency { node: String, dependency: String },

    #[error("task '{node}' failed (agent '{agent}'): {message}")]
    ExternalCall {
        node: String,
        agent: String,
        message: String,
    },

    #[error("export of '{document}' failed: {message}")]
    Export { document: String, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn dependency(node: impl Into<String>, dependency: impl Into<String>) -> Self {
        Self::CyclicOrUnknownDependency {
            node: node.into(),
            dependency: dependency.into(),
        }
    }

    pub fn external_call(
        node: impl Into<String>,
        agent: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ExternalCall {
            node: node.into(),
            agent: agent.into(),
            message: message.into(),
        }
    }

    pub fn export(document: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Export {
            document: document.into(),
            message: message.into(),
        }
    }

    /// True for errors detected before any node executes.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::CyclicOrUnknownDependency { .. } | Self::Toml(_)
        )
    }
}
