//! docweave-core - shared ids, error taxonomy, and run configuration

pub mod config;
pub mod error;
pub mod types;

pub use config::{absolute_path, path_within, ModelConfig, PipelineConfig, ProviderKind, RunSettings};
pub use error::{Error, Result};
pub use types::*;
