//! Pipeline configuration
//!
//! One explicit object per run, loaded from TOML at startup. A missing file
//! falls back to defaults; a malformed one is a configuration error, since a
//! run must never start from a half-read config.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Name of the model entry agents bind to unless told otherwise.
pub const DEFAULT_MODEL_KEY: &str = "default";

/// Topic used when the operator supplies none.
pub const DEFAULT_TOPIC: &str = "Design an AI-powered Document Verification System for a financial \
institution that automates the verification of KYC documents (such as Aadhar, PAN, Passport, \
Driving License) using OCR and computer vision techniques. The system should extract information \
from uploaded documents, validate them against the user's entered data, detect potential \
forgeries, and provide a confidence score. It should integrate with the bank's onboarding \
workflow and support a secure API for external integration.";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Run-scoped settings.
    pub run: RunSettings,
    /// Named model configurations. Agents refer to these by key.
    pub models: BTreeMap<String, ModelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Directory receiving one text file per task node plus the exports.
    /// Cleared of files at the start of every run.
    pub output_dir: PathBuf,
    /// Topic used when none is given on the command line.
    pub default_topic: String,
    /// Model key bound to every catalog agent.
    pub model: String,
    /// Produce the two `.docx` exports after the graph completes.
    pub export: bool,
    /// Where to write the YAML run manifest. Must lie outside `output_dir`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    #[default]
    Gemini,
}

impl ProviderKind {
    /// Environment variables consulted for the API key, in order.
    pub fn api_key_vars(&self) -> &'static [&'static str] {
        match self {
            Self::Anthropic => &["ANTHROPIC_API_KEY"],
            Self::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        }
    }

    /// Model used when a configuration switches provider without naming one.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => "claude-sonnet-4-5",
            Self::Gemini => "gemini-1.5-flash",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(Error::config(format!("unknown provider '{}'", other))),
        }
    }
}

/// One language-model client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub provider: ProviderKind,
    /// Model id as the provider spells it.
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Overrides the provider's endpoint (proxies, gateways, tests).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Request timeout enforced by the HTTP client.
    pub timeout_secs: u64,
}

// ============================================================
// Defaults
// ============================================================

impl Default for PipelineConfig {
    fn default() -> Self {
        let mut models = BTreeMap::new();
        models.insert(DEFAULT_MODEL_KEY.to_string(), ModelConfig::default());
        Self {
            run: RunSettings::default(),
            models,
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
            default_topic: DEFAULT_TOPIC.to_string(),
            model: DEFAULT_MODEL_KEY.to_string(),
            export: true,
            manifest: None,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            model: ProviderKind::Gemini.default_model().into(),
            temperature: 0.2,
            max_tokens: 8192,
            base_url: None,
            timeout_secs: 300,
        }
    }
}

impl ModelConfig {
    pub fn anthropic(model: impl Into<String>) -> Self {
        Self {
            provider: ProviderKind::Anthropic,
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn gemini(model: impl Into<String>) -> Self {
        Self {
            provider: ProviderKind::Gemini,
            model: model.into(),
            ..Default::default()
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl PipelineConfig {
    /// Load config from a TOML file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config at {} - using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Serialise as TOML (for `init-config`).
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("cannot serialise configuration: {}", e)))
    }

    pub fn model(&self, key: &str) -> Option<&ModelConfig> {
        self.models.get(key)
    }

    /// Reject configurations that cannot drive a run.
    pub fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(Error::config("no model configurations declared"));
        }
        if !self.models.contains_key(&self.run.model) {
            return Err(Error::config(format!(
                "run.model '{}' does not name a [models] entry",
                self.run.model
            )));
        }
        for (key, model) in &self.models {
            if model.model.trim().is_empty() {
                return Err(Error::config(format!("models.{}: empty model id", key)));
            }
            if !(0.0..=2.0).contains(&model.temperature) {
                return Err(Error::config(format!(
                    "models.{}: temperature {} outside 0.0..=2.0",
                    key, model.temperature
                )));
            }
            if model.max_tokens == 0 {
                return Err(Error::config(format!("models.{}: max_tokens must be > 0", key)));
            }
        }
        if let Some(manifest) = &self.run.manifest {
            if path_within(manifest, &self.run.output_dir) {
                return Err(Error::config(format!(
                    "run.manifest {} must not live inside the output directory",
                    manifest.display()
                )));
            }
        }
        Ok(())
    }
}

// ============================================================
// Paths
// ============================================================

/// Absolute form of `path` with `.` and `..` resolved lexically. Relative
/// paths are taken from the current directory; the filesystem is not read.
pub fn absolute_path(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// True when `path` names `dir` itself or something beneath it, however
/// either is spelled.
pub fn path_within(path: &Path, dir: &Path) -> bool {
    absolute_path(path).starts_with(absolute_path(dir))
}
