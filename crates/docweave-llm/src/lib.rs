//! docweave LLM - provider adapters with streaming support

pub mod anthropic;
pub mod gemini;
pub mod mock;
pub mod provider;
pub mod sse;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use mock::{MockBehavior, ScriptedProvider};
pub use provider::{provider_for, LlmError, LlmProvider, LlmResult, LlmStream};
pub use types::*;
