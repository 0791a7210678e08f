//! LLM Provider trait

use crate::types::{Completion, LlmRequest, StreamDelta};
use docweave_core::{ModelConfig, ProviderKind};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// LLM error types
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("empty response")]
    EmptyResponse,

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Stream type for LLM responses
pub type LlmStream = Pin<Box<dyn Stream<Item = LlmResult<StreamDelta>> + Send>>;

/// LLM Provider trait
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Stream a completion response.
    async fn complete_stream(&self, request: LlmRequest) -> LlmResult<LlmStream>;

    /// Run one request to completion and collect the streamed text.
    ///
    /// Any error delta aborts the collection; a response that ends without a
    /// single text delta is an `EmptyResponse`.
    async fn complete(&self, request: LlmRequest) -> LlmResult<Completion> {
        let mut stream = self.complete_stream(request).await?;
        let mut completion = Completion::default();

        while let Some(delta) = stream.next().await {
            match delta? {
                StreamDelta::Text(text) => completion.text.push_str(&text),
                StreamDelta::Done { stop_reason, usage } => {
                    if stop_reason.is_some() {
                        completion.stop_reason = stop_reason;
                    }
                    if usage.is_some() {
                        completion.usage = usage;
                    }
                }
                StreamDelta::Error(e) => return Err(LlmError::StreamError(e)),
            }
        }

        if completion.text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(completion)
    }
}

/// Build the provider client a model configuration asks for.
pub fn provider_for(config: &ModelConfig, api_key: &str) -> LlmResult<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match config.provider {
        ProviderKind::Anthropic => {
            let mut p = crate::AnthropicProvider::new(api_key, config.timeout_secs)?;
            if let Some(url) = &config.base_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        ProviderKind::Gemini => {
            let mut p = crate::GeminiProvider::new(api_key, config.timeout_secs)?;
            if let Some(url) = &config.base_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
    };
    Ok(provider)
}
