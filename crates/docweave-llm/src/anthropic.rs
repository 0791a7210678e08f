//! Anthropic Claude API provider with SSE streaming

use crate::provider::{LlmError, LlmProvider, LlmResult, LlmStream};
use crate::sse::{sse_events, SseEvent};
use crate::types::{LlmRequest, StreamDelta, Usage};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> LlmResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str { "anthropic" }

    async fn complete_stream(&self, request: LlmRequest) -> LlmResult<LlmStream> {
        let body = AnthropicRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(|m| AnthropicMessage {
                role: m.role.clone(),
                content: m.content.clone(),
            }).collect(),
            max_tokens: request.max_tokens.unwrap_or(8192),
            stream: true,
            system: request.system.clone(),
            temperature: request.temperature,
        };

        debug!("Anthropic request: model={}", body.model);

        let response = self.client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Anthropic error {}: {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => LlmError::AuthFailed(error_text),
                429 => LlmError::RateLimited { retry_after_ms: 60000 },
                _ => LlmError::RequestFailed(format!("{}: {}", status, error_text)),
            });
        }

        let stream = sse_events(response.bytes_stream())
            .filter_map(|event| async move { map_event(event).transpose() });
        Ok(Box::pin(stream))
    }
}

/// Translate one SSE frame into a delta. Frames that carry nothing the
/// caller needs (pings, block boundaries) map to `None`.
pub(crate) fn map_event(event: LlmResult<SseEvent>) -> LlmResult<Option<StreamDelta>> {
    let event = event?;
    match event.event.as_str() {
        "content_block_delta" => {
            let data: ContentBlockDelta = serde_json::from_str(&event.data)
                .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
            Ok(match data.delta {
                DeltaType::TextDelta { text } => Some(StreamDelta::Text(text)),
                DeltaType::Other => None,
            })
        }
        "message_delta" => {
            let data: MessageDelta = serde_json::from_str(&event.data)
                .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
            if let Some(stop_reason) = &data.delta.stop_reason {
                debug!("Message complete: stop_reason={}", stop_reason);
            }
            Ok(Some(StreamDelta::Done {
                stop_reason: data.delta.stop_reason,
                usage: data.usage.map(|u| Usage {
                    input_tokens: u.input_tokens.unwrap_or(0),
                    output_tokens: u.output_tokens,
                }),
            }))
        }
        "error" => {
            let message = serde_json::from_str::<ErrorEvent>(&event.data)
                .map(|e| e.error.message)
                .unwrap_or(event.data);
            Err(LlmError::StreamError(message))
        }
        _ => Ok(None),
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ContentBlockDelta {
    delta: DeltaType,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum DeltaType {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct MessageDelta {
    delta: MessageDeltaContent,
    usage: Option<DeltaUsage>,
}

#[derive(Deserialize)]
struct MessageDeltaContent {
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct DeltaUsage {
    input_tokens: Option<u32>,
    output_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorEvent {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: &str, data: &str) -> LlmResult<SseEvent> {
        Ok(SseEvent { event: event.into(), data: data.into() })
    }

    #[test]
    fn text_delta_maps_to_text() {
        let delta = map_event(frame(
            "content_block_delta",
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
        ))
        .unwrap();
        assert!(matches!(delta, Some(StreamDelta::Text(t)) if t == "Hi"));
    }

    #[test]
    fn thinking_delta_ignored() {
        let delta = map_event(frame(
            "content_block_delta",
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"hmm"}}"#,
        ))
        .unwrap();
        assert!(delta.is_none());
    }

    #[test]
    fn message_delta_carries_usage() {
        let delta = map_event(frame(
            "message_delta",
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":42}}"#,
        ))
        .unwrap();
        match delta {
            Some(StreamDelta::Done { stop_reason, usage }) => {
                assert_eq!(stop_reason.as_deref(), Some("end_turn"));
                assert_eq!(usage.unwrap().output_tokens, 42);
            }
            other => panic!("Expected Done, got {:?}", other),
        }
    }

    #[test]
    fn error_event_is_stream_error() {
        let err = map_event(frame(
            "error",
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        ))
        .unwrap_err();
        assert!(err.to_string().contains("Overloaded"));
    }

    #[test]
    fn pings_ignored() {
        assert!(map_event(frame("ping", "{}")).unwrap().is_none());
    }
}
