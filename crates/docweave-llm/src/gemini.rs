//! Google Gemini provider (streamGenerateContent over SSE)

use crate::provider::{LlmError, LlmProvider, LlmResult, LlmStream};
use crate::sse::{sse_events, SseEvent};
use crate::types::{LlmRequest, StreamDelta, Usage};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> LlmResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: GEMINI_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url.trim_end_matches('/'),
            model
        )
    }
}

#[async_trait::async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str { "gemini" }

    async fn complete_stream(&self, request: LlmRequest) -> LlmResult<LlmStream> {
        let body = GeminiRequest {
            system_instruction: request.system.as_ref().map(|s| GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: s.clone() }],
            }),
            contents: request.messages.iter().map(|m| GeminiContent {
                // Gemini calls the assistant side "model"
                role: Some(if m.role == "assistant" { "model".into() } else { m.role.clone() }),
                parts: vec![GeminiPart { text: m.content.clone() }],
            }).collect(),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        };

        debug!("Gemini request: model={}", request.model);

        let response = self.client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini error {}: {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => LlmError::AuthFailed(error_text),
                429 => LlmError::RateLimited { retry_after_ms: 60000 },
                _ => LlmError::RequestFailed(format!("{}: {}", status, error_text)),
            });
        }

        let stream = sse_events(response.bytes_stream())
            .flat_map(|event| futures::stream::iter(map_chunk(event)));
        Ok(Box::pin(stream))
    }
}

/// Each SSE chunk is a full `GenerateContentResponse`; it may carry text,
/// a finish reason, usage metadata, or a block reason.
pub(crate) fn map_chunk(event: LlmResult<SseEvent>) -> Vec<LlmResult<StreamDelta>> {
    let event = match event {
        Ok(e) => e,
        Err(e) => return vec![Err(e)],
    };
    let chunk: GenerateResponse = match serde_json::from_str(&event.data) {
        Ok(c) => c,
        Err(e) => return vec![Err(LlmError::InvalidResponse(e.to_string()))],
    };

    if let Some(err) = chunk.error {
        return vec![Err(LlmError::StreamError(err.message))];
    }
    if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
        return vec![Err(LlmError::RequestFailed(format!("prompt blocked: {}", reason)))];
    }

    let mut deltas = Vec::new();
    let mut finish_reason = None;
    for candidate in chunk.candidates.unwrap_or_default() {
        if let Some(content) = candidate.content {
            for part in content.parts.unwrap_or_default() {
                if let Some(text) = part.text {
                    deltas.push(Ok(StreamDelta::Text(text)));
                }
            }
        }
        if candidate.finish_reason.is_some() {
            finish_reason = candidate.finish_reason;
        }
    }

    if finish_reason.is_some() || chunk.usage_metadata.is_some() {
        deltas.push(Ok(StreamDelta::Done {
            stop_reason: finish_reason,
            usage: chunk.usage_metadata.map(|u| Usage {
                input_tokens: u.prompt_token_count.unwrap_or(0),
                output_tokens: u.candidates_token_count.unwrap_or(0),
            }),
        }));
    }
    deltas
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    usage_metadata: Option<UsageMetadata>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(json: &str) -> LlmResult<SseEvent> {
        Ok(SseEvent { event: String::new(), data: json.into() })
    }

    #[test]
    fn text_chunk() {
        let out = map_chunk(data(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello"}],"role":"model"}}]}"#,
        ));
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], Ok(StreamDelta::Text(t)) if t == "Hello"));
    }

    #[test]
    fn final_chunk_has_usage() {
        let out = map_chunk(data(
            r#"{"candidates":[{"content":{"parts":[{"text":"."}]},"finishReason":"STOP"}],
                "usageMetadata":{"promptTokenCount":10,"candidatesTokenCount":3}}"#,
        ));
        assert_eq!(out.len(), 2);
        match &out[1] {
            Ok(StreamDelta::Done { stop_reason, usage }) => {
                assert_eq!(stop_reason.as_deref(), Some("STOP"));
                assert_eq!(usage.as_ref().unwrap().input_tokens, 10);
            }
            other => panic!("Expected Done, got {:?}", other),
        }
    }

    #[test]
    fn blocked_prompt_is_error() {
        let out = map_chunk(data(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#));
        assert!(matches!(&out[0], Err(LlmError::RequestFailed(m)) if m.contains("SAFETY")));
    }

    #[test]
    fn garbage_is_invalid_response() {
        let out = map_chunk(data("not json"));
        assert!(matches!(&out[0], Err(LlmError::InvalidResponse(_))));
    }

    #[test]
    fn endpoint_uses_sse() {
        let p = GeminiProvider::new("k", 5).unwrap().with_base_url("http://localhost:1/v1beta/");
        assert_eq!(
            p.endpoint("gemini-1.5-flash"),
            "http://localhost:1/v1beta/models/gemini-1.5-flash:streamGenerateContent?alt=sse"
        );
    }
}
