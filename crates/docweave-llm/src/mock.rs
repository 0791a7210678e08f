//! ScriptedProvider - deterministic LLM responses for tests and dry runs
//!
//! Implements `LlmProvider` without touching the network. Every request is
//! recorded so tests can inspect exactly what a pipeline sent.

use crate::provider::{LlmError, LlmProvider, LlmResult, LlmStream};
use crate::types::{LlmRequest, StreamDelta, Usage};
use async_stream::stream;
use std::sync::Arc;
use tokio::sync::Mutex;

type Responder = dyn Fn(&LlmRequest) -> MockBehavior + Send + Sync;

/// Mock behavior configuration
#[derive(Clone, Debug)]
pub enum MockBehavior {
    /// Return a text-only response
    Text(String),
    /// Echo the last user message back
    Echo,
    /// Fail the request before any stream is produced
    Error(String),
    /// Stream some text, then fail mid-stream
    StreamError { partial: String, message: String },
}

/// A sequence of behaviors - each call pops the next one.
/// If the sequence is exhausted, the default behavior applies.
pub struct ScriptedProvider {
    behaviors: Mutex<Vec<MockBehavior>>,
    default_behavior: MockBehavior,
    responder: Option<Arc<Responder>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedProvider {
    /// Create a mock that always returns the same behavior
    pub fn constant(behavior: MockBehavior) -> Self {
        Self {
            behaviors: Mutex::new(Vec::new()),
            default_behavior: behavior,
            responder: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock with a sequence of behaviors (consumed in order)
    pub fn sequence(behaviors: Vec<MockBehavior>) -> Self {
        Self {
            behaviors: Mutex::new(behaviors),
            default_behavior: MockBehavior::Text("(mock: sequence exhausted)".into()),
            responder: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Decide each response from the request itself.
    pub fn from_fn(f: impl Fn(&LlmRequest) -> MockBehavior + Send + Sync + 'static) -> Self {
        Self {
            behaviors: Mutex::new(Vec::new()),
            default_behavior: MockBehavior::Echo,
            responder: Some(Arc::new(f)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Get the number of calls made
    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    /// Every request received so far, in order.
    pub async fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().await.clone()
    }

    async fn next_behavior(&self, request: &LlmRequest) -> MockBehavior {
        self.requests.lock().await.push(request.clone());

        if let Some(responder) = &self.responder {
            return responder(request);
        }
        let mut behaviors = self.behaviors.lock().await;
        if behaviors.is_empty() {
            self.default_behavior.clone()
        } else {
            behaviors.remove(0)
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str { "scripted" }

    async fn complete_stream(&self, request: LlmRequest) -> LlmResult<LlmStream> {
        let behavior = self.next_behavior(&request).await;
        let echo = request.last_user_text().unwrap_or_default().to_string();

        let text = match behavior {
            MockBehavior::Error(message) => return Err(LlmError::RequestFailed(message)),
            MockBehavior::StreamError { partial, message } => {
                return Ok(Box::pin(stream! {
                    yield Ok(StreamDelta::Text(partial));
                    yield Err(LlmError::StreamError(message));
                }));
            }
            MockBehavior::Text(text) => text,
            MockBehavior::Echo => echo,
        };

        Ok(Box::pin(stream! {
            let chars: Vec<char> = text.chars().collect();
            // Stream text in chunks like a real LLM
            for chunk in chars.chunks(20) {
                yield Ok(StreamDelta::Text(chunk.iter().collect()));
            }
            yield Ok(StreamDelta::Done {
                stop_reason: Some("end_turn".into()),
                usage: Some(Usage {
                    input_tokens: 0,
                    output_tokens: (chars.len() / 4) as u32,
                }),
            });
        }))
    }
}
