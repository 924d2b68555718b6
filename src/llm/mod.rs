// Chat-completion provider client
// Speaks the OpenAI-compatible chat API: plain completions plus
// tool-calling with a follow-up round carrying tool results


use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::ChatProviderConfig;

const DEFAULT_TIMEOUT_SECONDS: u64 = 120;
const DEFAULT_RETRY_ATTEMPTS: u32 = 2;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("no API credential configured for the chat provider")]
    MissingCredential,

    #[error("chat provider returned HTTP {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("chat response is missing the completion payload")]
    MalformedResponse,

    #[error("chat request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// One wire-format conversation entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// The assistant turn that requested tool calls, echoed back to the
    /// provider before the tool results.
    #[inline]
    pub fn assistant_tool_calls(content: Option<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content,
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    /// A tool result keyed by the call it answers.
    #[inline]
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object, exactly as the model produced it.
    pub arguments: String,
}

/// Tool advertised to the model: name, description, and a JSON-schema
/// object describing the parameters.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Parsed completion: plain content, requested tool calls, or both.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantTurn {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl AssistantTurn {
    #[inline]
    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Completion provider abstraction so the orchestrator can be driven by
/// a scripted double in tests.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<AssistantTurn, LlmError>;
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: Url,
    model: String,
    api_key: Option<String>,
    retry_attempts: u32,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallRequest>>,
}

impl ChatClient {
    #[inline]
    pub fn new(config: &ChatProviderConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
            .build()?;

        Ok(Self {
            http,
            base_url: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.resolve_api_key(),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    async fn request_completion(
        &self,
        request: &CompletionRequest<'_>,
    ) -> Result<CompletionResponse, LlmError> {
        let key = self.api_key.as_deref().ok_or(LlmError::MissingCredential)?;

        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!(
                "Chat completion attempt {}/{} ({} messages)",
                attempt,
                self.retry_attempts,
                request.messages.len()
            );

            let response = match self
                .http
                .post(self.base_url.as_str())
                .bearer_auth(key)
                .json(request)
                .send()
                .await
            {
                Ok(response) => response,
                Err(error) => {
                    warn!("Chat transport error: {}", error);
                    last_error = Some(LlmError::Transport(error));
                    self.backoff(attempt).await;
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                return response.json().await.map_err(|_| LlmError::MalformedResponse);
            }

            let body = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                warn!(
                    "Chat provider returned {} on attempt {}/{}",
                    status, attempt, self.retry_attempts
                );
                last_error = Some(LlmError::Provider {
                    status: status.as_u16(),
                    body,
                });
                self.backoff(attempt).await;
                continue;
            }

            return Err(LlmError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        Err(last_error.unwrap_or(LlmError::MalformedResponse))
    }

    async fn backoff(&self, attempt: u32) {
        if attempt < self.retry_attempts {
            let delay = Duration::from_millis(EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000);
            debug!("Waiting {:?} before retry", delay);
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ChatProvider for ChatClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<AssistantTurn, LlmError> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            tools: (!tools.is_empty()).then(|| tools.iter().map(wire_tool).collect()),
            tool_choice: (!tools.is_empty()).then_some("auto"),
        };

        let response = self.request_completion(&request).await?;
        turn_from_response(response)
    }
}

/// Wire form of a tool spec: `{"type": "function", "function": {...}}`.
fn wire_tool(spec: &ToolSpec) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": spec.name,
            "description": spec.description,
            "parameters": spec.parameters,
        }
    })
}

fn turn_from_response(response: CompletionResponse) -> Result<AssistantTurn, LlmError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(LlmError::MalformedResponse)?;

    Ok(AssistantTurn {
        content: choice.message.content,
        tool_calls: choice.message.tool_calls.unwrap_or_default(),
    })
}
