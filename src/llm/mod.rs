//! Chat-completion client abstraction.
//!
//! Provides a unified interface for OpenAI-compatible providers, including
//! tool-calling requests and responses.

mod lmstudio;
mod openai;

pub use lmstudio::LmStudioClient;
pub use openai::OpenAiClient;

use crate::{Error, Result};
use serde_json::json;
use std::time::Duration;

/// A message in a chat conversation.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// Message role: "system", "user", "assistant" or "tool".
    pub role: &'static str,
    /// Text content, when present.
    pub content: Option<String>,
    /// Tool invocations requested by an assistant message.
    pub tool_calls: Vec<ToolCallRequest>,
    /// For tool-result messages, the id of the call being answered.
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Creates an assistant message echoing requested tool calls.
    #[must_use]
    pub fn assistant(content: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: "assistant",
            content,
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Creates a tool-result message.
    #[must_use]
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool",
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A tool the model may invoke, described by a JSON schema.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    /// Tool name as the model will reference it.
    pub name: String,
    /// What the tool does (shown to the model).
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: serde_json::Value,
}

/// Tool-choice directive for a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolChoice {
    /// The model decides whether to call tools.
    #[default]
    Auto,
    /// Tool calls are forbidden; the model must answer in text.
    None,
}

impl ToolChoice {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::None => "none",
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    /// Provider-assigned call id, echoed back with the result.
    pub id: String,
    /// Requested tool name.
    pub name: String,
    /// Arguments as a raw JSON string, exactly as the model produced them.
    pub arguments: String,
}

/// A chat-completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Conversation so far.
    pub messages: Vec<ChatMessage>,
    /// Tools offered to the model (empty for plain completions).
    pub tools: Vec<ToolSpec>,
    /// Tool-choice directive.
    pub tool_choice: ToolChoice,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

/// A chat-completion response: text, tool calls, or both.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated text, when present.
    pub content: Option<String>,
    /// Tool invocations the model wants executed.
    pub tool_calls: Vec<ToolCallRequest>,
}

impl CompletionResponse {
    /// Whether the model requested any tool calls.
    #[must_use]
    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Trait for chat-completion providers.
pub trait ChatCompletion: Send + Sync {
    /// The provider name.
    fn name(&self) -> &'static str;

    /// Runs a chat completion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Completion`] if the provider is unreachable or
    /// returns an error status.
    fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;

    /// Convenience wrapper for plain system+user text completions.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails or produces no content.
    fn complete_text(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let request = CompletionRequest {
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            tools: Vec::new(),
            tool_choice: ToolChoice::Auto,
            temperature,
            max_tokens,
        };
        let response = self.complete(&request)?;
        response.content.ok_or_else(|| Error::Completion {
            provider: self.name().to_string(),
            cause: "response carried no text content".to_string(),
        })
    }
}

/// HTTP client configuration for LLM providers.
#[derive(Debug, Clone, Copy)]
pub struct LlmHttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for LlmHttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 120_000,
            connect_timeout_ms: 3_000,
        }
    }
}

impl LlmHttpConfig {
    /// Loads HTTP configuration from config file settings.
    #[must_use]
    pub fn from_config(config: &crate::config::LlmConfig) -> Self {
        let mut settings = Self::default();
        if let Some(timeout_ms) = config.timeout_ms {
            settings.timeout_ms = timeout_ms;
        }
        if let Some(connect_timeout_ms) = config.connect_timeout_ms {
            settings.connect_timeout_ms = connect_timeout_ms;
        }
        settings
    }
}

/// Builds a blocking HTTP client for LLM requests with configured timeouts.
#[must_use]
pub fn build_http_client(config: LlmHttpConfig) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build LLM HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}

/// Builds an OpenAI-compatible chat-completions request body.
pub(crate) fn build_chat_body(model: &str, request: &CompletionRequest) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = request.messages.iter().map(message_to_wire).collect();

    let mut body = json!({
        "model": model,
        "messages": messages,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
        "stream": false,
    });

    if !request.tools.is_empty() {
        let tools: Vec<serde_json::Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();
        body["tools"] = json!(tools);
        body["tool_choice"] = json!(request.tool_choice.as_str());
    }

    body
}

fn message_to_wire(msg: &ChatMessage) -> serde_json::Value {
    let mut wire = json!({ "role": msg.role });
    if let Some(content) = &msg.content {
        wire["content"] = json!(content);
    }
    if !msg.tool_calls.is_empty() {
        let calls: Vec<serde_json::Value> = msg
            .tool_calls
            .iter()
            .map(|tc| {
                json!({
                    "id": tc.id,
                    "type": "function",
                    "function": { "name": tc.name, "arguments": tc.arguments }
                })
            })
            .collect();
        wire["tool_calls"] = json!(calls);
    }
    if let Some(id) = &msg.tool_call_id {
        wire["tool_call_id"] = json!(id);
    }
    wire
}

/// Parses an OpenAI-compatible chat-completions response body.
pub(crate) fn parse_chat_response(
    provider: &'static str,
    body: &serde_json::Value,
) -> Result<CompletionResponse> {
    let message = body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| Error::Completion {
            provider: provider.to_string(),
            cause: "no choices in response".to_string(),
        })?;

    let content = message
        .get("content")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .filter(|s| !s.is_empty());

    let tool_calls = message
        .get("tool_calls")
        .and_then(serde_json::Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .filter_map(|tc| {
                    let function = tc.get("function")?;
                    Some(ToolCallRequest {
                        id: tc.get("id").and_then(serde_json::Value::as_str)?.to_string(),
                        name: function
                            .get("name")
                            .and_then(serde_json::Value::as_str)?
                            .to_string(),
                        arguments: function
                            .get("arguments")
                            .and_then(serde_json::Value::as_str)
                            .unwrap_or("{}")
                            .to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(CompletionResponse {
        content,
        tool_calls,
    })
}
