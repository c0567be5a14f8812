//! `OpenAI` client.

use super::{
    ChatCompletion, CompletionRequest, CompletionResponse, LlmHttpConfig, build_chat_body,
    build_http_client, parse_chat_response,
};
use crate::{Error, Result};

/// `OpenAI` chat-completions client.
pub struct OpenAiClient {
    /// API endpoint.
    endpoint: String,
    /// Model to use.
    model: String,
    /// API key.
    api_key: Option<String>,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

impl OpenAiClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    /// Creates a new `OpenAI` client, reading the key from `OPENAI_API_KEY`.
    #[must_use]
    pub fn new() -> Self {
        let endpoint = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| Self::DEFAULT_ENDPOINT.to_string());
        let model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| Self::DEFAULT_MODEL.to_string());
        let api_key = std::env::var("OPENAI_API_KEY").ok();

        Self {
            endpoint,
            model,
            api_key,
            client: build_http_client(LlmHttpConfig::default()),
        }
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets HTTP client timeouts.
    #[must_use]
    pub fn with_http_config(mut self, config: LlmHttpConfig) -> Self {
        self.client = build_http_client(config);
        self
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatCompletion for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let api_key = self.api_key.as_ref().ok_or_else(|| Error::Completion {
            provider: "openai".to_string(),
            cause: "OPENAI_API_KEY is not set".to_string(),
        })?;

        let body = build_chat_body(&self.model, request);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                tracing::error!(provider = "openai", model = %self.model, error = %e, "LLM request failed");
                Error::Completion {
                    provider: "openai".to_string(),
                    cause: e.to_string(),
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            tracing::error!(
                provider = "openai",
                model = %self.model,
                status = %status,
                body = %body,
                "LLM API returned error status"
            );
            return Err(Error::Completion {
                provider: "openai".to_string(),
                cause: format!("API returned status: {status} - {body}"),
            });
        }

        let payload: serde_json::Value = response.json().map_err(|e| Error::Completion {
            provider: "openai".to_string(),
            cause: e.to_string(),
        })?;

        parse_chat_response("openai", &payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatMessage, ToolChoice};

    #[test]
    fn test_client_configuration() {
        let client = OpenAiClient::new()
            .with_endpoint("http://localhost:8080/v1")
            .with_model("gpt-4o");

        assert_eq!(client.endpoint, "http://localhost:8080/v1");
        assert_eq!(client.model, "gpt-4o");
        assert_eq!(client.name(), "openai");
    }

    #[test]
    fn test_missing_api_key_is_completion_error() {
        let client = OpenAiClient {
            endpoint: OpenAiClient::DEFAULT_ENDPOINT.to_string(),
            model: OpenAiClient::DEFAULT_MODEL.to_string(),
            api_key: None,
            client: reqwest::blocking::Client::new(),
        };

        let request = CompletionRequest {
            messages: vec![ChatMessage::user("вопрос")],
            tools: Vec::new(),
            tool_choice: ToolChoice::Auto,
            temperature: 0.7,
            max_tokens: 10,
        };

        let err = client.complete(&request).unwrap_err();
        assert!(matches!(err, Error::Completion { .. }));
    }
}
