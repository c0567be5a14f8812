//! LM Studio client.
//!
//! LM Studio provides an OpenAI-compatible API on localhost and is the
//! default provider.

use super::{
    ChatCompletion, CompletionRequest, CompletionResponse, LlmHttpConfig, build_chat_body,
    build_http_client, parse_chat_response,
};
use crate::{Error, Result};

/// LM Studio local LLM client.
pub struct LmStudioClient {
    /// API endpoint.
    endpoint: String,
    /// Model to use (LM Studio falls back to the loaded model).
    model: String,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

impl LmStudioClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "http://localhost:1234/v1";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "google/gemma-3-27b";

    /// Creates a new LM Studio client.
    #[must_use]
    pub fn new() -> Self {
        let endpoint = std::env::var("LMSTUDIO_ENDPOINT")
            .unwrap_or_else(|_| Self::DEFAULT_ENDPOINT.to_string());
        let model =
            std::env::var("LMSTUDIO_MODEL").unwrap_or_else(|_| Self::DEFAULT_MODEL.to_string());

        Self {
            endpoint,
            model,
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

    /// Sets HTTP client timeouts.
    #[must_use]
    pub fn with_http_config(mut self, config: LlmHttpConfig) -> Self {
        self.client = build_http_client(config);
        self
    }

    /// Checks if LM Studio is reachable.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/models", self.endpoint))
            .send()
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

impl Default for LmStudioClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatCompletion for LmStudioClient {
    fn name(&self) -> &'static str {
        "lmstudio"
    }

    fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let body = build_chat_body(&self.model, request);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .json(&body)
            .send()
            .map_err(|e| {
                let error_kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connect"
                } else {
                    "request"
                };
                tracing::error!(
                    provider = "lmstudio",
                    model = %self.model,
                    error = %e,
                    error_kind = error_kind,
                    "LLM request failed"
                );
                Error::Completion {
                    provider: "lmstudio".to_string(),
                    cause: format!("{error_kind} error: {e}"),
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            tracing::error!(
                provider = "lmstudio",
                model = %self.model,
                status = %status,
                body = %body,
                "LLM API returned error status"
            );
            return Err(Error::Completion {
                provider: "lmstudio".to_string(),
                cause: format!("API returned status: {status} - {body}"),
            });
        }

        let payload: serde_json::Value = response.json().map_err(|e| {
            tracing::error!(provider = "lmstudio", error = %e, "Failed to parse LLM response");
            Error::Completion {
                provider: "lmstudio".to_string(),
                cause: e.to_string(),
            }
        })?;

        parse_chat_response("lmstudio", &payload)
    }
}
