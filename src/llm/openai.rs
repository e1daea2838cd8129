//! OpenAI-compatible chat-completions client.
//!
//! Works against any endpoint speaking the `/chat/completions` protocol
//! (OpenAI, OpenRouter, LiteLLM proxies, Ollama's compatibility layer).

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{LlmBackend, LlmError};
use crate::config::ModelConfig;

/// Client for OpenAI-compatible completion APIs.
pub struct OpenAiClient {
    api_base: String,
    api_key: Option<String>,
    model: String,
    http_client: Client,
}

impl OpenAiClient {
    /// Creates a client with explicit configuration.
    pub fn new(
        api_base: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            api_key,
            model: model.into(),
            http_client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Creates a client from the model section of a run config.
    ///
    /// The API key is read from the environment variable named by
    /// `api_key_env`, when one is configured.
    pub fn from_config(config: &ModelConfig) -> Result<Self, LlmError> {
        let api_key = match &config.api_key_env {
            Some(var) => Some(env::var(var).map_err(|_| LlmError::MissingApiKey(var.clone()))?),
            None => None,
        };

        Ok(Self::new(
            config.api_base.clone(),
            api_key,
            config.name.clone(),
            Duration::from_millis(config.timeout_ms),
        ))
    }

    /// The configured API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// The configured model name.
    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Request body for the chat-completions endpoint.
#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Response body from the chat-completions endpoint.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl LlmBackend for OpenAiClient {
    async fn complete(
        &self,
        prompt: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let request = ApiRequest {
            model: &self.model,
            messages: vec![ApiMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
            max_tokens,
        };

        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));

        let mut http_request = self.http_client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            http_request = http_request.bearer_auth(key);
        }

        let response = http_request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "LLM backend rejected completion request");
            return Err(LlmError::Rejected {
                code: status.as_u16(),
                message: body,
            });
        }

        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Transport(format!("malformed completion response: {e}")))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(LlmError::Empty);
        }

        Ok(content)
    }
}
