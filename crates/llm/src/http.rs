//! Default HTTP Model Client
//!
//! An OpenAI-compatible chat-completions client. Most internal gateways
//! (and local servers like vLLM or Ollama's compat endpoint) speak this
//! shape, so it serves as the default `ModelClient` when the front door does
//! not inject its own adapter.

use async_trait::async_trait;
use serde::Deserialize;

use crate::provider::ModelClient;
use crate::types::{parse_http_error, LlmError, LlmResult};

/// OpenAI-compatible chat-completions client.
pub struct HttpModelClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl HttpModelClient {
    /// Create a client for a chat-completions endpoint
    /// (e.g. `https://api.openai.com/v1/chat/completions`).
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    fn build_body(model: &str, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
        })
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn call(&self, model: &str, prompt: &str) -> LlmResult<String> {
        let mut request = self
            .client
            .post(&self.base_url)
            .json(&Self::build_body(model, prompt));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| LlmError::Transport {
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "model call failed");
            return Err(parse_http_error(status.as_u16(), &body));
        }

        let parsed: ChatCompletionResponse =
            response.json().await.map_err(|e| LlmError::InvalidResponse {
                message: e.to_string(),
            })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| LlmError::InvalidResponse {
                message: "response contained no message content".to_string(),
            })
    }
}
