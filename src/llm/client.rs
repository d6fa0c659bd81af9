//! HTTP client for the remote model API.
//!
//! The orchestration core treats the model as an opaque collaborator:
//! prompts in, raw text (expected to be a single JSON object) or an error
//! out. Transport failures and malformed payloads are handled identically
//! upstream via the fallback path.

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Sampling and shape options forwarded with every generation request.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: None,
            max_tokens: None,
        }
    }
}

/// One complete prompt pair for the remote model.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub task_prompt: String,
    pub options: GenerationOptions,
}

/// Abstract remote-model call. The orchestration core is generic over this
/// trait and never inspects the concrete transport.
pub trait ModelClient: Send + Sync {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<String>>;

    /// Model identifier for report metadata.
    fn model_name(&self) -> &str;
}

/// Chat API request body.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    /// Ask the server to constrain output to a JSON object where supported.
    format: &'static str,
    options: GenerationOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Production `ModelClient` over a chat-completion HTTP endpoint.
pub struct HttpModelClient {
    api_url: String,
    model_name: String,
    timeout_seconds: u64,
    http_client: reqwest::Client,
}

impl HttpModelClient {
    pub fn new(api_url: String, model_name: String, timeout_seconds: u64) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_url,
            model_name,
            timeout_seconds,
            http_client,
        })
    }

    async fn send(&self, request: GenerationRequest) -> Result<String> {
        let url = format!("{}/api/chat", self.api_url);

        let body = ChatRequest {
            model: self.model_name.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system_prompt,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.task_prompt,
                },
            ],
            stream: false,
            format: "json",
            options: request.options,
        };

        debug!("Sending generation request to {}", url);

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow::anyhow!("Request timed out after {}s", self.timeout_seconds)
                } else if e.is_connect() {
                    anyhow::anyhow!("Cannot connect to model API at {}", self.api_url)
                } else {
                    anyhow::anyhow!("Failed to send request: {}", e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Model API error {}: {}", status, body));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse model API response")?;

        Ok(chat_response.message.content)
    }
}

impl ModelClient for HttpModelClient {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<String>> {
        Box::pin(self.send(request))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_options_default() {
        let opts = GenerationOptions::default();
        assert_eq!(opts.temperature, 0.1);
        assert!(opts.top_p.is_none());
        assert!(opts.max_tokens.is_none());
    }

    #[test]
    fn test_options_serialization_skips_none() {
        let opts = GenerationOptions::default();
        let json = serde_json::to_string(&opts).unwrap();
        assert!(json.contains("temperature"));
        assert!(!json.contains("top_p"));
        assert!(!json.contains("max_tokens"));
    }
}
