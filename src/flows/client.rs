use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::FlowError;
use crate::config::AiConfig;

/// A generative text backend: system prompt plus user prompt in, text out.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, FlowError>;
}

/// Client for an Ollama-compatible `/api/generate` endpoint.
pub struct HttpCompletionClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpCompletionClient {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, FlowError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FlowError::Transport(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout,
        })
    }

    pub fn from_config(config: &AiConfig) -> Result<Self, FlowError> {
        Self::new(&config.base_url, &config.model, config.timeout)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    format: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[async_trait]
impl TextCompletion for HttpCompletionClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, FlowError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            system,
            stream: false,
            format: "json",
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    FlowError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    FlowError::Transport(format!(
                        "Request timed out after {}s",
                        self.timeout.as_secs()
                    ))
                } else {
                    FlowError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FlowError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| FlowError::Transport(e.to_string()))?;

        Ok(parsed.response)
    }
}
