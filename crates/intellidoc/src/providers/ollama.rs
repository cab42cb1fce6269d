//! Ollama client for local embeddings and chat

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::llm::{ChatMessage, LlmProvider};
use super::retry::{check_status, retry_transient};

/// Ollama API client with a single bounded retry on transient failures
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Server base URL
    base_url: String,
    /// Chat model
    generate_model: String,
    /// Embedding model
    embed_model: String,
    /// Embedding dimensions
    dimensions: usize,
    /// Sampling temperature
    temperature: f32,
    /// Per-call timeout
    timeout: Duration,
    /// Maximum retries
    max_retries: u32,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(llm: &LlmConfig, embeddings: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(llm.timeout())
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: llm.base_url.trim_end_matches('/').to_string(),
            generate_model: llm.generate_model.clone(),
            embed_model: embeddings.model.clone(),
            dimensions: embeddings.dimensions,
            temperature: llm.temperature,
            timeout: llm.timeout(),
            max_retries: llm.max_retries,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout(self.timeout)
        } else {
            Error::Http(err)
        }
    }

    async fn request_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&EmbedRequest {
                model: &self.embed_model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response = check_status(response, "Embedding request").await?;

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("Failed to parse embedding response: {}", e)))?;

        Ok(parsed.embedding)
    }

    async fn request_chat(&self, messages: &[ChatMessage]) -> Result<String> {
        tracing::debug!("Generating with model: {}", self.generate_model);

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&ChatRequest {
                model: &self.generate_model,
                messages,
                stream: false,
                options: ChatOptions {
                    temperature: self.temperature,
                },
            })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response = check_status(response, "Chat request").await?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::llm(format!("Failed to parse chat response: {}", e)))?;

        Ok(parsed.message.content)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        retry_transient(self.max_retries, "Embedding request", || {
            self.request_embedding(text)
        })
        .await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[async_trait]
impl LlmProvider for OllamaClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        retry_transient(self.max_retries, "Chat request", || {
            self.request_chat(messages)
        })
        .await
    }

    async fn health_check(&self) -> Result<bool> {
        EmbeddingProvider::health_check(self).await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.generate_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response() {
        let raw = r#"{"model":"llama3.2","message":{"role":"assistant","content":"Hi [2]"},"done":true}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.message.content, "Hi [2]");
    }

    #[test]
    fn test_chat_request_disables_streaming() {
        let messages = [ChatMessage::user("q")];
        let body = serde_json::to_value(ChatRequest {
            model: "llama3.2",
            messages: &messages,
            stream: false,
            options: ChatOptions { temperature: 0.2 },
        })
        .unwrap();
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "user");
    }
}
