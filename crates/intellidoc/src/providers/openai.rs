//! OpenAI-compatible client for embeddings and chat completions

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::llm::{ChatMessage, LlmProvider};
use super::retry::{check_status, retry_transient};

/// OpenAI API client with a single bounded retry on transient failures
pub struct OpenAiClient {
    /// HTTP client
    client: Client,
    /// API base URL without trailing slash
    base_url: String,
    /// Bearer token
    api_key: Option<String>,
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
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    /// Create a new client
    pub fn new(llm: &LlmConfig, embeddings: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(llm.timeout())
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        if llm.api_key.is_none() {
            tracing::warn!("No API key configured; set OPENAI_API_KEY");
        }

        Ok(Self {
            client,
            base_url: llm.base_url.trim_end_matches('/').to_string(),
            api_key: llm.api_key.clone(),
            generate_model: llm.generate_model.clone(),
            embed_model: embeddings.model.clone(),
            dimensions: embeddings.dimensions,
            temperature: llm.temperature,
            timeout: llm.timeout(),
            max_retries: llm.max_retries,
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.post(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout(self.timeout)
        } else {
            Error::Http(err)
        }
    }

    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .post("/v1/embeddings")
            .json(&EmbeddingRequest {
                model: &self.embed_model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response = check_status(response, "Embedding request").await?;

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("Failed to parse embedding response: {}", e)))?;

        if parsed.data.len() != texts.len() {
            return Err(Error::embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    async fn request_chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let response = self
            .post("/v1/chat/completions")
            .json(&ChatRequest {
                model: &self.generate_model,
                messages,
                temperature: self.temperature,
            })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response = check_status(response, "Chat completion").await?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::llm(format!("Failed to parse chat response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::llm("Chat response contained no message"))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let input = [text.to_string()];
        let mut vectors = self.embed_batch(&input).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::embedding("Empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        retry_transient(self.max_retries, "Embedding request", || {
            self.request_embeddings(texts)
        })
        .await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        let mut request = self.client.get(format!("{}/v1/models", self.base_url));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        match request.send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[async_trait]
impl LlmProvider for OpenAiClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        retry_transient(self.max_retries, "Chat completion", || {
            self.request_chat(messages)
        })
        .await
    }

    async fn health_check(&self) -> Result<bool> {
        EmbeddingProvider::health_check(self).await
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.generate_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_shape() {
        let messages = vec![ChatMessage::system("rules"), ChatMessage::user("hi")];
        let body = serde_json::to_value(ChatRequest {
            model: "gpt-3.5-turbo",
            messages: &messages,
            temperature: 0.0,
        })
        .unwrap();

        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
    }

    #[test]
    fn test_parse_chat_response() {
        let raw = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"Answer [1]"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("Answer [1]")
        );
    }

    #[test]
    fn test_trims_base_url() {
        let llm = LlmConfig {
            base_url: "http://localhost:8000/".to_string(),
            ..LlmConfig::default()
        };
        let client = OpenAiClient::new(&llm, &EmbeddingConfig::default()).unwrap();
        assert_eq!(client.base_url, "http://localhost:8000");
    }
}
