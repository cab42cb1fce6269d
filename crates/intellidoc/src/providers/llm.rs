//! LLM provider trait for chat completions

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a chat completion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Trait for the external generative capability
///
/// Implementations:
/// - `OpenAiClient`: OpenAI-compatible `/v1/chat/completions`
/// - `OllamaClient`: Local Ollama server `/api/chat`
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete a conversation, returning the assistant's reply text
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
