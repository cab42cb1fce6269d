//! Provider abstractions for embeddings, LLM, and vector storage
//!
//! This module provides trait-based abstractions that allow switching between
//! an OpenAI-compatible API and a local Ollama server.

pub mod embedding;
pub mod llm;
pub mod local;
pub mod ollama;
pub mod openai;
mod retry;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use llm::{ChatMessage, LlmProvider, Role};
pub use local::LocalVectorStore;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use vector_store::{VectorSearchResult, VectorStoreProvider};
