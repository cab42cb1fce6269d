//! Application state wiring providers, knowledge base and question pipeline

use std::sync::Arc;
use uuid::Uuid;

use crate::config::{BackendProvider, RagConfig};
use crate::conversation::SessionStore;
use crate::error::{Error, Result};
use crate::generation::AnswerComposer;
use crate::ingestion::KnowledgeBase;
use crate::pipeline::QuestionPipeline;
use crate::providers::{
    EmbeddingProvider, LlmProvider, LocalVectorStore, OllamaClient, OpenAiClient,
    VectorStoreProvider,
};
use crate::retrieval::{QueryRewriter, Retriever};
use crate::types::{ConversationTurn, DocumentSummary, IngestRequest, QueryRequest, QueryResponse};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    knowledge_base: KnowledgeBase,
    pipeline: QuestionPipeline,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    llm_provider: Arc<dyn LlmProvider>,
    vector_store_provider: Arc<dyn VectorStoreProvider>,
}

impl AppState {
    /// Create state from configuration, opening persisted storage
    pub fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing intellidoc (backend: {:?})...", config.backend);

        let (embedding_provider, llm_provider): (Arc<dyn EmbeddingProvider>, Arc<dyn LlmProvider>) =
            match config.backend {
                BackendProvider::OpenAi => {
                    if config.llm.api_key.is_none() {
                        return Err(Error::Config(
                            "OpenAI backend selected but OPENAI_API_KEY is not set".to_string(),
                        ));
                    }
                    let client = Arc::new(OpenAiClient::new(&config.llm, &config.embeddings)?);
                    tracing::info!(
                        "Using OpenAI backend (embedding: {}, llm: {})",
                        config.embeddings.model,
                        config.llm.generate_model
                    );
                    (client.clone(), client)
                }
                BackendProvider::Ollama => {
                    let client = Arc::new(OllamaClient::new(&config.llm, &config.embeddings)?);
                    tracing::info!(
                        "Using Ollama backend at {} (embedding: {}, llm: {})",
                        config.llm.base_url,
                        config.embeddings.model,
                        config.llm.generate_model
                    );
                    (client.clone(), client)
                }
            };

        let vector_store_provider: Arc<dyn VectorStoreProvider> =
            Arc::new(LocalVectorStore::from_config(&config.storage)?);

        Self::with_providers(
            config,
            embedding_provider,
            llm_provider,
            vector_store_provider,
        )
    }

    /// Create state around already constructed providers
    pub fn with_providers(
        config: RagConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        llm_provider: Arc<dyn LlmProvider>,
        vector_store_provider: Arc<dyn VectorStoreProvider>,
    ) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            "Embedder: {} ({}D), generator: {} ({}), index: {}",
            embedding_provider.name(),
            embedding_provider.dimensions(),
            llm_provider.name(),
            llm_provider.model(),
            vector_store_provider.name()
        );

        let knowledge_base = KnowledgeBase::new(
            Arc::clone(&embedding_provider),
            Arc::clone(&vector_store_provider),
            &config,
        )
        .with_registry(config.storage.documents_path())?;
        tracing::info!(
            "Knowledge base ready with {} documents",
            knowledge_base.len()
        );

        let timeout = config.llm.timeout();
        let rewriter = if config.retrieval.rewrite_enabled {
            QueryRewriter::new(Arc::clone(&llm_provider), timeout)
        } else {
            QueryRewriter::verbatim()
        };
        let retriever = Retriever::new(
            Arc::clone(&embedding_provider),
            Arc::clone(&vector_store_provider),
            rewriter,
            timeout,
        )
        .with_history_window(config.retrieval.history_window)
        .with_min_similarity(config.retrieval.min_similarity);

        let composer = AnswerComposer::new(Arc::clone(&llm_provider), timeout);
        let pipeline = QuestionPipeline::new(
            retriever,
            composer,
            Arc::new(SessionStore::new()),
            config.retrieval.top_k,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                knowledge_base,
                pipeline,
                embedding_provider,
                llm_provider,
                vector_store_provider,
            }),
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.inner.knowledge_base
    }

    pub fn pipeline(&self) -> &QuestionPipeline {
        &self.inner.pipeline
    }

    pub async fn ingest(&self, request: IngestRequest) -> Result<DocumentSummary> {
        self.inner.knowledge_base.ingest(request, None).await
    }

    pub async fn ask(&self, request: QueryRequest) -> Result<QueryResponse> {
        self.inner.pipeline.ask(request).await
    }

    pub async fn delete(&self, document_id: &Uuid) -> Result<DocumentSummary> {
        self.inner.knowledge_base.delete(document_id).await
    }

    pub fn list(&self) -> Vec<DocumentSummary> {
        self.inner.knowledge_base.list()
    }

    pub async fn history(&self, session_id: &str) -> Vec<ConversationTurn> {
        self.inner.pipeline.sessions().history(session_id).await
    }

    /// Whether every provider answers its health check
    pub async fn health_check(&self) -> bool {
        let embedder = self
            .inner
            .embedding_provider
            .health_check()
            .await
            .unwrap_or(false);
        let llm = self
            .inner
            .llm_provider
            .health_check()
            .await
            .unwrap_or(false);
        let index = self
            .inner
            .vector_store_provider
            .health_check()
            .await
            .unwrap_or(false);

        if !(embedder && llm && index) {
            tracing::warn!(
                "Health check failed ({}: {}, {}: {}, {}: {})",
                self.inner.embedding_provider.name(),
                embedder,
                self.inner.llm_provider.name(),
                llm,
                self.inner.vector_store_provider.name(),
                index
            );
        }
        embedder && llm && index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::VectorStore;
    use crate::testing::{KeywordEmbedder, ScriptedLlm};

    fn state(dir: &std::path::Path) -> AppState {
        let mut config = RagConfig::default();
        config.storage.data_dir = dir.to_path_buf();
        let index = Arc::new(LocalVectorStore::from_config(&config.storage).unwrap());
        AppState::with_providers(
            config,
            Arc::new(KeywordEmbedder::new()),
            Arc::new(ScriptedLlm::answering(|_| "Tomatoes want sun [1].".to_string())),
            index,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_state_reopens_persisted_documents() {
        let dir = tempfile::tempdir().unwrap();

        let first = state(dir.path());
        let summary = first
            .ingest(IngestRequest::new("garden.txt", "Tomatoes need full sun."))
            .await
            .unwrap();
        assert!(first.health_check().await);
        drop(first);

        let reopened = state(dir.path());
        assert_eq!(reopened.list(), vec![summary]);

        let response = reopened
            .ask(QueryRequest::new("s", "tomatoes sun"))
            .await
            .unwrap();
        assert_eq!(response.citations.len(), 1);
        assert_eq!(response.citations[0].filename, "garden.txt");
        assert_eq!(reopened.history("s").await.len(), 1);
    }

    #[test]
    fn test_openai_backend_requires_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RagConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();
        config.llm.api_key = None;

        assert!(matches!(AppState::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_in_memory_store_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RagConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();
        let index = Arc::new(LocalVectorStore::new(Arc::new(VectorStore::in_memory())));

        let state = AppState::with_providers(
            config,
            Arc::new(KeywordEmbedder::new()),
            Arc::new(ScriptedLlm::failing()),
            index,
        )
        .unwrap();
        assert!(state.list().is_empty());
    }
}
