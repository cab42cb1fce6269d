//! Question answering over the knowledge base
//!
//! A question moves `Received → Rewriting → Retrieving → Composing` and ends
//! `Committed` or `Failed`. Only a committed question changes its session.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

use crate::conversation::SessionStore;
use crate::error::Result;
use crate::generation::AnswerComposer;
use crate::retrieval::Retriever;
use crate::types::{
    ConversationTurn, GroundingViolation, QueryRequest, QueryResponse, SourcePassage,
};

/// Lifecycle of one question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionStage {
    Received,
    Rewriting,
    Retrieving,
    Composing,
    Committed,
    Failed,
}

impl fmt::Display for QuestionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Rewriting => "rewriting",
            Self::Retrieving => "retrieving",
            Self::Composing => "composing",
            Self::Committed => "committed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

fn enter(stage: QuestionStage) {
    tracing::debug!(%stage, "Question stage");
}

/// Retrieves, composes and commits one question at a time per session
pub struct QuestionPipeline {
    retriever: Retriever,
    composer: AnswerComposer,
    sessions: Arc<SessionStore>,
    top_k: usize,
}

impl QuestionPipeline {
    pub fn new(
        retriever: Retriever,
        composer: AnswerComposer,
        sessions: Arc<SessionStore>,
        top_k: usize,
    ) -> Self {
        Self {
            retriever,
            composer,
            sessions,
            top_k,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Answer a question within its session
    ///
    /// Fails with `SessionBusy` if the session already has a question in flight.
    /// On any error the session's history is unchanged.
    pub async fn ask(&self, request: QueryRequest) -> Result<QueryResponse> {
        let span = tracing::info_span!("question", session = %request.session_id);
        async move {
            let start = Instant::now();
            enter(QuestionStage::Received);

            let mut conversation = self.sessions.acquire(&request.session_id)?;

            let result = self.answer(&request, conversation.turns()).await;
            match result {
                Ok((turn, sources, grounding_violations)) => {
                    let response = QueryResponse {
                        session_id: request.session_id.clone(),
                        answer: turn.answer.clone(),
                        citations: turn.citations.clone(),
                        standalone_query: turn.standalone_query.clone(),
                        sources,
                        grounding_violations,
                        processing_time_ms: start.elapsed().as_millis() as u64,
                    };
                    conversation.commit(turn);
                    enter(QuestionStage::Committed);

                    tracing::info!(
                        "Answered in {}ms with {} citations from {} passages",
                        response.processing_time_ms,
                        response.citations.len(),
                        response.sources.len()
                    );
                    Ok(response)
                }
                Err(e) => {
                    enter(QuestionStage::Failed);
                    tracing::warn!("Question failed: {}", e);
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn answer(
        &self,
        request: &QueryRequest,
        history: &[ConversationTurn],
    ) -> Result<(ConversationTurn, Vec<SourcePassage>, Vec<GroundingViolation>)> {
        let k = request.top_k.unwrap_or(self.top_k).max(1);

        enter(QuestionStage::Rewriting);
        let recent = self.retriever.window(history);
        let standalone_query = self.retriever.rewrite(&request.question, recent).await;

        enter(QuestionStage::Retrieving);
        let passages = self.retriever.search(&standalone_query, k).await?;
        tracing::debug!(
            "Retrieved {} passages for \"{}\"",
            passages.len(),
            standalone_query
        );

        enter(QuestionStage::Composing);
        let composed = self
            .composer
            .compose(&request.question, &passages, recent)
            .await?;

        let sources = passages
            .iter()
            .map(|p| SourcePassage::from_chunk(&p.chunk, p.similarity))
            .collect();
        let turn = ConversationTurn::new(
            request.question.as_str(),
            standalone_query,
            composed.answer,
            composed.citations,
        );

        Ok((turn, sources, composed.violations))
    }
}
