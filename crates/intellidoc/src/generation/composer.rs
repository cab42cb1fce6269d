//! Grounded answer composition

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::providers::llm::LlmProvider;
use crate::providers::vector_store::VectorSearchResult;
use crate::types::{Citation, ConversationTurn, GroundingViolation};

use super::citation::extract_and_link_citations;
use super::prompt::PromptBuilder;

/// Answer produced by the generator after grounding
#[derive(Debug, Clone)]
pub struct ComposedAnswer {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub violations: Vec<GroundingViolation>,
}

/// Composes answers from retrieved passages
pub struct AnswerComposer {
    llm: Arc<dyn LlmProvider>,
    timeout: Duration,
}

impl AnswerComposer {
    pub fn new(llm: Arc<dyn LlmProvider>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// Ask the generator to answer `question` using only `passages`
    ///
    /// Markers naming no supplied passage are stripped and reported as
    /// violations. A generator failure or timeout is `CompositionFailed`.
    pub async fn compose(
        &self,
        question: &str,
        passages: &[VectorSearchResult],
        history: &[ConversationTurn],
    ) -> Result<ComposedAnswer> {
        if passages.is_empty() {
            tracing::debug!("Composing with an empty context");
        }

        let messages = PromptBuilder::answer_messages(question, passages, history);

        let raw = match tokio::time::timeout(self.timeout, self.llm.chat(&messages)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                return Err(Error::composition_failed(format!(
                    "{} generator failed: {}",
                    self.llm.name(),
                    e
                )))
            }
            Err(_) => {
                return Err(Error::composition_failed(format!(
                    "{} generator timed out after {}s",
                    self.llm.name(),
                    self.timeout.as_secs_f32()
                )))
            }
        };

        let parsed = extract_and_link_citations(&raw, passages);
        if !parsed.violations.is_empty() {
            tracing::warn!(
                "Stripped {} ungrounded citation marker(s) from answer",
                parsed.violations.len()
            );
        }

        Ok(ComposedAnswer {
            answer: parsed.answer,
            citations: parsed.citations,
            violations: parsed.violations,
        })
    }
}
