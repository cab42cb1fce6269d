//! Follow-up question rewriting

use std::sync::Arc;
use std::time::Duration;

use crate::generation::PromptBuilder;
use crate::providers::llm::LlmProvider;
use crate::types::ConversationTurn;

/// Turns a follow-up question into a standalone query using recent history
///
/// Never fails: any problem with the model falls back to the question as asked.
pub struct QueryRewriter {
    llm: Option<Arc<dyn LlmProvider>>,
    timeout: Duration,
}

impl QueryRewriter {
    pub fn new(llm: Arc<dyn LlmProvider>, timeout: Duration) -> Self {
        Self {
            llm: Some(llm),
            timeout,
        }
    }

    /// Rewriter that always returns the question verbatim
    pub fn verbatim() -> Self {
        Self {
            llm: None,
            timeout: Duration::ZERO,
        }
    }

    pub async fn rewrite(&self, question: &str, history: &[ConversationTurn]) -> String {
        let llm = match &self.llm {
            Some(llm) if !history.is_empty() => llm,
            _ => return question.to_string(),
        };

        let messages = PromptBuilder::rewrite_messages(question, history);
        match tokio::time::timeout(self.timeout, llm.chat(&messages)).await {
            Ok(Ok(reply)) => {
                let standalone = reply.trim();
                if standalone.is_empty() {
                    tracing::warn!("Rewriter returned empty text, using question verbatim");
                    question.to_string()
                } else {
                    tracing::debug!("Rewrote \"{}\" as \"{}\"", question, standalone);
                    standalone.to_string()
                }
            }
            Ok(Err(e)) => {
                tracing::warn!("Rewrite failed, using question verbatim: {}", e);
                question.to_string()
            }
            Err(_) => {
                tracing::warn!(
                    "Rewrite timed out after {}s, using question verbatim",
                    self.timeout.as_secs_f32()
                );
                question.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLlm;

    fn history() -> Vec<ConversationTurn> {
        vec![ConversationTurn::new(
            "Who wrote Dune?",
            "Who wrote Dune?",
            "Frank Herbert [1].",
            Vec::new(),
        )]
    }

    #[tokio::test]
    async fn test_empty_history_is_verbatim() {
        let llm = Arc::new(ScriptedLlm::answering(|_| "rewritten".to_string()));
        let rewriter = QueryRewriter::new(llm.clone(), Duration::from_secs(5));

        assert_eq!(
            rewriter.rewrite("When was it published?", &[]).await,
            "When was it published?"
        );
        assert!(llm.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rewrites_follow_up() {
        let llm = Arc::new(ScriptedLlm::answering(|_| {
            "  When was Dune published?\n".to_string()
        }));
        let rewriter = QueryRewriter::new(llm.clone(), Duration::from_secs(5));

        let standalone = rewriter.rewrite("When was it published?", &history()).await;
        assert_eq!(standalone, "When was Dune published?");
        assert_eq!(llm.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failures_fall_back_to_verbatim() {
        let failing = QueryRewriter::new(Arc::new(ScriptedLlm::failing()), Duration::from_secs(5));
        assert_eq!(failing.rewrite("and then?", &history()).await, "and then?");

        let blank = QueryRewriter::new(
            Arc::new(ScriptedLlm::answering(|_| "   ".to_string())),
            Duration::from_secs(5),
        );
        assert_eq!(blank.rewrite("and then?", &history()).await, "and then?");

        let slow = QueryRewriter::new(
            Arc::new(
                ScriptedLlm::answering(|_| "late".to_string())
                    .with_delay(Duration::from_millis(500)),
            ),
            Duration::from_millis(20),
        );
        assert_eq!(slow.rewrite("and then?", &history()).await, "and then?");
    }

    #[tokio::test]
    async fn test_verbatim_rewriter() {
        assert_eq!(
            QueryRewriter::verbatim().rewrite("q", &history()).await,
            "q"
        );
    }
}
