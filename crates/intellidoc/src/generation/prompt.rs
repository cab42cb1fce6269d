//! Prompt templates for query rewriting and grounded answering

use crate::providers::llm::ChatMessage;
use crate::providers::vector_store::VectorSearchResult;
use crate::types::ConversationTurn;

/// System prompt for turning a follow-up into a standalone query
pub const REWRITE_INSTRUCTIONS: &str = "Given a chat history and the latest user question \
which might reference context in the chat history, formulate a standalone question which \
can be understood without the chat history. Do NOT answer the question, just reformulate \
it if needed and otherwise return it as is. Reply with the question only.";

/// System prompt for grounded answering; the context block is appended after it
pub const ANSWER_INSTRUCTIONS: &str = "You are an assistant for question-answering tasks \
over the user's documents.

GROUNDING RULES:
1. Use ONLY the numbered passages in the CONTEXT below to answer the question.
2. If the answer is not in the context, say that you don't know.
3. Cite every claim with the number of the passage that supports it, e.g. [1] or [1, 3].
4. Only cite numbers that appear in the CONTEXT. Never invent a citation.
5. Keep the answer concise.";

/// Prompt builder for rewriting and answering
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build the context block, binding passage `i` to marker `[i + 1]`
    pub fn build_context(passages: &[VectorSearchResult]) -> String {
        if passages.is_empty() {
            return "(no passages were retrieved)".to_string();
        }

        let mut context = String::new();
        for (i, result) in passages.iter().enumerate() {
            context.push_str(&format!(
                "[{}] {}\n{}\n\n---\n\n",
                i + 1,
                result.chunk.source.format_citation(),
                result.chunk.content.trim()
            ));
        }
        context
    }

    /// Messages asking the generator to answer `question` from `passages`
    pub fn answer_messages(
        question: &str,
        passages: &[VectorSearchResult],
        history: &[ConversationTurn],
    ) -> Vec<ChatMessage> {
        let system = format!(
            "{}\n\nCONTEXT:\n{}",
            ANSWER_INSTRUCTIONS,
            Self::build_context(passages)
        );

        let mut messages = Vec::with_capacity(history.len() * 2 + 2);
        messages.push(ChatMessage::system(system));
        Self::push_history(&mut messages, history);
        messages.push(ChatMessage::user(question));
        messages
    }

    /// Messages asking the generator to rewrite a follow-up into a standalone query
    pub fn rewrite_messages(question: &str, history: &[ConversationTurn]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() * 2 + 2);
        messages.push(ChatMessage::system(REWRITE_INSTRUCTIONS));
        Self::push_history(&mut messages, history);
        messages.push(ChatMessage::user(question));
        messages
    }

    fn push_history(messages: &mut Vec<ChatMessage>, history: &[ConversationTurn]) {
        for turn in history {
            messages.push(ChatMessage::user(turn.question.as_str()));
            messages.push(ChatMessage::assistant(turn.answer.as_str()));
        }
    }
}
