//! Answer generation with citation grounding

pub mod citation;
pub mod composer;
pub mod prompt;

pub use citation::{extract_and_link_citations, ParsedAnswer};
pub use composer::{AnswerComposer, ComposedAnswer};
pub use prompt::PromptBuilder;
