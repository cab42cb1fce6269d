//! Vector index, query rewriting and retrieval

pub mod retriever;
pub mod rewrite;
pub mod vector_store;

pub use retriever::{Retrieval, Retriever};
pub use rewrite::QueryRewriter;
pub use vector_store::{cosine_similarity, SearchResult, VectorStore};
