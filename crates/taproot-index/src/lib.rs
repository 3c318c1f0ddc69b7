//! Taproot Index — hybrid search store, embedding adapter, reranker client

pub mod embedding;
pub mod rerank;
pub mod store;


pub use embedding::{Embedder, EmbeddingError, InputType};
pub use rerank::{RerankClient, RerankDoc, RerankResult};
pub use store::{SearchAction, SearchRow, SearchStore, tokenize_query};
