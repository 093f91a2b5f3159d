//! Retrieval plumbing: embedding backends, the SQLite vector index, and the
//! multi-query retriever that assembles prompt context.

pub mod embedding;
pub mod retriever;
pub mod store;

pub use embedding::{EmbeddingBackendKind, EmbeddingClient, EmbeddingConfig, HashEmbedder};
pub use retriever::{render_context, Retriever};
pub use store::{IndexedRecord, RetrievalResult, SearchFilters, StoreStats, VectorStore};
