//! Knowledge base: chunk records, the store seam and query-time retrieval.

pub mod retriever;
pub mod store;
pub mod types;

pub use retriever::{KnowledgeRetriever, RetrievalError, Retriever};
pub use store::{KnowledgeStore, QdrantKnowledgeStore, StoreError};
pub use types::{
    ContentType, EmbeddedChunk, KnowledgeChunk, RetrievalContext, VectorSearchResult,
};
