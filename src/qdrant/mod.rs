//! Qdrant vector store integration.

pub mod client;
pub mod filters;
pub mod payload;
pub mod types;

pub use client::QdrantService;
pub use filters::build_knowledge_filter;
pub use payload::{compute_chunk_hash, point_id};
pub use types::{KnowledgeFilter, PointUpsert, QdrantError, ScoredPoint};
