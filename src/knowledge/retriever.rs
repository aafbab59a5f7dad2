//! Locale-filtered nearest-neighbour retrieval for chat questions.

use crate::embedding::{EmbeddingClient, EmbeddingClientError};
use crate::knowledge::store::{KnowledgeStore, StoreError};
use crate::knowledge::types::RetrievalContext;
use crate::locale::Locale;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors produced while retrieving context for a question.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The query could not be embedded.
    #[error("Failed to embed query: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// The vector search failed.
    #[error("Knowledge search failed: {0}")]
    Store(#[from] StoreError),
}

/// Retrieves the chunks most relevant to a question.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Top-`k` chunks for `query` within `locale`, best first.
    async fn retrieve(
        &self,
        query: &str,
        locale: Locale,
        k: usize,
    ) -> Result<RetrievalContext, RetrievalError>;
}

/// Embeds the query, then searches the knowledge store. No retries.
pub struct KnowledgeRetriever {
    embedding: Arc<dyn EmbeddingClient>,
    store: Arc<dyn KnowledgeStore>,
}

impl KnowledgeRetriever {
    /// Build a retriever from its two collaborators.
    pub fn new(embedding: Arc<dyn EmbeddingClient>, store: Arc<dyn KnowledgeStore>) -> Self {
        Self { embedding, store }
    }
}

#[async_trait]
impl Retriever for KnowledgeRetriever {
    async fn retrieve(
        &self,
        query: &str,
        locale: Locale,
        k: usize,
    ) -> Result<RetrievalContext, RetrievalError> {
        tracing::debug!(stage = "embedding", locale = %locale, "Retrieval stage");
        let vector = self
            .embedding
            .generate_embeddings(vec![query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or(EmbeddingClientError::Empty)?;

        tracing::debug!(stage = "retrieving", locale = %locale, "Retrieval stage");
        let results = self.store.search(vector, locale, k).await?;
        let context = RetrievalContext::from_unsorted(results, k);
        tracing::debug!(
            locale = %locale,
            requested = k,
            retrieved = context.len(),
            top_similarity = context.results().first().map(|hit| hit.similarity),
            "Retrieved knowledge context"
        );
        Ok(context)
    }
}
