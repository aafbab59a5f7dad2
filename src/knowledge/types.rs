//! Knowledge-base records shared by the retriever and the indexer.

use crate::locale::Locale;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of source a chunk was derived from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// One product rendered for one locale.
    Product,
    /// Text read from a marketing page.
    Page,
    /// Local document ingested from disk.
    Document,
}

impl ContentType {
    /// Lowercase tag stored in payloads.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Page => "page",
            Self::Document => "document",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A passage of knowledge text plus the metadata stored next to its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    /// Passage text shown to the model.
    pub text: String,
    /// Language partition of the chunk.
    pub locale: Locale,
    /// Source kind.
    pub content_type: ContentType,
    /// Free-form category (product category, page section, document folder).
    #[serde(default)]
    pub category: String,
    /// Stable identifier of the source unit, shared by all its chunks.
    pub source_id: String,
    /// Public URL of the source.
    #[serde(default)]
    pub source_url: String,
    /// Human-readable title of the source.
    #[serde(default)]
    pub source_title: String,
    /// Position of the chunk within its source unit.
    #[serde(default)]
    pub chunk_index: usize,
    /// Product SKU.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    /// Product price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Product image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Full product record serialized as JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<Value>,
}

/// A chunk paired with its embedding, ready to be written.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    /// Chunk metadata and text.
    pub chunk: KnowledgeChunk,
    /// Embedding vector; its length equals the collection dimension.
    pub embedding: Vec<f32>,
}

/// A stored chunk returned by a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSearchResult {
    /// Point identifier in the store.
    pub id: String,
    /// Chunk payload (without its vector).
    pub chunk: KnowledgeChunk,
    /// Cosine similarity to the query, in `[-1, 1]`.
    pub similarity: f32,
}

impl VectorSearchResult {
    /// Similarity expressed as a rounded percentage.
    pub fn relevance_percent(&self) -> i32 {
        (self.similarity * 100.0).round() as i32
    }
}

/// Top-K search results ordered by non-increasing similarity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalContext {
    results: Vec<VectorSearchResult>,
}

impl RetrievalContext {
    /// Sort `results` by descending similarity and keep the best `k`.
    pub fn from_unsorted(mut results: Vec<VectorSearchResult>, k: usize) -> Self {
        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        results.truncate(k);
        Self { results }
    }

    /// Ordered results.
    pub fn results(&self) -> &[VectorSearchResult] {
        &self.results
    }

    /// Whether nothing relevant was found.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of retained results.
    pub fn len(&self) -> usize {
        self.results.len()
    }
}
