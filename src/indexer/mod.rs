//! Offline knowledge indexer.
//!
//! Turns the product catalog, the marketing pages and local documents into embedded
//! [`KnowledgeChunk`]s. Work is split into units, one per source and locale. Each unit is
//! embedded in a single batch and written with delete-then-upsert semantics, so re-indexing a
//! unit fully replaces its previous chunks. A failing unit is logged, counted and skipped.

pub mod chunking;
pub mod documents;
pub mod pages;
pub mod products;

pub use chunking::split_text;
pub use documents::{DocumentFile, collect_documents, document_unit};
pub use pages::{MARKETING_PAGES, PageContent, PageReader, ReaderClient, ReaderError};
pub use products::{Product, load_catalog, product_units, render_product};

use crate::embedding::{EmbeddingClient, EmbeddingClientError};
use crate::knowledge::{EmbeddedChunk, KnowledgeChunk, KnowledgeStore, StoreError};
use crate::locale::Locale;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while indexing.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Product catalog could not be read.
    #[error("Failed to read product catalog {}: {source}", path.display())]
    Catalog {
        /// Catalog location.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Catalog or product record is not valid JSON.
    #[error("Invalid product catalog: {0}")]
    CatalogFormat(#[from] serde_json::Error),
    /// Documents directory does not exist.
    #[error("Documents directory {} does not exist", .0.display())]
    DocumentsRoot(PathBuf),
    /// `--file` pattern is not a valid glob.
    #[error("Invalid document pattern: {0}")]
    Glob(#[from] globset::Error),
    /// Walking the documents directory failed.
    #[error("Failed to scan documents: {0}")]
    Walk(#[from] walkdir::Error),
    /// Page could not be fetched.
    #[error(transparent)]
    Reader(#[from] ReaderError),
    /// Chunks could not be embedded.
    #[error("Failed to embed chunks: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Knowledge store rejected the operation.
    #[error("Knowledge store error: {0}")]
    Store(#[from] StoreError),
    /// Provider returned a different number of vectors than chunks sent.
    #[error("Expected {expected} embeddings, received {actual}")]
    EmbeddingCount {
        /// Chunks sent.
        expected: usize,
        /// Vectors received.
        actual: usize,
    },
}

/// Chunks of one source in one locale, replaced together.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUnit {
    /// Identifier shared by every chunk of the source, e.g. `product:oak-14`.
    pub source_id: String,
    /// Locale partition.
    pub locale: Locale,
    /// Chunks with contiguous `chunk_index` values starting at zero.
    pub chunks: Vec<KnowledgeChunk>,
}

/// Run switches shared by every indexing mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexerOptions {
    /// Embed but do not write.
    pub dry_run: bool,
    /// Skip units that already have chunks in the store.
    pub skip_existing: bool,
    /// Pause after each processed unit.
    pub delay: Duration,
}

/// Outcome counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    /// Units embedded (and written unless dry-run).
    pub processed: usize,
    /// Units left untouched by `skip_existing`.
    pub skipped: usize,
    /// Units that failed and were skipped.
    pub failed: usize,
    /// Chunks embedded across processed units.
    pub chunks: usize,
}

impl IndexReport {
    /// Add another run's counters.
    pub fn merge(&mut self, other: IndexReport) {
        self.processed += other.processed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.chunks += other.chunks;
    }

    /// Log the counters under `label`.
    pub fn log(&self, label: &str) {
        tracing::info!(
            mode = label,
            processed = self.processed,
            skipped = self.skipped,
            failed = self.failed,
            chunks = self.chunks,
            "Indexing finished"
        );
    }
}

/// Embeds source units and writes them to the knowledge store.
pub struct Indexer {
    embedding: Arc<dyn EmbeddingClient>,
    store: Arc<dyn KnowledgeStore>,
    options: IndexerOptions,
}

impl Indexer {
    /// Build an indexer over explicit collaborators.
    pub fn new(
        embedding: Arc<dyn EmbeddingClient>,
        store: Arc<dyn KnowledgeStore>,
        options: IndexerOptions,
    ) -> Self {
        Self {
            embedding,
            store,
            options,
        }
    }

    /// Index one unit per product and locale.
    pub async fn index_products(
        &self,
        products: &[Product],
        site_base_url: &str,
        collection: Option<&str>,
    ) -> Result<IndexReport, IndexerError> {
        let units = product_units(products, site_base_url, collection)?;
        tracing::info!(products = products.len(), units = units.len(), collection, "Indexing products");

        let mut report = IndexReport::default();
        for unit in units {
            if self.should_skip(&unit.source_id, unit.locale, &mut report).await {
                continue;
            }
            self.store_unit(unit, &mut report).await;
        }
        Ok(report)
    }

    /// Fetch and index every marketing page in every locale.
    pub async fn index_pages(&self, reader: &dyn PageReader, site_base_url: &str) -> IndexReport {
        let mut report = IndexReport::default();
        for path in MARKETING_PAGES {
            for locale in Locale::ALL {
                let source_id = pages::page_source_id(path);
                if self.should_skip(&source_id, locale, &mut report).await {
                    continue;
                }

                let url = pages::page_url(site_base_url, locale, path);
                let page = match reader.read(&url).await {
                    Ok(page) => page,
                    Err(error) => {
                        report.failed += 1;
                        tracing::error!(url = %url, error = %error, "Failed to fetch page");
                        continue;
                    }
                };

                let unit = SourceUnit {
                    source_id,
                    locale,
                    chunks: pages::page_chunks(&page, path, locale, &url),
                };
                self.store_unit(unit, &mut report).await;
            }
        }
        report
    }

    /// Index documents, all tagged with `locale`.
    pub async fn index_documents(&self, documents: &[DocumentFile], locale: Locale) -> IndexReport {
        let mut report = IndexReport::default();
        for document in documents {
            let Some(unit) = document_unit(document, locale) else {
                tracing::warn!(path = %document.relative_path, "Skipping empty document");
                report.skipped += 1;
                continue;
            };
            if self.should_skip(&unit.source_id, locale, &mut report).await {
                continue;
            }
            self.store_unit(unit, &mut report).await;
        }
        report
    }

    async fn should_skip(&self, source_id: &str, locale: Locale, report: &mut IndexReport) -> bool {
        if !self.options.skip_existing {
            return false;
        }
        match self.store.exists(source_id, locale).await {
            Ok(true) => {
                report.skipped += 1;
                tracing::debug!(source_id, locale = %locale, "Skipping existing unit");
                true
            }
            Ok(false) => false,
            Err(error) => {
                report.failed += 1;
                tracing::error!(source_id, locale = %locale, error = %error, "Existence check failed");
                true
            }
        }
    }

    async fn store_unit(&self, unit: SourceUnit, report: &mut IndexReport) {
        let source_id = unit.source_id.clone();
        let locale = unit.locale;
        match self.embed_and_write(unit).await {
            Ok(chunks) => {
                report.processed += 1;
                report.chunks += chunks;
                tracing::info!(
                    source_id = %source_id,
                    locale = %locale,
                    chunks,
                    dry_run = self.options.dry_run,
                    "Indexed unit"
                );
            }
            Err(error) => {
                report.failed += 1;
                tracing::error!(source_id = %source_id, locale = %locale, error = %error, "Failed to index unit");
            }
        }

        if !self.options.delay.is_zero() {
            tokio::time::sleep(self.options.delay).await;
        }
    }

    async fn embed_and_write(&self, unit: SourceUnit) -> Result<usize, IndexerError> {
        let texts: Vec<String> = unit.chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embedding.generate_embeddings(texts).await?;
        if vectors.len() != unit.chunks.len() {
            return Err(IndexerError::EmbeddingCount {
                expected: unit.chunks.len(),
                actual: vectors.len(),
            });
        }

        let embedded: Vec<EmbeddedChunk> = unit
            .chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding })
            .collect();
        let count = embedded.len();

        if self.options.dry_run {
            return Ok(count);
        }
        self.store
            .replace(&unit.source_id, unit.locale, embedded)
            .await?;
        Ok(count)
    }
}
