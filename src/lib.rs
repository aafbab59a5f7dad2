#![deny(missing_docs)]

//! Core library for the floorchat retrieval-augmented chat backend.

/// HTTP routing and the chat endpoint.
pub mod api;
/// Per-request chat orchestration.
pub mod chat;
/// Chat model abstraction and the OpenAI-compatible client.
pub mod completion;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Chat input validation and sanitization.
pub mod guard;
/// Offline knowledge indexer.
pub mod indexer;
/// Knowledge chunks, storage and retrieval.
pub mod knowledge;
/// Locales and localized user-facing strings.
pub mod locale;
/// Structured logging and tracing setup.
pub mod logging;
/// Chat traffic counters.
pub mod metrics;
/// Qdrant vector store integration.
pub mod qdrant;
/// Exponential backoff helpers.
pub mod retry;
