//! Embedding client abstraction and the OpenAI-compatible adapter.
//!
//! The chat path calls [`EmbeddingClient::generate_embeddings`] once per question and never
//! retries. The indexer wraps the same client in [`RetryingEmbeddingClient`], which backs off
//! on rate-limit responses only.

use crate::config::Config;
use crate::retry::{BackoffPolicy, retry_with_backoff};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider throttled the request (HTTP 429).
    #[error("Embedding provider rate limited the request")]
    RateLimited,
    /// Provider rejected the configured credentials.
    #[error("Embedding provider rejected credentials ({0})")]
    Auth(StatusCode),
    /// HTTP layer failed before a usable response arrived.
    #[error("Embedding request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Provider answered with an unexpected status code.
    #[error("Unexpected embedding response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Response body could not be decoded.
    #[error("Malformed embedding response: {0}")]
    MalformedResponse(String),
    /// Provider returned vectors of the wrong size.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension configured for the knowledge base.
        expected: usize,
        /// Dimension produced by the provider.
        actual: usize,
    },
    /// Nothing to embed, or the provider returned no vectors.
    #[error("Embedding request produced no vectors")]
    Empty,
}

impl EmbeddingClientError {
    /// Whether the failure is a rate-limit signal worth backing off for.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce one embedding vector per input text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;

    /// Dimensionality of every vector this client returns.
    fn dimension(&self) -> usize;
}

/// Client for the `POST /embeddings` endpoint of an OpenAI-compatible API.
pub struct OpenAiEmbeddingClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbeddingClient {
    /// Build a client from the runtime configuration.
    pub fn from_config(config: &Config) -> Result<Self, EmbeddingClientError> {
        let http = Client::builder()
            .user_agent("floorchat/0.1")
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        tracing::debug!(
            base_url = %config.openai_base_url,
            model = %config.embedding_model,
            dimension = config.embedding_dimension,
            "Initialized embedding client"
        );
        Ok(Self::with_client(
            http,
            &config.openai_base_url,
            &config.openai_api_key,
            &config.embedding_model,
            config.embedding_dimension,
        ))
    }

    /// Build a client around an existing HTTP client and explicit settings.
    pub fn with_client(
        http: Client,
        base_url: &str,
        api_key: &str,
        model: &str,
        dimension: usize,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            dimension,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }

    fn request_body(&self, texts: &[String]) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "input": texts,
        });
        // Only the v3 embedding models accept a `dimensions` override.
        if self.model.starts_with("text-embedding-3")
            && let Some(object) = body.as_object_mut()
        {
            object.insert("dimensions".into(), json!(self.dimension));
        }
        body
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Err(EmbeddingClientError::Empty);
        }

        tracing::debug!(
            model = %self.model,
            inputs = texts.len(),
            "Generating embeddings"
        );

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&self.request_body(&texts))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(EmbeddingClientError::RateLimited);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(EmbeddingClientError::Auth(status));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::UnexpectedStatus { status, body });
        }

        let body = response.text().await?;
        let mut payload: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|error| EmbeddingClientError::MalformedResponse(error.to_string()))?;

        if payload.data.is_empty() {
            return Err(EmbeddingClientError::Empty);
        }
        if payload.data.len() != texts.len() {
            return Err(EmbeddingClientError::MalformedResponse(format!(
                "expected {} embeddings, received {}",
                texts.len(),
                payload.data.len()
            )));
        }

        payload.data.sort_by_key(|datum| datum.index);
        let embeddings: Vec<Vec<f32>> = payload
            .data
            .into_iter()
            .map(|datum| datum.embedding)
            .collect();

        if let Some(vector) = embeddings
            .iter()
            .find(|vector| vector.len() != self.dimension)
        {
            return Err(EmbeddingClientError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Decorator that retries rate-limited embedding calls with exponential backoff.
pub struct RetryingEmbeddingClient<C> {
    inner: C,
    policy: BackoffPolicy,
}

impl<C> RetryingEmbeddingClient<C> {
    /// Wrap `inner` with the given backoff policy.
    pub fn new(inner: C, policy: BackoffPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<C> EmbeddingClient for RetryingEmbeddingClient<C>
where
    C: EmbeddingClient,
{
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        retry_with_backoff(
            self.policy,
            "embedding",
            EmbeddingClientError::is_rate_limited,
            || self.inner.generate_embeddings(texts.clone()),
        )
        .await
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}
