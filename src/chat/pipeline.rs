//! Per-request chat orchestration: validate, retrieve, prompt, stream.

use crate::chat::messages::{ChatMessage, last_user_text, normalize_history};
use crate::chat::prompt::{build_system_prompt, render_context};
use crate::completion::{
    ChatModel, CompletionRequest, MALFORMED_RETRY_DELAY, ModelError, OpenAiChatModel, TextStream,
    complete_with_retry,
};
use crate::config::Config;
use crate::embedding::{EmbeddingClientError, OpenAiEmbeddingClient};
use crate::guard::{ValidationError, validate_input};
use crate::knowledge::{KnowledgeRetriever, QdrantKnowledgeStore, RetrievalError, Retriever};
use crate::locale::Locale;
use crate::metrics::ChatMetrics;
use crate::qdrant::{QdrantError, QdrantService};
use async_stream::stream;
use futures_util::StreamExt;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

/// Lifecycle of one chat request. Every transition is logged with the request id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestStage {
    /// Body parsed, nothing checked yet.
    Received,
    /// Running the input validator.
    Validating,
    /// Terminal: the validator refused the message.
    Rejected,
    /// The message passed validation.
    Validated,
    /// Embedding the question. Logged by the retriever inside the request span.
    Embedding,
    /// Searching the knowledge base. Logged by the retriever inside the request span.
    Retrieving,
    /// Assembling the system prompt and history.
    Prompting,
    /// Forwarding model deltas to the client.
    Streaming,
    /// Terminal: the answer finished.
    Complete,
    /// Terminal: an upstream call failed.
    Errored,
}

impl RequestStage {
    /// Lowercase label used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Validating => "validating",
            Self::Rejected => "rejected",
            Self::Validated => "validated",
            Self::Embedding => "embedding",
            Self::Retrieving => "retrieving",
            Self::Prompting => "prompting",
            Self::Streaming => "streaming",
            Self::Complete => "complete",
            Self::Errored => "errored",
        }
    }
}

impl fmt::Display for RequestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that end a chat request.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The request carried no user message.
    #[error("Request contains no user message")]
    MissingMessage,
    /// The request body was not a valid chat request.
    #[error("Malformed request body: {0}")]
    MalformedRequest(String),
    /// The input validator refused the message.
    #[error("Input rejected: {0}")]
    Rejected(#[from] ValidationError),
    /// Embedding or vector search failed.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    /// The chat model failed.
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl ChatError {
    /// Whether the client is at fault (HTTP 400) rather than an upstream service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingMessage | Self::MalformedRequest(_) | Self::Rejected(_)
        )
    }

    /// Localized text shown to the shopper.
    pub fn user_message(&self, locale: Locale) -> &'static str {
        let messages = locale.messages();
        match self {
            Self::MissingMessage => messages.missing_message,
            Self::MalformedRequest(_) => messages.invalid_content,
            Self::Rejected(error) => error.code.message(locale),
            Self::Retrieval(_) | Self::Model(_) => messages.processing_failed,
        }
    }
}

/// Failures while wiring the pipeline at process start.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Embedding client could not be built.
    #[error("Failed to build embedding client: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Qdrant client could not be built.
    #[error("Failed to build Qdrant client: {0}")]
    Qdrant(#[from] QdrantError),
    /// Chat model client could not be built.
    #[error("Failed to build chat model client: {0}")]
    Model(#[from] ModelError),
}

/// Tunables applied to every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    /// Chunks retrieved per question.
    pub top_k: usize,
    /// Length budget passed to the validator.
    pub input_max_length: usize,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Pause before retrying a malformed non-streaming completion.
    pub malformed_retry_delay: Duration,
}

impl PipelineSettings {
    /// Settings taken from the runtime configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.retrieval_top_k,
            input_max_length: config.input_max_length,
            max_tokens: config.chat_max_tokens,
            temperature: config.chat_temperature,
            malformed_retry_delay: MALFORMED_RETRY_DELAY,
        }
    }
}

/// A validated request with its prompt ready for the model.
#[derive(Debug, Clone)]
pub struct PreparedChat {
    /// Identifier used in logs and as the stream's message id.
    pub request_id: Uuid,
    /// Locale the answer is written in.
    pub locale: Locale,
    /// Prompt sent to the model.
    pub request: CompletionRequest,
}

/// A streamed answer.
pub struct ChatResponse {
    /// Identifier of the assistant message.
    pub message_id: String,
    /// Text deltas in arrival order.
    pub deltas: TextStream,
}

/// Retrieval-augmented chat over explicit collaborators.
pub struct ChatPipeline {
    retriever: Arc<dyn Retriever>,
    model: Arc<dyn ChatModel>,
    settings: PipelineSettings,
    metrics: Arc<ChatMetrics>,
}

impl ChatPipeline {
    /// Assemble a pipeline from its collaborators.
    pub fn new(
        retriever: Arc<dyn Retriever>,
        model: Arc<dyn ChatModel>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            retriever,
            model,
            settings,
            metrics: Arc::new(ChatMetrics::new()),
        }
    }

    /// Build the hosted-service clients once and wire them together.
    pub fn from_config(config: &Config) -> Result<Self, StartupError> {
        let embedding = Arc::new(OpenAiEmbeddingClient::from_config(config)?);
        let store = Arc::new(QdrantKnowledgeStore::new(
            QdrantService::from_config(config)?,
            config.knowledge_collection.clone(),
            config.embedding_dimension,
        ));
        let retriever = Arc::new(KnowledgeRetriever::new(embedding, store));
        let model = Arc::new(OpenAiChatModel::from_config(config)?);
        Ok(Self::new(
            retriever,
            model,
            PipelineSettings::from_config(config),
        ))
    }

    /// Shared request counters.
    pub fn metrics(&self) -> &ChatMetrics {
        &self.metrics
    }

    /// Validate the last user message, retrieve context and build the model request.
    pub async fn prepare(
        &self,
        messages: &[ChatMessage],
        locale: Locale,
    ) -> Result<PreparedChat, ChatError> {
        let request_id = Uuid::new_v4();
        self.metrics.record_request();
        trace_stage(request_id, RequestStage::Received);

        let Some(raw) = last_user_text(messages) else {
            self.metrics.record_rejected();
            tracing::info!(request_id = %request_id, locale = %locale, "Chat request without user message");
            trace_stage(request_id, RequestStage::Rejected);
            return Err(ChatError::MissingMessage);
        };

        trace_stage(request_id, RequestStage::Validating);
        let sanitized = match validate_input(&raw, self.settings.input_max_length).into_result() {
            Ok(sanitized) => sanitized,
            Err(error) => {
                self.metrics.record_rejected();
                tracing::warn!(
                    request_id = %request_id,
                    code = %error.code,
                    length = raw.chars().count(),
                    locale = %locale,
                    detail = %error.detail,
                    "Chat input rejected"
                );
                trace_stage(request_id, RequestStage::Rejected);
                return Err(error.into());
            }
        };
        trace_stage(request_id, RequestStage::Validated);

        let context = match self
            .retriever
            .retrieve(&sanitized, locale, self.settings.top_k)
            .instrument(tracing::debug_span!("chat_request", request_id = %request_id))
            .await
        {
            Ok(context) => context,
            Err(error) => return Err(self.fail(request_id, error.into())),
        };
        tracing::debug!(
            request_id = %request_id,
            chunks = context.len(),
            "Context retrieved"
        );

        trace_stage(request_id, RequestStage::Prompting);
        let system = build_system_prompt(locale, &render_context(&context, locale));
        let request = CompletionRequest {
            system,
            messages: normalize_history(messages, &sanitized),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        Ok(PreparedChat {
            request_id,
            locale,
            request,
        })
    }

    /// Answer as a stream of deltas. Completion and mid-stream failure are counted when the
    /// stream ends.
    pub async fn respond(
        &self,
        messages: &[ChatMessage],
        locale: Locale,
    ) -> Result<ChatResponse, ChatError> {
        let prepared = self.prepare(messages, locale).await?;
        let request_id = prepared.request_id;

        trace_stage(request_id, RequestStage::Streaming);
        let mut upstream = match self.model.stream(&prepared.request).await {
            Ok(stream) => stream,
            Err(error) => return Err(self.fail(request_id, error.into())),
        };

        let mut outcome = StreamOutcome::new(Arc::clone(&self.metrics), request_id);
        let deltas = stream! {
            let mut delta_count = 0usize;
            while let Some(item) = upstream.next().await {
                match item {
                    Ok(delta) => {
                        delta_count += 1;
                        yield Ok(delta);
                    }
                    Err(error) => {
                        outcome.errored();
                        tracing::error!(request_id = %request_id, error = %error, "Chat stream failed");
                        yield Err(error);
                        return;
                    }
                }
            }
            outcome.completed();
            tracing::info!(request_id = %request_id, deltas = delta_count, "Chat answer streamed");
        };

        Ok(ChatResponse {
            message_id: format!("msg-{request_id}"),
            deltas: Box::pin(deltas),
        })
    }

    /// Answer in one piece, retrying once if the model returns a malformed body.
    pub async fn respond_once(
        &self,
        messages: &[ChatMessage],
        locale: Locale,
    ) -> Result<String, ChatError> {
        let prepared = self.prepare(messages, locale).await?;
        let request_id = prepared.request_id;

        trace_stage(request_id, RequestStage::Streaming);
        match complete_with_retry(
            self.model.as_ref(),
            &prepared.request,
            self.settings.malformed_retry_delay,
        )
        .await
        {
            Ok(text) => {
                self.metrics.record_completed();
                trace_stage(request_id, RequestStage::Complete);
                Ok(text)
            }
            Err(error) => Err(self.fail(request_id, error.into())),
        }
    }

    fn fail(&self, request_id: Uuid, error: ChatError) -> ChatError {
        self.metrics.record_errored();
        tracing::error!(request_id = %request_id, error = %error, "Chat request failed");
        trace_stage(request_id, RequestStage::Errored);
        error
    }
}

/// Counts a streamed answer exactly once, including when the client drops the stream early.
struct StreamOutcome {
    metrics: Arc<ChatMetrics>,
    request_id: Uuid,
    settled: bool,
}

impl StreamOutcome {
    fn new(metrics: Arc<ChatMetrics>, request_id: Uuid) -> Self {
        Self {
            metrics,
            request_id,
            settled: false,
        }
    }

    fn completed(&mut self) {
        self.settled = true;
        self.metrics.record_completed();
        trace_stage(self.request_id, RequestStage::Complete);
    }

    fn errored(&mut self) {
        self.settled = true;
        self.metrics.record_errored();
        trace_stage(self.request_id, RequestStage::Errored);
    }
}

impl Drop for StreamOutcome {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(request_id = %self.request_id, "Chat stream dropped before it finished");
            self.errored();
        }
    }
}

fn trace_stage(request_id: Uuid, stage: RequestStage) {
    tracing::debug!(request_id = %request_id, stage = %stage, "Chat stage");
}
