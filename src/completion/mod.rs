//! Chat-completion seam: the [`ChatModel`] trait, its OpenAI-compatible client and the
//! malformed-response retry wrapper.

pub mod openai;
pub mod sse;
pub mod types;

pub use openai::OpenAiChatModel;
pub use types::{CompletionRequest, ModelError, PromptMessage, Role, TextStream};

use async_trait::async_trait;
use std::time::Duration;

/// Pause before the single retry of a malformed completion.
pub const MALFORMED_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Generates answers from a system prompt and a conversation.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Produce the whole answer in one response.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError>;

    /// Produce the answer as a stream of text deltas.
    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, ModelError>;
}

/// Non-streaming completion that retries once, after `delay`, when the provider returns a body
/// that is not valid JSON. Every other error is returned as is.
pub async fn complete_with_retry(
    model: &dyn ChatModel,
    request: &CompletionRequest,
    delay: Duration,
) -> Result<String, ModelError> {
    match model.complete(request).await {
        Err(ModelError::MalformedResponse(reason)) => {
            tracing::warn!(
                reason = %reason,
                delay_ms = delay.as_millis() as u64,
                "Malformed completion, retrying once"
            );
            tokio::time::sleep(delay).await;
            model.complete(request).await
        }
        other => other,
    }
}
