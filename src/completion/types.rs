//! Request, message and error types for chat completions.

use futures_core::Stream;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;

/// Speaker of a prompt message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions from the application.
    System,
    /// The shopper.
    User,
    /// The assistant's earlier answers.
    Assistant,
}

/// One normalized conversation turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    /// Speaker.
    pub role: Role,
    /// Plain text content.
    pub content: String,
}

impl PromptMessage {
    /// Convenience constructor.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Everything a chat model needs to produce one answer.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    /// System prompt placed before the conversation.
    pub system: String,
    /// Conversation history ending with the user's question.
    pub messages: Vec<PromptMessage>,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Errors raised by chat model providers.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Provider throttled the request (HTTP 429).
    #[error("Chat model rate limited the request")]
    RateLimited,
    /// Provider rejected the configured credentials.
    #[error("Chat model rejected credentials ({0})")]
    Auth(StatusCode),
    /// HTTP layer failed before or while reading the response.
    #[error("Chat completion request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Response body or stream event could not be decoded.
    #[error("Malformed chat completion response: {0}")]
    MalformedResponse(String),
    /// Provider answered with an unexpected status code.
    #[error("Unexpected chat completion response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Incremental answer text, one delta per item.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ModelError>> + Send>>;
