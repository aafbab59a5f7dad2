//! Chat request wire format and conversation normalization.

use crate::completion::{PromptMessage, Role};
use serde::Deserialize;

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// Conversation so far, oldest first.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// `false` asks for a single JSON answer instead of an event stream.
    #[serde(default)]
    pub stream: Option<bool>,
}

impl ChatRequest {
    /// Whether the client wants a streamed answer (the default).
    pub fn wants_stream(&self) -> bool {
        self.stream.unwrap_or(true)
    }
}

/// One typed fragment of a message; only `text` parts carry content.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessagePart {
    /// Part kind, e.g. `text`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Text of a `text` part.
    #[serde(default)]
    pub text: Option<String>,
}

/// Message content: a plain string or a list of typed parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Plain text.
    Text(String),
    /// Structured parts.
    Parts(Vec<MessagePart>),
}

impl Content {
    /// Concatenated text of the content, ignoring non-text parts.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter(|part| part.kind == "text")
                .filter_map(|part| part.text.as_deref())
                .collect(),
        }
    }
}

/// A conversation turn as received from the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "WireMessage")]
pub struct ChatMessage {
    /// Speaker.
    pub role: Role,
    /// Content in whichever shape the client used.
    pub content: Content,
}

impl ChatMessage {
    /// Plain-text user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Content::Text(text.into()),
        }
    }

    /// Plain-text assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::Text(text.into()),
        }
    }
}

#[derive(Deserialize)]
struct WireMessage {
    role: Role,
    #[serde(default)]
    content: Option<WireContent>,
    #[serde(default)]
    parts: Option<Vec<MessagePart>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Parts(Vec<MessagePart>),
}

impl From<WireMessage> for ChatMessage {
    fn from(wire: WireMessage) -> Self {
        let content = match (wire.content, wire.parts) {
            (Some(WireContent::Text(text)), _) if !text.is_empty() => Content::Text(text),
            (Some(WireContent::Parts(parts)), _) if !parts.is_empty() => Content::Parts(parts),
            (_, Some(parts)) => Content::Parts(parts),
            (Some(WireContent::Text(text)), None) => Content::Text(text),
            (Some(WireContent::Parts(parts)), None) => Content::Parts(parts),
            (None, None) => Content::Text(String::new()),
        };
        Self {
            role: wire.role,
            content,
        }
    }
}

/// Text of the most recent user message, if any.
pub fn last_user_text(messages: &[ChatMessage]) -> Option<String> {
    messages
        .iter()
        .rev()
        .find(|message| message.role == Role::User)
        .map(|message| message.content.text())
}

/// Flatten the conversation for the model.
///
/// Client-sent system messages are dropped, the last user turn is replaced by the validated
/// `sanitized_last`, and turns left without text are removed.
pub fn normalize_history(messages: &[ChatMessage], sanitized_last: &str) -> Vec<PromptMessage> {
    let last_user = messages
        .iter()
        .rposition(|message| message.role == Role::User);

    let mut history: Vec<PromptMessage> = messages
        .iter()
        .enumerate()
        .filter(|(_, message)| message.role != Role::System)
        .map(|(index, message)| {
            let content = if Some(index) == last_user {
                sanitized_last.to_string()
            } else {
                message.content.text().trim().to_string()
            };
            PromptMessage::new(message.role, content)
        })
        .filter(|message| !message.content.is_empty())
        .collect();

    if last_user.is_none() && !sanitized_last.is_empty() {
        history.push(PromptMessage::new(Role::User, sanitized_last));
    }
    history
}
