//! Client for the `POST /chat/completions` endpoint of an OpenAI-compatible API.

use crate::completion::ChatModel;
use crate::completion::sse::{SseDecoder, SseEvent, parse_delta};
use crate::completion::types::{CompletionRequest, ModelError, Role, TextStream};
use crate::config::Config;
use async_stream::try_stream;
use async_trait::async_trait;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

/// Hosted chat model reached over HTTP.
pub struct OpenAiChatModel {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChatModel {
    /// Build a client from the runtime configuration.
    pub fn from_config(config: &Config) -> Result<Self, ModelError> {
        let http = Client::builder()
            .user_agent("floorchat/0.1")
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        tracing::debug!(
            base_url = %config.openai_base_url,
            model = %config.chat_model,
            "Initialized chat model client"
        );
        Ok(Self::with_client(
            http,
            &config.openai_base_url,
            &config.openai_api_key,
            &config.chat_model,
        ))
    }

    /// Build a client around an existing HTTP client and explicit settings.
    pub fn with_client(http: Client, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    fn request_body(&self, request: &CompletionRequest, stream: bool) -> Value {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(json!({ "role": Role::System, "content": request.system }));
        messages.extend(
            request
                .messages
                .iter()
                .map(|message| json!({ "role": message.role, "content": message.content })),
        );
        json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "stream": stream,
        })
    }

    async fn send(&self, request: &CompletionRequest, stream: bool) -> Result<Response, ModelError> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(request, stream))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ModelError::RateLimited);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ModelError::Auth(status));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::UnexpectedStatus { status, body });
        }
        Ok(response)
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        let response = self.send(request, false).await?;
        let body = response.text().await?;
        let payload: CompletionResponse = serde_json::from_str(&body)
            .map_err(|error| ModelError::MalformedResponse(error.to_string()))?;
        payload
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| ModelError::MalformedResponse("response has no choices".into()))
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, ModelError> {
        let response = self.send(request, true).await?;
        Ok(Box::pin(decode_deltas(response.bytes_stream())))
    }
}

/// Turn a chunked `text/event-stream` body into text deltas, stopping at `[DONE]`.
fn decode_deltas<S, B>(bytes: S) -> impl Stream<Item = Result<String, ModelError>> + Send
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    try_stream! {
        let mut bytes = Box::pin(bytes);
        let mut decoder = SseDecoder::default();
        let mut finished = false;
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(ModelError::from)?;
            for event in decoder.push(chunk.as_ref()) {
                match event {
                    SseEvent::Done => {
                        finished = true;
                        break;
                    }
                    SseEvent::Data(data) => {
                        if let Some(delta) = parse_delta(&data)? {
                            yield delta;
                        }
                    }
                }
            }
            if finished {
                break;
            }
        }
        if !finished {
            if let Some(SseEvent::Data(data)) = decoder.finish() {
                if let Some(delta) = parse_delta(&data)? {
                    yield delta;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::PromptMessage;
    use futures_util::TryStreamExt;
    use httpmock::{Method::POST, MockServer};

    fn model(server: &MockServer) -> OpenAiChatModel {
        OpenAiChatModel::with_client(
            Client::builder()
                .user_agent("floorchat-test")
                .build()
                .expect("client"),
            &server.base_url(),
            "sk-test",
            "gpt-test",
        )
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: "You sell floors.".into(),
            messages: vec![PromptMessage::new(Role::User, "Do you have oak?")],
            max_tokens: 100,
            temperature: 0.3,
        }
    }

    fn sse_body(deltas: &[&str]) -> String {
        let mut body = String::from("data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n");
        for delta in deltas {
            body.push_str(&format!(
                "data: {}\n\n",
                json!({ "choices": [{ "delta": { "content": delta } }] })
            ));
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    #[tokio::test]
    async fn streams_deltas_until_done() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("authorization", "Bearer sk-test")
                    .json_body_partial(
                        r#"{"model":"gpt-test","stream":true,"max_tokens":100,"messages":[{"role":"system","content":"You sell floors."},{"role":"user","content":"Do you have oak?"}]}"#,
                    );
                then.status(200)
                    .header("content-type", "text/event-stream")
                    .body(sse_body(&["Yes, ", "we do."]));
            })
            .await;

        let deltas: Vec<String> = model(&server)
            .stream(&request())
            .await
            .expect("stream")
            .try_collect()
            .await
            .expect("deltas");

        mock.assert();
        assert_eq!(deltas, vec!["Yes, ".to_string(), "we do.".to_string()]);
    }

    #[tokio::test]
    async fn malformed_event_ends_stream_with_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).body(
                    "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\ndata: <oops>\n\n",
                );
            })
            .await;

        let mut stream = model(&server).stream(&request()).await.expect("stream");
        assert_eq!(stream.next().await.expect("first").expect("delta"), "Hi");
        assert!(matches!(
            stream.next().await,
            Some(Err(ModelError::MalformedResponse(_)))
        ));
    }

    #[tokio::test]
    async fn complete_returns_message_content() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .json_body_partial(r#"{"stream":false}"#);
                then.status(200).json_body(json!({
                    "choices": [{ "message": { "role": "assistant", "content": "Oak is in stock." } }]
                }));
            })
            .await;

        let text = model(&server).complete(&request()).await.expect("text");
        assert_eq!(text, "Oak is in stock.");
    }

    #[tokio::test]
    async fn maps_rate_limit_and_auth_statuses() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(429);
            })
            .await;
        assert!(matches!(
            model(&server).complete(&request()).await,
            Err(ModelError::RateLimited)
        ));

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(401);
            })
            .await;
        assert!(matches!(
            model(&server).stream(&request()).await,
            Err(ModelError::Auth(StatusCode::UNAUTHORIZED))
        ));
    }
}
