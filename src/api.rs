//! HTTP surface for the chat backend.
//!
//! - `POST /api/chat` – Validate the last user message, retrieve knowledge and answer. Streams a
//!   UI message stream (Server-Sent Events) by default; `"stream": false` returns `{ "text" }`.
//!   The `x-locale` header (`en` | `bg`, default `bg`) selects the answer language.
//! - `GET /metrics` – Chat request counters.
//! - `GET /health` – Liveness probe.

use crate::chat::{ChatError, ChatPipeline, ChatRequest, ChatResponse};
use crate::locale::{LOCALE_HEADER, Locale};
use crate::metrics::MetricsSnapshot;
use async_stream::stream;
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, Sse},
    },
    routing::{get, post},
};
use futures_core::Stream;
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::{Value, json};
use std::convert::Infallible;
use std::sync::Arc;

/// Header announcing the UI message stream protocol version.
pub const UI_STREAM_HEADER: &str = "x-vercel-ai-ui-message-stream";

const TEXT_PART_ID: &str = "text-0";

/// Build the HTTP router exposing the chat API surface.
pub fn create_router(pipeline: Arc<ChatPipeline>) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/metrics", get(get_metrics))
        .route("/health", get(health))
        .with_state(pipeline)
}

/// Answer a chat request as a stream or as one JSON body.
async fn chat(
    State(pipeline): State<Arc<ChatPipeline>>,
    headers: HeaderMap,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let locale = Locale::from_header(
        headers
            .get(LOCALE_HEADER)
            .and_then(|value| value.to_str().ok()),
    );
    let Json(request) = body.map_err(|rejection| {
        tracing::warn!(status = %rejection.status(), "Rejected malformed chat request body");
        AppError::new(ChatError::MalformedRequest(rejection.body_text()), locale)
    })?;

    if !request.wants_stream() {
        let text = pipeline
            .respond_once(&request.messages, locale)
            .await
            .map_err(|error| AppError::new(error, locale))?;
        return Ok(Json(TextResponse { text }).into_response());
    }

    let response = pipeline
        .respond(&request.messages, locale)
        .await
        .map_err(|error| AppError::new(error, locale))?;

    let events = ui_message_stream(response, locale).map(Ok::<_, Infallible>);
    Ok((
        [
            (
                HeaderName::from_static(UI_STREAM_HEADER),
                HeaderValue::from_static("v1"),
            ),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        ],
        Sse::new(events),
    )
        .into_response())
}

/// Body of a non-streaming answer.
#[derive(Serialize)]
struct TextResponse {
    text: String,
}

/// Translate model deltas into UI message stream events.
///
/// Order: `start`, `text-start`, one `text-delta` per delta, `text-end`, `finish`, `[DONE]`. A
/// failing delta stream ends with an `error` event carrying the localized generic message.
fn ui_message_stream(response: ChatResponse, locale: Locale) -> impl Stream<Item = Event> + Send {
    let ChatResponse {
        message_id,
        mut deltas,
    } = response;

    stream! {
        yield json_event(json!({ "type": "start", "messageId": message_id }));
        yield json_event(json!({ "type": "text-start", "id": TEXT_PART_ID }));

        while let Some(item) = deltas.next().await {
            match item {
                Ok(delta) => {
                    yield json_event(json!({
                        "type": "text-delta",
                        "id": TEXT_PART_ID,
                        "delta": delta,
                    }));
                }
                Err(_) => {
                    yield json_event(json!({
                        "type": "error",
                        "errorText": locale.messages().processing_failed,
                    }));
                    yield Event::default().data("[DONE]");
                    return;
                }
            }
        }

        yield json_event(json!({ "type": "text-end", "id": TEXT_PART_ID }));
        yield json_event(json!({ "type": "finish" }));
        yield Event::default().data("[DONE]");
    }
}

fn json_event(payload: Value) -> Event {
    Event::default().data(payload.to_string())
}

/// Return the chat request counters.
async fn get_metrics(State(pipeline): State<Arc<ChatPipeline>>) -> Json<MetricsSnapshot> {
    Json(pipeline.metrics().snapshot())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

struct AppError {
    error: ChatError,
    locale: Locale,
}

impl AppError {
    fn new(error: ChatError, locale: Locale) -> Self {
        Self { error, locale }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.error.user_message(self.locale);
        if self.error.is_client_error() {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
        } else {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": message, "details": self.error.to_string() })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::PipelineSettings;
    use crate::completion::stub::ScriptedModel;
    use crate::completion::{ChatModel, CompletionRequest, ModelError, TextStream};
    use crate::knowledge::{RetrievalContext, RetrievalError, Retriever};
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request},
    };
    use futures_util::stream as futures_stream;
    use std::time::Duration;
    use tower::ServiceExt;

    const SETTINGS: PipelineSettings = PipelineSettings {
        top_k: 5,
        input_max_length: 800,
        max_tokens: 1000,
        temperature: 0.3,
        malformed_retry_delay: Duration::from_millis(1),
    };

    struct EmptyRetriever;

    #[async_trait]
    impl Retriever for EmptyRetriever {
        async fn retrieve(
            &self,
            _query: &str,
            _locale: Locale,
            _k: usize,
        ) -> Result<RetrievalContext, RetrievalError> {
            Ok(RetrievalContext::default())
        }
    }

    /// Emits one delta, then fails.
    struct BrokenStreamModel;

    #[async_trait]
    impl ChatModel for BrokenStreamModel {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, ModelError> {
            Err(ModelError::RateLimited)
        }

        async fn stream(&self, _request: &CompletionRequest) -> Result<TextStream, ModelError> {
            Ok(Box::pin(futures_stream::iter(vec![
                Ok("Par".to_string()),
                Err(ModelError::MalformedResponse("cut off".into())),
            ])))
        }
    }

    fn app(model: Arc<dyn ChatModel>) -> (Router, Arc<ChatPipeline>) {
        let pipeline = Arc::new(ChatPipeline::new(Arc::new(EmptyRetriever), model, SETTINGS));
        (create_router(pipeline.clone()), pipeline)
    }

    fn chat_request(body: Value, locale: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/chat")
            .header("content-type", "application/json");
        if let Some(locale) = locale {
            builder = builder.header(LOCALE_HEADER, locale);
        }
        builder.body(Body::from(body.to_string())).expect("request")
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        String::from_utf8(bytes.to_vec()).expect("utf8 body")
    }

    fn data_lines(body: &str) -> Vec<String> {
        body.lines()
            .filter_map(|line| line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")))
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn streams_ui_message_events_in_order() {
        let (router, pipeline) = app(Arc::new(ScriptedModel::answering(&["Hello", " there"])));
        let response = router
            .oneshot(chat_request(
                json!({ "messages": [{ "role": "user", "parts": [{ "type": "text", "text": "Do you sell oak?" }] }] }),
                Some("en"),
            ))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(UI_STREAM_HEADER).expect("protocol header"),
            "v1"
        );
        let lines = data_lines(&body_text(response).await);
        assert_eq!(lines.last().map(String::as_str), Some("[DONE]"));

        let events: Vec<Value> = lines[..lines.len() - 1]
            .iter()
            .map(|line| serde_json::from_str(line).expect("json event"))
            .collect();
        let kinds: Vec<&str> = events
            .iter()
            .map(|event| event["type"].as_str().expect("type"))
            .collect();
        assert_eq!(
            kinds,
            vec!["start", "text-start", "text-delta", "text-delta", "text-end", "finish"]
        );
        assert!(events[0]["messageId"].as_str().expect("id").starts_with("msg-"));
        assert_eq!(events[2]["delta"], "Hello");
        assert_eq!(events[3]["delta"], " there");
        assert_eq!(pipeline.metrics().snapshot().completed, 1);
    }

    #[tokio::test]
    async fn rejects_overlong_message_with_localized_text() {
        for (header, locale) in [(Some("en"), Locale::En), (None, Locale::Bg)] {
            let (router, _) = app(Arc::new(ScriptedModel::default()));
            let response = router
                .oneshot(chat_request(
                    json!({ "messages": [{ "role": "user", "content": "a ".repeat(401) }] }),
                    header,
                ))
                .await
                .expect("router response");

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
            assert_eq!(body["error"], locale.messages().too_long);
        }
    }

    #[tokio::test]
    async fn missing_user_message_is_bad_request() {
        let (router, _) = app(Arc::new(ScriptedModel::default()));
        let response = router
            .oneshot(chat_request(json!({ "messages": [] }), Some("en")))
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
        assert_eq!(body["error"], Locale::En.messages().missing_message);
    }

    #[tokio::test]
    async fn malformed_body_is_localized_json_error() {
        let bodies = [
            r#"{ "messages": [{ "role": "tool", "content": "hi" }] }"#,
            r#"{ "messages": [{ "role": "user", "#,
        ];
        for (raw, locale) in [(bodies[0], Locale::En), (bodies[1], Locale::Bg)] {
            let (router, pipeline) = app(Arc::new(ScriptedModel::default()));
            let request = Request::builder()
                .method(Method::POST)
                .uri("/api/chat")
                .header("content-type", "application/json")
                .header(LOCALE_HEADER, locale.as_str())
                .body(Body::from(raw))
                .expect("request");
            let response = router.oneshot(request).await.expect("router response");

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body: Value = serde_json::from_str(&body_text(response).await).expect("json body");
            assert_eq!(body, json!({ "error": locale.messages().invalid_content }));
            assert_eq!(pipeline.metrics().snapshot().requests, 0);
        }
    }

    #[tokio::test]
    async fn upstream_failure_is_internal_error_with_details() {
        let (router, _) = app(Arc::new(BrokenStreamModel));
        let response = router
            .oneshot(chat_request(
                json!({ "messages": [{ "role": "user", "content": "Oak?" }], "stream": false }),
                Some("bg"),
            ))
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
        assert_eq!(body["error"], Locale::Bg.messages().processing_failed);
        assert!(body["details"].as_str().expect("details").contains("rate limited"));
    }

    #[tokio::test]
    async fn failing_stream_ends_with_error_event() {
        let (router, pipeline) = app(Arc::new(BrokenStreamModel));
        let response = router
            .oneshot(chat_request(
                json!({ "messages": [{ "role": "user", "content": "Oak?" }] }),
                Some("en"),
            ))
            .await
            .expect("router response");
        let lines = data_lines(&body_text(response).await);
        assert_eq!(lines.last().map(String::as_str), Some("[DONE]"));
        let error: Value = serde_json::from_str(&lines[lines.len() - 2]).expect("error event");
        assert_eq!(error["type"], "error");
        assert_eq!(error["errorText"], Locale::En.messages().processing_failed);
        assert!(!lines.iter().any(|line| line.contains("\"finish\"")));
        assert_eq!(pipeline.metrics().snapshot().errored, 1);
    }

    #[tokio::test]
    async fn non_streaming_answer_returns_text() {
        let (router, _) = app(Arc::new(ScriptedModel::answering(&["Yes, ", "we do."])));
        let response = router
            .oneshot(chat_request(
                json!({ "messages": [{ "role": "user", "content": "Samples?" }], "stream": false }),
                None,
            ))
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
        assert_eq!(body, json!({ "text": "Yes, we do." }));
    }

    #[tokio::test]
    async fn metrics_and_health_endpoints_respond() {
        let (router, pipeline) = app(Arc::new(ScriptedModel::default()));
        pipeline.metrics().record_request();

        let response = router
            .clone()
            .oneshot(Request::get("/metrics").body(Body::empty()).expect("request"))
            .await
            .expect("metrics");
        let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
        assert_eq!(body["requests"], 1);
        assert_eq!(body["errored"], 0);

        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("health");
        let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
        assert_eq!(body, json!({ "status": "ok" }));
    }
}
