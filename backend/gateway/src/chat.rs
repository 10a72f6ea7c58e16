//! Streaming chat endpoint (`POST /api/chat`).
//!
//! Pre-stream failures (bad body, upstream refused) are plain JSON errors.
//! After the headers are out, every outcome is reported as a frame.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, instrument, warn};

use chatbox_core::frame::DELIMITER;
use chatbox_core::{
    ChatRequest, FrameEvent, GenerationRequest, ProviderError, TokenProvider, TokenStream,
};
use chatbox_logging::redact_sensitive_data;

use crate::error::ApiError;
use crate::server::GatewayState;

/// Frames buffered between the pump task and the response body.
const FRAME_BUFFER: usize = 64;

type FrameSender = mpsc::Sender<Result<Bytes, Infallible>>;

/// Handler for `POST /api/chat`.
#[instrument(skip_all)]
pub async fn stream_chat(
    State(state): State<GatewayState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = match payload {
        Ok(Json(request)) if !request.message.is_empty() => request,
        Ok(_) => return Err(ApiError::InvalidMessage),
        Err(rejection) => {
            debug!(error = %rejection, "Rejected chat request body");
            return Err(ApiError::InvalidMessage);
        }
    };

    let model = request
        .model
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| state.default_model.clone());

    let (provider, upstream_model) = state.registry.resolve(&model).map_err(|e| {
        error!(error = %loggable(&e), "No provider for chat request");
        ApiError::StreamingFailed
    })?;

    let generation = GenerationRequest {
        model: upstream_model,
        prompt: request.message,
    };
    let tokens = provider.stream(&generation).await.map_err(|e| {
        error!(provider = provider.name(), error = %loggable(&e), "Failed to open upstream stream");
        ApiError::StreamingFailed
    })?;

    info!(provider = provider.name(), model = %generation.model, "Streaming chat response");

    let (tx, rx) = mpsc::channel(FRAME_BUFFER);
    tokio::spawn(pump(tokens, tx, state.keepalive));

    Ok(event_stream_response(Body::from_stream(ReceiverStream::new(rx))))
}

/// Upstream errors can echo request headers or keys back in their bodies.
fn loggable(e: &ProviderError) -> String {
    redact_sensitive_data(&e.to_string())
}

fn event_stream_response(body: Body) -> Response {
    let mut response = body.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream; charset=utf-8"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-transform"),
    );
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

/// What the pump saw while waiting on upstream.
enum Step {
    Item(Option<Result<String, ProviderError>>),
    Idle,
    ClientGone,
}

async fn next_step(
    tokens: &mut TokenStream,
    tx: &FrameSender,
    keepalive: Option<Duration>,
) -> Step {
    let next = async {
        match keepalive {
            Some(period) => match tokio::time::timeout(period, tokens.next()).await {
                Ok(item) => Step::Item(item),
                Err(_) => Step::Idle,
            },
            None => Step::Item(tokens.next().await),
        }
    };

    tokio::select! {
        _ = tx.closed() => Step::ClientGone,
        step = next => step,
    }
}

/// Relay upstream tokens into the response body until a terminal frame is sent
/// or the client goes away. Dropping `tokens` on return releases the upstream call.
async fn pump(mut tokens: TokenStream, tx: FrameSender, keepalive: Option<Duration>) {
    let mut sent = 0usize;

    loop {
        let frame = match next_step(&mut tokens, &tx, keepalive).await {
            Step::ClientGone => {
                debug!(sent, "Client disconnected, dropping upstream stream");
                return;
            }
            Step::Idle => FrameEvent::Keepalive,
            Step::Item(Some(Ok(token))) if token.is_empty() => continue,
            Step::Item(Some(Ok(token))) => {
                if token.contains(DELIMITER) {
                    warn!(len = token.len(), "Token contains a frame delimiter");
                }
                sent += 1;
                FrameEvent::Token(token)
            }
            Step::Item(Some(Err(e))) => {
                let diagnostic = loggable(&e);
                warn!(error = %diagnostic, sent, "Upstream failed mid-stream");
                FrameEvent::Error(diagnostic)
            }
            Step::Item(None) => {
                debug!(sent, "Upstream completed");
                FrameEvent::Done
            }
        };

        let terminal = frame.is_terminal();
        if tx.send(Ok(Bytes::from(frame.encode()))).await.is_err() {
            debug!(sent, "Client disconnected, dropping upstream stream");
            return;
        }
        if terminal {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use chatbox_core::FrameParser;
    use chatbox_providers::{MockProvider, ProviderRegistry};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::server::build_router;

    fn state_with(provider: MockProvider) -> GatewayState {
        let mut registry = ProviderRegistry::new();
        registry.register("mock", Arc::new(provider));
        GatewayState::new(registry)
    }

    fn post_chat(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let app = build_router(state_with(MockProvider::new(["x"])));

        for body in [r#"{"message":""}"#, r#"{"message":42}"#, r#"{}"#, "not json"] {
            let response = app.clone().oneshot(post_chat(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body}");
            assert_eq!(
                body_text(response).await,
                r#"{"error":"Message is required and must be a string"}"#
            );
        }
    }

    #[tokio::test]
    async fn test_streams_tokens_then_done() {
        let app = build_router(state_with(MockProvider::new(["Hel", "", "lo", " 👋"])));
        let response = app.oneshot(post_chat(r#"{"message":"hi"}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers["content-type"], "text/event-stream; charset=utf-8");
        assert_eq!(headers["cache-control"], "no-cache, no-transform");
        assert_eq!(headers["x-accel-buffering"], "no");

        assert_eq!(
            body_text(response).await,
            "data: Hel\n\ndata: lo\n\ndata:  👋\n\ndata: [DONE]\n\n"
        );
    }

    #[tokio::test]
    async fn test_mid_stream_failure_ends_with_error_frame() {
        let app = build_router(state_with(MockProvider::new(["a", "b", "c"]).failing_after(2)));
        let response = app.oneshot(post_chat(r#"{"message":"hi"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut parser = FrameParser::new();
        let events: Vec<FrameEvent> = parser
            .push(&body_text(response).await)
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1], FrameEvent::Token("b".into()));
        match &events[2] {
            FrameEvent::Error(diag) => assert!(diag.contains("mock upstream failure")),
            other => panic!("expected error frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_open_failure_is_plain_500() {
        let app = build_router(state_with(MockProvider::new(["a"]).failing_on_open()));
        let response = app.oneshot(post_chat(r#"{"message":"hi"}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, r#"{"error":"Streaming failed"}"#);
    }

    #[tokio::test]
    async fn test_model_prefix_selects_provider() {
        let mut registry = ProviderRegistry::new();
        registry.register("mock", Arc::new(MockProvider::new(["default"])));
        registry.register("echo", Arc::new(MockProvider::echo()));
        let app = build_router(GatewayState::new(registry));

        let response = app
            .oneshot(post_chat(r#"{"message":"ping","model":"echo/any"}"#))
            .await
            .unwrap();
        assert_eq!(
            body_text(response).await,
            "data: Echo:\n\ndata:  ping\n\ndata: [DONE]\n\n"
        );
    }

    #[test]
    fn test_upstream_error_body_is_redacted_for_logs() {
        let err = ProviderError::Status {
            provider: "openai".into(),
            status: 401,
            body: r#"{"error":{"message":"Bad key: sk-proj-abcdefghijklmnop1234"}}"#.into(),
        };
        let line = loggable(&err);
        assert!(line.contains("401"));
        assert!(!line.contains("abcdefghijklmnop1234"));
        assert!(line.contains("[REDACTED_KEY]"));
    }

    #[tokio::test]
    async fn test_token_with_delimiter_is_forwarded_verbatim() {
        let app = build_router(state_with(MockProvider::new(["a\n\nb", "c"])));
        let response = app.oneshot(post_chat(r#"{"message":"hi"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let wire = body_text(response).await;
        assert_eq!(wire, "data: a\n\nb\n\ndata: c\n\ndata: [DONE]\n\n");

        // The consumer sees the token cut at the embedded delimiter, nothing worse.
        let mut parser = FrameParser::new();
        let events = parser.push(&wire);
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], Ok(FrameEvent::Token("a".into())));
        assert!(matches!(
            events[1],
            Err(chatbox_core::ProtocolError::MissingDataPrefix(_))
        ));
        assert_eq!(events[2], Ok(FrameEvent::Token("c".into())));
        assert_eq!(events[3], Ok(FrameEvent::Done));
    }

    #[tokio::test]
    async fn test_keepalive_during_upstream_silence() {
        let provider = MockProvider::new(["slow"]).with_delay(Duration::from_millis(120));
        let state = state_with(provider).with_keepalive(Some(Duration::from_millis(20)));
        let response = build_router(state)
            .oneshot(post_chat(r#"{"message":"hi"}"#))
            .await
            .unwrap();

        let text = body_text(response).await;
        assert!(text.starts_with(": keepalive\n\n"));
        assert!(text.ends_with("data: slow\n\ndata: [DONE]\n\n"));
    }

    #[tokio::test]
    async fn test_pump_stops_when_client_is_gone() {
        let provider = MockProvider::new(["a", "b", "c"]).with_delay(Duration::from_millis(10));
        let tokens = provider
            .stream(&GenerationRequest {
                model: "mock".into(),
                prompt: "hi".into(),
            })
            .await
            .unwrap();

        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        tokio::time::timeout(Duration::from_secs(1), pump(tokens, tx, None))
            .await
            .unwrap();
    }
}
