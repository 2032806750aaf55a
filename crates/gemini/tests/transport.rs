//! End-to-end tests of the Gemini transport against an in-process server.

use acore::{ApiKey, Provider, ProviderError, ProviderErrorKind, Request, StreamChunk};
use aistudio_gemini::{Client, Gemini};
use axum::{
    Router,
    extract::{Path, Query},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures_util::StreamExt;
use serde_json::{Value, json};
use std::{collections::HashMap, time::Duration};
use tokio::task::JoinHandle;

const KEY: &str = "test-key-123";

fn json_response(status: StatusCode, body: Value) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

fn sse_response(events: &[Value]) -> Response {
    let body: String = events
        .iter()
        .map(|event| format!("data: {event}\r\n\r\n"))
        .collect();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/event-stream")],
        body,
    )
        .into_response()
}

fn text_event(text: &str) -> Value {
    json!({ "candidates": [{ "content": { "parts": [{ "text": text }], "role": "model" } }] })
}

async fn generate(Path(call): Path<String>, headers: HeaderMap, body: String) -> Response {
    let key = headers
        .get("x-goog-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if key != KEY {
        return json_response(
            StatusCode::BAD_REQUEST,
            json!({ "error": {
                "code": 400,
                "message": format!("API key not valid: {key}"),
                "status": "INVALID_ARGUMENT",
                "details": [{
                    "@type": "type.googleapis.com/google.rpc.ErrorInfo",
                    "reason": "API_KEY_INVALID"
                }]
            }}),
        );
    }

    let request: Value = serde_json::from_str(&body).unwrap_or_default();
    let prompt = request["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap_or_default()
        .to_owned();

    match call.as_str() {
        "echo:generateContent" => json_response(
            StatusCode::OK,
            json!({
                "candidates": [{
                    "content": { "parts": [{ "text": format!("echo: {prompt}") }], "role": "model" },
                    "finishReason": "STOP"
                }],
                "usageMetadata": { "promptTokenCount": 3, "candidatesTokenCount": 5 }
            }),
        ),
        "busy:generateContent" => {
            let mut response = json_response(
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": {
                    "code": 503,
                    "message": "The model is overloaded.",
                    "status": "UNAVAILABLE"
                }}),
            );
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, "7".parse().unwrap());
            response
        }
        "echo:streamGenerateContent" => {
            let mut last = text_event("world");
            last["usageMetadata"] = json!({ "promptTokenCount": 3, "candidatesTokenCount": 3 });
            sse_response(&[text_event("Hel"), text_event("lo, "), last])
        }
        "broken:streamGenerateContent" => sse_response(&[
            text_event("partial"),
            json!({ "error": { "code": 500, "message": "internal", "status": "INTERNAL" } }),
        ]),
        _ => json_response(
            StatusCode::NOT_FOUND,
            json!({ "error": {
                "code": 404,
                "message": format!("{call} is not found"),
                "status": "NOT_FOUND"
            }}),
        ),
    }
}

async fn list(Query(query): Query<HashMap<String, String>>) -> Response {
    match query.get("pageToken").map(String::as_str) {
        None => json_response(
            StatusCode::OK,
            json!({
                "models": [
                    {
                        "name": "models/gemini-1.5-flash",
                        "displayName": "Gemini 1.5 Flash",
                        "inputTokenLimit": 1048576,
                        "supportedGenerationMethods": ["generateContent"]
                    },
                    { "displayName": "missing name" }
                ],
                "nextPageToken": "p2"
            }),
        ),
        Some("p2") => json_response(
            StatusCode::OK,
            json!({ "models": [{ "name": "models/gemini-pro" }] }),
        ),
        Some(_) => json_response(StatusCode::BAD_REQUEST, json!({})),
    }
}

async fn serve() -> String {
    let app = Router::new()
        .route("/v1beta/models", get(list))
        .route("/v1beta/models/{call}", post(generate));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/v1beta")
}

async fn provider(key: &str) -> Gemini {
    let base = serve().await;
    Gemini::custom(Client::new(), &ApiKey::from(key), &base).unwrap()
}

#[tokio::test]
async fn generate_returns_text_and_usage() {
    let gemini = provider(KEY).await;
    let completion = gemini
        .generate(&Request::new("echo", "ping"))
        .await
        .unwrap();
    assert_eq!(completion.text, "echo: ping");
    assert_eq!(completion.usage.unwrap().total(), 8);
}

#[tokio::test]
async fn server_error_carries_retry_after_header() {
    let gemini = provider(KEY).await;
    let err = gemini
        .generate(&Request::new("models/busy", "ping"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::Server);
    assert_eq!(err.status, Some(503));
    assert_eq!(err.retry_after, Some(Duration::from_secs(7)));
}

#[tokio::test]
async fn invalid_key_is_unauthorized_and_redacted() {
    let gemini = provider("wrong-key").await;
    let err = gemini
        .generate(&Request::new("echo", "ping"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::Unauthorized);
    assert!(!err.message.contains("wrong-key"));
    assert!(err.message.contains("[REDACTED]"));
}

#[tokio::test]
async fn unknown_model_is_not_found() {
    let gemini = provider(KEY).await;
    let err = gemini
        .generate(&Request::new("nope", "ping"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::NotFound);
}

#[tokio::test]
async fn stream_yields_chunks_in_order() {
    let gemini = provider(KEY).await;
    let chunks: Vec<_> = gemini
        .stream(&Request::new("echo", "ping"))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["Hel", "lo, ", "world"]);
    assert_eq!(chunks.last().and_then(|c| c.usage).unwrap().total(), 6);
}

/// Start a stream through the trait and drain it on another task.
fn spawn_stream<P: Provider>(
    provider: &P,
    request: Request,
) -> JoinHandle<Vec<Result<StreamChunk, ProviderError>>> {
    let stream = provider.stream(&request);
    drop(request);
    tokio::spawn(stream.collect())
}

#[tokio::test]
async fn stream_outlives_request_and_provider() {
    let gemini = provider(KEY).await;
    let handle = spawn_stream(&gemini, Request::new("echo", "ping"));
    drop(gemini);
    let text: String = handle
        .await
        .unwrap()
        .into_iter()
        .map(|chunk| chunk.unwrap().text)
        .collect();
    assert_eq!(text, "Hello, world");
}

#[tokio::test]
async fn stream_error_follows_partial_output() {
    let gemini = provider(KEY).await;
    let items: Vec<_> = gemini
        .stream(&Request::new("broken", "ping"))
        .collect()
        .await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap().text, "partial");
    assert_eq!(items[1].as_ref().unwrap_err().kind, ProviderErrorKind::Server);
}

#[tokio::test]
async fn list_models_follows_pages_and_skips_malformed() {
    let gemini = provider(KEY).await;
    let models = gemini.list_models().await.unwrap();
    let ids: Vec<&str> = models.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["models/gemini-1.5-flash", "models/gemini-pro"]);
    assert_eq!(models[0].token_limit, Some(1_048_576));
}
