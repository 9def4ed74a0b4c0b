//! OpenAiCompatProvider against a throwaway local upstream.

use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use chat_mvp_core::config::Config;
use chat_mvp_core::error::{ChatError, ProviderError};
use chat_mvp_core::provider::{LlmProvider, OpenAiCompatProvider};
use chat_mvp_core::service::ChatService;
use chat_mvp_core::types::Message;

#[derive(Clone)]
struct Upstream {
    status: StatusCode,
    body: &'static str,
    seen: Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>,
}

async fn completions(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, String) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    upstream.seen.lock().unwrap().push((auth, body));
    (upstream.status, upstream.body.to_string())
}

/// Start a fake `/v1/chat/completions` server; returns its base URL.
async fn spawn_upstream(upstream: Upstream) -> String {
    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state(upstream);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/v1")
}

fn upstream(status: StatusCode, body: &'static str) -> Upstream {
    Upstream {
        status,
        body,
        seen: Arc::new(Mutex::new(Vec::new())),
    }
}

fn config_for(base: &str) -> Config {
    let mut cfg = Config::default();
    cfg.openai.api_key = "sk-test".to_string();
    cfg.openai.api_base = base.to_string();
    cfg
}

const HI_THERE: &str = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"hi there"},"finish_reason":"stop"}],"usage":{"prompt_tokens":9,"completion_tokens":2,"total_tokens":11}}"#;

#[tokio::test]
async fn test_request_wire_format() {
    let up = upstream(StatusCode::OK, HI_THERE);
    let seen = up.seen.clone();
    let base = spawn_upstream(up).await;

    let provider = OpenAiCompatProvider::new("sk-test".into(), Some(base)).unwrap();
    let resp = provider
        .chat(&[Message::system("sys"), Message::user("hello")], "gpt-3.5-turbo", 1000, 0.7)
        .await
        .unwrap();
    assert_eq!(resp.choices[0].content, "hi there");
    assert_eq!(resp.usage.total_tokens, 11);

    let seen = seen.lock().unwrap();
    let (auth, body) = &seen[0];
    assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
    assert_eq!(body["model"], "gpt-3.5-turbo");
    assert_eq!(body["max_tokens"], 1000);
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    assert_eq!(body["messages"][1], serde_json::json!({"role": "user", "content": "hello"}));
}

#[tokio::test]
async fn test_end_to_end_through_service() {
    let base = spawn_upstream(upstream(StatusCode::OK, HI_THERE)).await;
    let svc = ChatService::from_config(&config_for(&base)).unwrap();

    assert_eq!(svc.chat("u1", "hello").await.unwrap(), "hi there");
    let history = svc.history("u1").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].content, "hi there");
}

#[tokio::test]
async fn test_non_success_status() {
    let base = spawn_upstream(upstream(
        StatusCode::UNAUTHORIZED,
        r#"{"error":{"message":"Incorrect API key provided"}}"#,
    ))
    .await;
    let svc = ChatService::from_config(&config_for(&base)).unwrap();

    let err = svc.chat("u1", "hello").await.unwrap_err();
    match err {
        ChatError::Upstream(ProviderError::Api { status, message }) => {
            assert_eq!(status, 401);
            assert!(message.contains("Incorrect API key"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(svc.history("u1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_zero_choices() {
    let base = spawn_upstream(upstream(StatusCode::OK, r#"{"choices":[]}"#)).await;
    let svc = ChatService::from_config(&config_for(&base)).unwrap();

    let err = svc.chat("u1", "hello").await.unwrap_err();
    assert!(matches!(err, ChatError::EmptyResponse));
    assert_eq!(svc.history("u1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_malformed_body() {
    let base = spawn_upstream(upstream(StatusCode::OK, "not json at all")).await;
    let svc = ChatService::from_config(&config_for(&base)).unwrap();

    let err = svc.chat("u1", "hello").await.unwrap_err();
    assert!(matches!(err, ChatError::Upstream(ProviderError::Parse(_))));
}

#[tokio::test]
async fn test_unreachable_upstream() {
    // Bind then drop to get a port nothing listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let svc = ChatService::from_config(&config_for(&format!("http://{addr}/v1"))).unwrap();
    let err = svc.chat("u1", "hello").await.unwrap_err();
    assert!(matches!(err, ChatError::Upstream(ProviderError::Http(_))));
    assert_eq!(svc.history("u1").await.unwrap().len(), 1);
}
