//! Integration tests for the HTTP chat surface
//!
//! Drives the full request path through the router: NDJSON streaming,
//! sources-first ordering, terminal error events and conversation
//! persistence across a session.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lyra::config::Config;
use lyra::context::{Instruction, Role};
use lyra::relay::StreamRelay;
use lyra::server::{AppState, create_router};
use lyra::store::MemoryStore;

const OLA_BODY: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"Ol\"}}]}\n\
                        data: {\"choices\":[{\"delta\":{\"content\":\"á\"}}]}\n\
                        data: [DONE]\n";

/// Build an application state wired to the given mock upstream
fn create_test_state(upstream_url: String, search_url: Option<String>) -> Arc<AppState> {
    unsafe { std::env::set_var("TEST_API_KEY", "test-key") };

    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.upstream.api_url = upstream_url;
    config.upstream.api_key_env = "TEST_API_KEY".to_string();
    config.search.api_key_env = "TEST_API_KEY".to_string();
    if let Some(url) = search_url {
        config.search.api_url = url;
    }
    config.memory.data_dir = temp_dir.path().to_path_buf();
    std::mem::forget(temp_dir);

    let relay = StreamRelay::new(&config.upstream).unwrap();
    let store = MemoryStore::new(config.memory.memory_file(), config.memory.persisted_cap);

    Arc::new(AppState {
        config,
        relay,
        store: Arc::new(tokio::sync::Mutex::new(store)),
    })
}

async fn post_perguntar(state: Arc<AppState>, body: &str) -> (StatusCode, Vec<String>) {
    let app = create_router(state);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/perguntar")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let lines = String::from_utf8_lossy(&body_bytes)
        .lines()
        .map(|l| l.to_string())
        .collect();
    (status, lines)
}

async fn load_memory(state: &Arc<AppState>) -> Vec<Instruction> {
    let store = state.store.lock().await;
    store.load().await
}

#[tokio::test]
async fn test_chat_flow_streams_and_persists() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(OLA_BODY, "text/event-stream"))
        .mount(&upstream)
        .await;

    let state = create_test_state(upstream.uri(), None);
    let (status, lines) = post_perguntar(state.clone(), r#"{"mensagem": "Oi"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(lines, vec![r#"{"delta":"Ol"}"#, r#"{"delta":"á"}"#]);

    let conversation = load_memory(&state).await;
    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation[0].role, Role::User);
    assert_eq!(conversation[0].content, "Oi");
    assert_eq!(conversation[1].role, Role::Assistant);
    assert_eq!(conversation[1].content, "Olá");
}

#[tokio::test]
async fn test_chat_flow_upstream_rejection_emits_single_error() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&upstream)
        .await;

    let state = create_test_state(upstream.uri(), None);
    let (status, lines) = post_perguntar(state.clone(), r#"{"mensagem": "Oi"}"#).await;

    // The stream itself was committed with 200; the failure arrives as the
    // single terminal event on the transport
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with(r#"{"error":"#));
    assert!(lines[0].contains("500"));

    // Only the user turn was persisted
    let conversation = load_memory(&state).await;
    assert_eq!(conversation.len(), 1);
    assert_eq!(conversation[0].role, Role::User);
}

#[tokio::test]
async fn test_chat_flow_sources_come_before_deltas() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(OLA_BODY, "text/event-stream"))
        .mount(&upstream)
        .await;

    let search = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "organic": [
                {"title": "Primeiro", "link": "https://a.example", "snippet": "resumo a"},
                {"title": "Segundo", "link": "https://b.example", "snippet": "resumo b"}
            ]
        })))
        .mount(&search)
        .await;

    let state = create_test_state(upstream.uri(), Some(search.uri()));
    let (status, lines) = post_perguntar(
        state,
        r#"{"mensagem": "quem ganhou ontem?", "usarWeb": true, "maxDocs": 2}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with(r#"{"fontes":"#));
    assert!(lines[0].contains("Primeiro"));
    assert!(lines[0].contains("https://b.example"));
    assert_eq!(lines[1], r#"{"delta":"Ol"}"#);
    assert_eq!(lines[2], r#"{"delta":"á"}"#);
}

#[tokio::test]
async fn test_chat_flow_search_failure_degrades_silently() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(OLA_BODY, "text/event-stream"))
        .mount(&upstream)
        .await;

    let search = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&search)
        .await;

    let state = create_test_state(upstream.uri(), Some(search.uri()));
    let (status, lines) =
        post_perguntar(state, r#"{"mensagem": "Oi", "usarWeb": true}"#).await;

    // No fontes event, chat continues untouched
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lines, vec![r#"{"delta":"Ol"}"#, r#"{"delta":"á"}"#]);
}

#[tokio::test]
async fn test_chat_flow_message_override_replaces_history() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(OLA_BODY, "text/event-stream"))
        .mount(&upstream)
        .await;

    let state = create_test_state(upstream.uri(), None);

    // Seed prior history that the override must replace
    {
        let store = state.store.lock().await;
        store
            .save(&[Instruction::new(Role::User, "conversa antiga")])
            .await
            .unwrap();
    }

    let body = r#"{"messages": [
        {"role": "user", "content": "primeira"},
        {"role": "assistant", "content": "resposta"},
        {"role": "user", "content": "segunda"}
    ]}"#;
    let (status, lines) = post_perguntar(state.clone(), body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(lines, vec![r#"{"delta":"Ol"}"#, r#"{"delta":"á"}"#]);

    let conversation = load_memory(&state).await;
    assert_eq!(conversation.len(), 4);
    assert_eq!(conversation[0].content, "primeira");
    assert_eq!(conversation[3].role, Role::Assistant);
    assert_eq!(conversation[3].content, "Olá");
    assert!(!conversation.iter().any(|i| i.content == "conversa antiga"));
}
