//! HTTP surface for the chat relay
//!
//! Exposes the streaming chat endpoint plus the conversation memory and
//! health endpoints. The chat handler validates the request, resolves the
//! collaborators that need credentials, then hands the session to a
//! background task and immediately returns a chunked NDJSON response fed
//! by that task.

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use futures::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::{Mutex as TokioMutex, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::context::{Instruction, Role, assemble, now_brasilia, web_context_instruction};
use crate::error::{LyraError, Result};
use crate::relay::{EventSink, OutboundEvent, StreamRelay};
use crate::search::SearchClient;
use crate::store::MemoryStore;

/// Shared application state for all handlers
pub struct AppState {
    /// Immutable server configuration
    pub config: Config,
    /// Upstream stream relay
    pub relay: StreamRelay,
    /// Conversation store, locked per load/save
    pub store: Arc<TokioMutex<MemoryStore>>,
}

/// Inbound chat request body
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Current user utterance
    #[serde(default)]
    pub mensagem: Option<String>,
    /// Full message-list override; replaces the loaded history
    #[serde(default)]
    pub messages: Option<Vec<Instruction>>,
    /// Whether to augment the prompt with web-search context
    #[serde(default, rename = "usarWeb")]
    pub usar_web: bool,
    /// Requested number of search results, clamped server-side
    #[serde(default, rename = "maxDocs")]
    pub max_docs: Option<usize>,
}

/// The chat relay server
pub struct ChatServer {
    config: Config,
}

impl ChatServer {
    /// Create a new server with the given configuration
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Start the server and listen for requests
    ///
    /// The upstream credential is resolved here, before any request is
    /// accepted; a missing key aborts startup.
    pub async fn serve(&self) -> Result<()> {
        let relay = StreamRelay::new(&self.config.upstream)?;
        let store = MemoryStore::new(
            self.config.memory.memory_file(),
            self.config.memory.persisted_cap,
        );

        let state = Arc::new(AppState {
            config: self.config.clone(),
            relay,
            store: Arc::new(TokioMutex::new(store)),
        });

        let app = create_router(state);

        let addr: SocketAddr = self
            .config
            .server
            .listen_addr
            .parse()
            .map_err(|e| LyraError::Config(format!("Invalid listen address: {e}")))?;

        tracing::info!("Starting chat relay server on {addr}");
        tracing::info!("Upstream model: {}", self.config.upstream.model);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| LyraError::Server(format!("Failed to bind to {addr}: {e}")))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| LyraError::Server(e.to_string()))?;

        tracing::info!("Chat relay server shut down gracefully");
        Ok(())
    }
}

/// Create the router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/perguntar", post(perguntar_handler))
        .route(
            "/memory",
            get(memory_get_handler).delete(memory_delete_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint - returns JSON status
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Return the persisted conversation
async fn memory_get_handler(State(state): State<Arc<AppState>>) -> Json<Vec<Instruction>> {
    let store = state.store.lock().await;
    Json(store.load().await)
}

/// Clear the persisted conversation
async fn memory_delete_handler(State(state): State<Arc<AppState>>) -> Response<Body> {
    let store = state.store.lock().await;
    match store.save(&[]).await {
        Ok(()) => Json(serde_json::json!({"ok": true})).into_response(),
        Err(e) => {
            warn!("failed to clear conversation: {e}");
            create_error_response(StatusCode::INTERNAL_SERVER_ERROR, "falha ao limpar a memória")
        }
    }
}

/// Streaming chat endpoint
///
/// Validation and credential resolution happen before the stream is
/// committed, so configuration errors surface as plain JSON responses and
/// never as partial output.
async fn perguntar_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Response<Body> {
    let mensagem = request.mensagem.unwrap_or_default();
    let override_messages = request.messages.filter(|m| !m.is_empty());

    if mensagem.trim().is_empty() && override_messages.is_none() {
        return create_error_response(StatusCode::BAD_REQUEST, "mensagem vazia");
    }

    let search = if request.usar_web {
        match SearchClient::new(&state.config.search) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("search collaborator unavailable: {e}");
                return create_error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &e.to_string(),
                );
            }
        }
    } else {
        None
    };

    let max_docs = request
        .max_docs
        .unwrap_or(state.config.search.default_max_docs);

    let (sink, rx) = EventSink::channel(32);
    tokio::spawn(run_session(
        state,
        mensagem,
        override_messages,
        search,
        max_docs,
        sink,
    ));

    ndjson_response(rx)
}

/// Run one chat relay session end-to-end
///
/// Owns the conversation lifecycle for the request: one load at the start,
/// one save at the end, with the relay exchange in between. Dropping the
/// sink on return closes the outbound transport.
async fn run_session(
    state: Arc<AppState>,
    mensagem: String,
    override_messages: Option<Vec<Instruction>>,
    search: Option<SearchClient>,
    max_docs: usize,
    sink: EventSink,
) {
    let session_id = Uuid::new_v4();
    debug!(%session_id, "chat session started");

    let mut conversation = match override_messages {
        Some(messages) => messages,
        None => {
            let store = state.store.lock().await;
            let mut conversation = store.load().await;
            conversation.push(Instruction::new(Role::User, mensagem.clone()));
            if let Err(e) = store.save(&conversation).await {
                warn!(%session_id, "failed to persist user turn: {e}");
            }
            conversation
        }
    };

    let mut fontes = Vec::new();
    if let Some(search) = &search {
        if !mensagem.trim().is_empty() {
            fontes = search.search(&mensagem, max_docs).await;
        }
    }
    let web_context = (!fontes.is_empty()).then(|| web_context_instruction(&fontes));

    let instructions = assemble(
        &conversation,
        web_context,
        state.config.memory.window,
        now_brasilia(),
    );

    // Sources go out before any content fragment
    if !fontes.is_empty() && !sink.send(&OutboundEvent::Fontes(fontes)).await {
        debug!(%session_id, "caller disconnected before streaming");
        return;
    }

    match state.relay.relay(&instructions, &sink).await {
        Ok(full) => {
            let reply = if full.is_empty() {
                "(Sem resposta)".to_string()
            } else {
                full
            };
            conversation.push(Instruction::new(Role::Assistant, reply));

            let store = state.store.lock().await;
            if let Err(e) = store.save(&conversation).await {
                warn!(%session_id, "failed to persist assistant turn: {e}");
            }
            debug!(%session_id, "chat session finished");
        }
        Err(e) => {
            warn!(%session_id, "relay failed: {e}");
            if !sink.send(&OutboundEvent::Error(e.to_string())).await {
                debug!(%session_id, "caller disconnected before the error could be delivered");
            }
        }
    }
}

/// Build the chunked NDJSON response from the session channel
fn ndjson_response(rx: mpsc::Receiver<Bytes>) -> Response<Body> {
    let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::empty())
                .unwrap()
        })
}

/// Create a JSON error response for pre-stream failures
fn create_error_response(status: StatusCode, message: &str) -> Response<Body> {
    let body = serde_json::json!({"erro": message});

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::empty())
                .unwrap()
        })
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}
