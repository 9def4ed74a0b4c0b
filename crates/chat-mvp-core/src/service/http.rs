use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{self, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::ChatError;
use crate::service::ChatService;
use crate::types::Message;

const UNAVAILABLE_MESSAGE: &str = "AI service temporarily unavailable, please try again later";

/// Shared application state for the HTTP API.
pub struct AppState {
    pub config: Config,
    pub chat: Arc<ChatService>,
}

impl AppState {
    pub fn new(config: Config, chat: Arc<ChatService>) -> Self {
        Self { config, chat }
    }
}

/// Request body for the chat endpoint.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default, alias = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub message: String,
}

/// Response body for the chat endpoint.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub reply: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Query string / body naming a user.
#[derive(Debug, Deserialize)]
pub struct UserRequest {
    #[serde(default, alias = "userId")]
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub user_id: String,
    pub history: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub success: bool,
    pub message: String,
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub build: String,
    pub sessions: usize,
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let (status, error) = if self.is_unavailable() {
            let status = match self {
                ChatError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::SERVICE_UNAVAILABLE,
            };
            // Upstream detail is already logged by the service.
            (status, UNAVAILABLE_MESSAGE.to_string())
        } else {
            let detail = match self {
                ChatError::Validation(detail) => detail,
                other => other.to_string(),
            };
            (StatusCode::BAD_REQUEST, detail)
        };
        (status, Json(ErrorResponse { success: false, error })).into_response()
    }
}

impl From<JsonRejection> for ChatError {
    fn from(rejection: JsonRejection) -> Self {
        ChatError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ChatError {
    fn from(rejection: QueryRejection) -> Self {
        ChatError::Validation(rejection.body_text())
    }
}

/// Create the axum Router with all API routes.
///
/// Static files are served from `server.staticDir` when that directory
/// exists; otherwise only the API is mounted.
pub fn create_router(state: Arc<AppState>) -> Router {
    let static_dir = state.config.server.static_dir.clone();

    let mut router = Router::new()
        // API
        .route("/api/chat", post(handle_chat))
        .route("/api/history", get(handle_get_history).delete(handle_clear_history))
        // Health
        .route("/health", get(handle_health));

    if Path::new(&static_dir).is_dir() {
        let index = Path::new(&static_dir).join("index.html");
        router = router
            .nest_service("/static", ServeDir::new(&static_dir))
            .route_service("/", ServeFile::new(index));
        info!("Serving static files from {}", static_dir);
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    http::Method::GET,
                    http::Method::POST,
                    http::Method::PUT,
                    http::Method::DELETE,
                    http::Method::OPTIONS,
                ])
                .allow_headers([
                    http::header::CONTENT_TYPE,
                    http::header::AUTHORIZATION,
                ]),
        )
        .with_state(state)
}

/// POST /api/chat — Send a message, get the assistant's reply
async fn handle_chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ChatError> {
    let Json(req) = payload?;
    let reply = state.chat.chat(&req.user_id, &req.message).await?;
    Ok(Json(ChatResponse {
        success: true,
        reply,
        user_id: req.user_id.trim().to_string(),
        timestamp: Utc::now(),
    }))
}

/// GET /api/history?user_id= — Conversation history
async fn handle_get_history(
    State(state): State<Arc<AppState>>,
    query: Result<Query<UserRequest>, QueryRejection>,
) -> Result<Json<HistoryResponse>, ChatError> {
    let Query(req) = query?;
    let history = state.chat.history(&req.user_id).await?;
    Ok(Json(HistoryResponse {
        success: true,
        user_id: req.user_id.trim().to_string(),
        history,
    }))
}

/// DELETE /api/history — Clear a user's session
async fn handle_clear_history(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> Result<Json<ClearResponse>, ChatError> {
    let Json(req) = payload?;
    state.chat.clear(&req.user_id).await.inspect_err(|e| {
        warn!("Clear history rejected: {}", e);
    })?;
    Ok(Json(ClearResponse {
        success: true,
        message: "history cleared".to_string(),
    }))
}

/// GET /health — Health check
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: crate::SERVICE_NAME.to_string(),
        version: crate::VERSION.to_string(),
        build: crate::GIT_HASH.to_string(),
        sessions: state.chat.store().len().await,
    })
}

/// Start the HTTP server on the given address.
pub async fn serve(addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, router).await?;
    Ok(())
}
