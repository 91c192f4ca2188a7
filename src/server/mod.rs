//! HTTP API consumed by the triage dashboard.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Settings;
use crate::context::ServiceContext;
use crate::store::{RunStatus, TriageStore};
use crate::triage::chat::{continue_chat, refresh_chat, start_chat, ChatSession};
use crate::triage::merge::fallback_issue;
use crate::triage::model::{AnalyzedIssue, Progress};
use crate::triage::run::{spawn_analysis, RunOptions};
use crate::view::{build_view, FeatureGroup, IssueQuery};

// ── Config ──

/// Where the server listens.
pub struct ServeConfig {
    /// Interface address.
    pub bind: String,
    /// TCP port.
    pub port: u16,
}

// ── App State ──

/// Shared state of every handler.
pub struct AppState {
    /// Ports to GitHub and the analysis service.
    pub ctx: Arc<ServiceContext>,
    /// Run state, chats and stars.
    pub store: Arc<TriageStore>,
    /// Process settings.
    pub settings: Arc<Settings>,
}

impl AppState {
    fn require_api_key(&self) -> Result<(), AppError> {
        if self.settings.analysis_api_key.is_none() {
            return Err(AppError::internal("ANALYSIS_API_KEY not configured"));
        }
        Ok(())
    }
}

// ── Error Handling ──

/// A failed request, rendered as `{"error": message}`.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, message: message.into() }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, message: message.into() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

impl From<String> for AppError {
    fn from(message: String) -> Self {
        tracing::error!(error = %message, "request failed");
        Self::internal(message)
    }
}

// ── Entrypoint ──

/// Serves the API until the process is stopped.
///
/// # Errors
///
/// Returns an error if the address is invalid or cannot be bound.
pub async fn serve(state: AppState, config: ServeConfig) -> Result<(), String> {
    let addr: SocketAddr = format!("{}:{}", config.bind, config.port)
        .parse()
        .map_err(|e| format!("Invalid bind address {}:{}: {e}", config.bind, config.port))?;
    let app = router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind {addr}: {e}"))?;
    tracing::info!(%addr, "triage API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("Server error: {e}"))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

/// Builds the router (for testing without binding to a port).
pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(state.settings.frontend_url.as_deref());
    Router::new()
        .route("/health", get(health))
        .route("/api/issues", get(get_issues))
        .route("/api/issues/analyze", post(post_analyze))
        .route("/api/issues/{number}", get(get_issue))
        .route("/api/stars", get(get_stars))
        .route("/api/stars/{number}", post(post_star).delete(delete_star))
        .route("/api/sessions", get(get_sessions))
        .route("/api/chat", post(post_chat))
        .route("/api/chat/{session_id}", get(get_chat))
        .route("/api/chat/{session_id}/message", post(post_chat_message))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    let Some(url) = frontend_url else {
        return CorsLayer::permissive();
    };
    match HeaderValue::from_str(url) {
        Ok(origin) => CorsLayer::new().allow_origin(origin).allow_methods(Any).allow_headers(Any),
        Err(e) => {
            tracing::warn!(frontend_url = url, error = %e, "unusable FRONTEND_URL, allowing any origin");
            CorsLayer::permissive()
        }
    }
}

fn parse_number(raw: &str) -> Result<u64, AppError> {
    raw.trim().parse().map_err(|_| AppError::bad_request("Invalid issue number"))
}

// ── Health ──

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "status": "ok", "timestamp": state.ctx.clock.now().to_rfc3339() }))
}

// ── GET /api/issues ──

#[derive(Serialize)]
struct IssuesResponse {
    issues: Vec<AnalyzedIssue>,
    starred: Vec<AnalyzedIssue>,
    groups: Option<Vec<FeatureGroup>>,
    features: Vec<String>,
    status: RunStatus,
    error: Option<String>,
    progress: Progress,
}

async fn get_issues(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IssueQuery>,
) -> Result<Json<IssuesResponse>, AppError> {
    let opts = query.parse().map_err(AppError::bad_request)?;
    let snapshot = state.store.snapshot();
    let view = build_view(&snapshot.issues, &state.store.starred(), &opts);

    Ok(Json(IssuesResponse {
        issues: view.issues,
        starred: view.starred,
        groups: view.groups,
        features: view.features,
        status: snapshot.status,
        error: snapshot.error,
        progress: snapshot.progress,
    }))
}

// ── POST /api/issues/analyze ──

async fn post_analyze(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let in_progress = |store: &TriageStore| {
        let snapshot = store.snapshot();
        Json(json!({
            "message": "Analysis already in progress",
            "status": snapshot.status,
            "progress": snapshot.progress,
        }))
    };

    if state.store.status().is_active() {
        return Ok(in_progress(&state.store));
    }
    state.require_api_key()?;

    let opts = RunOptions::from_settings(&state.settings);
    if !spawn_analysis(Arc::clone(&state.ctx), Arc::clone(&state.store), opts) {
        return Ok(in_progress(&state.store));
    }
    tracing::info!("analysis started");
    Ok(Json(json!({ "message": "Analysis started", "status": RunStatus::Fetching })))
}

// ── GET /api/issues/{number} ──

async fn get_issue(
    State(state): State<Arc<AppState>>,
    Path(number): Path<String>,
) -> Result<Json<AnalyzedIssue>, AppError> {
    let number = parse_number(&number)?;
    if let Some(issue) = state.store.issue(number) {
        return Ok(Json(issue));
    }
    let raw = state
        .ctx
        .issues
        .get(number)
        .await
        .map_err(|e| format!("Failed to fetch issue #{number}: {e}"))?;
    Ok(Json(fallback_issue(&raw)))
}

// ── Stars ──

fn starred_list(store: &TriageStore) -> Vec<u64> {
    store.starred().into_iter().collect()
}

async fn get_stars(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "starred": starred_list(&state.store) }))
}

async fn post_star(
    State(state): State<Arc<AppState>>,
    Path(number): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.store.star(parse_number(&number)?);
    Ok(Json(json!({ "success": true, "starred": starred_list(&state.store) })))
}

async fn delete_star(
    State(state): State<Arc<AppState>>,
    Path(number): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.store.unstar(parse_number(&number)?);
    Ok(Json(json!({ "success": true, "starred": starred_list(&state.store) })))
}

// ── GET /api/sessions ──

async fn get_sessions(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "sessions": state.store.analysis_sessions() }))
}

// ── Chat ──

#[derive(Deserialize)]
struct StartChatBody {
    #[serde(rename = "issueNumber")]
    issue_number: Option<u64>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct ChatMessageBody {
    message: Option<String>,
}

fn non_empty(message: Option<String>) -> Option<String> {
    message.filter(|m| !m.trim().is_empty())
}

async fn post_chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartChatBody>,
) -> Result<Json<Value>, AppError> {
    state.require_api_key()?;
    let (Some(issue_number), Some(message)) = (body.issue_number, non_empty(body.message)) else {
        return Err(AppError::bad_request("issueNumber and message are required"));
    };

    let chat = start_chat(&state.ctx, &state.store, issue_number, &message).await?;
    Ok(Json(json!({ "sessionId": chat.session_id, "url": chat.url, "status": chat.status })))
}

async fn post_chat_message(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(body): Json<ChatMessageBody>,
) -> Result<Json<Value>, AppError> {
    state.require_api_key()?;
    let Some(message) = non_empty(body.message) else {
        return Err(AppError::bad_request("message is required"));
    };

    continue_chat(&state.ctx, &state.store, &session_id, &message)
        .await?
        .ok_or_else(|| AppError::not_found("Chat session not found"))?;
    Ok(Json(json!({ "success": true })))
}

async fn get_chat(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ChatSession>, AppError> {
    state.require_api_key()?;
    let chat = refresh_chat(&state.ctx, &state.store, &session_id)
        .await?
        .ok_or_else(|| AppError::not_found("Chat session not found"))?;
    Ok(Json(chat))
}
