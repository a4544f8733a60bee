use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{DefierError, Result};
use crate::intent::Intent;
use crate::services::chat::ChatTurn;
use crate::services::execution::ExecutionRequest;
use crate::services::orchestrator::Orchestrator;
use crate::strategy::BridgePreview;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Deserialize)]
struct ChatRequest {
    messages: Vec<ChatTurn>,
    #[serde(default)]
    wallet: Option<String>,
}

#[derive(Deserialize)]
struct IntentRequest {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
struct IntentResponse {
    intent: Option<Intent>,
}

#[derive(Deserialize)]
struct EnsRequest {
    #[serde(default)]
    name: String,
}

#[derive(Serialize)]
struct EnsResponse {
    address: String,
}

#[derive(Deserialize)]
struct ExecuteRequest {
    intent: Option<Intent>,
    #[serde(default)]
    message: Option<String>,
    wallet: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    dry_run: bool,
}

#[derive(Deserialize)]
struct ConfirmBridgeRequest {
    preview: BridgePreview,
    wallet: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn wallet_arg(wallet: &str) -> Option<&str> {
    Some(wallet.trim()).filter(|wallet| !wallet.is_empty())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/intent", post(intent))
        .route("/ens", post(ens))
        .route("/execute", post(execute))
        .route("/bridge/confirm", post(confirm_bridge))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn chat(State(state): State<AppState>, Json(payload): Json<ChatRequest>) -> impl IntoResponse {
    debug!(turns = payload.messages.len(), wallet = ?payload.wallet, "Chat request");
    let wallet = payload.wallet.as_deref().and_then(wallet_arg);
    match state.orchestrator.handle_message(&payload.messages, wallet).await {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(err) => {
            error!(error = %err, "Chat request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

async fn intent(
    State(state): State<AppState>,
    Json(payload): Json<IntentRequest>,
) -> impl IntoResponse {
    let Some(text) = payload.text.filter(|text| !text.trim().is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "text is required");
    };
    match state.orchestrator.extract_intent(&text).await {
        Ok(intent) => (StatusCode::OK, Json(IntentResponse { intent })).into_response(),
        Err(err) => {
            error!(error = %err, "Intent request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

async fn ens(State(state): State<AppState>, Json(payload): Json<EnsRequest>) -> impl IntoResponse {
    match state.orchestrator.resolve_ens(&payload.name).await {
        Ok(Some(address)) => (StatusCode::OK, Json(EnsResponse { address })).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "not_found"),
        Err(DefierError::Validation(_)) => error_response(StatusCode::BAD_REQUEST, "invalid_name"),
        Err(err) => {
            error!(error = %err, "Name lookup failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

async fn execute(
    State(state): State<AppState>,
    Json(payload): Json<ExecuteRequest>,
) -> impl IntoResponse {
    let request = ExecutionRequest {
        intent: payload.intent,
        message: payload.message.unwrap_or_default(),
        wallet: wallet_arg(&payload.wallet).map(str::to_string),
        source_hint: payload.source.filter(|source| !source.trim().is_empty()),
        dry_run: payload.dry_run,
    };
    let report = state.orchestrator.execute(request).await;
    (StatusCode::OK, Json(report)).into_response()
}

async fn confirm_bridge(
    State(state): State<AppState>,
    Json(payload): Json<ConfirmBridgeRequest>,
) -> impl IntoResponse {
    let result = state
        .orchestrator
        .confirm_bridge(&payload.preview, wallet_arg(&payload.wallet))
        .await;
    (StatusCode::OK, Json(result)).into_response()
}

pub async fn run(host: &str, port: u16, config: Config) -> Result<()> {
    run_with_shutdown(host, port, config, futures::future::pending::<()>()).await
}

pub async fn run_with_shutdown<F>(host: &str, port: u16, config: Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let orchestrator = Arc::new(Orchestrator::from_config(&config)?);
    if let Err(err) = orchestrator.initialize().await {
        warn!(error = %err, "Tool catalog initialization failed; chat runs without tools");
    }

    let app = build_router(AppState {
        orchestrator: orchestrator.clone(),
    });

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| DefierError::Runtime(e.to_string()))?;
    info!(addr = %addr, "defierd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| DefierError::Runtime(e.to_string()))?;

    orchestrator.shutdown().await
}
