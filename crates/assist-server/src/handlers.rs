//! HTTP Handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use assist_core::{context::DeviceContextEntry, ConversationId, Message, TurnResult};

use crate::state::AppState;

const DEFAULT_LANGUAGE: &str = "en";

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub provider: String,
    pub provider_connected: bool,
    pub conversations: usize,
}

#[derive(Debug, Deserialize)]
pub struct ConversationRequest {
    pub text: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub conversation_id: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let provider = state.agent.provider();
    let provider_connected = provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        provider: provider.name().to_string(),
        provider_connected,
        conversations: state.agent.sessions().len(),
    })
}

/// Device snapshot as it would be sent to the model
pub async fn list_devices(
    State(state): State<AppState>,
) -> Result<Json<Vec<DeviceContextEntry>>, ApiError> {
    state.agent.devices().await.map(Json).map_err(|e| {
        tracing::error!(error = %e, "Device enumeration failed");
        api_error(StatusCode::BAD_GATEWAY, e.to_string(), "DEVICE_SOURCE_ERROR")
    })
}

/// Process one utterance
///
/// Provider failures still answer 200 with `error` set in the body, the
/// same way a voice pipeline receives them.
pub async fn conversation_handler(
    State(state): State<AppState>,
    Json(payload): Json<ConversationRequest>,
) -> Result<Json<TurnResult>, ApiError> {
    if payload.text.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "text must not be empty", "EMPTY_TEXT"));
    }

    let language = payload
        .language
        .as_deref()
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_LANGUAGE);

    let result = state
        .agent
        .process_turn(&payload.text, payload.conversation_id, language)
        .await;

    Ok(Json(result))
}

/// Stored history of one conversation
pub async fn conversation_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let conversation_id = ConversationId::from_string(id);
    let messages = state
        .agent
        .sessions()
        .history(&conversation_id)
        .await
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                format!("conversation '{conversation_id}' not found"),
                "NOT_FOUND",
            )
        })?;

    Ok(Json(HistoryResponse {
        conversation_id: conversation_id.to_string(),
        messages,
    }))
}
