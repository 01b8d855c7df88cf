// ABOUTME: Session lifecycle API: create, list, inspect, and send messages to sessions.
// ABOUTME: Message posts start a background run; progress arrives on the SSE stream.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use agentdock_runtime::Runner;

use crate::app_state::{open_session, SharedState};

/// Request body for creating a session.
#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Response body after creating a session.
#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// Summary of a session for the list endpoint.
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub user_id: String,
    pub created_at: String,
    pub message_count: usize,
    pub running: bool,
}

/// Request body for sending a user message.
#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub text: String,
}

/// POST /api/apps/{app}/sessions - Create a new persisted session.
pub async fn create_session(
    State(state): State<SharedState>,
    Path(app_name): Path<String>,
    body: Option<Json<CreateSessionRequest>>,
) -> impl IntoResponse {
    if state.app(&app_name).is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "app not found" })),
        )
            .into_response();
    }

    let user_id = body
        .and_then(|Json(b)| b.user_id)
        .unwrap_or_else(|| "user".to_string());

    match open_session(&state, &app_name, &user_id).await {
        Ok(handle) => (
            StatusCode::CREATED,
            Json(CreateSessionResponse {
                session_id: handle.session_id.to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(app = %app_name, error = %e, "failed to open session");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "failed to create session storage" })),
            )
                .into_response()
        }
    }
}

/// GET /api/apps/{app}/sessions - List live sessions for an app.
pub async fn list_sessions(
    State(state): State<SharedState>,
    Path(app_name): Path<String>,
) -> impl IntoResponse {
    if state.app(&app_name).is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "app not found" })),
        )
            .into_response();
    }

    let mut summaries = Vec::new();
    for handle in state.sessions.list_for_app(&app_name).await {
        let session_state = handle.read_state().await;
        summaries.push(SessionSummary {
            session_id: handle.session_id.to_string(),
            user_id: session_state.user_id.clone(),
            created_at: session_state.created_at.to_rfc3339(),
            message_count: session_state.transcript.len(),
            running: handle.is_running(),
        });
    }

    Json(summaries).into_response()
}

/// GET /api/apps/{app}/sessions/{id} - Full materialized session state.
pub async fn get_session(
    State(state): State<SharedState>,
    Path((_app_name, id)): Path<(String, String)>,
) -> impl IntoResponse {
    let Ok(session_id) = id.parse::<Ulid>() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "invalid session id" })),
        )
            .into_response();
    };

    let Some(handle) = state.sessions.get(session_id).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "session not found" })),
        )
            .into_response();
    };

    let session_state = handle.read_state().await;
    Json(session_state.clone()).into_response()
}

/// POST /api/apps/{app}/sessions/{id}/messages - Send a user message and
/// start a run. Returns 202 immediately; events stream over SSE.
pub async fn post_message(
    State(state): State<SharedState>,
    Path((app_name, id)): Path<(String, String)>,
    Json(body): Json<PostMessageRequest>,
) -> impl IntoResponse {
    let Some(app) = state.app(&app_name) else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "app not found" })),
        )
            .into_response();
    };

    let Ok(session_id) = id.parse::<Ulid>() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "invalid session id" })),
        )
            .into_response();
    };

    let Some(handle) = state.sessions.get(session_id).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "session not found" })),
        )
            .into_response();
    };

    if handle.is_running() {
        return (
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "a run is already active for this session" })),
        )
            .into_response();
    }

    if !state.provider_status.any_available {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "error": "no model provider configured; set GOOGLE_API_KEY (or another provider key) and restart"
            })),
        )
            .into_response();
    }

    let runner = match Runner::from_provider(
        app,
        Arc::clone(&state.registry),
        &state.config.default_provider,
        state.config.default_model.as_deref(),
    ) {
        Ok(runner) => runner,
        Err(e) => {
            tracing::error!(app = %app_name, error = %e, "failed to build runner");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let text = body.text;
    tokio::spawn(async move {
        // Failures are emitted as run_failed events by the runner itself.
        let _ = runner.run(&handle, &text).await;
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "running" })),
    )
        .into_response()
}
