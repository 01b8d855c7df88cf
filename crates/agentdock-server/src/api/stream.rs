// ABOUTME: SSE event streaming handler for real-time session event delivery.
// ABOUTME: Subscribes to a session's broadcast channel and converts events to SSE format.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::stream::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use ulid::Ulid;

use agentdock_core::RunEvent;

use crate::app_state::SharedState;

/// Convert a broadcast receiver into an SSE-compatible stream. The SSE event
/// name is the payload's snake_case kind; the data is the full event JSON.
fn event_stream_from_receiver(
    rx: tokio::sync::broadcast::Receiver<RunEvent>,
) -> impl Stream<Item = Result<SseEvent, axum::Error>> {
    BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => {
                let event_type = event.payload.kind();
                let data = serde_json::to_string(&event).ok()?;
                Some(Ok(SseEvent::default().event(event_type).data(data)))
            }
            Err(_) => None,
        }
    })
}

/// GET /api/apps/{app}/sessions/{id}/events/stream - SSE endpoint for
/// real-time session event streaming.
pub async fn event_stream(
    State(state): State<SharedState>,
    Path((_app_name, id)): Path<(String, String)>,
) -> impl IntoResponse {
    let session_id = match id.parse::<Ulid>() {
        Ok(id) => id,
        Err(_) => {
            return (StatusCode::BAD_REQUEST, "invalid session id").into_response();
        }
    };

    let handle = match state.sessions.get(session_id).await {
        Some(h) => h,
        None => {
            return (StatusCode::NOT_FOUND, "session not found").into_response();
        }
    };

    let rx = handle.subscribe();
    let stream = event_stream_from_receiver(rx);

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}
