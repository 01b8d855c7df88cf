// ABOUTME: Route definitions for the agentdock HTTP server.
// ABOUTME: Assembles API, SSE, and web UI routes into a single Axum Router with shared state.

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::SharedState;
use crate::auth::AuthLayer;
use crate::web;

/// Build the complete Axum router with all routes and shared state.
/// When an auth token is configured, /api/* routes require it.
pub fn create_router(state: SharedState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/", get(web::index))
        .route("/web/apps/{app}", get(web::app_page))
        .route("/web/apps/{app}/sessions", post(web::create_session))
        .route("/web/apps/{app}/sessions/{id}", get(web::session_page))
        .route(
            "/web/apps/{app}/sessions/{id}/transcript",
            get(web::transcript_partial),
        )
        .route("/api/apps", get(api::apps::list_apps))
        .route("/api/apps/{app}", get(api::apps::get_app))
        .route(
            "/api/apps/{app}/sessions",
            get(api::sessions::list_sessions).post(api::sessions::create_session),
        )
        .route(
            "/api/apps/{app}/sessions/{id}",
            get(api::sessions::get_session),
        )
        .route(
            "/api/apps/{app}/sessions/{id}/messages",
            post(api::sessions::post_message),
        )
        .route(
            "/api/apps/{app}/sessions/{id}/events/stream",
            get(api::stream::event_stream),
        );

    if let Some(token) = state.config.auth_token.clone() {
        router = router.layer(AuthLayer::new(token));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Health check handler. Returns 200 OK with a simple JSON body.
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
