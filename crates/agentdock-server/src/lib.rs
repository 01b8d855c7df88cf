// ABOUTME: HTTP server for agentdock, providing the REST API, SSE streaming, and the dev web UI.
// ABOUTME: Uses Axum with shared state holding discovered apps, live sessions, and persistence.

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod providers;
pub mod routes;
pub mod web;

pub use app_state::{AppState, SharedState};
pub use config::{ConfigError, DockConfig};
pub use providers::ProviderStatus;
pub use routes::create_router;
