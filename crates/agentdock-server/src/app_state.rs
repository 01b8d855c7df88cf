// ABOUTME: Shared application state for the agentdock HTTP server.
// ABOUTME: Holds discovered apps, live sessions, the session index, and event persisters.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::RwLock;
use ulid::Ulid;

use agentdock_core::{AgentApp, SessionState};
use agentdock_runtime::{builtin_registry, SessionHandle, SessionService, ToolRegistry};
use agentdock_store::{
    recover_app_sessions, session_log_path, JsonlLog, SessionIndex, SessionRow, SqliteError,
};

use crate::config::DockConfig;
use crate::providers::ProviderStatus;

/// Shared application state accessible by all Axum handlers.
pub struct AppState {
    /// Discovered apps, keyed by app name. Fixed at startup.
    pub apps: HashMap<String, Arc<AgentApp>>,
    pub sessions: SessionService,
    pub registry: Arc<ToolRegistry>,
    /// Background tasks that subscribe to session broadcast channels and
    /// persist every event to JSONL. Keyed by session id for cleanup.
    pub persisters: RwLock<HashMap<Ulid, tokio::task::JoinHandle<()>>>,
    pub index: Mutex<SessionIndex>,
    pub home: PathBuf,
    pub config: DockConfig,
    pub provider_status: ProviderStatus,
}

/// Type alias for the Arc-wrapped state used with Axum's State extractor.
pub type SharedState = Arc<AppState>;

impl AppState {
    /// Create a new AppState with the given config, discovered apps, and
    /// provider status. Opens the session index under the data home.
    pub fn new(
        config: DockConfig,
        apps: Vec<Arc<AgentApp>>,
        provider_status: ProviderStatus,
    ) -> Result<Self, SqliteError> {
        let home = config.home.clone();
        let index = SessionIndex::open(&agentdock_store::index_path(&home))?;

        Ok(Self {
            apps: apps
                .into_iter()
                .map(|app| (app.name().to_string(), app))
                .collect(),
            sessions: SessionService::new(),
            registry: Arc::new(builtin_registry()),
            persisters: RwLock::new(HashMap::new()),
            index: Mutex::new(index),
            home,
            config,
            provider_status,
        })
    }

    /// Look up a discovered app by name.
    pub fn app(&self, name: &str) -> Option<Arc<AgentApp>> {
        self.apps.get(name).cloned()
    }
}

/// Create a persisted session: register it, start its event persister, then
/// emit SessionCreated so the creation event itself reaches the log.
pub async fn open_session(
    state: &SharedState,
    app_name: &str,
    user_id: &str,
) -> Result<Arc<SessionHandle>, agentdock_store::JsonlError> {
    let session_id = Ulid::new();
    let session_state =
        SessionState::new(session_id, app_name.to_string(), user_id.to_string());
    let handle = state.sessions.restore(session_state).await;

    {
        let index = state.index.lock().expect("index mutex poisoned");
        if let Err(e) = index.upsert(&SessionRow {
            session_id: session_id.to_string(),
            app_name: app_name.to_string(),
            user_id: user_id.to_string(),
            created_at: Utc::now().to_rfc3339(),
            last_event_id: 0,
        }) {
            tracing::error!(session_id = %session_id, error = %e, "failed to index session");
        }
    }

    start_persister(state, &handle, app_name).await?;

    handle
        .emit(agentdock_core::RunEventPayload::SessionCreated {
            app_name: app_name.to_string(),
            user_id: user_id.to_string(),
        })
        .await;

    tracing::info!(session_id = %session_id, app = app_name, "session opened");
    Ok(handle)
}

/// Spawn a background task that appends every broadcast event to the
/// session's JSONL log and advances the index cursor.
pub async fn start_persister(
    state: &SharedState,
    handle: &Arc<SessionHandle>,
    app_name: &str,
) -> Result<(), agentdock_store::JsonlError> {
    let log_path = session_log_path(&state.home, app_name, handle.session_id);
    let mut log = JsonlLog::open(&log_path)?;
    let mut rx = handle.subscribe();
    let session_id = handle.session_id;
    let state_for_task = Arc::clone(state);

    let task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Err(e) = log.append(&event) {
                        tracing::error!(session_id = %session_id, error = %e, "failed to persist event");
                        continue;
                    }
                    let index = state_for_task.index.lock().expect("index mutex poisoned");
                    if let Err(e) = index.set_last_event(&session_id.to_string(), event.event_id) {
                        tracing::warn!(session_id = %session_id, error = %e, "failed to advance index cursor");
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(session_id = %session_id, missed, "persister lagged behind event stream");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    state.persisters.write().await.insert(session_id, task);
    Ok(())
}

/// Rebuild persisted sessions for every discovered app and re-attach
/// persisters so new events continue the existing logs.
pub async fn recover_sessions(state: &SharedState) {
    for app_name in state.apps.keys() {
        let states = {
            let index = state.index.lock().expect("index mutex poisoned");
            match recover_app_sessions(&state.home, &index, app_name) {
                Ok(states) => states,
                Err(e) => {
                    tracing::error!(app = app_name, error = %e, "session recovery failed");
                    continue;
                }
            }
        };

        for session_state in states {
            let session_id = session_state.session_id;
            let handle = state.sessions.restore(session_state).await;
            if let Err(e) = start_persister(state, &handle, app_name).await {
                tracing::error!(session_id = %session_id, error = %e, "failed to restart persister");
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::test_state;
    use super::*;
    use agentdock_core::{RunEventPayload, TranscriptMessage};
    use tempfile::TempDir;

    #[tokio::test]
    async fn open_session_persists_creation_event() {
        let dir = TempDir::new().unwrap();
        let state = test_state(dir.path().to_path_buf());

        let handle = open_session(&state, "demo", "u1").await.unwrap();

        // Give the persister task a moment to drain the broadcast.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let log_path = session_log_path(dir.path(), "demo", handle.session_id);
        let events = JsonlLog::replay(&log_path).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload.kind(), "session_created");

        let index = state.index.lock().unwrap();
        let row = index.get(&handle.session_id.to_string()).unwrap().unwrap();
        assert_eq!(row.app_name, "demo");
        assert_eq!(row.last_event_id, 1);
    }

    #[tokio::test]
    async fn events_persist_and_recover_across_restart() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().to_path_buf();
        let session_id;

        {
            let state = test_state(home.clone());
            let handle = open_session(&state, "demo", "u1").await.unwrap();
            session_id = handle.session_id;

            handle
                .emit(RunEventPayload::UserMessageAppended {
                    message: TranscriptMessage::from_user("hello".to_string()),
                })
                .await;
            handle
                .emit(RunEventPayload::FinalResponse {
                    message: TranscriptMessage::new("helper".to_string(), "hi".to_string()),
                })
                .await;

            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }

        // Fresh state, as after a restart.
        let state = test_state(home);
        recover_sessions(&state).await;

        let handle = state.sessions.get(session_id).await.expect("recovered");
        let session_state = handle.read_state().await;
        assert_eq!(session_state.transcript.len(), 2);
        assert_eq!(session_state.last_event_id, 3);
        assert!(!session_state.running);
    }

    #[tokio::test]
    async fn app_lookup_by_name() {
        let dir = TempDir::new().unwrap();
        let state = test_state(dir.path().to_path_buf());
        assert!(state.app("demo").is_some());
        assert!(state.app("missing").is_none());
    }
}
