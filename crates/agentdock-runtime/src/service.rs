// ABOUTME: In-memory session service: sequenced event emission, broadcast, and shared state.
// ABOUTME: SessionHandle is the single place event ids are assigned and state is mutated.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock, RwLockReadGuard};
use ulid::Ulid;

use agentdock_core::{RunEvent, RunEventPayload, SessionState};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Handle to a live session. Emitting an event assigns the next sequence
/// number, stamps the time, folds the event into state, and broadcasts it.
pub struct SessionHandle {
    pub session_id: Ulid,
    state: Arc<RwLock<SessionState>>,
    event_tx: broadcast::Sender<RunEvent>,
    next_event_id: AtomicU64,
    run_active: AtomicBool,
}

impl SessionHandle {
    fn new(state: SessionState) -> Self {
        let next = state.last_event_id + 1;
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            session_id: state.session_id,
            state: Arc::new(RwLock::new(state)),
            event_tx,
            next_event_id: AtomicU64::new(next),
            run_active: AtomicBool::new(false),
        }
    }

    /// Subscribe to the event broadcast stream.
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.event_tx.subscribe()
    }

    /// Get a read-only view of the current session state.
    pub async fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().await
    }

    /// Emit an event: assign the next id, apply to state, broadcast.
    pub async fn emit(&self, payload: RunEventPayload) -> RunEvent {
        let event = RunEvent {
            event_id: self.next_event_id.fetch_add(1, Ordering::SeqCst),
            session_id: self.session_id,
            timestamp: Utc::now(),
            payload,
        };

        {
            let mut state = self.state.write().await;
            state.apply(&event);
        }

        // Ignore broadcast errors; no active subscribers is fine.
        let _ = self.event_tx.send(event.clone());
        event
    }

    /// Try to claim the session for a run. Returns false when a run is
    /// already active.
    pub fn try_begin_run(&self) -> bool {
        self.run_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Release the run claim.
    pub fn end_run(&self) {
        self.run_active.store(false, Ordering::SeqCst);
    }

    /// True while a run holds the session.
    pub fn is_running(&self) -> bool {
        self.run_active.load(Ordering::SeqCst)
    }
}

/// In-memory registry of live sessions, keyed by session id.
#[derive(Default)]
pub struct SessionService {
    sessions: RwLock<HashMap<Ulid, Arc<SessionHandle>>>,
}

impl SessionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new session for an app and emit its SessionCreated event.
    pub async fn create_session(&self, app_name: &str, user_id: &str) -> Arc<SessionHandle> {
        let session_id = Ulid::new();
        let state = SessionState::new(session_id, app_name.to_string(), user_id.to_string());
        let handle = Arc::new(SessionHandle::new(state));

        handle
            .emit(RunEventPayload::SessionCreated {
                app_name: app_name.to_string(),
                user_id: user_id.to_string(),
            })
            .await;

        self.sessions
            .write()
            .await
            .insert(session_id, Arc::clone(&handle));

        tracing::info!(session_id = %session_id, app = app_name, "session created");
        handle
    }

    /// Register a session rebuilt from persisted events. No event is
    /// emitted; the state already reflects the log.
    pub async fn restore(&self, state: SessionState) -> Arc<SessionHandle> {
        let session_id = state.session_id;
        let handle = Arc::new(SessionHandle::new(state));
        self.sessions
            .write()
            .await
            .insert(session_id, Arc::clone(&handle));
        handle
    }

    /// Look up a live session.
    pub async fn get(&self, session_id: Ulid) -> Option<Arc<SessionHandle>> {
        self.sessions.read().await.get(&session_id).cloned()
    }

    /// All live sessions for an app, newest first.
    pub async fn list_for_app(&self, app_name: &str) -> Vec<Arc<SessionHandle>> {
        let sessions = self.sessions.read().await;
        let mut handles = Vec::new();
        for handle in sessions.values() {
            if handle.read_state().await.app_name == app_name {
                handles.push(Arc::clone(handle));
            }
        }
        handles.sort_by(|a, b| b.session_id.cmp(&a.session_id));
        handles
    }
}
