// ABOUTME: Persistence layer for agentdock, handling session event logs and recovery.
// ABOUTME: Provides a JSONL event log per session, a SQLite session index, and replay.

pub mod jsonl;
pub mod recovery;
pub mod sqlite;

use std::path::{Path, PathBuf};

use ulid::Ulid;

pub use jsonl::{JsonlError, JsonlLog};
pub use recovery::{recover_app_sessions, recover_session, RecoveryError};
pub use sqlite::{SessionIndex, SessionRow, SqliteError};

/// Directory holding one session's data under the data home.
pub fn session_dir(home: &Path, app_name: &str, session_id: Ulid) -> PathBuf {
    home.join("apps")
        .join(app_name)
        .join("sessions")
        .join(session_id.to_string())
}

/// Path of a session's JSONL event log.
pub fn session_log_path(home: &Path, app_name: &str, session_id: Ulid) -> PathBuf {
    session_dir(home, app_name, session_id).join("events.jsonl")
}

/// Path of the SQLite session index.
pub fn index_path(home: &Path) -> PathBuf {
    home.join("index.db")
}
