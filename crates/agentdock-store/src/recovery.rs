// ABOUTME: Session recovery: rebuild SessionState from JSONL logs, repairing corrupt tails.
// ABOUTME: Used at server startup to bring persisted sessions back into memory.

use std::path::Path;

use thiserror::Error;
use ulid::Ulid;

use agentdock_core::SessionState;

use crate::jsonl::{JsonlError, JsonlLog};
use crate::sqlite::{SessionIndex, SqliteError};
use crate::session_log_path;

/// Errors that can occur during session recovery.
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("jsonl error: {0}")]
    Jsonl(#[from] JsonlError),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] SqliteError),

    #[error("invalid session id '{0}'")]
    InvalidSessionId(String),
}

/// Rebuild one session's state by replaying its JSONL log.
///
/// A log that fails to replay (typically a partial trailing line from a
/// crash mid-append) is repaired in place and replayed again.
pub fn recover_session(
    home: &Path,
    app_name: &str,
    session_id: Ulid,
) -> Result<SessionState, RecoveryError> {
    let log_path = session_log_path(home, app_name, session_id);

    let events = match JsonlLog::replay(&log_path) {
        Ok(events) => events,
        Err(JsonlError::Json(_)) => {
            tracing::warn!(
                session_id = %session_id,
                path = %log_path.display(),
                "event log corrupt, repairing"
            );
            let kept = JsonlLog::repair(&log_path)?;
            tracing::info!(session_id = %session_id, kept, "event log repaired");
            JsonlLog::replay(&log_path)?
        }
        Err(e) => return Err(e.into()),
    };

    Ok(SessionState::replay(session_id, &events))
}

/// Rebuild every indexed session for an app. Sessions whose logs are
/// unreadable are skipped with a warning so one bad log cannot block
/// startup.
pub fn recover_app_sessions(
    home: &Path,
    index: &SessionIndex,
    app_name: &str,
) -> Result<Vec<SessionState>, RecoveryError> {
    let mut states = Vec::new();

    for row in index.list_for_app(app_name)? {
        let session_id: Ulid = row
            .session_id
            .parse()
            .map_err(|_| RecoveryError::InvalidSessionId(row.session_id.clone()))?;

        match recover_session(home, app_name, session_id) {
            Ok(state) => states.push(state),
            Err(e) => {
                tracing::warn!(
                    session_id = %row.session_id,
                    error = %e,
                    "skipping unrecoverable session"
                );
            }
        }
    }

    Ok(states)
}
