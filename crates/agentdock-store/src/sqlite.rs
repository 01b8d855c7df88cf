// ABOUTME: SQLite-backed index of sessions for fast listing without replaying event logs.
// ABOUTME: The index is a rebuildable cache; the JSONL logs remain the source of truth.

use std::path::Path;

use rusqlite::{params, Connection};
use thiserror::Error;

/// Errors that can occur during SQLite index operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// A row in the sessions table.
#[derive(Debug, Clone)]
pub struct SessionRow {
    pub session_id: String,
    pub app_name: String,
    pub user_id: String,
    pub created_at: String,
    pub last_event_id: u64,
}

/// A SQLite-backed index of sessions across all apps.
pub struct SessionIndex {
    conn: Connection,
}

impl SessionIndex {
    /// Open or create the index database at the given path.
    pub fn open(path: &Path) -> Result<Self, SqliteError> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                app_name TEXT NOT NULL,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_event_id INTEGER NOT NULL DEFAULT 0
            );",
        )?;

        Ok(Self { conn })
    }

    /// Insert or update a session row.
    pub fn upsert(&self, row: &SessionRow) -> Result<(), SqliteError> {
        self.conn.execute(
            "INSERT INTO sessions (session_id, app_name, user_id, created_at, last_event_id)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(session_id) DO UPDATE SET
                last_event_id = excluded.last_event_id",
            params![
                row.session_id,
                row.app_name,
                row.user_id,
                row.created_at,
                row.last_event_id,
            ],
        )?;
        Ok(())
    }

    /// Update only the last_event_id cursor for a session.
    pub fn set_last_event(&self, session_id: &str, last_event_id: u64) -> Result<(), SqliteError> {
        self.conn.execute(
            "UPDATE sessions SET last_event_id = ?2 WHERE session_id = ?1",
            params![session_id, last_event_id],
        )?;
        Ok(())
    }

    /// Fetch a single session row.
    pub fn get(&self, session_id: &str) -> Result<Option<SessionRow>, SqliteError> {
        let mut stmt = self.conn.prepare(
            "SELECT session_id, app_name, user_id, created_at, last_event_id
             FROM sessions WHERE session_id = ?1",
        )?;
        let mut rows = stmt.query_map(params![session_id], row_from)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// List all sessions for an app, newest first.
    pub fn list_for_app(&self, app_name: &str) -> Result<Vec<SessionRow>, SqliteError> {
        let mut stmt = self.conn.prepare(
            "SELECT session_id, app_name, user_id, created_at, last_event_id
             FROM sessions WHERE app_name = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![app_name], row_from)?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok(sessions)
    }

    /// Delete a session row.
    pub fn delete(&self, session_id: &str) -> Result<(), SqliteError> {
        self.conn.execute(
            "DELETE FROM sessions WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(())
    }
}

fn row_from(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        session_id: row.get(0)?,
        app_name: row.get(1)?,
        user_id: row.get(2)?,
        created_at: row.get(3)?,
        last_event_id: row.get::<_, i64>(4)? as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use ulid::Ulid;

    fn row(app: &str, created_at: &str) -> SessionRow {
        SessionRow {
            session_id: Ulid::new().to_string(),
            app_name: app.to_string(),
            user_id: "u1".to_string(),
            created_at: created_at.to_string(),
            last_event_id: 0,
        }
    }

    #[test]
    fn upsert_and_get_round_trip() {
        let dir = TempDir::new().unwrap();
        let index = SessionIndex::open(&dir.path().join("index.db")).unwrap();

        let mut r = row("stock_picker", "2026-08-07T10:00:00Z");
        r.last_event_id = 5;
        index.upsert(&r).unwrap();

        let got = index.get(&r.session_id).unwrap().unwrap();
        assert_eq!(got.app_name, "stock_picker");
        assert_eq!(got.user_id, "u1");
        assert_eq!(got.last_event_id, 5);
    }

    #[test]
    fn get_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        let index = SessionIndex::open(&dir.path().join("index.db")).unwrap();
        assert!(index.get("nonexistent").unwrap().is_none());
    }

    #[test]
    fn upsert_updates_cursor_only() {
        let dir = TempDir::new().unwrap();
        let index = SessionIndex::open(&dir.path().join("index.db")).unwrap();

        let mut r = row("app", "2026-08-07T10:00:00Z");
        index.upsert(&r).unwrap();

        r.last_event_id = 42;
        index.upsert(&r).unwrap();

        let got = index.get(&r.session_id).unwrap().unwrap();
        assert_eq!(got.last_event_id, 42);
        assert_eq!(got.created_at, "2026-08-07T10:00:00Z");
    }

    #[test]
    fn set_last_event_updates_row() {
        let dir = TempDir::new().unwrap();
        let index = SessionIndex::open(&dir.path().join("index.db")).unwrap();

        let r = row("app", "2026-08-07T10:00:00Z");
        index.upsert(&r).unwrap();
        index.set_last_event(&r.session_id, 17).unwrap();

        assert_eq!(index.get(&r.session_id).unwrap().unwrap().last_event_id, 17);
    }

    #[test]
    fn list_for_app_filters_and_orders_newest_first() {
        let dir = TempDir::new().unwrap();
        let index = SessionIndex::open(&dir.path().join("index.db")).unwrap();

        index.upsert(&row("alpha", "2026-08-07T09:00:00Z")).unwrap();
        index.upsert(&row("alpha", "2026-08-07T11:00:00Z")).unwrap();
        index.upsert(&row("beta", "2026-08-07T10:00:00Z")).unwrap();

        let listed = index.list_for_app("alpha").unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].created_at, "2026-08-07T11:00:00Z");
        assert_eq!(listed[1].created_at, "2026-08-07T09:00:00Z");
    }

    #[test]
    fn delete_removes_row() {
        let dir = TempDir::new().unwrap();
        let index = SessionIndex::open(&dir.path().join("index.db")).unwrap();

        let r = row("app", "2026-08-07T10:00:00Z");
        index.upsert(&r).unwrap();
        index.delete(&r.session_id).unwrap();

        assert!(index.get(&r.session_id).unwrap().is_none());
    }
}
