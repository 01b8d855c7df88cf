// ABOUTME: Append-only JSONL event log for durable session event storage.
// ABOUTME: Provides crash-safe append, sequential replay, and repair for truncated files.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use agentdock_core::RunEvent;
use thiserror::Error;

/// Errors that can occur during JSONL log operations.
#[derive(Debug, Error)]
pub enum JsonlError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// An append-only JSONL event log backed by a file.
/// Each line is a single JSON-serialized RunEvent followed by a newline.
pub struct JsonlLog {
    path: PathBuf,
    file: File,
}

impl JsonlLog {
    /// Returns the path to the underlying JSONL file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open (or create) a JSONL log file at the given path.
    /// Creates parent directories if they do not exist.
    /// The file is opened in append mode.
    pub fn open(path: &Path) -> Result<Self, JsonlError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Append a single event to the log. Serializes as one JSON line,
    /// writes it with a trailing newline, and fsyncs to disk.
    pub fn append(&mut self, event: &RunEvent) -> Result<(), JsonlError> {
        let json = serde_json::to_string(event)?;
        writeln!(self.file, "{}", json)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Replay all events from a JSONL file, returning them in order.
    /// Empty lines are skipped. Returns an empty Vec for empty files.
    pub fn replay(path: &Path) -> Result<Vec<RunEvent>, JsonlError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut events = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event: RunEvent = serde_json::from_str(&line)?;
            events.push(event);
        }

        Ok(events)
    }

    /// Repair a potentially corrupted JSONL file by keeping only complete,
    /// parseable lines and truncating any partial trailing data.
    /// Uses atomic temp-file + fsync + rename to prevent data loss on crash.
    /// Returns the count of valid events retained.
    pub fn repair(path: &Path) -> Result<usize, JsonlError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut valid_lines: Vec<String> = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            // Only keep lines that parse as valid RunEvent JSON
            if serde_json::from_str::<RunEvent>(&line).is_ok() {
                valid_lines.push(line);
            }
        }

        let count = valid_lines.len();

        // Write valid lines to a temp file, fsync, then atomically rename
        let tmp_path = path.with_extension("jsonl.tmp");
        let mut tmp_file = File::create(&tmp_path)?;
        for line in &valid_lines {
            writeln!(tmp_file, "{}", line)?;
        }
        tmp_file.sync_all()?;

        // Atomic rename over the original
        fs::rename(&tmp_path, path)?;

        // Fsync the parent directory to ensure the rename metadata is durable.
        if let Some(parent) = path.parent()
            && let Ok(dir) = File::open(parent)
        {
            let _ = dir.sync_all();
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdock_core::{RunEventPayload, TranscriptMessage};
    use chrono::Utc;
    use tempfile::TempDir;
    use ulid::Ulid;

    fn make_event(session_id: Ulid, event_id: u64) -> RunEvent {
        RunEvent {
            event_id,
            session_id,
            timestamp: Utc::now(),
            payload: RunEventPayload::UserMessageAppended {
                message: TranscriptMessage::from_user(format!("message {}", event_id)),
            },
        }
    }

    #[test]
    fn append_and_replay_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.jsonl");
        let session_id = Ulid::new();

        let mut log = JsonlLog::open(&path).unwrap();
        for id in 1..=3 {
            log.append(&make_event(session_id, id)).unwrap();
        }

        let events = JsonlLog::replay(&path).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].event_id, 1);
        assert_eq!(events[2].event_id, 3);
        assert_eq!(events[0].session_id, session_id);
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir
            .path()
            .join("apps")
            .join("demo")
            .join("sessions")
            .join("s1")
            .join("events.jsonl");

        let log = JsonlLog::open(&path).unwrap();
        assert_eq!(log.path(), path);
        assert!(path.exists());
    }

    #[test]
    fn replay_empty_file_returns_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.jsonl");
        let _ = JsonlLog::open(&path).unwrap();

        let events = JsonlLog::replay(&path).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn replay_fails_on_corrupt_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.jsonl");

        let mut log = JsonlLog::open(&path).unwrap();
        log.append(&make_event(Ulid::new(), 1)).unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"{\"partial\": tru")
            .unwrap();

        assert!(JsonlLog::replay(&path).is_err());
    }

    #[test]
    fn repair_drops_partial_trailing_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.jsonl");
        let session_id = Ulid::new();

        let mut log = JsonlLog::open(&path).unwrap();
        log.append(&make_event(session_id, 1)).unwrap();
        log.append(&make_event(session_id, 2)).unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"{\"partial\": tru")
            .unwrap();

        let kept = JsonlLog::repair(&path).unwrap();
        assert_eq!(kept, 2);

        let events = JsonlLog::replay(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event_id, 2);
    }

    #[test]
    fn append_after_repair_continues_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.jsonl");
        let session_id = Ulid::new();

        let mut log = JsonlLog::open(&path).unwrap();
        log.append(&make_event(session_id, 1)).unwrap();
        drop(log);

        JsonlLog::repair(&path).unwrap();

        let mut log = JsonlLog::open(&path).unwrap();
        log.append(&make_event(session_id, 2)).unwrap();

        let events = JsonlLog::replay(&path).unwrap();
        assert_eq!(events.len(), 2);
    }
}
