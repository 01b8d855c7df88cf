// ABOUTME: Defines SessionState, the materialized view of a session built from its event stream.
// ABOUTME: The apply() method folds RunEvent payloads into transcript and status fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::event::{RunEvent, RunEventPayload};
use crate::transcript::TranscriptMessage;

/// The full materialized state of a session, built by replaying events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: Ulid,
    pub app_name: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub transcript: Vec<TranscriptMessage>,
    pub last_event_id: u64,
    /// True while a run is in flight. Not persisted meaningfully: replay
    /// always ends with the session idle.
    pub running: bool,
    /// Error text of the most recent failed run, cleared by the next
    /// successful final response.
    pub last_error: Option<String>,
}

impl SessionState {
    /// Create an empty session state.
    pub fn new(session_id: Ulid, app_name: String, user_id: String) -> Self {
        Self {
            session_id,
            app_name,
            user_id,
            created_at: Utc::now(),
            transcript: Vec::new(),
            last_event_id: 0,
            running: false,
            last_error: None,
        }
    }

    /// Apply a single event to mutate this state. Unknown-to-state payloads
    /// (turn markers, tool calls, intermediate text) only advance the cursor.
    pub fn apply(&mut self, event: &RunEvent) {
        self.last_event_id = event.event_id;

        match &event.payload {
            RunEventPayload::SessionCreated { app_name, user_id } => {
                self.app_name = app_name.clone();
                self.user_id = user_id.clone();
                self.created_at = event.timestamp;
            }

            RunEventPayload::UserMessageAppended { message } => {
                self.transcript.push(message.clone());
                self.running = true;
            }

            RunEventPayload::FinalResponse { message } => {
                self.transcript.push(message.clone());
                self.running = false;
                self.last_error = None;
            }

            RunEventPayload::RunFailed { error } => {
                self.running = false;
                self.last_error = Some(error.clone());
            }

            RunEventPayload::AgentTurnStarted { .. }
            | RunEventPayload::TextEmitted { .. }
            | RunEventPayload::ToolCallStarted { .. }
            | RunEventPayload::ToolCallFinished { .. }
            | RunEventPayload::AgentTransferred { .. } => {}
        }
    }

    /// Replay a sequence of events into a fresh state.
    pub fn replay(session_id: Ulid, events: &[RunEvent]) -> Self {
        let mut state = Self::new(session_id, String::new(), String::new());
        for event in events {
            state.apply(event);
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(session_id: Ulid, event_id: u64, payload: RunEventPayload) -> RunEvent {
        RunEvent {
            event_id,
            session_id,
            timestamp: Utc::now(),
            payload,
        }
    }

    #[test]
    fn apply_builds_transcript() {
        let id = Ulid::new();
        let mut state = SessionState::new(id, "stock_picker".to_string(), "u1".to_string());

        state.apply(&event(
            id,
            1,
            RunEventPayload::UserMessageAppended {
                message: TranscriptMessage::from_user("Analyze GOOGL".to_string()),
            },
        ));
        assert!(state.running);

        state.apply(&event(
            id,
            2,
            RunEventPayload::AgentTurnStarted {
                agent: "ChiefInvestmentOfficer".to_string(),
            },
        ));

        state.apply(&event(
            id,
            3,
            RunEventPayload::FinalResponse {
                message: TranscriptMessage::new(
                    "ChiefInvestmentOfficer".to_string(),
                    "Thesis: hold.".to_string(),
                ),
            },
        ));

        assert_eq!(state.transcript.len(), 2);
        assert_eq!(state.last_event_id, 3);
        assert!(!state.running);
        assert!(state.last_error.is_none());
    }

    #[test]
    fn run_failed_records_error_and_stops_running() {
        let id = Ulid::new();
        let mut state = SessionState::new(id, "app".to_string(), "u1".to_string());

        state.apply(&event(
            id,
            1,
            RunEventPayload::UserMessageAppended {
                message: TranscriptMessage::from_user("hi".to_string()),
            },
        ));
        state.apply(&event(
            id,
            2,
            RunEventPayload::RunFailed {
                error: "rate limited".to_string(),
            },
        ));

        assert!(!state.running);
        assert_eq!(state.last_error.as_deref(), Some("rate limited"));
    }

    #[test]
    fn replay_reproduces_identical_state() {
        let id = Ulid::new();
        let events = vec![
            event(
                id,
                1,
                RunEventPayload::SessionCreated {
                    app_name: "gcp_iac".to_string(),
                    user_id: "dev".to_string(),
                },
            ),
            event(
                id,
                2,
                RunEventPayload::UserMessageAppended {
                    message: TranscriptMessage::from_user("Create a GKE cluster".to_string()),
                },
            ),
            event(
                id,
                3,
                RunEventPayload::AgentTransferred {
                    from: "Coordinator".to_string(),
                    to: "terraform_config_gen".to_string(),
                },
            ),
            event(
                id,
                4,
                RunEventPayload::FinalResponse {
                    message: TranscriptMessage::new(
                        "terraform_config_gen".to_string(),
                        "```hcl\n...\n```".to_string(),
                    ),
                },
            ),
        ];

        let state = SessionState::replay(id, &events);
        assert_eq!(state.app_name, "gcp_iac");
        assert_eq!(state.user_id, "dev");
        assert_eq!(state.transcript.len(), 2);
        assert_eq!(state.last_event_id, 4);
        assert!(!state.running, "replayed session always ends idle");
    }

    #[test]
    fn state_serde_round_trip() {
        let id = Ulid::new();
        let mut state = SessionState::new(id, "app".to_string(), "u".to_string());
        state.transcript.push(TranscriptMessage::from_user("x".to_string()));
        state.last_event_id = 7;

        let json = serde_json::to_string(&state).unwrap();
        let back: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.session_id, id);
        assert_eq!(back.transcript.len(), 1);
        assert_eq!(back.last_event_id, 7);
    }
}
