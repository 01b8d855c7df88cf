// ABOUTME: Defines the event envelope and payload variants emitted while a session runs.
// ABOUTME: Events are immutable facts; replaying a session's log reconstructs its state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::transcript::TranscriptMessage;

/// An event envelope wrapping a timestamped, sequenced payload for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    pub event_id: u64,
    pub session_id: Ulid,
    pub timestamp: DateTime<Utc>,
    pub payload: RunEventPayload,
}

/// The set of things that can happen while a session runs. Each variant
/// captures the minimum data needed to rebuild the transcript and to render
/// a live activity feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunEventPayload {
    SessionCreated {
        app_name: String,
        user_id: String,
    },
    UserMessageAppended {
        message: TranscriptMessage,
    },
    AgentTurnStarted {
        agent: String,
    },
    TextEmitted {
        agent: String,
        text: String,
    },
    ToolCallStarted {
        agent: String,
        tool: String,
        args: serde_json::Value,
    },
    ToolCallFinished {
        agent: String,
        tool: String,
        output: serde_json::Value,
    },
    AgentTransferred {
        from: String,
        to: String,
    },
    FinalResponse {
        message: TranscriptMessage,
    },
    RunFailed {
        error: String,
    },
}

impl RunEventPayload {
    /// Stable snake_case name for this payload variant, used as the SSE
    /// event name and in terminal output.
    pub fn kind(&self) -> &'static str {
        match self {
            RunEventPayload::SessionCreated { .. } => "session_created",
            RunEventPayload::UserMessageAppended { .. } => "user_message_appended",
            RunEventPayload::AgentTurnStarted { .. } => "agent_turn_started",
            RunEventPayload::TextEmitted { .. } => "text_emitted",
            RunEventPayload::ToolCallStarted { .. } => "tool_call_started",
            RunEventPayload::ToolCallFinished { .. } => "tool_call_finished",
            RunEventPayload::AgentTransferred { .. } => "agent_transferred",
            RunEventPayload::FinalResponse { .. } => "final_response",
            RunEventPayload::RunFailed { .. } => "run_failed",
        }
    }
}
