// ABOUTME: Defines TranscriptMessage, the conversation history unit shared by sessions and agents.
// ABOUTME: Senders are either "user" or an agent name; replay order is the order of the event log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Sender name used for messages originating from the human user.
pub const USER_SENDER: &str = "user";

/// A single message in a session transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub message_id: Ulid,
    pub sender: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptMessage {
    /// Create a new transcript message with a fresh ULID and current timestamp.
    pub fn new(sender: String, content: String) -> Self {
        Self {
            message_id: Ulid::new(),
            sender,
            content,
            timestamp: Utc::now(),
        }
    }

    /// Create a message from the human user.
    pub fn from_user(content: String) -> Self {
        Self::new(USER_SENDER.to_string(), content)
    }

    /// True when this message came from the human user.
    pub fn is_user(&self) -> bool {
        self.sender == USER_SENDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_round_trips() {
        let msg = TranscriptMessage::from_user("Should I invest in GOOGL?".to_string());
        assert!(msg.is_user());

        let json = serde_json::to_string(&msg).unwrap();
        let back: TranscriptMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.message_id, msg.message_id);
        assert_eq!(back.content, msg.content);
    }

    #[test]
    fn agent_message_is_not_user() {
        let msg = TranscriptMessage::new(
            "ChiefInvestmentOfficer".to_string(),
            "Here is my thesis.".to_string(),
        );
        assert!(!msg.is_user());
    }
}
