// ABOUTME: Defines the ModelRuntime trait that all LLM provider adapters must implement.
// ABOUTME: Also defines the neutral chat representation and ModelError taxonomy shared by providers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors that can occur while calling a model provider.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("invalid reply: {0}")]
    InvalidReply(String),

    #[error("rate limited")]
    RateLimited,

    #[error("context too large")]
    ContextTooLarge,
}

/// Who produced a chat message. Providers map these onto their own role
/// vocabulary ("assistant", "model", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Model,
}

/// One piece of a chat message: plain text, a function call the model made,
/// or the result we are feeding back for a call. `call_id` carries the
/// provider-assigned call identifier where the API requires pairing
/// (Anthropic, OpenAI); Gemini pairs by name and leaves it None.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChatPart {
    Text(String),
    FunctionCall {
        call_id: Option<String>,
        name: String,
        args: Value,
    },
    FunctionResponse {
        call_id: Option<String>,
        name: String,
        response: Value,
    },
}

/// A single message in the neutral conversation history sent to providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub parts: Vec<ChatPart>,
}

impl ChatMessage {
    /// A plain-text user message.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            parts: vec![ChatPart::Text(text.into())],
        }
    }

    /// A plain-text model message.
    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            parts: vec![ChatPart::Text(text.into())],
        }
    }
}

/// A request to a model provider: system instruction, conversation history,
/// tool declarations, and whether the provider's native search grounding
/// tool should be enabled.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    /// Neutral tool declarations: `{ "name", "description", "parameters" }`.
    /// Each provider reformats these to its own tool schema.
    pub tools: Vec<Value>,
    pub native_search: bool,
}

/// A function call parsed out of a model reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub call_id: Option<String>,
    pub name: String,
    pub args: Value,
}

/// One part of a model reply.
#[derive(Debug, Clone)]
pub enum ReplyPart {
    Text(String),
    Call(FunctionCall),
}

/// A parsed model reply: ordered text and function-call parts.
#[derive(Debug, Clone, Default)]
pub struct ModelReply {
    pub parts: Vec<ReplyPart>,
}

impl ModelReply {
    /// All text parts concatenated in order.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            if let ReplyPart::Text(t) = part {
                out.push_str(t);
            }
        }
        out
    }

    /// All function calls in order.
    pub fn calls(&self) -> Vec<&FunctionCall> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ReplyPart::Call(c) => Some(c),
                ReplyPart::Text(_) => None,
            })
            .collect()
    }

    /// True when the reply contains at least one function call.
    pub fn has_calls(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, ReplyPart::Call(_)))
    }
}

/// Trait that all LLM provider adapters must implement. Each provider
/// (Gemini, Anthropic, OpenAI) translates a ModelRequest into an API call
/// and parses the response into a ModelReply.
#[async_trait]
pub trait ModelRuntime: Send + Sync {
    /// Execute one model call with the given request.
    async fn generate(&self, request: &ModelRequest) -> Result<ModelReply, ModelError>;

    /// Provider name for logging and display (e.g. "gemini", "anthropic").
    fn provider_name(&self) -> &str;

    /// Model identifier being used (e.g. "gemini-2.5-flash").
    fn model_name(&self) -> &str;
}
