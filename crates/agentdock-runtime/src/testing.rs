// ABOUTME: Test utilities for agentdock-runtime, including a scripted stub model runtime.
// ABOUTME: Used in tests to simulate model replies without real API calls.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::runtime::{
    FunctionCall, ModelError, ModelReply, ModelRequest, ModelRuntime, ReplyPart,
};

/// A stub model runtime that plays back a scripted sequence of replies.
///
/// Each generate() call pops the next reply; running past the script is a
/// provider error, which makes over-consuming tests fail loudly.
pub struct StubRuntime {
    replies: Mutex<VecDeque<ModelReply>>,
}

impl StubRuntime {
    /// Create a stub that plays back the given replies in order.
    pub fn new(replies: Vec<ModelReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }

    /// Create a stub that returns a single text reply.
    pub fn text(text: &str) -> Self {
        Self::new(vec![Self::text_reply(text)])
    }

    /// A reply consisting of one text part.
    pub fn text_reply(text: &str) -> ModelReply {
        ModelReply {
            parts: vec![ReplyPart::Text(text.to_string())],
        }
    }

    /// A reply consisting of one function call.
    pub fn call_reply(name: &str, args: Value) -> ModelReply {
        ModelReply {
            parts: vec![ReplyPart::Call(FunctionCall {
                call_id: None,
                name: name.to_string(),
                args,
            })],
        }
    }
}

#[async_trait]
impl ModelRuntime for StubRuntime {
    async fn generate(&self, _request: &ModelRequest) -> Result<ModelReply, ModelError> {
        self.replies
            .lock()
            .expect("stub mutex poisoned")
            .pop_front()
            .ok_or_else(|| ModelError::Provider("stub runtime has no replies left".to_string()))
    }

    fn provider_name(&self) -> &str {
        "stub"
    }

    fn model_name(&self) -> &str {
        "stub-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn empty_request() -> ModelRequest {
        ModelRequest {
            system: String::new(),
            messages: Vec::new(),
            tools: Vec::new(),
            native_search: false,
        }
    }

    #[tokio::test]
    async fn stub_plays_back_in_order() {
        let stub = StubRuntime::new(vec![
            StubRuntime::call_reply("f", json!({"a": 1})),
            StubRuntime::text_reply("done"),
        ]);

        let first = stub.generate(&empty_request()).await.unwrap();
        assert!(first.has_calls());
        assert_eq!(first.calls()[0].name, "f");

        let second = stub.generate(&empty_request()).await.unwrap();
        assert_eq!(second.text(), "done");
    }

    #[tokio::test]
    async fn exhausted_stub_errors() {
        let stub = StubRuntime::text("only one");
        stub.generate(&empty_request()).await.unwrap();

        let err = stub.generate(&empty_request()).await.unwrap_err();
        assert!(err.to_string().contains("no replies left"));
    }
}
