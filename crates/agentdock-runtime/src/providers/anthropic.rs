// ABOUTME: Anthropic Claude API adapter implementing the ModelRuntime trait.
// ABOUTME: Translates ModelRequests into Messages API calls and parses tool_use blocks.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::runtime::{
    ChatMessage, ChatPart, ChatRole, FunctionCall, ModelError, ModelReply, ModelRequest,
    ModelRuntime, ReplyPart,
};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 8192;

/// Anthropic Claude runtime adapter. Calls the Messages API with tool
/// definitions and maps tool_use blocks back into a ModelReply.
pub struct AnthropicRuntime {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicRuntime {
    /// Create a new AnthropicRuntime reading configuration from environment variables.
    /// Required: `ANTHROPIC_API_KEY`
    /// Optional: `ANTHROPIC_BASE_URL` (defaults to https://api.anthropic.com)
    /// Optional: `ANTHROPIC_MODEL` (defaults to claude-sonnet-4-5-20250929)
    pub fn from_env(model: Option<&str>) -> Result<Self, ModelError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| ModelError::Provider("ANTHROPIC_API_KEY not set".to_string()))?;

        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let model = model
            .map(String::from)
            .or_else(|| std::env::var("ANTHROPIC_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(Self::new(api_key, base_url, model))
    }

    /// Create a new AnthropicRuntime with explicit configuration.
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model,
        }
    }

    /// Build the JSON request body for the Messages API.
    pub fn build_request_body(&self, request: &ModelRequest) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(build_message).collect();

        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.get("name").cloned().unwrap_or(Value::Null),
                    "description": tool.get("description").cloned().unwrap_or(Value::Null),
                    "input_schema": tool.get("parameters").cloned().unwrap_or(json!({"type": "object"}))
                })
            })
            .collect();

        let mut body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": request.system,
            "messages": messages
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
        }
        body
    }

    /// Parse a Messages API response into a ModelReply.
    pub fn parse_response(response_body: &Value) -> Result<ModelReply, ModelError> {
        let content = response_body
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| {
                ModelError::InvalidReply("missing content array in response".to_string())
            })?;

        let mut reply = ModelReply::default();
        for block in content {
            match block.get("type").and_then(|t| t.as_str()) {
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(|t| t.as_str())
                        && !text.is_empty()
                    {
                        reply.parts.push(ReplyPart::Text(text.to_string()));
                    }
                }
                Some("tool_use") => {
                    let name = block
                        .get("name")
                        .and_then(|n| n.as_str())
                        .ok_or_else(|| {
                            ModelError::InvalidReply("tool_use block missing name".to_string())
                        })?;
                    let call_id = block
                        .get("id")
                        .and_then(|i| i.as_str())
                        .map(String::from);
                    let args = block.get("input").cloned().unwrap_or(json!({}));
                    reply.parts.push(ReplyPart::Call(FunctionCall {
                        call_id,
                        name: name.to_string(),
                        args,
                    }));
                }
                _ => {}
            }
        }

        if reply.parts.is_empty() {
            return Err(ModelError::InvalidReply(
                "no actionable content in response".to_string(),
            ));
        }

        Ok(reply)
    }
}

/// Convert one neutral chat message into an Anthropic message.
/// Function responses become tool_result blocks paired by call id.
fn build_message(message: &ChatMessage) -> Value {
    let role = match message.role {
        ChatRole::User => "user",
        ChatRole::Model => "assistant",
    };

    let content: Vec<Value> = message
        .parts
        .iter()
        .map(|part| match part {
            ChatPart::Text(text) => json!({ "type": "text", "text": text }),
            ChatPart::FunctionCall { call_id, name, args } => json!({
                "type": "tool_use",
                "id": call_id.clone().unwrap_or_default(),
                "name": name,
                "input": args
            }),
            ChatPart::FunctionResponse { call_id, response, .. } => json!({
                "type": "tool_result",
                "tool_use_id": call_id.clone().unwrap_or_default(),
                "content": response.to_string()
            }),
        })
        .collect();

    json!({ "role": role, "content": content })
}

#[async_trait]
impl ModelRuntime for AnthropicRuntime {
    async fn generate(&self, request: &ModelRequest) -> Result<ModelReply, ModelError> {
        if request.native_search {
            return Err(ModelError::Provider(
                "google_search tool requires the gemini provider".to_string(),
            ));
        }

        let body = self.build_request_body(request);
        let url = format!("{}/v1/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Provider(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ModelError::RateLimited);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ModelError::Provider(
                "unauthorized: check ANTHROPIC_API_KEY".to_string(),
            ));
        }

        if status.is_server_error() {
            return Err(ModelError::Provider(format!("server error: {}", status)));
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ModelError::Provider(format!(
                "API error {}: {}",
                status, error_body
            )));
        }

        let response_body: Value = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidReply(format!("failed to parse JSON: {}", e)))?;

        Self::parse_response(&response_body)
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
