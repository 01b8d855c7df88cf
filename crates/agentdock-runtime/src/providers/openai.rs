// ABOUTME: OpenAI Chat Completions adapter implementing the ModelRuntime trait.
// ABOUTME: Maps neutral function calls to tool_calls entries and tool-role result messages.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::runtime::{
    ChatMessage, ChatPart, ChatRole, FunctionCall, ModelError, ModelReply, ModelRequest,
    ModelRuntime, ReplyPart,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o";

/// OpenAI runtime adapter. Calls the Chat Completions API with tool
/// definitions and maps tool_calls back into a ModelReply.
pub struct OpenAiRuntime {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiRuntime {
    /// Create a new OpenAiRuntime reading configuration from environment variables.
    /// Required: `OPENAI_API_KEY`
    /// Optional: `OPENAI_BASE_URL` (defaults to https://api.openai.com)
    /// Optional: `OPENAI_MODEL` (defaults to gpt-4o)
    pub fn from_env(model: Option<&str>) -> Result<Self, ModelError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ModelError::Provider("OPENAI_API_KEY not set".to_string()))?;

        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let model = model
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(Self::new(api_key, base_url, model))
    }

    /// Create a new OpenAiRuntime with explicit configuration.
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model,
        }
    }

    /// Build the JSON request body for the Chat Completions API.
    pub fn build_request_body(&self, request: &ModelRequest) -> Value {
        let mut messages = vec![json!({ "role": "system", "content": request.system })];
        for message in &request.messages {
            build_messages(message, &mut messages);
        }

        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.get("name").cloned().unwrap_or(Value::Null),
                        "description": tool.get("description").cloned().unwrap_or(Value::Null),
                        "parameters": tool.get("parameters").cloned().unwrap_or(json!({"type": "object"}))
                    }
                })
            })
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
        }
        body
    }

    /// Parse a Chat Completions response into a ModelReply.
    pub fn parse_response(response_body: &Value) -> Result<ModelReply, ModelError> {
        let message = response_body
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("message"))
            .ok_or_else(|| {
                ModelError::InvalidReply("missing choices[0].message in response".to_string())
            })?;

        let mut reply = ModelReply::default();

        if let Some(text) = message.get("content").and_then(|c| c.as_str())
            && !text.is_empty()
        {
            reply.parts.push(ReplyPart::Text(text.to_string()));
        }

        if let Some(tool_calls) = message.get("tool_calls").and_then(|t| t.as_array()) {
            for call in tool_calls {
                let function = call.get("function").ok_or_else(|| {
                    ModelError::InvalidReply("tool call missing function".to_string())
                })?;
                let name = function
                    .get("name")
                    .and_then(|n| n.as_str())
                    .ok_or_else(|| {
                        ModelError::InvalidReply("tool call missing name".to_string())
                    })?;
                let args_text = function
                    .get("arguments")
                    .and_then(|a| a.as_str())
                    .unwrap_or("{}");
                let args: Value = serde_json::from_str(args_text).map_err(|e| {
                    ModelError::InvalidReply(format!("unparseable tool arguments: {}", e))
                })?;
                let call_id = call.get("id").and_then(|i| i.as_str()).map(String::from);

                reply.parts.push(ReplyPart::Call(FunctionCall {
                    call_id,
                    name: name.to_string(),
                    args,
                }));
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

/// Convert one neutral chat message into Chat Completions messages.
/// A model turn with function calls becomes a single assistant message with
/// tool_calls; each function response becomes its own tool-role message.
fn build_messages(message: &ChatMessage, out: &mut Vec<Value>) {
    match message.role {
        ChatRole::Model => {
            let mut text = String::new();
            let mut tool_calls = Vec::new();
            for part in &message.parts {
                match part {
                    ChatPart::Text(t) => text.push_str(t),
                    ChatPart::FunctionCall { call_id, name, args } => {
                        tool_calls.push(json!({
                            "id": call_id.clone().unwrap_or_default(),
                            "type": "function",
                            "function": {
                                "name": name,
                                "arguments": args.to_string()
                            }
                        }));
                    }
                    ChatPart::FunctionResponse { .. } => {}
                }
            }

            let mut entry = json!({ "role": "assistant" });
            entry["content"] = if text.is_empty() {
                Value::Null
            } else {
                Value::String(text)
            };
            if !tool_calls.is_empty() {
                entry["tool_calls"] = Value::Array(tool_calls);
            }
            out.push(entry);
        }
        ChatRole::User => {
            for part in &message.parts {
                match part {
                    ChatPart::Text(t) => {
                        out.push(json!({ "role": "user", "content": t }));
                    }
                    ChatPart::FunctionResponse { call_id, response, .. } => {
                        out.push(json!({
                            "role": "tool",
                            "tool_call_id": call_id.clone().unwrap_or_default(),
                            "content": response.to_string()
                        }));
                    }
                    ChatPart::FunctionCall { .. } => {}
                }
            }
        }
    }
}

#[async_trait]
impl ModelRuntime for OpenAiRuntime {
    async fn generate(&self, request: &ModelRequest) -> Result<ModelReply, ModelError> {
        if request.native_search {
            return Err(ModelError::Provider(
                "google_search tool requires the gemini provider".to_string(),
            ));
        }

        let body = self.build_request_body(request);
        let url = format!("{}/v1/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("authorization", format!("Bearer {}", self.api_key))
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
                "unauthorized: check OPENAI_API_KEY".to_string(),
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
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
