// ABOUTME: Google Gemini API adapter implementing the ModelRuntime trait.
// ABOUTME: Translates ModelRequests into generateContent calls with function declarations.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::runtime::{
    ChatMessage, ChatPart, ChatRole, FunctionCall, ModelError, ModelReply, ModelRequest,
    ModelRuntime, ReplyPart,
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const MAX_TOKENS: u32 = 8192;

/// Google Gemini runtime adapter. Calls the generateContent API with
/// function declarations and maps functionCall parts back into a ModelReply.
pub struct GeminiRuntime {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiRuntime {
    /// Create a new GeminiRuntime reading configuration from environment variables.
    /// Required: `GOOGLE_API_KEY` (or `GEMINI_API_KEY` as a fallback)
    /// Optional: `GEMINI_BASE_URL` (defaults to https://generativelanguage.googleapis.com)
    /// Optional: `GEMINI_MODEL` (defaults to gemini-2.5-flash)
    pub fn from_env(model: Option<&str>) -> Result<Self, ModelError> {
        let api_key = std::env::var("GOOGLE_API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .map_err(|_| ModelError::Provider("GOOGLE_API_KEY not set".to_string()))?;

        let base_url =
            std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let model = model
            .map(String::from)
            .or_else(|| std::env::var("GEMINI_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(Self::new(api_key, base_url, model))
    }

    /// Create a new GeminiRuntime with explicit configuration.
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model,
        }
    }

    /// Build the JSON request body for the generateContent API.
    pub fn build_request_body(request: &ModelRequest) -> Value {
        let contents: Vec<Value> = request.messages.iter().map(build_content).collect();

        let mut tools = Vec::new();
        if !request.tools.is_empty() {
            let declarations: Vec<Value> = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.get("name").cloned().unwrap_or(Value::Null),
                        "description": tool.get("description").cloned().unwrap_or(Value::Null),
                        "parameters": tool.get("parameters").cloned().unwrap_or(json!({"type": "object"}))
                    })
                })
                .collect();
            tools.push(json!({ "function_declarations": declarations }));
        }
        if request.native_search {
            tools.push(json!({ "google_search": {} }));
        }

        let mut body = json!({
            "system_instruction": {
                "parts": [{"text": request.system}]
            },
            "contents": contents,
            "generation_config": {
                "max_output_tokens": MAX_TOKENS
            }
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
        }
        body
    }

    /// Parse a generateContent response into a ModelReply.
    pub fn parse_response(response_body: &Value) -> Result<ModelReply, ModelError> {
        let candidates = response_body
            .get("candidates")
            .and_then(|c| c.as_array())
            .ok_or_else(|| {
                ModelError::InvalidReply("missing candidates array in response".to_string())
            })?;

        let candidate = candidates
            .first()
            .ok_or_else(|| ModelError::InvalidReply("empty candidates array".to_string()))?;

        let parts = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array())
            .ok_or_else(|| {
                ModelError::InvalidReply("missing parts array in candidate".to_string())
            })?;

        let mut reply = ModelReply::default();
        for part in parts {
            if let Some(function_call) = part.get("functionCall") {
                let name = function_call
                    .get("name")
                    .and_then(|n| n.as_str())
                    .ok_or_else(|| {
                        ModelError::InvalidReply("functionCall missing name".to_string())
                    })?;
                let args = function_call.get("args").cloned().unwrap_or(json!({}));
                reply.parts.push(ReplyPart::Call(FunctionCall {
                    call_id: None,
                    name: name.to_string(),
                    args,
                }));
            } else if let Some(text) = part.get("text").and_then(|t| t.as_str())
                && !text.is_empty()
            {
                reply.parts.push(ReplyPart::Text(text.to_string()));
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

/// Convert one neutral chat message into a Gemini `contents` entry.
fn build_content(message: &ChatMessage) -> Value {
    let role = match message.role {
        ChatRole::User => "user",
        ChatRole::Model => "model",
    };

    let parts: Vec<Value> = message
        .parts
        .iter()
        .map(|part| match part {
            ChatPart::Text(text) => json!({ "text": text }),
            ChatPart::FunctionCall { name, args, .. } => json!({
                "functionCall": { "name": name, "args": args }
            }),
            ChatPart::FunctionResponse { name, response, .. } => json!({
                "functionResponse": { "name": name, "response": response }
            }),
        })
        .collect();

    json!({ "role": role, "parts": parts })
}

#[async_trait]
impl ModelRuntime for GeminiRuntime {
    async fn generate(&self, request: &ModelRequest) -> Result<ModelReply, ModelError> {
        let body = Self::build_request_body(request);
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Provider(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ModelError::RateLimited);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ModelError::Provider(
                "unauthorized: check GOOGLE_API_KEY".to_string(),
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
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
