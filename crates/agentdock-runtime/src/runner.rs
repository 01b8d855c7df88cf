// ABOUTME: The agent run loop: drives a model through tool calls, delegation, and transfer.
// ABOUTME: One Runner per app; every step of a run is emitted as a RunEvent on the session.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{json, Value};

use agentdock_core::agent::{AgentDef, TRANSFER_TOOL};
use agentdock_core::{AgentApp, RunEventPayload, TranscriptMessage};

use crate::providers::create_runtime;
use crate::runtime::{
    ChatMessage, ChatPart, ChatRole, FunctionCall, ModelError, ModelReply, ModelRequest,
    ModelRuntime, ReplyPart,
};
use crate::service::SessionHandle;
use crate::tools::ToolRegistry;

/// How many model round-trips a single invocation may take before it is
/// aborted.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Errors that can occur while running an invocation.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("'{target}' is not a sub-agent of '{agent}'")]
    InvalidTransfer { agent: String, target: String },

    #[error("agent '{agent}' exceeded {limit} reasoning iterations")]
    IterationLimit { agent: String, limit: usize },

    #[error("a run is already active for this session")]
    SessionBusy,
}

/// Executes invocations of one agent app. Holds a model runtime per agent
/// (agents may use different models) and the function-tool registry.
pub struct Runner {
    app: Arc<AgentApp>,
    registry: Arc<ToolRegistry>,
    runtimes: HashMap<String, Arc<dyn ModelRuntime>>,
    max_iterations: usize,
}

impl Runner {
    /// Build a runner for an app, creating one runtime per agent from the
    /// given provider. Each agent's model resolves from its own definition,
    /// then the app manifest, then `default_model`.
    pub fn from_provider(
        app: Arc<AgentApp>,
        registry: Arc<ToolRegistry>,
        provider: &str,
        default_model: Option<&str>,
    ) -> Result<Self, ModelError> {
        let provider = app
            .manifest
            .provider
            .name
            .as_deref()
            .unwrap_or(provider)
            .to_string();

        let mut runtimes = HashMap::new();
        for agent in &app.graph.agents {
            let model = agent
                .model
                .clone()
                .or_else(|| app.manifest.provider.model.clone())
                .or_else(|| default_model.map(String::from));
            let runtime = create_runtime(&provider, model.as_deref())?;
            runtimes.insert(agent.name.clone(), runtime);
        }

        Ok(Self {
            app,
            registry,
            runtimes,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        })
    }

    /// Build a runner that uses a single runtime for every agent. Used by
    /// tests with a stub runtime.
    pub fn with_runtime(
        app: Arc<AgentApp>,
        registry: Arc<ToolRegistry>,
        runtime: Arc<dyn ModelRuntime>,
    ) -> Self {
        let runtimes = app
            .graph
            .agents
            .iter()
            .map(|a| (a.name.clone(), Arc::clone(&runtime)))
            .collect();
        Self {
            app,
            registry,
            runtimes,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Override the iteration bound.
    pub fn max_iterations(mut self, limit: usize) -> Self {
        self.max_iterations = limit;
        self
    }

    /// Run one user message against the app. Claims the session for the
    /// duration; a concurrent run is rejected with SessionBusy. Returns the
    /// final response text.
    pub async fn run(&self, session: &SessionHandle, text: &str) -> Result<String, RunError> {
        if !session.try_begin_run() {
            return Err(RunError::SessionBusy);
        }

        let result = self.run_inner(session, text).await;

        if let Err(ref e) = result {
            tracing::error!(session_id = %session.session_id, error = %e, "run failed");
            session
                .emit(RunEventPayload::RunFailed {
                    error: e.to_string(),
                })
                .await;
        }

        session.end_run();
        result
    }

    async fn run_inner(&self, session: &SessionHandle, text: &str) -> Result<String, RunError> {
        session
            .emit(RunEventPayload::UserMessageAppended {
                message: TranscriptMessage::from_user(text.to_string()),
            })
            .await;

        // Seed the working history from the transcript, which now includes
        // the message just appended. Each invocation starts at the root.
        let history: Vec<ChatMessage> = {
            let state = session.read_state().await;
            state
                .transcript
                .iter()
                .map(|m| {
                    if m.is_user() {
                        ChatMessage::user_text(&m.content)
                    } else {
                        ChatMessage::model_text(&m.content)
                    }
                })
                .collect()
        };

        let root = self.lookup(&self.app.graph.root_agent)?;
        let (final_text, final_agent) = self.drive(session, root, history, true).await?;

        let message = TranscriptMessage::new(final_agent, final_text.clone());
        session
            .emit(RunEventPayload::FinalResponse { message })
            .await;

        Ok(final_text)
    }

    /// Drive one agent (and whatever it transfers to) until a reply with no
    /// function calls arrives. Returns the final text and the name of the
    /// agent that produced it.
    async fn drive(
        &self,
        session: &SessionHandle,
        start: &AgentDef,
        mut history: Vec<ChatMessage>,
        allow_transfer: bool,
    ) -> Result<(String, String), RunError> {
        let mut active = start;
        session
            .emit(RunEventPayload::AgentTurnStarted {
                agent: active.name.clone(),
            })
            .await;

        for _ in 0..self.max_iterations {
            let reply = self.step(active, &history).await?;

            let text = reply.text();
            if !text.is_empty() {
                session
                    .emit(RunEventPayload::TextEmitted {
                        agent: active.name.clone(),
                        text: text.clone(),
                    })
                    .await;
            }

            if !reply.has_calls() {
                return Ok((text, active.name.clone()));
            }

            history.push(model_turn(&reply));

            let mut responses = Vec::new();
            let mut next_agent = None;
            for call in reply.calls() {
                let (output, transfer) = self
                    .dispatch_call(session, active, call, allow_transfer)
                    .await?;
                responses.push(ChatPart::FunctionResponse {
                    call_id: call.call_id.clone(),
                    name: call.name.clone(),
                    response: output,
                });
                if transfer.is_some() {
                    next_agent = transfer;
                }
            }
            history.push(ChatMessage {
                role: ChatRole::User,
                parts: responses,
            });

            if let Some(name) = next_agent {
                active = self.lookup(&name)?;
                session
                    .emit(RunEventPayload::AgentTurnStarted {
                        agent: active.name.clone(),
                    })
                    .await;
            }
        }

        Err(RunError::IterationLimit {
            agent: active.name.clone(),
            limit: self.max_iterations,
        })
    }

    /// Resolve one function call. Returns the tool output to feed back and,
    /// for transfers, the name of the agent taking over.
    async fn dispatch_call(
        &self,
        session: &SessionHandle,
        agent: &AgentDef,
        call: &FunctionCall,
        allow_transfer: bool,
    ) -> Result<(Value, Option<String>), RunError> {
        if call.name == TRANSFER_TOOL {
            if !allow_transfer {
                // Agents running as tools answer their caller; they cannot
                // take over the conversation.
                return Ok((
                    json!({"error": "transfer_to_agent is not available to agents running as tools"}),
                    None,
                ));
            }
            let target = call
                .args
                .get("agent_name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            if !agent.sub_agents.iter().any(|s| s == &target) {
                return Err(RunError::InvalidTransfer {
                    agent: agent.name.clone(),
                    target,
                });
            }
            session
                .emit(RunEventPayload::AgentTransferred {
                    from: agent.name.clone(),
                    to: target.clone(),
                })
                .await;
            return Ok((
                json!({"status": "transferred", "active_agent": target}),
                Some(target),
            ));
        }

        session
            .emit(RunEventPayload::ToolCallStarted {
                agent: agent.name.clone(),
                tool: call.name.clone(),
                args: call.args.clone(),
            })
            .await;

        let output = if agent.agent_tools.iter().any(|a| a == &call.name) {
            let request = call
                .args
                .get("request")
                .and_then(|v| v.as_str())
                .map(String::from)
                .unwrap_or_else(|| call.args.to_string());
            let target = self.lookup(&call.name)?;
            let result = self.run_subagent(session, target, request).await?;
            json!({ "result": result })
        } else {
            match self.registry.get(&call.name) {
                Some(handler) => handler
                    .call(call.args.clone())
                    .await
                    .unwrap_or_else(|e| json!({ "error": e.to_string() })),
                None => json!({ "error": format!("unknown tool '{}'", call.name) }),
            }
        };

        session
            .emit(RunEventPayload::ToolCallFinished {
                agent: agent.name.clone(),
                tool: call.name.clone(),
                output: output.clone(),
            })
            .await;

        Ok((output, None))
    }

    /// Run an agent as a tool: it gets the request as its own conversation,
    /// uses its own tools, and its final text is the tool result. Boxed
    /// because agent-tools may nest.
    fn run_subagent<'a>(
        &'a self,
        session: &'a SessionHandle,
        agent: &'a AgentDef,
        request: String,
    ) -> Pin<Box<dyn Future<Output = Result<String, RunError>> + Send + 'a>> {
        Box::pin(async move {
            let history = vec![ChatMessage::user_text(request)];
            let (text, _) = self.drive(session, agent, history, false).await?;
            Ok(text)
        })
    }

    async fn step(
        &self,
        agent: &AgentDef,
        history: &[ChatMessage],
    ) -> Result<ModelReply, RunError> {
        let runtime = self
            .runtimes
            .get(&agent.name)
            .ok_or_else(|| RunError::UnknownAgent(agent.name.clone()))?;

        let request = self.build_request(agent, history);
        tracing::debug!(
            agent = %agent.name,
            model = runtime.model_name(),
            tools = request.tools.len(),
            "model step"
        );

        Ok(runtime.generate(&request).await?)
    }

    /// Assemble the model request for one agent: its instruction as the
    /// system prompt, the shared history, and its reachable tools.
    fn build_request(&self, agent: &AgentDef, history: &[ChatMessage]) -> ModelRequest {
        let mut tools = self.registry.declarations_for(agent.function_tools());

        for name in &agent.agent_tools {
            if let Some(def) = self.app.graph.resolve(name) {
                tools.push(agent_tool_declaration(def));
            }
        }

        if !agent.sub_agents.is_empty() {
            tools.push(transfer_declaration(&agent.sub_agents));
        }

        ModelRequest {
            system: agent.instruction.clone(),
            messages: history.to_vec(),
            tools,
            native_search: agent.uses_native_search(),
        }
    }

    fn lookup(&self, name: &str) -> Result<&AgentDef, RunError> {
        self.app
            .graph
            .resolve(name)
            .ok_or_else(|| RunError::UnknownAgent(name.to_string()))
    }
}

/// Re-express a model reply as a history message.
fn model_turn(reply: &ModelReply) -> ChatMessage {
    let parts = reply
        .parts
        .iter()
        .map(|part| match part {
            ReplyPart::Text(t) => ChatPart::Text(t.clone()),
            ReplyPart::Call(c) => ChatPart::FunctionCall {
                call_id: c.call_id.clone(),
                name: c.name.clone(),
                args: c.args.clone(),
            },
        })
        .collect();
    ChatMessage {
        role: ChatRole::Model,
        parts,
    }
}

/// Declaration exposing a peer agent as a callable tool.
fn agent_tool_declaration(agent: &AgentDef) -> Value {
    let description = if agent.description.is_empty() {
        format!(
            "Delegate a request to the {} agent and receive its reply.",
            agent.name
        )
    } else {
        agent.description.clone()
    };
    json!({
        "name": agent.name,
        "description": description,
        "parameters": {
            "type": "object",
            "properties": {
                "request": {
                    "type": "string",
                    "description": "The request to send to this agent."
                }
            },
            "required": ["request"]
        }
    })
}

/// Declaration of the transfer function offered to agents with sub-agents.
fn transfer_declaration(sub_agents: &[String]) -> Value {
    json!({
        "name": TRANSFER_TOOL,
        "description": "Hand the conversation to one of your sub-agents. The chosen agent takes over and responds to the user.",
        "parameters": {
            "type": "object",
            "properties": {
                "agent_name": {
                    "type": "string",
                    "enum": sub_agents
                }
            },
            "required": ["agent_name"]
        }
    })
}
