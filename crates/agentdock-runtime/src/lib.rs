// ABOUTME: Runtime crate for agentdock: model providers, tool execution, and the agent run loop.
// ABOUTME: Turns declarative AgentApp definitions into live sessions that stream RunEvents.

pub mod providers;
pub mod runner;
pub mod runtime;
pub mod service;
pub mod testing;
pub mod tools;

pub use providers::create_runtime;
pub use runner::{RunError, Runner, DEFAULT_MAX_ITERATIONS};
pub use runtime::{
    ChatMessage, ChatPart, ChatRole, FunctionCall, ModelError, ModelReply, ModelRequest,
    ModelRuntime, ReplyPart,
};
pub use service::{SessionHandle, SessionService};
pub use tools::{builtin_registry, ToolError, ToolHandler, ToolRegistry};
