// ABOUTME: Core library for agentdock, containing agent definitions, discovery, and run events.
// ABOUTME: This crate defines the shared data model used across all agentdock components.

pub mod agent;
pub mod discovery;
pub mod event;
pub mod manifest;
pub mod session;
pub mod transcript;

pub use agent::{AgentDef, AgentGraph, GraphError};
pub use discovery::{discover_apps, load_app, AgentApp, DiscoveryError};
pub use event::{RunEvent, RunEventPayload};
pub use manifest::{AppManifest, ManifestError};
pub use session::SessionState;
pub use transcript::TranscriptMessage;

/// File name of the initialization unit inside an app directory.
pub const MANIFEST_FILE: &str = "agentdock.toml";

/// File name of the agent-definition unit inside an app directory.
pub const AGENTS_FILE: &str = "agents.yaml";
