// ABOUTME: Configuration loading and validation for the agentdock server.
// ABOUTME: Reads AGENTDOCK_* environment variables and enforces security constraints.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("AGENTDOCK_BIND is not a valid socket address: {0}")]
    InvalidBind(String),

    #[error("AGENTDOCK_ALLOW_REMOTE is true but AGENTDOCK_AUTH_TOKEN is not set; refusing to start without authentication")]
    RemoteWithoutToken,
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct DockConfig {
    pub home: PathBuf,
    pub bind: SocketAddr,
    pub allow_remote: bool,
    pub auth_token: Option<String>,
    pub default_provider: String,
    pub default_model: Option<String>,
}

impl DockConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - AGENTDOCK_HOME: data directory (default: ~/.agentdock)
    /// - AGENTDOCK_BIND: socket address to bind (default: 127.0.0.1:8000)
    /// - AGENTDOCK_ALLOW_REMOTE: allow non-loopback connections (default: false)
    /// - AGENTDOCK_AUTH_TOKEN: bearer token for API auth (optional)
    /// - AGENTDOCK_DEFAULT_PROVIDER: LLM provider (default: gemini)
    /// - AGENTDOCK_DEFAULT_MODEL: LLM model name (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        let home = std::env::var("AGENTDOCK_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::var("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("/tmp"))
                    .join(".agentdock")
            });

        let bind_str =
            std::env::var("AGENTDOCK_BIND").unwrap_or_else(|_| "127.0.0.1:8000".to_string());
        let bind: SocketAddr = bind_str
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind_str))?;

        let allow_remote = std::env::var("AGENTDOCK_ALLOW_REMOTE")
            .map(|v| v == "true" || v == "1" || v == "yes")
            .unwrap_or(false);

        let auth_token = std::env::var("AGENTDOCK_AUTH_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());

        let default_provider = std::env::var("AGENTDOCK_DEFAULT_PROVIDER")
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "gemini".to_string());

        let default_model = std::env::var("AGENTDOCK_DEFAULT_MODEL")
            .ok()
            .filter(|m| !m.is_empty());

        // Security validation: if allowing remote access, require auth token
        if allow_remote && auth_token.is_none() {
            return Err(ConfigError::RemoteWithoutToken);
        }

        Ok(Self {
            home,
            bind,
            allow_remote,
            auth_token,
            default_provider,
            default_model,
        })
    }
}
