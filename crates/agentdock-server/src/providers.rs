// ABOUTME: LLM provider status detection for the agentdock UI.
// ABOUTME: Reads environment variables to determine which providers are configured.

use serde::Serialize;

/// Status of a single LLM provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub has_api_key: bool,
    pub model: String,
}

/// Overall provider status for the UI.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub default_provider: String,
    pub default_model: Option<String>,
    pub providers: Vec<ProviderInfo>,
    pub any_available: bool,
}

impl ProviderStatus {
    /// Detect available LLM providers from environment variables.
    ///
    /// Checks for:
    /// - GOOGLE_API_KEY (or GEMINI_API_KEY) / GEMINI_MODEL
    /// - ANTHROPIC_API_KEY / ANTHROPIC_MODEL
    /// - OPENAI_API_KEY / OPENAI_MODEL
    /// - AGENTDOCK_DEFAULT_PROVIDER / AGENTDOCK_DEFAULT_MODEL
    ///
    /// Never exposes actual API key values.
    pub fn detect() -> Self {
        let default_provider = std::env::var("AGENTDOCK_DEFAULT_PROVIDER")
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "gemini".to_string());
        let default_model = std::env::var("AGENTDOCK_DEFAULT_MODEL")
            .ok()
            .filter(|m| !m.is_empty());

        let gemini_key = env_present("GOOGLE_API_KEY") || env_present("GEMINI_API_KEY");
        let providers = vec![
            ProviderInfo {
                name: "gemini".to_string(),
                has_api_key: gemini_key,
                model: env_or("GEMINI_MODEL", "gemini-2.5-flash"),
            },
            ProviderInfo {
                name: "anthropic".to_string(),
                has_api_key: env_present("ANTHROPIC_API_KEY"),
                model: env_or("ANTHROPIC_MODEL", "claude-sonnet-4-5-20250929"),
            },
            ProviderInfo {
                name: "openai".to_string(),
                has_api_key: env_present("OPENAI_API_KEY"),
                model: env_or("OPENAI_MODEL", "gpt-4o"),
            },
        ];

        let any_available = providers.iter().any(|p| p.has_api_key);

        Self {
            default_provider,
            default_model,
            providers,
            any_available,
        }
    }

    /// A status with no providers configured, for tests.
    pub fn unavailable() -> Self {
        Self {
            default_provider: "gemini".to_string(),
            default_model: None,
            providers: Vec::new(),
            any_available: false,
        }
    }
}

fn env_present(var: &str) -> bool {
    std::env::var(var).ok().filter(|v| !v.is_empty()).is_some()
}

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}
