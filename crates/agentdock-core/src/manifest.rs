// ABOUTME: Parses agentdock.toml, the initialization unit of an agent app directory.
// ABOUTME: Carries app identity, provider defaults, and the env vars the app requires.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Providers the runtime knows how to construct.
pub const KNOWN_PROVIDERS: &[&str] = &["gemini", "anthropic", "openai"];

/// Errors produced while parsing or validating an app manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("app name must not be empty")]
    EmptyName,

    #[error("unknown provider '{0}' (expected one of gemini, anthropic, openai)")]
    UnknownProvider(String),
}

/// The `[app]` table of agentdock.toml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSection {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// The `[provider]` table of agentdock.toml. All fields optional; the
/// server/CLI configuration supplies defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSection {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Parsed agentdock.toml: app identity, provider defaults, and required
/// environment variables surfaced to the user before a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppManifest {
    pub app: AppSection,
    #[serde(default)]
    pub provider: ProviderSection,
    /// Env vars that must be set for this app to run (e.g. GOOGLE_API_KEY).
    #[serde(default)]
    pub required_env: Vec<String>,
}

impl AppManifest {
    /// Parse a manifest from TOML text and validate it.
    pub fn parse_toml(text: &str) -> Result<Self, ManifestError> {
        let manifest: AppManifest = toml::from_str(text)?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        if self.app.name.trim().is_empty() {
            return Err(ManifestError::EmptyName);
        }
        if let Some(ref provider) = self.provider.name
            && !KNOWN_PROVIDERS.contains(&provider.as_str())
        {
            return Err(ManifestError::UnknownProvider(provider.clone()));
        }
        Ok(())
    }

    /// Env vars from `required_env` that are currently unset or empty.
    pub fn missing_env(&self) -> Vec<String> {
        self.required_env
            .iter()
            .filter(|var| {
                std::env::var(var.as_str())
                    .map(|v| v.is_empty())
                    .unwrap_or(true)
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_manifest() {
        let text = r#"
[app]
name = "stock_picker"
description = "Multi-agent stock analysis"

[provider]
name = "gemini"
model = "gemini-2.5-flash"

required_env = ["GOOGLE_API_KEY"]
"#;
        let manifest = AppManifest::parse_toml(text).unwrap();
        assert_eq!(manifest.app.name, "stock_picker");
        assert_eq!(manifest.provider.name.as_deref(), Some("gemini"));
        assert_eq!(manifest.provider.model.as_deref(), Some("gemini-2.5-flash"));
        assert_eq!(manifest.required_env, vec!["GOOGLE_API_KEY"]);
    }

    #[test]
    fn parse_minimal_manifest() {
        let manifest = AppManifest::parse_toml("[app]\nname = \"tiny\"\n").unwrap();
        assert_eq!(manifest.app.name, "tiny");
        assert!(manifest.app.description.is_empty());
        assert!(manifest.provider.name.is_none());
        assert!(manifest.required_env.is_empty());
    }

    #[test]
    fn rejects_empty_name() {
        let err = AppManifest::parse_toml("[app]\nname = \"  \"\n").unwrap_err();
        assert!(matches!(err, ManifestError::EmptyName));
    }

    #[test]
    fn rejects_unknown_provider() {
        let text = "[app]\nname = \"x\"\n[provider]\nname = \"watson\"\n";
        let err = AppManifest::parse_toml(text).unwrap_err();
        assert!(matches!(err, ManifestError::UnknownProvider(ref p) if p == "watson"));
    }

    #[test]
    fn missing_env_reports_unset_vars() {
        let manifest = AppManifest {
            app: AppSection {
                name: "x".to_string(),
                description: String::new(),
            },
            provider: ProviderSection::default(),
            required_env: vec!["AGENTDOCK_TEST_SURELY_UNSET_VAR".to_string()],
        };
        assert_eq!(
            manifest.missing_env(),
            vec!["AGENTDOCK_TEST_SURELY_UNSET_VAR"]
        );
    }
}
