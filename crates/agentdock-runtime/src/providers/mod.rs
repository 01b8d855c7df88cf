// ABOUTME: Provider adapter modules and the factory that resolves a provider name to a runtime.
// ABOUTME: Model resolution order is explicit arg, then provider env var, then provider default.

pub mod anthropic;
pub mod gemini;
pub mod openai;

use std::sync::Arc;

use crate::runtime::{ModelError, ModelRuntime};

pub use anthropic::AnthropicRuntime;
pub use gemini::GeminiRuntime;
pub use openai::OpenAiRuntime;

/// Create a model runtime for the given provider name.
///
/// The model is resolved from:
/// 1. The explicit `model` parameter (if Some)
/// 2. A provider-specific environment variable (e.g. GEMINI_MODEL)
/// 3. A sensible default for that provider
pub fn create_runtime(
    provider: &str,
    model: Option<&str>,
) -> Result<Arc<dyn ModelRuntime>, ModelError> {
    match provider {
        "gemini" => Ok(Arc::new(GeminiRuntime::from_env(model)?)),
        "anthropic" => Ok(Arc::new(AnthropicRuntime::from_env(model)?)),
        "openai" => Ok(Arc::new(OpenAiRuntime::from_env(model)?)),
        unknown => Err(ModelError::Provider(format!(
            "unsupported provider: {}",
            unknown
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serialize all tests that read/write env vars to prevent race conditions.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn unknown_provider_returns_error() {
        let err = create_runtime("watson", None).err().unwrap();
        assert!(err.to_string().contains("unsupported provider"));
    }

    #[test]
    fn gemini_missing_api_key_returns_error() {
        let _guard = ENV_MUTEX.lock().unwrap();
        unsafe {
            std::env::remove_var("GOOGLE_API_KEY");
            std::env::remove_var("GEMINI_API_KEY");
        }
        let err = create_runtime("gemini", None).err().unwrap();
        assert!(
            err.to_string().contains("GOOGLE_API_KEY"),
            "expected mention of GOOGLE_API_KEY in error, got: {}",
            err
        );
    }

    #[test]
    fn anthropic_missing_api_key_returns_error() {
        let _guard = ENV_MUTEX.lock().unwrap();
        unsafe { std::env::remove_var("ANTHROPIC_API_KEY") };
        let err = create_runtime("anthropic", None).err().unwrap();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn openai_missing_api_key_returns_error() {
        let _guard = ENV_MUTEX.lock().unwrap();
        unsafe { std::env::remove_var("OPENAI_API_KEY") };
        let err = create_runtime("openai", None).err().unwrap();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn explicit_model_overrides_default() {
        let _guard = ENV_MUTEX.lock().unwrap();
        unsafe {
            std::env::set_var("GOOGLE_API_KEY", "test-key");
            std::env::remove_var("GEMINI_MODEL");
        }

        let runtime = create_runtime("gemini", Some("gemini-2.5-pro")).unwrap();

        unsafe { std::env::remove_var("GOOGLE_API_KEY") };

        assert_eq!(runtime.model_name(), "gemini-2.5-pro");
        assert_eq!(runtime.provider_name(), "gemini");
    }

    #[test]
    fn gemini_api_key_fallback_variable_works() {
        let _guard = ENV_MUTEX.lock().unwrap();
        unsafe {
            std::env::remove_var("GOOGLE_API_KEY");
            std::env::set_var("GEMINI_API_KEY", "fallback-key");
        }

        let result = create_runtime("gemini", None);

        unsafe { std::env::remove_var("GEMINI_API_KEY") };

        let runtime = result.unwrap();
        assert_eq!(runtime.model_name(), "gemini-2.5-flash");
    }
}
