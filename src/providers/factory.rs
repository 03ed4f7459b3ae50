use crate::config::LlmConfig;
use crate::error::DiningError;
use crate::providers::{GoogleProvider, KeyRotator, LlmProvider, OpenAIProvider};
use log::info;
use std::sync::Arc;

pub struct ProviderFactory;

impl ProviderFactory {
    /// Create the configured provider instance
    pub fn create(config: &LlmConfig) -> Result<Box<dyn LlmProvider>, DiningError> {
        match config.provider.as_str() {
            "google" => {
                let keys = Arc::new(KeyRotator::new(config.api_keys.clone()));
                info!(
                    "Using Google Gemini model {} with {} API key(s)",
                    config.model,
                    keys.len()
                );
                Ok(Box::new(GoogleProvider::new(config, keys)))
            }
            "openai" => {
                info!("Using OpenAI-compatible model {}", config.model);
                Ok(Box::new(OpenAIProvider::new(config)?))
            }
            other => Err(DiningError::LlmError(format!(
                "Unknown provider: {} (available: {})",
                other,
                Self::available_providers().join(", ")
            ))),
        }
    }

    /// List all available provider names
    pub fn available_providers() -> Vec<&'static str> {
        vec!["google", "openai"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config(provider: &str) -> LlmConfig {
        LlmConfig {
            provider: provider.to_string(),
            api_keys: vec!["test-key".to_string()],
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_create_google_provider() {
        let provider = ProviderFactory::create(&create_test_config("google")).unwrap();
        assert_eq!(provider.provider_name(), "google");
    }

    #[test]
    fn test_create_google_provider_without_keys() {
        let config = LlmConfig::default();
        let provider = ProviderFactory::create(&config).unwrap();
        assert_eq!(provider.provider_name(), "google");
    }

    #[test]
    fn test_create_openai_provider() {
        let provider = ProviderFactory::create(&create_test_config("openai")).unwrap();
        assert_eq!(provider.provider_name(), "openai");
    }

    #[test]
    fn test_unknown_provider() {
        match ProviderFactory::create(&create_test_config("unknown")) {
            Err(DiningError::LlmError(message)) => {
                assert_eq!(message, "Unknown provider: unknown (available: google, openai)")
            }
            _ => panic!("expected an unknown provider error"),
        }
    }

    #[test]
    fn test_available_providers() {
        let providers = ProviderFactory::available_providers();
        assert!(providers.contains(&"google"));
        assert!(providers.contains(&"openai"));
    }
}
