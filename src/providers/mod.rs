mod factory;
mod google;
mod key_rotator;
mod open_ai;

pub use factory::ProviderFactory;
pub use google::GoogleProvider;
pub use key_rotator::{mask_key, KeyRotator};
pub use open_ai::OpenAIProvider;

use crate::error::DiningError;
use crate::model::{ChatMessage, Role};
use async_trait::async_trait;

/// A single text-generation call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerationRequest {
    /// System instruction, sent separately from the conversation
    pub system: Option<String>,
    /// Conversation turns, oldest first
    pub messages: Vec<ChatMessage>,
    /// Overrides the provider's configured limit
    pub max_tokens: Option<u32>,
    /// Overrides the provider's configured temperature
    pub temperature: Option<f32>,
    /// Ask the model to answer with a JSON document
    pub json_output: bool,
}

impl GenerationRequest {
    /// One user message and nothing else.
    pub fn prompt(text: impl Into<String>) -> Self {
        GenerationRequest {
            messages: vec![ChatMessage::new(Role::User, text)],
            ..Default::default()
        }
    }

    pub fn conversation(system: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        GenerationRequest {
            system: Some(system.into()),
            messages,
            ..Default::default()
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_output = true;
        self
    }
}

/// Unified trait for all LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name (e.g., "google", "openai")
    fn provider_name(&self) -> &str;

    /// Generate a completion and return its text
    async fn generate(&self, request: &GenerationRequest) -> Result<String, DiningError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builders() {
        let request = GenerationRequest::prompt("What is for lunch?")
            .with_max_tokens(500)
            .with_temperature(0.2)
            .json();

        assert!(request.system.is_none());
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, Role::User);
        assert_eq!(request.max_tokens, Some(500));
        assert_eq!(request.temperature, Some(0.2));
        assert!(request.json_output);
    }
}
