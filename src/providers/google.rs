use crate::config::LlmConfig;
use crate::error::DiningError;
use crate::model::Role;
use crate::providers::{GenerationRequest, KeyRotator, LlmProvider};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GoogleProvider {
    client: Client,
    keys: Arc<KeyRotator>,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl GoogleProvider {
    /// Create a new Google Gemini provider drawing keys from `keys`
    pub fn new(config: &LlmConfig, keys: Arc<KeyRotator>) -> Self {
        GoogleProvider {
            client: Client::new(),
            keys,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    #[doc(hidden)]
    pub fn with_base_url(keys: Arc<KeyRotator>, base_url: String, model: String) -> Self {
        GoogleProvider {
            client: Client::new(),
            keys,
            base_url,
            model,
            temperature: 0.7,
            max_tokens: 1000,
        }
    }

    fn request_body(&self, request: &GenerationRequest) -> Value {
        let contents: Vec<Value> = request
            .messages
            .iter()
            .filter(|message| message.role != Role::System)
            .map(|message| {
                let role = match message.role {
                    Role::Assistant => "model",
                    _ => "user",
                };
                json!({"role": role, "parts": [{"text": message.content}]})
            })
            .collect();

        let mut generation_config = json!({
            "temperature": request.temperature.unwrap_or(self.temperature),
            "maxOutputTokens": request.max_tokens.unwrap_or(self.max_tokens),
        });
        if request.json_output {
            generation_config["responseMimeType"] = json!("application/json");
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": generation_config,
        });
        if let Some(system) = &request.system {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }
        body
    }
}

#[async_trait]
impl LlmProvider for GoogleProvider {
    fn provider_name(&self) -> &str {
        "google"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, DiningError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.keys.next_key())
            .json(&self.request_body(request))
            .send()
            .await?;

        let status = response.status();
        let response_body: Value = response.json().await?;
        debug!("{:?}", response_body);

        if !status.is_success() {
            let message = response_body["error"]["message"]
                .as_str()
                .unwrap_or("no error message");
            return Err(DiningError::LlmError(format!(
                "Gemini returned {}: {}",
                status.as_u16(),
                message
            )));
        }

        let text = response_body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| {
                DiningError::LlmError("Failed to extract content from Google Gemini response".to_string())
            })?
            .to_string();

        Ok(text)
    }
}
