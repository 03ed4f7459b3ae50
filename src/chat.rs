//! Menu-aware chat with a graceful fallback chain.

use crate::config::SummaryConfig;
use crate::enrich::{enrich_response, NutritionCache, NutritionSource};
use crate::format::{format_response, DisplayNode};
use crate::model::{ChatMessage, MenuData, Role};
use crate::providers::{GenerationRequest, LlmProvider};
use crate::summary::truncate_menu_summary;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::Arc;

/// Returned when every generation attempt failed.
pub const APOLOGY: &str = "I'm having trouble processing your request right now. Could you try asking a more specific question about the menu items?";

const CHAT_MAX_TOKENS: u32 = 800;
const FALLBACK_MAX_TOKENS: u32 = 500;
const CHAT_TEMPERATURE: f32 = 0.7;

const ITEM_FORMAT_EXAMPLE: &str = "  \"**Turkey Breast** (Calories: 120, Protein: 24g, Carbs: 0g, Fat: 3g)
  **Swiss Cheese** (Calories: 80, Protein: 8g, Carbs: 1g, Fat: 6g)
  **Lettuce** (Calories: 5, Protein: 0g, Carbs: 1g, Fat: 0g)\"";

/// Assistant text after enrichment, with its display nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub text: String,
    pub nodes: Vec<DisplayNode>,
}

impl ChatReply {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let nodes = format_response(&text);
        ChatReply { text, nodes }
    }
}

pub struct ChatService {
    provider: Arc<dyn LlmProvider>,
    summary: SummaryConfig,
}

impl ChatService {
    pub fn new(provider: Arc<dyn LlmProvider>, summary: SummaryConfig) -> Self {
        ChatService { provider, summary }
    }

    fn menu_context(&self, menu_summary: Option<&str>) -> Option<String> {
        let summary = menu_summary.filter(|s| !s.trim().is_empty())?;
        if summary.len() <= self.summary.max_chars {
            return Some(summary.to_string());
        }
        let truncated = truncate_menu_summary(summary, self.summary.items_per_category);
        info!(
            "Menu summary truncated from {} to {} characters",
            summary.len(),
            truncated.len()
        );
        Some(truncated)
    }

    /// Answer a conversation. Never fails: after the full conversation, a
    /// simplified prompt and a direct prompt all fail, [`APOLOGY`] is returned.
    pub async fn chat(&self, messages: &[ChatMessage], menu_summary: Option<&str>) -> String {
        let context = self.menu_context(menu_summary);
        let question = last_user_message(messages);
        debug!("Chat request with {} messages", messages.len());

        let (system, conversation) = match messages.split_first() {
            Some((first, rest)) if first.role == Role::System => (first.content.clone(), rest.to_vec()),
            _ => (system_prompt(context.as_deref()), messages.to_vec()),
        };

        let attempts = [
            (
                "full conversation",
                GenerationRequest::conversation(system, conversation).with_max_tokens(CHAT_MAX_TOKENS),
            ),
            (
                "simplified prompt",
                GenerationRequest::prompt(simplified_prompt(context.as_deref(), question))
                    .with_max_tokens(FALLBACK_MAX_TOKENS),
            ),
            (
                "direct prompt",
                GenerationRequest::prompt(direct_prompt(context.as_deref(), question))
                    .with_max_tokens(FALLBACK_MAX_TOKENS),
            ),
        ];

        for (name, request) in attempts {
            match self
                .provider
                .generate(&request.with_temperature(CHAT_TEMPERATURE))
                .await
            {
                Ok(text) => {
                    debug!("Chat answered via {}", name);
                    return text;
                }
                Err(e) => warn!("Chat attempt with {} failed: {}", name, e),
            }
        }

        error!("All chat attempts failed");
        APOLOGY.to_string()
    }

    /// One-shot question about the menu. Returns [`APOLOGY`] on failure.
    pub async fn direct(&self, message: &str, menu_summary: Option<&str>) -> String {
        let context = self.menu_context(menu_summary);
        let request = GenerationRequest::prompt(direct_prompt(context.as_deref(), message))
            .with_max_tokens(FALLBACK_MAX_TOKENS)
            .with_temperature(CHAT_TEMPERATURE);

        match self.provider.generate(&request).await {
            Ok(text) => text,
            Err(e) => {
                error!("Direct chat failed: {}", e);
                APOLOGY.to_string()
            }
        }
    }
}

/// Enrich `text` with scraped nutrition when a menu is known, then format it.
pub async fn finish_reply(
    text: &str,
    menu: Option<&MenuData>,
    source: &dyn NutritionSource,
    cache: &NutritionCache,
) -> ChatReply {
    match menu {
        Some(menu) => ChatReply::new(enrich_response(text, menu, source, cache).await),
        None => ChatReply::new(text),
    }
}

fn last_user_message(messages: &[ChatMessage]) -> &str {
    messages
        .iter()
        .rev()
        .find(|message| message.role == Role::User)
        .map_or("", |message| message.content.as_str())
}

/// System instruction for the full conversation.
pub fn system_prompt(menu_summary: Option<&str>) -> String {
    let menu = match menu_summary {
        Some(summary) => format!("Here is the current menu information:\n{summary}"),
        None => "No menu data is currently available.".to_string(),
    };

    format!(
        "You are a helpful Rutgers Dining AI assistant. You provide personalized recommendations based on the dining hall menus.
{menu}

When making recommendations:
1. ALWAYS provide EXACTLY 3 meal options that match the user's preferences
2. Offer balanced meal combinations
3. Be helpful, concise, and friendly

FORMAT YOUR RESPONSES CLEARLY:
- Use \"**Option 1: [Name]**\", \"**Option 2: [Name]**\", and \"**Option 3: [Name]**\" for the three meal options
- For each food item, use the format \"**[Food Item]**\" (with double asterisks)
- List each food item on a NEW LINE with double asterisks, like:
{ITEM_FORMAT_EXAMPLE}
- IMPORTANT: Include estimated nutrition information for EACH individual food item in parentheses after the item name
- For each meal option, also include a meal total with format: \"Total: Calories: X, Protein: Xg, Carbs: Xg, Fat: Xg\"
- Use proper spacing and line breaks between items for readability

If the user asks about items not on the menu, politely explain that you can only provide information about the current menu.

IMPORTANT: Format your response with each food item on its own line with double asterisks and include nutrition info for EACH item."
    )
}

fn simplified_prompt(menu_summary: Option<&str>, question: &str) -> String {
    format!(
        "Based on this menu: {}

User question: {question}

Provide a helpful response about the menu items.

FORMAT YOUR RESPONSE:
- Use \"**Option 1: [Name]**\" for each meal option
- List each food item on a NEW LINE with double asterisks, like:
{ITEM_FORMAT_EXAMPLE}
- IMPORTANT: Include estimated nutrition information for EACH individual food item in parentheses
- For each meal option, also include a meal total
- Use proper spacing and line breaks between items for readability",
        menu_summary.unwrap_or("No menu data is currently available.")
    )
}

fn direct_prompt(menu_summary: Option<&str>, question: &str) -> String {
    format!(
        "You are a helpful Rutgers Dining AI assistant.

Here is the current menu:
{}

User question: {question}

Provide a helpful response about the menu items.

FORMAT YOUR RESPONSE:
- Start with a brief introduction to your recommendations
- ALWAYS provide EXACTLY 3 meal options
- Use \"**Option 1: [Name]**\", \"**Option 2: [Name]**\", and \"**Option 3: [Name]**\" for the three meal options
- For each food item, use the format \"**[Food Item]**\" (with double asterisks)
- List each food item on a NEW LINE with double asterisks, like:
{ITEM_FORMAT_EXAMPLE}
- IMPORTANT: Include estimated nutrition information for EACH individual food item in parentheses after the item name
- For each meal option, also include a meal total with format: \"Total: Calories: X, Protein: Xg, Carbs: Xg, Fat: Xg\"
- End with a brief conclusion or suggestion",
        menu_summary.unwrap_or("No menu data is currently available.")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiningError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Fails the first `failures` calls, then answers; records every request.
    struct ScriptedProvider {
        failures: usize,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedProvider {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(ScriptedProvider {
                failures,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<GenerationRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, request: &GenerationRequest) -> Result<String, DiningError> {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            if requests.len() <= self.failures {
                return Err(DiningError::LlmError("quota exceeded".to_string()));
            }
            Ok(format!("answer #{}", requests.len()))
        }
    }

    fn user(text: &str) -> ChatMessage {
        ChatMessage::new(Role::User, text)
    }

    const SUMMARY: &str = "Menu at Busch Dining Hall (Lunch):\n\nGRILL:\n- Burger\n\n";

    #[tokio::test]
    async fn test_chat_first_attempt() {
        let provider = ScriptedProvider::new(0);
        let service = ChatService::new(provider.clone(), SummaryConfig::default());

        let answer = service.chat(&[user("Something with protein")], Some(SUMMARY)).await;
        assert_eq!(answer, "answer #1");

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        let system = requests[0].system.as_deref().unwrap();
        assert!(system.contains("EXACTLY 3 meal options"));
        assert!(system.contains("- Burger"));
        assert_eq!(requests[0].max_tokens, Some(800));
        assert_eq!(requests[0].temperature, Some(0.7));
    }

    #[tokio::test]
    async fn test_chat_falls_back_in_order() {
        let provider = ScriptedProvider::new(2);
        let service = ChatService::new(provider.clone(), SummaryConfig::default());

        let answer = service.chat(&[user("vegan?")], Some(SUMMARY)).await;
        assert_eq!(answer, "answer #3");

        let requests = provider.requests();
        assert!(requests[1].system.is_none());
        assert!(requests[1].messages[0].content.starts_with("Based on this menu:"));
        assert!(requests[1].messages[0].content.contains("User question: vegan?"));
        assert_eq!(requests[1].max_tokens, Some(500));
        assert!(requests[2].messages[0]
            .content
            .starts_with("You are a helpful Rutgers Dining AI assistant."));
    }

    #[tokio::test]
    async fn test_chat_apologizes_when_everything_fails() {
        let provider = ScriptedProvider::new(usize::MAX);
        let service = ChatService::new(provider.clone(), SummaryConfig::default());

        let answer = service.chat(&[user("hello")], None).await;
        assert_eq!(answer, APOLOGY);
        assert_eq!(provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_chat_keeps_client_system_message() {
        let provider = ScriptedProvider::new(0);
        let service = ChatService::new(provider.clone(), SummaryConfig::default());
        let messages = vec![ChatMessage::new(Role::System, "Custom rules"), user("hi")];

        service.chat(&messages, Some(SUMMARY)).await;
        let requests = provider.requests();
        assert_eq!(requests[0].system.as_deref(), Some("Custom rules"));
        assert_eq!(requests[0].messages.len(), 1);
    }

    #[tokio::test]
    async fn test_long_summary_is_truncated() {
        let provider = ScriptedProvider::new(0);
        let config = SummaryConfig {
            max_chars: 40,
            items_per_category: 2,
        };
        let service = ChatService::new(provider.clone(), config);
        let summary = "Menu at X (Lunch):\n\nGRILL:\n- A\n- B\n- C\n- D\n\n";

        service.chat(&[user("hi")], Some(summary)).await;
        let system = provider.requests()[0].system.clone().unwrap();
        assert!(system.contains("- B"));
        assert!(!system.contains("- C"));
    }

    #[tokio::test]
    async fn test_direct() {
        let provider = ScriptedProvider::new(0);
        let service = ChatService::new(provider.clone(), SummaryConfig::default());
        assert_eq!(service.direct("dinner?", Some(SUMMARY)).await, "answer #1");

        let failing = ScriptedProvider::new(1);
        let service = ChatService::new(failing, SummaryConfig::default());
        assert_eq!(service.direct("dinner?", Some(SUMMARY)).await, APOLOGY);
    }

    #[test]
    fn test_system_prompt_without_menu() {
        assert!(system_prompt(None).contains("No menu data is currently available."));
    }
}
