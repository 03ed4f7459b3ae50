use dining_assistant::chat::{finish_reply, ChatService, APOLOGY};
use dining_assistant::config::SummaryConfig;
use dining_assistant::enrich::NutritionCache;
use dining_assistant::halls::DiningHallRegistry;
use dining_assistant::model::{ChatMessage, MenuData, MenuItem, Role};
use dining_assistant::providers::{GoogleProvider, KeyRotator, LlmProvider};
use dining_assistant::summary::menu_summary;
use dining_assistant::{DisplayNode, MenuPortal};
use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;

const GEMINI_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

const CHICKEN_LABEL: &str = "<h2>Grilled Chicken Breast</h2>\
    <b>Calories&nbsp;180</b>\
    <b>Total Fat</b>&nbsp;6g\
    <b>Tot. Carb.</b>&nbsp;0g\
    <b>Protein&nbsp;</b>30g";

fn gemini_reply(text: &str) -> String {
    json!({"candidates": [{"content": {"parts": [{"text": text}]}}]}).to_string()
}

fn menu(server: &Server) -> MenuData {
    let item = |name: &str, link: Option<String>| MenuItem {
        name: name.to_string(),
        category: "ENTREES".to_string(),
        portion: "4 OZ".to_string(),
        nutrition_link: link,
    };
    MenuData::new(
        "Busch Dining Hall",
        "10/17/2026",
        "Dinner",
        vec![
            item(
                "Grilled Chicken Breast",
                Some(format!("{}/foodpronet/label.aspx?RecNumAndPort=1", server.url())),
            ),
            item("Steamed Broccoli", None),
        ],
    )
}

fn provider(server: &Server, keys: &[&str]) -> Arc<dyn LlmProvider> {
    let keys = Arc::new(KeyRotator::new(keys.iter().map(|key| key.to_string())));
    Arc::new(GoogleProvider::with_base_url(
        keys,
        server.url(),
        "gemini-2.0-flash".to_string(),
    ))
}

fn portal(server: &Server) -> MenuPortal {
    let registry = DiningHallRegistry::rutgers()
        .with_base_url(format!("{}/foodpronet/pickmenu.aspx", server.url()));
    MenuPortal::new(registry, None).unwrap()
}

#[tokio::test]
async fn test_chat_reply_is_enriched_and_formatted() {
    let mut server = Server::new_async().await;
    let menu = menu(&server);

    let _llm = server
        .mock("POST", GEMINI_PATH)
        .match_header("x-goog-api-key", "gemini-key")
        .match_body(Matcher::Regex("Grilled Chicken Breast".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(gemini_reply(
            "**Option 1: Protein Plate**\n**Grilled Chicken:** lean and filling\n**Steamed Broccoli:** a green side",
        ))
        .create_async()
        .await;
    let label = server
        .mock("GET", "/foodpronet/label.aspx")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(CHICKEN_LABEL)
        .expect(1)
        .create_async()
        .await;

    let chat = ChatService::new(provider(&server, &["gemini-key"]), SummaryConfig::default());
    let messages = vec![ChatMessage::new(Role::User, "High protein dinner?")];
    let summary = menu_summary(&menu);
    let text = chat.chat(&messages, Some(&summary)).await;

    let portal = portal(&server);
    let cache = NutritionCache::new();
    let reply = finish_reply(&text, Some(&menu), &portal, &cache).await;

    assert!(reply
        .text
        .contains("**Grilled Chicken:** (Calories: 180, Protein: 30g, Carbs: 0g, Fat: 6g)"));
    assert!(reply.text.contains("**Steamed Broccoli:** a green side"));

    assert!(matches!(
        &reply.nodes[0],
        DisplayNode::OptionHeader { number: 1, title } if title == "Protein Plate"
    ));
    let chicken = reply
        .nodes
        .iter()
        .find_map(|node| match node {
            DisplayNode::FoodItem { name, badges } if name == "Grilled Chicken" => Some(badges),
            _ => None,
        })
        .expect("chicken food item");
    assert_eq!(chicken.len(), 4);
    assert_eq!(chicken[1].value, "30g");

    // Second reply mentioning the same item is served from the cache
    let again = finish_reply("**Grilled Chicken:** again", Some(&menu), &portal, &cache).await;
    assert!(again.text.contains("(Calories: 180"));
    assert_eq!(cache.len().await, 1);
    label.assert_async().await;
}

#[tokio::test]
async fn test_chat_falls_back_then_apologises() {
    let mut server = Server::new_async().await;
    let failing = server
        .mock("POST", GEMINI_PATH)
        .match_query(Matcher::Any)
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": {"message": "backend unavailable"}}"#)
        .expect(3)
        .create_async()
        .await;

    let chat = ChatService::new(provider(&server, &["a", "b"]), SummaryConfig::default());
    let text = chat
        .chat(&[ChatMessage::new(Role::User, "Anything vegan?")], None)
        .await;

    assert_eq!(text, APOLOGY);
    failing.assert_async().await;
}

#[tokio::test]
async fn test_direct_chat_uses_single_prompt() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", GEMINI_PATH)
        .match_query(Matcher::Any)
        .match_body(Matcher::Regex("User question: Where is dessert\\?".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(gemini_reply("Try the **Chocolate Chip Cookie**."))
        .create_async()
        .await;

    let chat = ChatService::new(provider(&server, &["k"]), SummaryConfig::default());
    let text = chat.direct("Where is dessert?", None).await;

    assert_eq!(text, "Try the **Chocolate Chip Cookie**.");
    mock.assert_async().await;
}
