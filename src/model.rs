use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

/// Category assigned to menu items that appear before any category header.
pub const UNCATEGORIZED: &str = "Uncategorized";

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(\.\d+)?").unwrap());

/// A single dish scraped from a menu page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub name: String,
    pub category: String,
    pub portion: String,
    pub nutrition_link: Option<String>,
}

/// The menu for one hall, date and meal period.
///
/// `items_by_category` keeps categories in the order they first appear in the
/// source page, and every entry of `items` appears in exactly one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuData {
    pub dining_hall: String,
    pub date: String,
    pub meal_period: String,
    #[serde(rename = "menuItems")]
    pub items: Vec<MenuItem>,
    #[serde(rename = "menuByCategory")]
    pub items_by_category: IndexMap<String, Vec<MenuItem>>,
    pub timestamp: DateTime<Utc>,
}

impl MenuData {
    pub fn new(
        dining_hall: impl Into<String>,
        date: impl Into<String>,
        meal_period: impl Into<String>,
        items: Vec<MenuItem>,
    ) -> Self {
        let mut items_by_category: IndexMap<String, Vec<MenuItem>> = IndexMap::new();
        for item in &items {
            items_by_category
                .entry(item.category.clone())
                .or_default()
                .push(item.clone());
        }

        MenuData {
            dining_hall: dining_hall.into(),
            date: date.into(),
            meal_period: meal_period.into(),
            items,
            items_by_category,
            timestamp: Utc::now(),
        }
    }

    /// Meal period as shown to people ("Knight+Room" becomes "Knight Room").
    pub fn display_meal_period(&self) -> String {
        self.meal_period.replace('+', " ")
    }
}

/// Nutrition facts scraped from an item's detail page.
///
/// Values keep their units ("12g", "140mg"); use [`numeric_value`] when a
/// number is needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionFacts {
    pub item_name: String,
    pub serving_size: String,
    pub calories: String,
    pub total_fat: String,
    pub saturated_fat: String,
    pub trans_fat: String,
    pub cholesterol: String,
    pub sodium: String,
    pub total_carbs: String,
    pub dietary_fiber: String,
    pub sugars: String,
    pub protein: String,
    pub ingredients: String,
    pub allergens: String,
    pub percent_daily_values: IndexMap<String, String>,
}

/// Best-effort number from a display value such as "12g" or "150 mg".
/// Returns 0 when no number is present.
pub fn numeric_value(value: &str) -> f64 {
    NUMBER_RE
        .find(value)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_f64()).unwrap_or(0.0))
}

/// Numeric nutrition values attached to a logged meal.
///
/// Stored values that are missing or not numbers load as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionalInfo {
    #[serde(default, deserialize_with = "lenient_number")]
    pub calories: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub protein: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub carbs: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub fat: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub saturated_fat: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub trans_fat: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub cholesterol: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub sodium: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub dietary_fiber: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub sugars: f64,
}

impl From<&NutritionFacts> for NutritionalInfo {
    fn from(facts: &NutritionFacts) -> Self {
        NutritionalInfo {
            calories: numeric_value(&facts.calories),
            protein: numeric_value(&facts.protein),
            carbs: numeric_value(&facts.total_carbs),
            fat: numeric_value(&facts.total_fat),
            saturated_fat: numeric_value(&facts.saturated_fat),
            trans_fat: numeric_value(&facts.trans_fat),
            cholesterol: numeric_value(&facts.cholesterol),
            sodium: numeric_value(&facts.sodium),
            dietary_fiber: numeric_value(&facts.dietary_fiber),
            sugars: numeric_value(&facts.sugars),
        }
    }
}

/// A meal the user logged, either by hand or from a menu item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealHistoryEntry {
    pub id: String,
    pub date: DateTime<Utc>,
    pub meal_type: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dining_hall: String,
    #[serde(default)]
    pub rating: u8,
    #[serde(default)]
    pub nutritional_info: NutritionalInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        let now = Utc::now().timestamp_millis();
        ChatMessage {
            id: now.to_string(),
            role,
            content: content.into(),
            timestamp: Some(now),
        }
    }
}

/// One menu-load-triggered conversation, persisted under its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub name: String,
    pub dining_hall: String,
    pub meal_period: String,
    pub date: String,
    pub messages: Vec<ChatMessage>,
    pub last_updated: i64,
}
