//! The user's meal log, persisted under `mealHistory`.

use crate::error::DiningError;
use crate::model::{MealHistoryEntry, MenuItem, NutritionFacts, NutritionalInfo};
use crate::store::{load_list, save_list, KeyValueStore, MEAL_HISTORY_KEY};
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

const EVENT_CAPACITY: usize = 32;

/// Change notifications for anything presenting the meal log.
#[derive(Debug, Clone, PartialEq)]
pub enum MealEvent {
    Added(MealHistoryEntry),
    Updated(MealHistoryEntry),
    Deleted(String),
}

/// A meal entered by hand. Nutrition is estimated from the meal type and
/// description.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualMeal {
    pub date: DateTime<Utc>,
    pub meal_type: String,
    pub name: String,
    pub description: String,
    pub dining_hall: String,
}

struct EstimateBase {
    calories: f64,
    protein: f64,
    carbs: f64,
    fat: f64,
}

fn estimate_base(meal_type: &str) -> EstimateBase {
    let (calories, protein, carbs, fat) = match meal_type {
        "breakfast" => (350.0, 15.0, 45.0, 12.0),
        "dinner" => (650.0, 35.0, 70.0, 25.0),
        "snack" => (200.0, 8.0, 25.0, 8.0),
        _ => (550.0, 25.0, 65.0, 20.0),
    };
    EstimateBase {
        calories,
        protein,
        carbs,
        fat,
    }
}

const PROTEIN_WORDS: &[&str] = &["chicken", "beef", "fish", "turkey", "protein"];
const CARB_WORDS: &[&str] = &["pasta", "rice", "bread", "potato", "carb"];
const FAT_WORDS: &[&str] = &["cheese", "butter", "oil", "fried", "fat"];
const VEGETABLE_WORDS: &[&str] = &["salad", "vegetable", "vegan", "veggie"];

/// Rough nutrition for a manual entry: meal-type baseline adjusted by
/// keywords found in the description.
pub fn estimate_nutrition(meal_type: &str, description: &str) -> NutritionalInfo {
    let base = estimate_base(&meal_type.to_lowercase());
    let text = description.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|word| text.contains(word));

    let mut info = NutritionalInfo {
        calories: base.calories,
        protein: base.protein,
        carbs: base.carbs,
        fat: base.fat,
        ..Default::default()
    };
    if mentions(PROTEIN_WORDS) {
        info.protein += 10.0;
        info.calories += 50.0;
    }
    if mentions(CARB_WORDS) {
        info.carbs += 15.0;
        info.calories += 70.0;
    }
    if mentions(FAT_WORDS) {
        info.fat += 8.0;
        info.calories += 90.0;
    }
    if mentions(VEGETABLE_WORDS) {
        info.calories -= 100.0;
        info.carbs -= 10.0;
        info.fat -= 5.0;
    }
    info
}

/// Meal type for a portal meal period ("Late+Night" becomes "late night").
pub fn meal_type_for_period(meal_period: &str) -> String {
    meal_period.to_lowercase().replace('+', " ")
}

pub struct MealHistory {
    store: Arc<dyn KeyValueStore>,
    entries: Mutex<Vec<MealHistoryEntry>>,
    events: broadcast::Sender<MealEvent>,
}

impl MealHistory {
    /// Load the saved log; unreadable data starts an empty one.
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let entries: Vec<MealHistoryEntry> = load_list(store.as_ref(), MEAL_HISTORY_KEY).await;
        info!("Loaded {} meal history entries", entries.len());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        MealHistory {
            store,
            entries: Mutex::new(entries),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MealEvent> {
        self.events.subscribe()
    }

    /// All entries, newest first.
    pub async fn entries(&self) -> Vec<MealHistoryEntry> {
        self.entries.lock().await.clone()
    }

    /// Entries whose date falls on `day` (UTC).
    pub async fn for_day(&self, day: NaiveDate) -> Vec<MealHistoryEntry> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|entry| entry.date.date_naive() == day)
            .cloned()
            .collect()
    }

    /// Log a menu item, using its scraped nutrition facts when available.
    pub async fn add_from_menu(
        &self,
        item: &MenuItem,
        dining_hall: &str,
        meal_period: &str,
        facts: Option<&NutritionFacts>,
    ) -> Result<MealHistoryEntry, DiningError> {
        let portion = if item.portion.is_empty() {
            "1 serving"
        } else {
            item.portion.as_str()
        };
        let mut entries = self.entries.lock().await;
        let entry = MealHistoryEntry {
            id: next_id(&entries),
            date: Utc::now(),
            meal_type: meal_type_for_period(meal_period),
            name: item.name.clone(),
            description: format!("From {dining_hall}, portion: {portion}"),
            dining_hall: dining_hall.to_string(),
            rating: 0,
            nutritional_info: facts.map(NutritionalInfo::from).unwrap_or_default(),
        };
        let mut next = entries.clone();
        next.insert(0, entry.clone());
        self.commit(&mut entries, next).await?;
        drop(entries);

        self.notify(MealEvent::Added(entry.clone()));
        Ok(entry)
    }

    pub async fn add_manual(&self, meal: ManualMeal) -> Result<MealHistoryEntry, DiningError> {
        let mut entries = self.entries.lock().await;
        let entry = manual_entry(next_id(&entries), meal);
        let mut next = entries.clone();
        next.insert(0, entry.clone());
        self.commit(&mut entries, next).await?;
        drop(entries);

        self.notify(MealEvent::Added(entry.clone()));
        Ok(entry)
    }

    /// Replace the entry with `id`, re-estimating its nutrition.
    /// Returns `None` when no such entry exists.
    pub async fn update(
        &self,
        id: &str,
        meal: ManualMeal,
    ) -> Result<Option<MealHistoryEntry>, DiningError> {
        let mut entries = self.entries.lock().await;
        let Some(index) = entries.iter().position(|entry| entry.id == id) else {
            return Ok(None);
        };
        let entry = manual_entry(id.to_string(), meal);
        let mut next = entries.clone();
        next[index] = entry.clone();
        self.commit(&mut entries, next).await?;
        drop(entries);

        self.notify(MealEvent::Updated(entry.clone()));
        Ok(Some(entry))
    }

    /// Remove the entry with `id`; returns whether it existed.
    pub async fn delete(&self, id: &str) -> Result<bool, DiningError> {
        let mut entries = self.entries.lock().await;
        if !entries.iter().any(|entry| entry.id == id) {
            return Ok(false);
        }
        let next: Vec<MealHistoryEntry> = entries
            .iter()
            .filter(|entry| entry.id != id)
            .cloned()
            .collect();
        self.commit(&mut entries, next).await?;
        drop(entries);

        self.notify(MealEvent::Deleted(id.to_string()));
        Ok(true)
    }

    /// Write `next` to the store, then make it the live log.
    /// A failed write leaves the live log untouched.
    async fn commit(
        &self,
        entries: &mut Vec<MealHistoryEntry>,
        next: Vec<MealHistoryEntry>,
    ) -> Result<(), DiningError> {
        save_list(self.store.as_ref(), MEAL_HISTORY_KEY, &next).await?;
        *entries = next;
        Ok(())
    }

    fn notify(&self, event: MealEvent) {
        // No subscribers is fine
        if self.events.send(event).is_err() {
            debug!("No meal event subscribers");
        }
    }
}

fn manual_entry(id: String, meal: ManualMeal) -> MealHistoryEntry {
    let nutritional_info = estimate_nutrition(&meal.meal_type, &meal.description);
    MealHistoryEntry {
        id,
        date: meal.date,
        meal_type: meal.meal_type,
        name: meal.name,
        description: meal.description,
        dining_hall: meal.dining_hall,
        rating: 0,
        nutritional_info,
    }
}

/// Millisecond timestamp id, bumped past any existing id.
fn next_id(entries: &[MealHistoryEntry]) -> String {
    let now = Utc::now().timestamp_millis();
    let newest = entries
        .iter()
        .filter_map(|entry| entry.id.parse::<i64>().ok())
        .max()
        .unwrap_or(0);
    now.max(newest + 1).to_string()
}
