pub mod analysis;
pub mod calculator;
pub mod chat;
pub mod config;
pub mod dashboard;
pub mod enrich;
pub mod error;
pub mod extractors;
pub mod format;
pub mod halls;
pub mod history;
pub mod model;
pub mod plan;
pub mod portal;
pub mod providers;
pub mod server;
pub mod sessions;
pub mod store;
pub mod summary;

pub use config::AppConfig;
pub use error::DiningError;
pub use format::{format_response, DisplayNode};
pub use model::{MenuData, MenuItem, NutritionFacts};
pub use portal::MenuPortal;

use crate::halls::DiningHallRegistry;

/// Fetch one menu from the live portal with default settings.
pub async fn fetch_menu(
    dining_hall: &str,
    date: &str,
    meal_period: &str,
) -> Result<MenuData, DiningError> {
    MenuPortal::new(DiningHallRegistry::rutgers(), None)?
        .fetch_menu(dining_hall, date, meal_period)
        .await
}

/// Fetch one item's nutrition facts from the live portal with default settings.
pub async fn fetch_nutrition(nutrition_link: &str) -> Result<NutritionFacts, DiningError> {
    MenuPortal::new(DiningHallRegistry::rutgers(), None)?
        .fetch_nutrition(nutrition_link)
        .await
}
