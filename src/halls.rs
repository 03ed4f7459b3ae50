use crate::error::DiningError;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// Menu page of the upstream FoodPro portal.
pub const MENU_PORTAL_URL: &str =
    "https://menuportal23.dining.rutgers.edu/foodpronet/pickmenu.aspx";

/// Relative nutrition links found on menu pages resolve against this path.
pub const NUTRITION_BASE_URL: &str = "https://menuportal23.dining.rutgers.edu/foodpronet/";

const SCHOOL_NAME: &str = "Rutgers+University+Dining";

/// Static description of one dining hall's menu feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiningHallConfig {
    pub name: String,
    pub base_url: String,
    pub location_num: String,
    /// Already URL-encoded ("Busch+Dining+Hall")
    pub location_name: String,
    pub meal_periods: Vec<String>,
}

impl DiningHallConfig {
    fn new(name: &str, location_num: &str, meal_periods: &[&str]) -> Self {
        DiningHallConfig {
            name: name.to_string(),
            base_url: MENU_PORTAL_URL.to_string(),
            location_num: location_num.to_string(),
            location_name: name.replace(' ', "+"),
            meal_periods: meal_periods.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn has_meal_period(&self, meal_period: &str) -> bool {
        self.meal_periods.iter().any(|p| p == meal_period)
    }
}

/// Lookup table from hall name to its feed configuration.
#[derive(Debug, Clone)]
pub struct DiningHallRegistry {
    halls: Vec<DiningHallConfig>,
}

impl Default for DiningHallRegistry {
    fn default() -> Self {
        Self::rutgers()
    }
}

impl DiningHallRegistry {
    pub fn new(halls: Vec<DiningHallConfig>) -> Self {
        DiningHallRegistry { halls }
    }

    /// The four New Brunswick halls served by the FoodPro portal.
    pub fn rutgers() -> Self {
        let standard = ["Breakfast", "Lunch", "Dinner", "Knight+Room"];
        DiningHallRegistry::new(vec![
            DiningHallConfig::new("Busch Dining Hall", "04", &standard),
            DiningHallConfig::new("Livingston Dining Commons", "03", &standard),
            DiningHallConfig::new(
                "The Atrium",
                "13",
                &["Breakfast", "Lunch", "Dinner", "Late+Night"],
            ),
            DiningHallConfig::new("Neilson Dining Hall", "05", &standard),
        ])
    }

    /// Point every hall at another menu page, e.g. a mirror or a test server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        for hall in &mut self.halls {
            hall.base_url = base_url.clone();
        }
        self
    }

    pub fn halls(&self) -> &[DiningHallConfig] {
        &self.halls
    }

    pub fn get(&self, name: &str) -> Option<&DiningHallConfig> {
        self.halls.iter().find(|hall| hall.name == name)
    }

    pub fn lookup(&self, name: &str) -> Result<&DiningHallConfig, DiningError> {
        self.get(name)
            .ok_or_else(|| DiningError::UnknownDiningHall(name.to_string()))
    }

    /// Build the menu page URL for a hall, date and meal period.
    ///
    /// `date` and `meal_period` are embedded verbatim; only the hall name is
    /// checked.
    pub fn menu_url(
        &self,
        dining_hall: &str,
        date: &str,
        meal_period: &str,
    ) -> Result<String, DiningError> {
        let hall = self.lookup(dining_hall)?;
        Ok(format!(
            "{}?locationNum={}&locationName={}&dtdate={}&activeMeal={}&sName={}",
            hall.base_url, hall.location_num, hall.location_name, date, meal_period, SCHOOL_NAME
        ))
    }
}

/// Format a date the way the portal expects it (M/D/YYYY, no padding).
pub fn portal_date(date: NaiveDate) -> String {
    format!("{}/{}/{}", date.month(), date.day(), date.year())
}
