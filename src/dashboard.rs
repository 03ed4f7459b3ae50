use crate::model::MealHistoryEntry;
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Today,
    #[default]
    Week,
    Month,
    All,
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "today" => Ok(TimeRange::Today),
            "week" => Ok(TimeRange::Week),
            "month" => Ok(TimeRange::Month),
            "all" => Ok(TimeRange::All),
            other => Err(format!("Unknown time range: {other}")),
        }
    }
}

impl TimeRange {
    pub fn includes(self, date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            TimeRange::Today => date.date_naive() == now.date_naive(),
            TimeRange::Week => date >= now - Duration::days(7),
            TimeRange::Month => now
                .checked_sub_months(Months::new(1))
                .map_or(true, |month_ago| date >= month_ago),
            TimeRange::All => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionSummary {
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    pub total_saturated_fat: f64,
    pub total_sodium: f64,
    pub total_sugars: f64,
    pub total_fiber: f64,
    pub total_cholesterol: f64,
    pub meal_count: usize,
    pub average_rating: f64,
    pub dining_hall_frequency: IndexMap<String, usize>,
    pub meal_type_frequency: IndexMap<String, usize>,
}

/// Macro totals for one calendar day, labelled by weekday.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotals {
    pub day: &'static str,
    pub date: NaiveDate,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub summary: NutritionSummary,
    pub daily: Vec<DailyTotals>,
}

pub fn summarize(meals: &[&MealHistoryEntry]) -> NutritionSummary {
    let mut summary = NutritionSummary {
        meal_count: meals.len(),
        ..Default::default()
    };
    let mut total_rating = 0.0;

    for meal in meals {
        let info = &meal.nutritional_info;
        summary.total_calories += info.calories;
        summary.total_protein += info.protein;
        summary.total_carbs += info.carbs;
        summary.total_fat += info.fat;
        summary.total_saturated_fat += info.saturated_fat;
        summary.total_sodium += info.sodium;
        summary.total_sugars += info.sugars;
        summary.total_fiber += info.dietary_fiber;
        summary.total_cholesterol += info.cholesterol;
        total_rating += f64::from(meal.rating);

        if !meal.dining_hall.is_empty() {
            *summary
                .dining_hall_frequency
                .entry(meal.dining_hall.clone())
                .or_default() += 1;
        }
        if !meal.meal_type.is_empty() {
            *summary
                .meal_type_frequency
                .entry(meal.meal_type.clone())
                .or_default() += 1;
        }
    }

    if !meals.is_empty() {
        summary.average_rating = total_rating / meals.len() as f64;
    }
    summary
}

/// Per-day totals, ordered Sun → Sat.
pub fn daily_totals(meals: &[&MealHistoryEntry]) -> Vec<DailyTotals> {
    let mut by_date: IndexMap<NaiveDate, DailyTotals> = IndexMap::new();
    for meal in meals {
        let date = meal.date.date_naive();
        let day = by_date.entry(date).or_insert_with(|| DailyTotals {
            day: WEEKDAYS[date.weekday().num_days_from_sunday() as usize],
            date,
            calories: 0.0,
            protein: 0.0,
            carbs: 0.0,
            fat: 0.0,
        });
        day.calories += meal.nutritional_info.calories;
        day.protein += meal.nutritional_info.protein;
        day.carbs += meal.nutritional_info.carbs;
        day.fat += meal.nutritional_info.fat;
    }

    let mut daily: Vec<DailyTotals> = by_date.into_values().collect();
    daily.sort_by_key(|totals| (totals.date.weekday().num_days_from_sunday(), totals.date));
    daily
}

/// Dashboard for the meals inside `range` as of `now`.
pub fn build_dashboard(
    meals: &[MealHistoryEntry],
    range: TimeRange,
    now: DateTime<Utc>,
) -> Dashboard {
    let selected: Vec<&MealHistoryEntry> = meals
        .iter()
        .filter(|meal| range.includes(meal.date, now))
        .collect();

    Dashboard {
        summary: summarize(&selected),
        daily: daily_totals(&selected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NutritionalInfo;
    use chrono::TimeZone;

    fn meal(day: u32, hall: &str, meal_type: &str, calories: f64, rating: u8) -> MealHistoryEntry {
        MealHistoryEntry {
            id: format!("{day}-{meal_type}"),
            date: Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0).unwrap(),
            meal_type: meal_type.to_string(),
            name: "Meal".to_string(),
            description: String::new(),
            dining_hall: hall.to_string(),
            rating,
            nutritional_info: NutritionalInfo {
                calories,
                protein: 10.0,
                sodium: 100.0,
                ..Default::default()
            },
        }
    }

    fn now() -> DateTime<Utc> {
        // Friday
        Utc.with_ymd_and_hms(2025, 3, 14, 18, 0, 0).unwrap()
    }

    #[test]
    fn test_time_range_from_str() {
        assert_eq!("Today".parse::<TimeRange>(), Ok(TimeRange::Today));
        assert_eq!("all".parse::<TimeRange>(), Ok(TimeRange::All));
        assert!("year".parse::<TimeRange>().is_err());
    }

    #[test]
    fn test_summary_totals_and_frequencies() {
        let meals = vec![
            meal(14, "Busch Dining Hall", "lunch", 500.0, 4),
            meal(13, "Busch Dining Hall", "dinner", 700.0, 0),
            meal(12, "The Atrium", "lunch", 300.0, 2),
        ];
        let dashboard = build_dashboard(&meals, TimeRange::Week, now());
        let summary = &dashboard.summary;

        assert_eq!(summary.meal_count, 3);
        assert_eq!(summary.total_calories, 1500.0);
        assert_eq!(summary.total_protein, 30.0);
        assert_eq!(summary.total_sodium, 300.0);
        assert_eq!(summary.average_rating, 2.0);
        assert_eq!(summary.dining_hall_frequency["Busch Dining Hall"], 2);
        assert_eq!(summary.meal_type_frequency["lunch"], 2);
    }

    #[test]
    fn test_ranges_filter_meals() {
        let meals = vec![
            meal(14, "Busch Dining Hall", "lunch", 500.0, 0),
            meal(10, "Busch Dining Hall", "lunch", 500.0, 0),
            meal(1, "Busch Dining Hall", "lunch", 500.0, 0),
        ];
        let count = |range| build_dashboard(&meals, range, now()).summary.meal_count;
        assert_eq!(count(TimeRange::Today), 1);
        assert_eq!(count(TimeRange::Week), 2);
        assert_eq!(count(TimeRange::Month), 3);
        assert_eq!(count(TimeRange::All), 3);
    }

    #[test]
    fn test_empty_dashboard() {
        let dashboard = build_dashboard(&[], TimeRange::All, now());
        assert_eq!(dashboard.summary.meal_count, 0);
        assert_eq!(dashboard.summary.average_rating, 0.0);
        assert!(dashboard.daily.is_empty());
    }

    #[test]
    fn test_daily_totals_sorted_by_weekday() {
        let meals = vec![
            meal(14, "Busch Dining Hall", "lunch", 500.0, 0), // Fri
            meal(14, "Busch Dining Hall", "dinner", 600.0, 0),
            meal(9, "Busch Dining Hall", "lunch", 400.0, 0), // Sun
            meal(11, "Busch Dining Hall", "lunch", 300.0, 0), // Tue
        ];
        let daily = build_dashboard(&meals, TimeRange::All, now()).daily;

        let days: Vec<&str> = daily.iter().map(|d| d.day).collect();
        assert_eq!(days, vec!["Sun", "Tue", "Fri"]);
        assert_eq!(daily[2].calories, 1100.0);
        assert_eq!(daily[2].protein, 20.0);
    }
}
