//! Daily energy and macro targets from body measurements.

use crate::error::DiningError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::LazyLock;

static FEET_INCHES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(\d+)'(\d+)"?"#).unwrap());
static LEADING_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-+]?(\d+\.?\d*|\.\d+)").unwrap());

const CM_PER_FOOT: f64 = 30.48;
const CM_PER_INCH: f64 = 2.54;
const KG_PER_POUND: f64 = 0.453592;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl FromStr for Sex {
    type Err = DiningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "male" | "m" => Ok(Sex::Male),
            "female" | "f" => Ok(Sex::Female),
            other => Err(DiningError::InvalidInput(format!("Unknown sex: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    #[default]
    Moderate,
    Active,
    VeryActive,
}

impl ActivityLevel {
    pub fn multiplier(self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::Light => 1.375,
            ActivityLevel::Moderate => 1.55,
            ActivityLevel::Active => 1.725,
            ActivityLevel::VeryActive => 1.9,
        }
    }
}

impl FromStr for ActivityLevel {
    type Err = DiningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "sedentary" => Ok(ActivityLevel::Sedentary),
            "light" => Ok(ActivityLevel::Light),
            "moderate" => Ok(ActivityLevel::Moderate),
            "active" => Ok(ActivityLevel::Active),
            "veryactive" => Ok(ActivityLevel::VeryActive),
            other => Err(DiningError::InvalidInput(format!("Unknown activity level: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyProfile {
    pub age: u32,
    pub sex: Sex,
    /// Free text: `5'10"`, `178cm`, `5.9` (feet) or `178`
    pub height: String,
    /// Free text: `170 lbs`, `77kg`, `170` (pounds) or `77`
    pub weight: String,
    #[serde(default)]
    pub activity_level: ActivityLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GoalCalories {
    pub lose: f64,
    pub maintain: f64,
    pub gain: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionTargets {
    pub bmr: f64,
    pub tdee: f64,
    pub protein: Range,
    pub carbs: Range,
    pub fat: Range,
    pub goal_calories: GoalCalories,
}

fn leading_number(text: &str) -> Option<f64> {
    LEADING_NUMBER_RE
        .find(text)
        .and_then(|m| m.as_str().trim().parse().ok())
}

/// Height in centimetres; 0 when nothing parses.
pub fn parse_height(height: &str) -> f64 {
    if let Some(caps) = FEET_INCHES_RE.captures(height) {
        let feet: f64 = caps[1].parse().unwrap_or(0.0);
        let inches: f64 = caps[2].parse().unwrap_or(0.0);
        return feet * CM_PER_FOOT + inches * CM_PER_INCH;
    }

    let lower = height.to_lowercase();
    if lower.contains("cm") {
        return leading_number(&lower.replace("cm", "")).unwrap_or(0.0);
    }

    match leading_number(height) {
        Some(value) if value < 10.0 => value * CM_PER_FOOT,
        Some(value) => value,
        None => 0.0,
    }
}

/// Weight in kilograms; 0 when nothing parses.
pub fn parse_weight(weight: &str) -> f64 {
    let lower = weight.to_lowercase();
    if lower.contains("lb") {
        return leading_number(&lower).unwrap_or(0.0) * KG_PER_POUND;
    }
    if lower.contains("kg") {
        return leading_number(&lower).unwrap_or(0.0);
    }

    match leading_number(weight) {
        Some(value) if value > 90.0 => value * KG_PER_POUND,
        Some(value) => value,
        None => 0.0,
    }
}

/// Mifflin-St Jeor basal metabolic rate.
pub fn bmr(age: u32, sex: Sex, height_cm: f64, weight_kg: f64) -> f64 {
    let base = 10.0 * weight_kg + 6.25 * height_cm - 5.0 * f64::from(age);
    match sex {
        Sex::Male => base + 5.0,
        Sex::Female => base - 161.0,
    }
}

pub fn macro_ranges(tdee: f64, weight_kg: f64) -> (Range, Range, Range) {
    let protein = Range {
        min: (weight_kg * 1.6).round(),
        max: (weight_kg * 2.2).round(),
    };
    let fat = Range {
        min: (tdee * 0.2 / 9.0).round(),
        max: (tdee * 0.35 / 9.0).round(),
    };

    let protein_calories = (protein.min + protein.max) / 2.0 * 4.0;
    let fat_calories = (fat.min + fat.max) / 2.0 * 9.0;
    let remaining = tdee - protein_calories - fat_calories;
    let carbs = Range {
        min: (remaining * 0.8 / 4.0).round(),
        max: (remaining * 1.2 / 4.0).round(),
    };
    (protein, carbs, fat)
}

pub fn calculate_targets(profile: &BodyProfile) -> Result<NutritionTargets, DiningError> {
    if !(15..=80).contains(&profile.age) {
        return Err(DiningError::InvalidInput(
            "Age must be between 15 and 80".to_string(),
        ));
    }
    if profile.height.trim().is_empty() {
        return Err(DiningError::MissingInput("Height"));
    }
    if profile.weight.trim().is_empty() {
        return Err(DiningError::MissingInput("Weight"));
    }

    let height_cm = parse_height(&profile.height);
    let weight_kg = parse_weight(&profile.weight);
    let bmr = bmr(profile.age, profile.sex, height_cm, weight_kg).round();
    let tdee = (bmr * profile.activity_level.multiplier()).round();
    let (protein, carbs, fat) = macro_ranges(tdee, weight_kg);

    Ok(NutritionTargets {
        bmr,
        tdee,
        protein,
        carbs,
        fat,
        goal_calories: GoalCalories {
            lose: (tdee * 0.8).round(),
            maintain: tdee,
            gain: (tdee * 1.15).round(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(actual: f64, expected: f64) -> bool {
        (actual - expected).abs() < 0.01
    }

    #[test]
    fn test_parse_height() {
        assert!(close(parse_height("5'10\""), 177.8));
        assert!(close(parse_height("5'10"), 177.8));
        assert!(close(parse_height("180cm"), 180.0));
        assert!(close(parse_height("180 CM"), 180.0));
        assert!(close(parse_height("6"), 182.88));
        assert!(close(parse_height("172"), 172.0));
        assert_eq!(parse_height("tall"), 0.0);
    }

    #[test]
    fn test_parse_weight() {
        assert!(close(parse_weight("170 lbs"), 77.11064));
        assert!(close(parse_weight("170lb"), 77.11064));
        assert!(close(parse_weight("70kg"), 70.0));
        assert!(close(parse_weight("170"), 77.11064));
        assert!(close(parse_weight("80"), 80.0));
        assert_eq!(parse_weight("heavy"), 0.0);
    }

    #[test]
    fn test_activity_level_from_str() {
        assert_eq!("veryActive".parse::<ActivityLevel>().unwrap(), ActivityLevel::VeryActive);
        assert_eq!("very-active".parse::<ActivityLevel>().unwrap(), ActivityLevel::VeryActive);
        assert!("couch".parse::<ActivityLevel>().is_err());
    }

    #[test]
    fn test_calculate_targets() {
        let profile = BodyProfile {
            age: 20,
            sex: Sex::Male,
            height: "5'10\"".to_string(),
            weight: "170 lbs".to_string(),
            activity_level: ActivityLevel::Moderate,
        };
        let targets = calculate_targets(&profile).unwrap();

        assert_eq!(targets.bmr, 1787.0);
        assert_eq!(targets.tdee, 2770.0);
        assert_eq!(targets.protein, Range { min: 123.0, max: 170.0 });
        assert_eq!(targets.fat, Range { min: 62.0, max: 108.0 });
        assert_eq!(targets.carbs, Range { min: 284.0, max: 426.0 });
        assert_eq!(targets.goal_calories.lose, 2216.0);
        assert_eq!(targets.goal_calories.maintain, 2770.0);
        assert!((targets.goal_calories.gain - 3185.5).abs() <= 0.5);
    }

    #[test]
    fn test_female_sedentary() {
        let profile = BodyProfile {
            age: 30,
            sex: Sex::Female,
            height: "165cm".to_string(),
            weight: "60kg".to_string(),
            activity_level: ActivityLevel::Sedentary,
        };
        let targets = calculate_targets(&profile).unwrap();
        assert_eq!(targets.bmr, 1320.0);
        assert_eq!(targets.tdee, 1584.0);
    }

    #[test]
    fn test_validation() {
        let mut profile = BodyProfile {
            age: 12,
            sex: Sex::Male,
            height: "180cm".to_string(),
            weight: "80kg".to_string(),
            activity_level: ActivityLevel::default(),
        };
        assert!(matches!(calculate_targets(&profile), Err(DiningError::InvalidInput(_))));

        profile.age = 25;
        profile.weight = " ".to_string();
        assert!(matches!(calculate_targets(&profile), Err(DiningError::MissingInput("Weight"))));
    }
}
