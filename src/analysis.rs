use crate::error::DiningError;
use crate::providers::{GenerationRequest, LlmProvider};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Nutrition estimate for a free-text meal description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealAnalysis {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    /// 1 to 10, higher is healthier
    pub health_score: u8,
    pub recommendations: Vec<String>,
}

pub fn analysis_prompt(meal_description: &str) -> String {
    format!(
        "Analyze the following meal and provide nutritional information:\n\n\
         \"{meal_description}\"\n\n\
         Provide a reasonable estimate of:\n\
         1. Calories\n\
         2. Protein (grams)\n\
         3. Carbohydrates (grams)\n\
         4. Fat (grams)\n\
         5. Health score (1-10, where 10 is extremely healthy)\n\
         6. A list of 2-3 recommendations to improve the nutritional value of this meal\n\n\
         If the meal description is vague, make educated assumptions based on typical dining hall portions.\n\n\
         Respond with a JSON object with the keys \"calories\", \"protein\", \"carbs\", \"fat\" (numbers), \
         \"healthScore\" (integer from 1 to 10) and \"recommendations\" (array of strings)."
    )
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

fn number_field(object: &Value, field: &str) -> Result<f64, DiningError> {
    object[field]
        .as_f64()
        .ok_or_else(|| DiningError::InvalidAnalysis(format!("{field} must be a number")))
}

/// Validate a model answer against the analysis schema.
pub fn parse_analysis(text: &str) -> Result<MealAnalysis, DiningError> {
    let object: Value = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| DiningError::InvalidAnalysis(format!("not valid JSON: {e}")))?;
    if !object.is_object() {
        return Err(DiningError::InvalidAnalysis("expected a JSON object".to_string()));
    }

    let score = match &object["healthScore"] {
        Value::Null => {
            return Err(DiningError::InvalidAnalysis("healthScore is missing".to_string()))
        }
        value => value
            .as_f64()
            .ok_or_else(|| DiningError::InvalidAnalysis("healthScore must be a number".to_string()))?,
    };
    if score.fract() != 0.0 || !(1.0..=10.0).contains(&score) {
        return Err(DiningError::InvalidAnalysis(format!(
            "healthScore {score} is not an integer between 1 and 10"
        )));
    }

    let recommendations = object["recommendations"]
        .as_array()
        .ok_or_else(|| DiningError::InvalidAnalysis("recommendations must be a list".to_string()))?
        .iter()
        .map(|r| {
            r.as_str().map(str::to_string).ok_or_else(|| {
                DiningError::InvalidAnalysis("recommendations must be strings".to_string())
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MealAnalysis {
        calories: number_field(&object, "calories")?,
        protein: number_field(&object, "protein")?,
        carbs: number_field(&object, "carbs")?,
        fat: number_field(&object, "fat")?,
        health_score: score as u8,
        recommendations,
    })
}

/// Ask the provider for a JSON analysis of `meal_description` and validate it.
pub async fn analyze_meal(
    provider: &dyn LlmProvider,
    meal_description: &str,
) -> Result<MealAnalysis, DiningError> {
    if meal_description.trim().is_empty() {
        return Err(DiningError::MissingInput("Meal description"));
    }

    let request = GenerationRequest::prompt(analysis_prompt(meal_description)).json();
    let text = provider.generate(&request).await?;
    debug!("Meal analysis response: {}", text);

    parse_analysis(&text).inspect_err(|e| error!("Error in meal analysis: {}", e))
}
