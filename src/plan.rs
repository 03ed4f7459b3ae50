//! Daily meal plans, generated by the LLM or simulated when it is unavailable.

use crate::error::DiningError;
use crate::portal::MenuPortal;
use crate::providers::{GenerationRequest, LlmProvider};
use crate::summary::menu_summary;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const PLAN_MAX_TOKENS: u32 = 1000;
const PLAN_TEMPERATURE: f32 = 0.7;
const DEFAULT_CALORIES: f64 = 2000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goal {
    Lose,
    Maintain,
    Gain,
    Muscle,
}

impl Goal {
    /// Unrecognised goals are treated as maintenance.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "lose" => Goal::Lose,
            "gain" => Goal::Gain,
            "muscle" => Goal::Muscle,
            _ => Goal::Maintain,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Goal::Lose => "Lose weight",
            Goal::Maintain => "Maintain weight",
            Goal::Gain => "Gain weight",
            Goal::Muscle => "Gain muscle (with exercise)",
        }
    }

    /// (calorie multiplier, protein multiplier)
    fn multipliers(self) -> (f64, f64) {
        match self {
            Goal::Lose => (0.8, 1.2),
            Goal::Maintain => (1.0, 1.0),
            Goal::Gain => (1.2, 1.0),
            Goal::Muscle => (1.1, 1.5),
        }
    }
}

/// Preferences submitted from the planner form. Free-text fields may be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MealPlanRequest {
    pub dietary_restrictions: String,
    pub calorie_limit: String,
    pub avoid_foods: String,
    pub maintenance_calories: String,
    pub goal: String,
    pub height: String,
    pub weight: String,
    pub selected_dining_hall: Option<String>,
    pub selected_meal_period: Option<String>,
}

impl MealPlanRequest {
    pub fn goal(&self) -> Goal {
        Goal::from_label(&self.goal)
    }

    fn preference_lines(&self) -> Vec<String> {
        let mut lines = vec![if self.dietary_restrictions.is_empty() {
            "- No dietary restrictions".to_string()
        } else {
            format!("- Dietary restrictions: {}", self.dietary_restrictions)
        }];
        if !self.calorie_limit.is_empty() {
            lines.push(format!("- Calorie limit: {} calories per day", self.calorie_limit));
        }
        lines.push(if self.avoid_foods.is_empty() {
            "- No specific foods to avoid".to_string()
        } else {
            format!("- Foods to avoid: {}", self.avoid_foods)
        });
        if !self.maintenance_calories.is_empty() {
            lines.push(format!("- Maintenance calories: {}", self.maintenance_calories));
        }
        lines.push(format!("- Goal: {}", self.goal().description()));
        if !self.height.is_empty() {
            lines.push(format!("- Height: {}", self.height));
        }
        if !self.weight.is_empty() {
            lines.push(format!("- Weight: {}", self.weight));
        }
        lines
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlan {
    pub success: bool,
    pub meal_plan: String,
    /// True when the plan came from [`simulated_meal_plan`]
    pub simulated: bool,
}

/// Prompt asking for a plan; with a menu summary the plan must use only its items.
pub fn meal_plan_prompt(request: &MealPlanRequest, menu_summary: Option<&str>) -> String {
    let mut prompt = String::from(
        "Create a personalized meal plan for a Rutgers University student with the following preferences:\n\n",
    );
    prompt.push_str(&request.preference_lines().join("\n"));
    prompt.push_str("\n\n");

    match menu_summary {
        Some(summary) => {
            let hall = request.selected_dining_hall.as_deref().unwrap_or("the dining hall");
            prompt.push_str(&format!(
                "Based on the current menu available at {hall}:\n\n{summary}\n\nCreate a meal plan using ONLY items from this menu. For each meal:\n"
            ));
            prompt.push_str("1. Provide the name of the meal\n");
            prompt.push_str("2. Include estimated calories and macronutrients (protein, carbs, fat) for EACH food item\n");
            prompt.push_str("3. Include a total nutrition count for each meal\n");
        }
        None => {
            prompt.push_str("Create a full day meal plan with breakfast, lunch, dinner, and a snack. For each meal:\n");
            prompt.push_str("1. Specify which Rutgers dining hall to visit (The Atrium, Livingston Dining Hall, Busch Dining Hall, or Neilson Dining Hall)\n");
            prompt.push_str("2. Provide the name of the meal\n");
            prompt.push_str("3. Include estimated calories and macronutrients (protein, carbs, fat) for EACH food item\n");
            prompt.push_str("4. Include a total nutrition count for each meal\n");
        }
    }

    prompt.push_str("\nFormat the response as a markdown document with sections for each meal.\n");
    prompt.push_str("For each food item, use the format \"**[Food Item]** (Calories: X, Protein: Xg, Carbs: Xg, Fat: Xg)\" on its own line.\n");
    prompt
}

/// Leading integer of a form value ("1800 kcal" → 1800), like a lenient parseInt.
fn leading_int(value: &str) -> Option<i64> {
    let value = value.trim();
    let sign_len = usize::from(value.starts_with(['-', '+']));
    let digits = value[sign_len..]
        .chars()
        .take_while(char::is_ascii_digit)
        .count();
    value[..sign_len + digits].parse().ok()
}

fn non_zero(value: &str) -> Option<f64> {
    leading_int(value).filter(|n| *n != 0).map(|n| n as f64)
}

/// Daily calorie target used by the simulated plan.
pub fn base_calories(request: &MealPlanRequest) -> f64 {
    let (calorie_multiplier, _) = request.goal().multipliers();
    if !request.calorie_limit.is_empty() {
        non_zero(&request.calorie_limit).unwrap_or(DEFAULT_CALORIES)
    } else if !request.maintenance_calories.is_empty() {
        non_zero(&request.maintenance_calories).unwrap_or(DEFAULT_CALORIES) * calorie_multiplier
    } else {
        DEFAULT_CALORIES
    }
}

#[derive(Debug, Clone, PartialEq)]
struct SimulatedMeal {
    heading: &'static str,
    name: &'static str,
    location: String,
    items: &'static [&'static str],
    calories: i64,
    protein: i64,
    carbs: i64,
    fat: i64,
}

fn simulated_meals(request: &MealPlanRequest) -> Vec<SimulatedMeal> {
    let base = base_calories(request);
    let (_, protein_multiplier) = request.goal().multipliers();
    let restrictions = request.dietary_restrictions.to_lowercase();
    let vegan = restrictions.contains("vegan");
    let vegetarian = restrictions.contains("vegetarian");
    let pick = |vegan_name, vegetarian_name, default_name| {
        if vegan {
            vegan_name
        } else if vegetarian {
            vegetarian_name
        } else {
            default_name
        }
    };

    let meal = |heading, name, default_hall: &str, share: f64, items| {
        let calories = base * share;
        SimulatedMeal {
            heading,
            name,
            location: request
                .selected_dining_hall
                .clone()
                .unwrap_or_else(|| default_hall.to_string()),
            items,
            calories: calories.round() as i64,
            protein: (calories / 16.0 * protein_multiplier).round() as i64,
            carbs: (calories / 4.0 * 0.5).round() as i64,
            fat: (calories / 9.0 * 0.3).round() as i64,
        }
    };

    vec![
        meal(
            "Breakfast",
            pick(
                "Tofu Scramble with Vegetables",
                "Vegetable Omelette with Cheese",
                "Scrambled Eggs with Turkey Bacon",
            ),
            "The Atrium",
            0.25,
            &[
                "**Eggs** (Calories: 120, Protein: 12g, Carbs: 1g, Fat: 8g)",
                "**Toast** (Calories: 80, Protein: 3g, Carbs: 15g, Fat: 1g)",
                "**Fruit** (Calories: 60, Protein: 1g, Carbs: 15g, Fat: 0g)",
            ],
        ),
        meal(
            "Lunch",
            pick(
                "Quinoa Bowl with Roasted Vegetables",
                "Mediterranean Salad with Feta",
                "Grilled Chicken Wrap with Sweet Potato Fries",
            ),
            "Livingston Dining Hall",
            0.3,
            &[
                "**Grilled Chicken** (Calories: 180, Protein: 30g, Carbs: 0g, Fat: 6g)",
                "**Whole Wheat Wrap** (Calories: 120, Protein: 4g, Carbs: 20g, Fat: 3g)",
                "**Sweet Potato Fries** (Calories: 150, Protein: 2g, Carbs: 30g, Fat: 5g)",
            ],
        ),
        meal(
            "Dinner",
            pick(
                "Vegetable Stir Fry with Tofu",
                "Eggplant Parmesan with Pasta",
                "Grilled Salmon with Roasted Vegetables",
            ),
            "Busch Dining Hall",
            0.35,
            &[
                "**Salmon Fillet** (Calories: 220, Protein: 25g, Carbs: 0g, Fat: 12g)",
                "**Brown Rice** (Calories: 150, Protein: 3g, Carbs: 32g, Fat: 1g)",
                "**Roasted Vegetables** (Calories: 100, Protein: 2g, Carbs: 20g, Fat: 2g)",
            ],
        ),
        meal(
            "Snack",
            pick(
                "Fresh Fruit with Almond Butter",
                "Greek Yogurt with Honey and Berries",
                "Protein Shake with Banana",
            ),
            "Neilson Dining Hall",
            0.1,
            &[
                "**Protein Shake** (Calories: 120, Protein: 20g, Carbs: 5g, Fat: 2g)",
                "**Banana** (Calories: 105, Protein: 1g, Carbs: 27g, Fat: 0g)",
            ],
        ),
    ]
}

/// Deterministic markdown plan built from the request alone.
pub fn simulated_meal_plan(request: &MealPlanRequest) -> String {
    let meals = simulated_meals(request);
    let mut plan = String::from("# Personalized Meal Plan\n\nBased on your preferences:\n");
    plan.push_str(&request.preference_lines().join("\n"));
    plan.push('\n');

    for meal in &meals {
        plan.push_str(&format!("\n## {}\n{} ({})\n", meal.heading, meal.name, meal.location));
        for item in meal.items {
            plan.push_str(&format!("- {item}\n"));
        }
        plan.push_str(&format!(
            "\nTotal: Calories: {}, Protein: {}g, Carbs: {}g, Fat: {}g\n",
            meal.calories, meal.protein, meal.carbs, meal.fat
        ));
    }

    let sum = |f: fn(&SimulatedMeal) -> i64| meals.iter().map(f).sum::<i64>();
    plan.push_str(&format!(
        "\n### Daily Totals\n- Total Calories: {}\n- Total Protein: {}g\n- Total Carbs: {}g\n- Total Fat: {}g\n",
        sum(|m| m.calories),
        sum(|m| m.protein),
        sum(|m| m.carbs),
        sum(|m| m.fat)
    ));
    plan
}

pub struct MealPlanner {
    provider: Arc<dyn LlmProvider>,
}

impl MealPlanner {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        MealPlanner { provider }
    }

    /// Ask the LLM for a plan, falling back to [`simulated_meal_plan`].
    pub async fn generate(&self, request: &MealPlanRequest, menu_summary: Option<&str>) -> MealPlan {
        let prompt = meal_plan_prompt(request, menu_summary);
        let generation = GenerationRequest::prompt(prompt)
            .with_max_tokens(PLAN_MAX_TOKENS)
            .with_temperature(PLAN_TEMPERATURE);

        match self.provider.generate(&generation).await {
            Ok(text) if !text.trim().is_empty() => MealPlan {
                success: true,
                meal_plan: text,
                simulated: false,
            },
            Ok(_) => {
                warn!("Meal plan generation returned no text, using simulated plan");
                self.simulated(request)
            }
            Err(e) => {
                error!("Error generating meal plan: {}", e);
                self.simulated(request)
            }
        }
    }

    fn simulated(&self, request: &MealPlanRequest) -> MealPlan {
        MealPlan {
            success: true,
            meal_plan: simulated_meal_plan(request),
            simulated: true,
        }
    }
}

/// Summary of today's menu for the hall and period selected in `request`,
/// if both are set and the menu can be fetched.
pub async fn selected_menu_summary(
    portal: &MenuPortal,
    request: &MealPlanRequest,
    date: &str,
) -> Option<String> {
    let hall = request.selected_dining_hall.as_deref().filter(|h| !h.is_empty())?;
    let period = request.selected_meal_period.as_deref().filter(|p| !p.is_empty())?;

    let menu: Result<_, DiningError> = portal.fetch_menu(hall, date, period).await;
    match menu {
        Ok(menu) => {
            let summary = menu_summary(&menu);
            info!("Menu summary created ({} characters)", summary.len());
            Some(summary)
        }
        Err(e) => {
            error!("Error fetching menu data: {}", e);
            None
        }
    }
}
