use crate::extractors::{clean_text, Extractor, ParsingContext};
use crate::model::NutritionFacts;
use html_escape::decode_html_entities;
use indexmap::IndexMap;
use log::debug;
use regex::Regex;
use std::sync::LazyLock;

static TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Ordered patterns for one field. The first pattern whose capture is
/// non-empty after cleaning wins; otherwise `default` is used.
struct Probe {
    patterns: Vec<Regex>,
    default: &'static str,
}

impl Probe {
    fn new(patterns: &[&str], default: &'static str) -> Self {
        let patterns = patterns
            .iter()
            .map(|pattern| Regex::new(&format!("(?is){pattern}")).unwrap())
            .collect();
        Probe { patterns, default }
    }

    fn find(&self, html: &str) -> Option<String> {
        self.patterns.iter().find_map(|pattern| {
            let captured = pattern.captures(html)?.get(1)?.as_str();
            let value = clean_fragment(captured);
            (!value.is_empty()).then_some(value)
        })
    }

    fn extract(&self, html: &str) -> String {
        self.find(html).unwrap_or_else(|| self.default.to_string())
    }
}

struct Probes {
    item_name: Probe,
    serving_size: Probe,
    calories: Probe,
    total_fat: Probe,
    saturated_fat: Probe,
    trans_fat: Probe,
    cholesterol: Probe,
    sodium: Probe,
    total_carbs: Probe,
    dietary_fiber: Probe,
    sugars: Probe,
    protein: Probe,
    ingredients: Probe,
    allergens: Probe,
    /// Display name and label pattern for each daily-value percentage
    daily_values: Vec<(&'static str, Probe)>,
}

static PROBES: LazyLock<Probes> = LazyLock::new(|| Probes {
    item_name: Probe::new(&[r"<h2>(.*?)</h2>", r"<h1[^>]*>(.*?)</h1>"], "Unknown Item"),
    serving_size: Probe::new(&[r"Serving Size\s*(.*?)</p>"], "1 EACH"),
    calories: Probe::new(&[r"Calories&nbsp;(\d+)", r"Calories[^<]*?(\d+)"], "0"),
    total_fat: Probe::new(
        &[r"<b>Total Fat</b>&nbsp;([^<]*)", r"Total Fat[^<]*?([0-9.]+g)"],
        "0g",
    ),
    saturated_fat: Probe::new(
        &[r"Sat\. Fat&nbsp;([^<]*)", r"Saturated Fat[^<]*?([0-9.]+g)"],
        "0g",
    ),
    trans_fat: Probe::new(&[r"Trans Fat&nbsp;([^<]*)", r"Trans Fat[^<]*?([0-9.]+g)"], "0g"),
    cholesterol: Probe::new(
        &[r"<b>Cholesterol&nbsp;</b>([^<]*)", r"Cholesterol[^<]*?([0-9.]+mg)"],
        "0mg",
    ),
    sodium: Probe::new(
        &[r"<b>Sodium&nbsp;</b>([^<]*)", r"Sodium[^<]*?([0-9.]+mg)"],
        "0mg",
    ),
    total_carbs: Probe::new(
        &[r"<b>Tot\. Carb\.</b>&nbsp;([^<]*)", r"Total Carbs[^<]*?([0-9.]+g)"],
        "0g",
    ),
    dietary_fiber: Probe::new(
        &[r"Dietary Fiber&nbsp;([^<]*)", r"Dietary Fiber[^<]*?([0-9.]+g)"],
        "0g",
    ),
    sugars: Probe::new(&[r"Sugars&nbsp;([^<]*)", r"Sugars[^<]*?([0-9.]+g)"], "0g"),
    protein: Probe::new(
        &[r"<b>Protein&nbsp;</b>([^<]*)", r"Protein[^<]*?([0-9.]+g)"],
        "0g",
    ),
    ingredients: Probe::new(
        &[
            r"<b>INGREDIENTS:(?:&nbsp;)*</b>(.*?)</p>",
            r"INGREDIENTS:(.*?)(?:</div>|<div)",
        ],
        "",
    ),
    allergens: Probe::new(
        &[
            r"<b>ALLERGENS:(?:&nbsp;)*</b>(.*?)</p>",
            r"ALLERGENS:(.*?)(?:</p>|</div>|<div)",
        ],
        "",
    ),
    daily_values: [
        ("Total Fat", "Total Fat"),
        ("Saturated Fat", r"Sat\. Fat"),
        ("Cholesterol", "Cholesterol"),
        ("Sodium", "Sodium"),
        ("Total Carbs", r"Tot\. Carb\."),
        ("Dietary Fiber", "Dietary Fiber"),
    ]
    .into_iter()
    .map(|(name, label)| {
        // Stay inside the label's row: no `<tr` between label and cell
        let pattern = format!(
            r#"{label}(?:[^<]|<[^t]|<t[^r])*?<td[^>]*align="center"[^>]*>\s*<b>(\d+)</b>%"#
        );
        (name, Probe::new(&[pattern.as_str()], ""))
    })
    .collect(),
});

/// Strip markup, decode entities and collapse whitespace.
fn clean_fragment(fragment: &str) -> String {
    let without_tags = TAGS.replace_all(fragment, " ");
    clean_text(&decode_html_entities(&without_tags))
}

/// Parses a FoodPro `label.aspx` nutrition page.
pub struct NutritionExtractor;

impl Extractor for NutritionExtractor {
    type Output = NutritionFacts;

    fn parse(&self, context: &ParsingContext) -> NutritionFacts {
        let html = context.html.as_str();
        let probes = &*PROBES;

        let percent_daily_values: IndexMap<String, String> = probes
            .daily_values
            .iter()
            .map(|(name, probe)| {
                let percent = probe
                    .find(html)
                    .map(|value| format!("{value}%"))
                    .unwrap_or_else(|| "0%".to_string());
                (name.to_string(), percent)
            })
            .collect();

        let facts = NutritionFacts {
            item_name: probes.item_name.extract(html),
            serving_size: probes.serving_size.extract(html),
            calories: probes.calories.extract(html),
            total_fat: probes.total_fat.extract(html),
            saturated_fat: probes.saturated_fat.extract(html),
            trans_fat: probes.trans_fat.extract(html),
            cholesterol: probes.cholesterol.extract(html),
            sodium: probes.sodium.extract(html),
            total_carbs: probes.total_carbs.extract(html),
            dietary_fiber: probes.dietary_fiber.extract(html),
            sugars: probes.sugars.extract(html),
            protein: probes.protein.extract(html),
            ingredients: probes.ingredients.extract(html),
            allergens: probes.allergens.extract(html),
            percent_daily_values,
        };

        debug!(
            "Parsed nutrition for {} from {}: {} calories",
            facts.item_name, context.url, facts.calories
        );
        facts
    }
}
