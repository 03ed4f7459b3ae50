//! Adds per-item nutrition to assistant replies that mention menu items.

use crate::error::DiningError;
use crate::model::{MenuData, MenuItem, NutritionFacts};
use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, warn};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;
use tokio::sync::Mutex;

static ITEM_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([\w\s&+'-]+):\*\*|\*([\w\s&+'-]+):\*").unwrap());

/// Anything that can resolve a nutrition link into facts.
#[async_trait]
pub trait NutritionSource: Send + Sync {
    async fn nutrition(&self, nutrition_link: &str) -> Result<NutritionFacts, DiningError>;
}

/// The four values spliced into a reply, with units as scraped.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemMacros {
    pub calories: String,
    pub protein: String,
    pub carbs: String,
    pub fat: String,
}

impl From<&NutritionFacts> for ItemMacros {
    fn from(facts: &NutritionFacts) -> Self {
        ItemMacros {
            calories: facts.calories.clone(),
            protein: facts.protein.clone(),
            carbs: facts.total_carbs.clone(),
            fat: facts.total_fat.clone(),
        }
    }
}

impl ItemMacros {
    fn parenthetical(&self) -> String {
        format!(
            "(Calories: {}, Protein: {}, Carbs: {}, Fat: {})",
            self.calories, self.protein, self.carbs, self.fat
        )
    }
}

/// Session-lifetime memo of fetched macros, keyed by menu item name.
#[derive(Default)]
pub struct NutritionCache {
    entries: Mutex<HashMap<String, ItemMacros>>,
}

impl NutritionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, item_name: &str) -> Option<ItemMacros> {
        self.entries.lock().await.get(item_name).cloned()
    }

    pub async fn insert(&self, item_name: impl Into<String>, macros: ItemMacros) {
        self.entries.lock().await.insert(item_name.into(), macros);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

fn label_name<'t>(captures: &Captures<'t>) -> Option<&'t str> {
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|name| name.as_str().trim())
}

/// Names written as `**Name:**` or `*Name:*`, first occurrence order, no repeats.
pub fn candidate_names(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for captures in ITEM_LABEL.captures_iter(text) {
        if let Some(name) = label_name(&captures) {
            if !name.is_empty() && !names.iter().any(|seen| seen == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

/// Exact case-insensitive name match, else containment in either direction.
pub fn match_menu_item<'m>(name: &str, items: &'m [MenuItem]) -> Option<&'m MenuItem> {
    let wanted = name.to_lowercase();
    items
        .iter()
        .find(|item| item.name.to_lowercase() == wanted)
        .or_else(|| {
            items.iter().find(|item| {
                let candidate = item.name.to_lowercase();
                candidate.contains(&wanted) || wanted.contains(&candidate)
            })
        })
}

async fn macros_for(
    item: &MenuItem,
    source: &dyn NutritionSource,
    cache: &NutritionCache,
) -> Option<ItemMacros> {
    if let Some(macros) = cache.get(&item.name).await {
        return Some(macros);
    }

    let link = item.nutrition_link.as_deref()?;
    match source.nutrition(link).await {
        Ok(facts) => {
            let macros = ItemMacros::from(&facts);
            cache.insert(item.name.clone(), macros.clone()).await;
            Some(macros)
        }
        Err(e) => {
            warn!("Nutrition lookup failed for {}: {}", item.name, e);
            None
        }
    }
}

/// Splice `(Calories: …, Protein: …, Carbs: …, Fat: …)` after every item label
/// in `text` that matches a menu item, unless the line already carries one.
///
/// Lookups run concurrently; a label whose item is unknown, has no link or
/// fails to fetch is left as it was.
pub async fn enrich_response(
    text: &str,
    menu: &MenuData,
    source: &dyn NutritionSource,
    cache: &NutritionCache,
) -> String {
    let names = candidate_names(text);
    if names.is_empty() {
        return text.to_string();
    }

    let matched: Vec<(String, &MenuItem)> = names
        .into_iter()
        .filter_map(|name| match_menu_item(&name, &menu.items).map(|item| (name, item)))
        .collect();
    debug!("Matched {} menu items in assistant reply", matched.len());

    let lookups = matched
        .iter()
        .map(|(_, item)| macros_for(item, source, cache));
    let results = join_all(lookups).await;

    let by_name: HashMap<&str, ItemMacros> = matched
        .iter()
        .zip(results)
        .filter_map(|((name, _), macros)| macros.map(|m| (name.as_str(), m)))
        .collect();
    if by_name.is_empty() {
        return text.to_string();
    }

    ITEM_LABEL
        .replace_all(text, |captures: &Captures| {
            let whole = &captures[0];
            let Some(macros) = label_name(captures).and_then(|name| by_name.get(name)) else {
                return whole.to_string();
            };
            let end = captures.get(0).map_or(text.len(), |m| m.end());
            let rest_of_line = text[end..].split('\n').next().unwrap_or_default();
            if rest_of_line.contains("(Calories:") {
                return whole.to_string();
            }
            let raw_name = captures
                .get(1)
                .or_else(|| captures.get(2))
                .map_or("", |m| m.as_str());
            format!("**{raw_name}:** {}", macros.parenthetical())
        })
        .into_owned()
}
