//! Plain-text menu listing used as LLM prompt context.

use crate::config::SummaryConfig;
use crate::model::MenuData;
use indexmap::IndexMap;
use log::debug;
use std::fmt::Write;

/// Render a menu as a nutrition-free listing:
///
/// ```text
/// Menu at Busch Dining Hall (Knight Room):
///
/// SOUPS:
/// - Tomato Soup
///
/// ```
pub fn menu_summary(menu: &MenuData) -> String {
    let mut summary = format!(
        "Menu at {} ({}):\n\n",
        menu.dining_hall,
        menu.display_meal_period()
    );

    for (category, items) in &menu.items_by_category {
        let _ = writeln!(summary, "{category}:");
        for item in items {
            let _ = writeln!(summary, "- {}", item.name);
        }
        summary.push('\n');
    }

    summary
}

fn is_category_line(line: &str) -> bool {
    line.ends_with(':') && !line.starts_with('-')
}

/// Shorten a summary by keeping at most `items_per_category` item lines under
/// each category header. Headers and blank lines are always kept; any other
/// line is dropped.
pub fn truncate_menu_summary(summary: &str, items_per_category: usize) -> String {
    let mut kept = Vec::new();
    let mut items_in_category = 0;

    for line in summary.split('\n') {
        let trimmed = line.trim();
        if is_category_line(trimmed) {
            items_in_category = 0;
            kept.push(line);
        } else if trimmed.starts_with('-') {
            if items_in_category < items_per_category {
                kept.push(line);
            }
            items_in_category += 1;
        } else if trimmed.is_empty() {
            kept.push(line);
        }
    }

    kept.join("\n")
}

/// Summary of `menu` ready to be embedded in a prompt, truncated when it is
/// longer than `config.max_chars`.
pub fn prepare_menu_context(menu: &MenuData, config: &SummaryConfig) -> String {
    let summary = menu_summary(menu);
    if summary.len() <= config.max_chars {
        return summary;
    }

    let truncated = truncate_menu_summary(&summary, config.items_per_category);
    debug!(
        "Menu summary truncated from {} to {} characters",
        summary.len(),
        truncated.len()
    );
    truncated
}

/// Split a summary back into its categories and item names.
pub fn parse_menu_summary(summary: &str) -> IndexMap<String, Vec<String>> {
    let mut categories: IndexMap<String, Vec<String>> = IndexMap::new();
    let mut current: Option<String> = None;

    // First line is the "Menu at ..." title
    for line in summary.split('\n').skip(1) {
        let trimmed = line.trim();
        if let Some(name) = trimmed.strip_prefix("- ") {
            if let Some(category) = &current {
                categories
                    .entry(category.clone())
                    .or_default()
                    .push(name.to_string());
            }
        } else if is_category_line(trimmed) {
            let category = trimmed.trim_end_matches(':').to_string();
            categories.entry(category.clone()).or_default();
            current = Some(category);
        }
    }

    categories
}
