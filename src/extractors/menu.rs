use crate::extractors::{clean_text, Extractor, ParsingContext};
use crate::halls::NUTRITION_BASE_URL;
use crate::model::{MenuItem, UNCATEGORIZED};
use log::debug;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static HEADER_DECORATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^--\s*|\s*--$").unwrap());

/// Pulls menu items out of a FoodPro `pickmenu.aspx` page.
///
/// Category headers are `h3` elements and every item is a `fieldset` whose
/// `col-1`, `col-2` and `col-3` divs hold the name, portion and nutrition
/// link. Items are assigned to the closest header above them.
pub struct MenuExtractor;

impl Extractor for MenuExtractor {
    type Output = Vec<MenuItem>;

    fn parse(&self, context: &ParsingContext) -> Vec<MenuItem> {
        debug!("Extracting menu items from {}", context.url);
        let document = Html::parse_document(&context.html);
        let blocks = Selector::parse("h3, fieldset").unwrap();

        let mut category: Option<String> = None;
        let mut items = Vec::new();

        for element in document.select(&blocks) {
            match element.value().name() {
                "h3" => {
                    if let Some(header) = header_text(element) {
                        category = Some(header);
                    }
                }
                _ => {
                    if let Some(item) = parse_item(element, category.as_deref()) {
                        items.push(item);
                    }
                }
            }
        }

        debug!("Found {} menu items", items.len());
        items
    }
}

fn header_text(element: ElementRef) -> Option<String> {
    let text = clean_text(&element.text().collect::<String>());
    let text = HEADER_DECORATION.replace_all(&text, "").trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn first_label(element: ElementRef, column: &str) -> Option<String> {
    let selector = Selector::parse(&format!("div[class^='{column}'] label")).ok()?;
    element
        .select(&selector)
        .next()
        .map(|label| clean_text(&label.text().collect::<String>()))
}

fn nutrition_link(element: ElementRef) -> Option<String> {
    let selector = Selector::parse("div[class^='col-3'] a[href]").unwrap();
    element
        .select(&selector)
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(str::trim)
        .find(|href| href.to_ascii_lowercase().starts_with("label.aspx"))
        .map(|href| format!("{NUTRITION_BASE_URL}{href}"))
}

fn parse_item(element: ElementRef, category: Option<&str>) -> Option<MenuItem> {
    let name = first_label(element, "col-1").filter(|name| !name.is_empty())?;

    Some(MenuItem {
        name,
        category: category.unwrap_or(UNCATEGORIZED).to_string(),
        portion: first_label(element, "col-2").unwrap_or_default(),
        nutrition_link: nutrition_link(element),
    })
}
