mod menu;
mod nutrition;

pub use self::menu::MenuExtractor;
pub use self::nutrition::NutritionExtractor;

/// A fetched page waiting to be parsed.
pub struct ParsingContext {
    pub url: String,
    pub html: String,
}

impl ParsingContext {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        ParsingContext {
            url: url.into(),
            html: html.into(),
        }
    }
}

/// Turns a portal page into structured data.
///
/// Extractors never fail: anything they cannot find falls back to a default.
pub trait Extractor {
    type Output;

    fn parse(&self, context: &ParsingContext) -> Self::Output;
}

/// Collapse whitespace runs (including non-breaking spaces) into single spaces.
pub(crate) fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
