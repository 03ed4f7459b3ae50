//! Turns the assistant's markdown-ish replies into typed display nodes.
//!
//! Recognised constructs, in priority order when two start at the same
//! offset:
//!
//! * `**Option 2: Balanced Plate**` → [`DisplayNode::OptionHeader`]
//! * `**Breakfast:**` → [`DisplayNode::Label`]
//! * `**Eggs** (Calories: 120, Protein: 12g, ...)` → [`DisplayNode::FoodItem`] with badges
//! * `**Eggs**` → [`DisplayNode::FoodItem`]
//! * `**30.5g of protein**` and `Total Protein: 30g` → [`DisplayNode::ProteinTotal`]
//! * `(Calories: 450, Protein: 30, Carbs: 50, Fat: 15)` → [`DisplayNode::NutritionGroup`]
//! * `Total: Calories: 650, Protein: 40g` → [`DisplayNode::MealTotal`]
//!
//! Everything else becomes [`DisplayNode::Text`] or, after a `•`,
//! [`DisplayNode::Bullet`]. Lines are separated by [`DisplayNode::LineBreak`].

use regex::{Captures, Regex};
use serde::Serialize;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NutrientKind {
    Calories,
    Protein,
    Carbs,
    Fat,
    Other,
}

impl NutrientKind {
    fn from_label(label: &str) -> Self {
        let label = label.to_ascii_lowercase();
        if label.starts_with("calor") {
            NutrientKind::Calories
        } else if label.starts_with("protein") {
            NutrientKind::Protein
        } else if label.starts_with("carb") {
            NutrientKind::Carbs
        } else if label.starts_with("fat") {
            NutrientKind::Fat
        } else {
            NutrientKind::Other
        }
    }
}

/// One `Label: value` pair shown next to a food item or total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NutritionBadge {
    pub kind: NutrientKind,
    pub label: String,
    pub value: String,
}

impl NutritionBadge {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        let label = label.into();
        NutritionBadge {
            kind: NutrientKind::from_label(&label),
            label,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DisplayNode {
    OptionHeader { number: u32, title: String },
    Label { text: String },
    FoodItem { name: String, badges: Vec<NutritionBadge> },
    NutritionGroup { badges: Vec<NutritionBadge> },
    MealTotal { badges: Vec<NutritionBadge> },
    /// Amount with unit, e.g. "30g"
    ProteinTotal { amount: String },
    Bullet { text: String },
    Text { text: String },
    LineBreak,
}

static NORMALIZATIONS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\(\s*\(", "("),
        (r"\)\s*\)", ")"),
        (r",\s*,", ","),
        (r"\(\s*,", "("),
        (r",\s*\)", ")"),
        (r"\*{3,}", "**"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).unwrap(), replacement))
    .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pattern {
    OptionHeader,
    Label,
    ItemWithNutrition,
    BoldItem,
    BoldProtein,
    TotalProtein,
    NutritionGroup,
    MealTotal,
}

static PATTERNS: LazyLock<Vec<(Pattern, Regex)>> = LazyLock::new(|| {
    [
        (Pattern::OptionHeader, r"\*\*Option (\d{1,9}):(.*?)\*\*"),
        (Pattern::Label, r"\*\*([\w\s&+'-]+):\*\*"),
        (
            Pattern::ItemWithNutrition,
            r"\*\*([\w\s&+'-]+)\*\*\s*\((Calories:[^)]+)\)",
        ),
        (Pattern::BoldItem, r"\*\*([\w\s&+'-]+)\*\*"),
        (Pattern::BoldProtein, r"\*\*(\d+\.?\d*g) of protein\*\*"),
        (
            Pattern::TotalProtein,
            r"(?i)Total Protein:?\s*(\d+\.?\d*g)(?:\s*of protein)?",
        ),
        (
            Pattern::NutritionGroup,
            r"\(Calories:\s*(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+\.?\d*)(?:g|cal)?(?:,\s*|\s+)Protein:\s*(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+\.?\d*)g?(?:,\s*|\s+)Carbs:\s*(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+\.?\d*)g?(?:,\s*|\s+)Fat:\s*(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+\.?\d*)g?\)",
        ),
        (
            Pattern::MealTotal,
            r"(?i)(?:Meal )?Total:?\s*(?:Calories:?\s*(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+\.?\d*)(?:g|cal)?)?(?:,?\s*Protein:?\s*(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+\.?\d*)g?)?(?:,?\s*Carbs?:?\s*(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+\.?\d*)g?)?(?:,?\s*Fat:?\s*(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+\.?\d*)g?)?",
        ),
    ]
    .into_iter()
    .map(|(pattern, regex)| (pattern, Regex::new(regex).unwrap()))
    .collect()
});

/// Collapse punctuation artifacts left behind by prompt round-tripping.
pub fn normalize(text: &str) -> String {
    NORMALIZATIONS
        .iter()
        .fold(text.to_string(), |text, (regex, replacement)| {
            regex.replace_all(&text, *replacement).into_owned()
        })
}

struct Token<'h> {
    pattern: Pattern,
    start: usize,
    end: usize,
    captures: Captures<'h>,
}

fn is_valid(pattern: Pattern, captures: &Captures) -> bool {
    match pattern {
        Pattern::OptionHeader => captures[1].parse::<u32>().is_ok(),
        Pattern::MealTotal => (1..=4).any(|group| captures.get(group).is_some()),
        _ => true,
    }
}

/// First valid match of `regex` at or after `pos`.
fn find_valid<'h>(pattern: Pattern, regex: &Regex, line: &'h str, mut pos: usize) -> Option<Token<'h>> {
    while pos <= line.len() {
        let captures = regex.captures_at(line, pos)?;
        let whole = captures.get(0)?;
        if is_valid(pattern, &captures) {
            return Some(Token {
                pattern,
                start: whole.start(),
                end: whole.end(),
                captures,
            });
        }
        pos = whole.start() + line[whole.start()..].chars().next()?.len_utf8();
    }
    None
}

fn next_token(line: &str, pos: usize) -> Option<Token<'_>> {
    let mut best: Option<Token> = None;
    for (pattern, regex) in PATTERNS.iter() {
        if let Some(token) = find_valid(*pattern, regex, line, pos) {
            if best.as_ref().map_or(true, |b| token.start < b.start) {
                best = Some(token);
            }
        }
    }
    best
}

/// Split `Calories: 1,200, Protein: 60g` on the commas between badges,
/// keeping thousands separators inside their value.
fn parse_badge_list(inner: &str) -> Vec<NutritionBadge> {
    let mut parts: Vec<String> = Vec::new();
    for part in inner.split(',') {
        match parts.last_mut() {
            Some(last) if part.starts_with(|c: char| c.is_ascii_digit()) => {
                last.push(',');
                last.push_str(part);
            }
            _ => parts.push(part.to_string()),
        }
    }
    parts
        .iter()
        .filter_map(|part| part.split_once(':'))
        .map(|(label, value)| NutritionBadge::new(label.trim(), value.trim()))
        .collect()
}

fn macro_badges(captures: &Captures) -> Vec<NutritionBadge> {
    [("Calories", ""), ("Protein", "g"), ("Carbs", "g"), ("Fat", "g")]
        .into_iter()
        .enumerate()
        .filter_map(|(i, (label, unit))| {
            captures
                .get(i + 1)
                .map(|value| NutritionBadge::new(label, format!("{}{unit}", value.as_str())))
        })
        .collect()
}

fn token_node(token: &Token) -> DisplayNode {
    let caps = &token.captures;
    match token.pattern {
        Pattern::OptionHeader => DisplayNode::OptionHeader {
            number: caps[1].parse().unwrap_or_default(),
            title: caps[2].trim().to_string(),
        },
        Pattern::Label => DisplayNode::Label {
            text: caps[1].trim().to_string(),
        },
        Pattern::ItemWithNutrition => DisplayNode::FoodItem {
            name: caps[1].trim().to_string(),
            badges: parse_badge_list(&caps[2]),
        },
        Pattern::BoldItem => DisplayNode::FoodItem {
            name: caps[1].trim().to_string(),
            badges: Vec::new(),
        },
        Pattern::BoldProtein | Pattern::TotalProtein => DisplayNode::ProteinTotal {
            amount: caps[1].to_string(),
        },
        Pattern::NutritionGroup => DisplayNode::NutritionGroup {
            badges: macro_badges(caps),
        },
        Pattern::MealTotal => DisplayNode::MealTotal {
            badges: macro_badges(caps),
        },
    }
}

fn push_text(nodes: &mut Vec<DisplayNode>, chunk: &str) {
    for (i, part) in chunk.split('•').enumerate() {
        let text = part.trim();
        if text.is_empty() {
            continue;
        }
        let text = text.to_string();
        nodes.push(if i == 0 {
            DisplayNode::Text { text }
        } else {
            DisplayNode::Bullet { text }
        });
    }
}

/// A nutrition group right after a label or bare item becomes its badges.
fn attach_group(nodes: &mut [DisplayNode], group: &[NutritionBadge]) -> bool {
    let Some(last) = nodes.last_mut() else {
        return false;
    };
    let name = match last {
        DisplayNode::Label { text } => text.clone(),
        DisplayNode::FoodItem { name, badges } if badges.is_empty() => name.clone(),
        _ => return false,
    };
    *last = DisplayNode::FoodItem {
        name,
        badges: group.to_vec(),
    };
    true
}

fn format_line(line: &str, nodes: &mut Vec<DisplayNode>) {
    let mut pos = 0;
    let mut previous_was_attachable = false;

    while let Some(token) = next_token(line, pos) {
        let gap = &line[pos..token.start];
        if !gap.trim().is_empty() {
            push_text(nodes, gap);
            previous_was_attachable = false;
        }

        let node = token_node(&token);
        let attached = match &node {
            DisplayNode::NutritionGroup { badges } if previous_was_attachable => {
                attach_group(nodes, badges)
            }
            _ => false,
        };
        if !attached {
            previous_was_attachable = matches!(
                &node,
                DisplayNode::Label { .. } | DisplayNode::FoodItem { .. }
            );
            nodes.push(node);
        } else {
            previous_was_attachable = false;
        }

        pos = token.end;
    }

    push_text(nodes, &line[pos..]);
}

/// Parse an assistant reply into display nodes.
pub fn format_response(text: &str) -> Vec<DisplayNode> {
    let normalized = normalize(text);
    let mut nodes = Vec::new();

    for (i, line) in normalized.split('\n').enumerate() {
        if i > 0 {
            nodes.push(DisplayNode::LineBreak);
        }
        format_line(line.trim_end_matches('\r'), &mut nodes);
    }

    nodes
}

fn badge_list(badges: &[NutritionBadge]) -> String {
    badges
        .iter()
        .map(|badge| format!("{}: {}", badge.label, badge.value))
        .collect::<Vec<_>>()
        .join(", ")
}

fn flatten_node(node: &DisplayNode) -> String {
    match node {
        DisplayNode::OptionHeader { number, title } => format!("**Option {number}: {title}**"),
        DisplayNode::Label { text } => format!("**{text}:**"),
        DisplayNode::FoodItem { name, badges } if badges.is_empty() => format!("**{name}**"),
        DisplayNode::FoodItem { name, badges } => {
            format!("**{name}** ({})", badge_list(badges))
        }
        DisplayNode::NutritionGroup { badges } => format!("({})", badge_list(badges)),
        DisplayNode::MealTotal { badges } => format!("Total: {}", badge_list(badges)),
        DisplayNode::ProteinTotal { amount } => format!("Total Protein: {amount}"),
        DisplayNode::Bullet { text } => format!("• {text}"),
        DisplayNode::Text { text } => text.clone(),
        DisplayNode::LineBreak => "\n".to_string(),
    }
}

/// Render nodes back to markdown that [`format_response`] parses into the
/// same nodes.
pub fn flatten(nodes: &[DisplayNode]) -> String {
    let mut out = String::new();
    let mut line_start = true;

    for node in nodes {
        if let DisplayNode::LineBreak = node {
            out.push('\n');
            line_start = true;
            continue;
        }
        if !line_start {
            out.push(' ');
        }
        out.push_str(&flatten_node(node));
        line_start = false;
    }

    out
}
