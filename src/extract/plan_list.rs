//! Slide outline parsing.
//!
//! Outlines arrive in whatever list style the model felt like using. Each
//! strategy recognises one style; the first that finds at least one entry
//! wins, and a fixed seven-slide outline closes the chain.

use std::sync::LazyLock;

use regex::Regex;

static NUMBERED_DOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\s+(.*)").expect("valid regex"));
static NUMBERED_DOT_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.").expect("valid regex"));
static NUMBERED_PAREN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\)\s+(.*)").expect("valid regex"));
static NUMBERED_PAREN_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\)").expect("valid regex"));
static SLIDE_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)slide\s+\d+\s*:?\s*(.*)").expect("valid regex"));
static SLIDE_LABEL_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^slide").expect("valid regex"));
static GENERIC_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^:]+)(?::\s*(.*))?$").expect("valid regex"));

/// Which list style produced the outline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSource {
    NumberedDot,
    NumberedParen,
    SlideLabel,
    GenericLines,
    Default,
}

/// One planned slide
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub title: String,
    pub description: String,
}

impl PlanEntry {
    /// Split `title: description` at the first colon
    pub fn parse(entry: &str) -> Self {
        let mut parts = entry.split(':');
        let title = parts.next().unwrap_or_default().trim().to_string();
        let description = parts.next().map(|d| d.trim().to_string()).unwrap_or_default();
        Self { title, description }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanList {
    pub source: PlanSource,
    pub entries: Vec<PlanEntry>,
}

type Strategy = fn(&str) -> Option<Vec<String>>;

const STRATEGIES: &[(PlanSource, Strategy)] = &[
    (PlanSource::NumberedDot, numbered_dot),
    (PlanSource::NumberedParen, numbered_paren),
    (PlanSource::SlideLabel, slide_label),
    (PlanSource::GenericLines, generic_lines),
];

/// Parse a slide outline, falling back to [`default_plan`]
pub fn extract_plan_list(text: &str, repo: &str) -> PlanList {
    for (source, strategy) in STRATEGIES {
        if let Some(items) = strategy(text) {
            return PlanList {
                source: *source,
                entries: items.iter().map(|item| PlanEntry::parse(item)).collect(),
            };
        }
    }
    PlanList {
        source: PlanSource::Default,
        entries: default_plan(repo)
            .iter()
            .map(|item| PlanEntry::parse(item))
            .collect(),
    }
}

/// Seven-slide outline used when nothing could be parsed
pub fn default_plan(repo: &str) -> Vec<String> {
    vec![
        format!("Title Slide: Introduction to {}", repo),
        format!("Overview: Key features and purpose of {}", repo),
        "Architecture: System components and structure".to_string(),
        "Features: Main capabilities and functionalities".to_string(),
        "Implementation: How it works and technical details".to_string(),
        format!("Use Cases: How to use {} effectively", repo),
        "Conclusion: Summary and next steps".to_string(),
    ]
}

/// `1. Title: description`
pub fn numbered_dot(text: &str) -> Option<Vec<String>> {
    list_items(text, &NUMBERED_DOT, &NUMBERED_DOT_START)
}

/// `1) Title: description`
pub fn numbered_paren(text: &str) -> Option<Vec<String>> {
    list_items(text, &NUMBERED_PAREN, &NUMBERED_PAREN_START)
}

/// `Slide 1: Title - description`
pub fn slide_label(text: &str) -> Option<Vec<String>> {
    list_items(text, &SLIDE_LABEL, &SLIDE_LABEL_START)
}

/// The title part of any `title[: description]` line that is not chatter
pub fn generic_lines(text: &str) -> Option<Vec<String>> {
    let items: Vec<String> = text
        .lines()
        .filter_map(|line| {
            let caps = GENERIC_LINE.captures(line)?;
            let head = caps[1].to_lowercase();
            let keep = caps[1].chars().count() > 3
                && !head.contains("please")
                && !head.contains("here");
            keep.then(|| caps[1].trim().to_string())
        })
        .collect();
    non_empty(items)
}

/// Items whose marker line is followed by another marker line or by nothing
/// but blank lines.
fn list_items(text: &str, marker: &Regex, next_marker: &Regex) -> Option<Vec<String>> {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut items = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let Some(caps) = marker.captures(line) else {
            continue;
        };
        let rest = &lines[i + 1..];
        let at_end = rest.iter().all(|l| l.is_empty());
        let continues = rest.first().is_some_and(|next| next_marker.is_match(next));
        if at_end || continues {
            let item = caps[1].trim();
            if !item.is_empty() {
                items.push(item.to_string());
            }
        }
    }
    non_empty(items)
}

fn non_empty(items: Vec<String>) -> Option<Vec<String>> {
    (!items.is_empty()).then_some(items)
}
