//! HTML slide fragment extraction.

use std::sync::LazyLock;

use regex::Regex;

static CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:html)?\s*([\s\S]*?)\s*```").expect("valid regex"));
static SLIDE_CONTAINER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<div class="slide"[\s\S]*?</div>\s*</div>"#).expect("valid regex")
});
static OPEN_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[\s\S]*?>").expect("valid regex"));
static TAG_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<([a-z][a-z0-9]*)").expect("valid regex"));

/// Which rule located the fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentSource {
    CodeBlock,
    SlideContainer,
    FirstElement,
    Raw,
}

/// HTML for one slide
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub source: FragmentSource,
    pub html: String,
}

type Strategy = fn(&str) -> Option<String>;

const STRATEGIES: &[(FragmentSource, Strategy)] = &[
    (FragmentSource::CodeBlock, code_block),
    (FragmentSource::SlideContainer, slide_container),
    (FragmentSource::FirstElement, first_element),
];

/// Locate the slide HTML inside a model reply.
///
/// Falls back to the raw reply, so non-empty input never yields an empty
/// fragment.
pub fn extract_html_fragment(text: &str) -> Fragment {
    STRATEGIES
        .iter()
        .find_map(|(source, strategy)| {
            strategy(text).map(|html| Fragment {
                source: *source,
                html,
            })
        })
        .unwrap_or_else(|| Fragment {
            source: FragmentSource::Raw,
            html: text.to_string(),
        })
}

/// Whether the fragment brings its own CSS
pub fn has_own_styling(html: &str) -> bool {
    html.contains("<style>") || html.contains(r#"<link rel="stylesheet""#)
}

fn code_block(text: &str) -> Option<String> {
    let caps = CODE_BLOCK.captures(text)?;
    non_empty(&caps[1])
}

fn slide_container(text: &str) -> Option<String> {
    if !text.contains(r#"<div class="slide""#) {
        return None;
    }
    SLIDE_CONTAINER.find(text).and_then(|m| non_empty(m.as_str()))
}

fn first_element(text: &str) -> Option<String> {
    if !(text.contains('<') && text.contains('>')) {
        return None;
    }
    let tag = OPEN_TAG.find(text)?;
    let name = TAG_NAME.captures(tag.as_str())?;
    let element = Regex::new(&format!(r"(?i)<{}[\s\S]*?</{}>", &name[1], &name[1])).ok()?;
    element.find(text).and_then(|m| non_empty(m.as_str()))
}

fn non_empty(text: &str) -> Option<String> {
    (!text.trim().is_empty()).then(|| text.to_string())
}
