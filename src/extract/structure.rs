//! `<wiki_structure>` parsing.
//!
//! The planner's XML is rarely well-formed enough for a strict parser, so
//! elements are located with non-greedy patterns in document order.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::cleanup::strip_xml_fence;
use crate::types::{Importance, PagePlan, Result, StructurePlan, WikiError, WikiSection};

static STRUCTURE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<wiki_structure>[\s\S]*?</wiki_structure>").expect("valid regex")
});
static CONTROL_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").expect("valid regex")
});
static PAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<page\b([^>]*)>(.*?)</page>").expect("valid regex"));
static SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<section\b([^>]*)>(.*?)</section>").expect("valid regex"));
static ID_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bid\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex"));

static TITLE: LazyLock<Regex> = LazyLock::new(|| element_pattern("title"));
static DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| element_pattern("description"));
static IMPORTANCE: LazyLock<Regex> = LazyLock::new(|| element_pattern("importance"));
static FILE_PATH: LazyLock<Regex> = LazyLock::new(|| element_pattern("file_path"));
static RELATED: LazyLock<Regex> = LazyLock::new(|| element_pattern("related"));
static PAGE_REF: LazyLock<Regex> = LazyLock::new(|| element_pattern("page_ref"));
static SECTION_REF: LazyLock<Regex> = LazyLock::new(|| element_pattern("section_ref"));

fn element_pattern(tag: &str) -> Regex {
    Regex::new(&format!(r"(?s)<{tag}(?:\s[^>]*)?>(.*?)</{tag}>")).expect("valid regex")
}

/// Parse the first `<wiki_structure>` block of a planning reply.
///
/// Sections are only read for comprehensive wikis; concise plans are flat.
pub fn extract_structure(text: &str, comprehensive: bool) -> Result<StructurePlan> {
    let unfenced = strip_xml_fence(text);
    let block = STRUCTURE_BLOCK
        .find(&unfenced)
        .ok_or_else(|| WikiError::MalformedStructure("No valid XML found in response".into()))?;
    let xml = CONTROL_CHARS.replace_all(block.as_str(), "");

    // Wiki-level title/description live outside page and section bodies
    let outer = SECTION.replace_all(&PAGE.replace_all(&xml, ""), "").into_owned();
    let title = first_element(&outer, &TITLE).unwrap_or_default();
    let description = first_element(&outer, &DESCRIPTION).unwrap_or_default();

    let mut pages: Vec<PagePlan> = Vec::new();
    for caps in PAGE.captures_iter(&xml) {
        let body = &caps[2];
        let id = id_attribute(&caps[1]).unwrap_or_else(|| format!("page-{}", pages.len() + 1));
        pages.push(PagePlan {
            id,
            title: first_element(body, &TITLE).unwrap_or_default(),
            importance: Importance::from_tag(first_element(body, &IMPORTANCE).as_deref()),
            file_paths: all_elements(body, &FILE_PATH),
            related_pages: all_elements(body, &RELATED),
        });
    }

    let mut sections: Vec<WikiSection> = Vec::new();
    if comprehensive {
        for caps in SECTION.captures_iter(&xml) {
            let body = &caps[2];
            let id =
                id_attribute(&caps[1]).unwrap_or_else(|| format!("section-{}", sections.len() + 1));
            sections.push(WikiSection {
                id,
                title: first_element(body, &TITLE).unwrap_or_default(),
                pages: all_elements(body, &PAGE_REF),
                subsections: all_elements(body, &SECTION_REF),
            });
        }
    }
    let root_sections = StructurePlan::compute_root_sections(&sections);

    debug!(
        "Parsed wiki structure: {} pages, {} sections",
        pages.len(),
        sections.len()
    );

    Ok(StructurePlan {
        id: "wiki".to_string(),
        title,
        description,
        pages,
        sections,
        root_sections,
    })
}

fn id_attribute(attrs: &str) -> Option<String> {
    let caps = ID_ATTR.captures(attrs)?;
    let value = caps.get(1).or_else(|| caps.get(2))?.as_str();
    (!value.is_empty()).then(|| decode_entities(value))
}

fn first_element(xml: &str, element: &Regex) -> Option<String> {
    element
        .captures(xml)
        .map(|caps| decode_entities(&caps[1]))
}

/// Text of every non-empty `<tag>` element, in order
fn all_elements(xml: &str, element: &Regex) -> Vec<String> {
    element
        .captures_iter(xml)
        .map(|caps| decode_entities(&caps[1]))
        .filter(|text| !text.is_empty())
        .collect()
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
