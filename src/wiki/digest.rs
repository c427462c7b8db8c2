//! Wiki digest: a length-capped concatenation of cached pages used as
//! context for slide and workshop prompts.

use crate::backend::CachedWiki;
use crate::constants::digest::{MAX_CHARS, NO_SUMMARY};
use crate::extract::first_paragraph_summary;
use crate::types::{Importance, PagePlan};

/// Build the digest with the default cap
pub fn build_digest(wiki: &CachedWiki) -> String {
    build_digest_with_limit(wiki, MAX_CHARS)
}

/// Overview first, then high-importance pages in full, then the rest.
///
/// The cap is soft: the page that crosses it is kept whole. Once the high
/// pages fill the budget nothing else is added; a later page that would
/// overflow contributes only its first-paragraph summary.
pub fn build_digest_with_limit(wiki: &CachedWiki, max_chars: usize) -> String {
    let mut digest = format!(
        "## Project Overview\n{}\n\n",
        wiki.wiki_structure.description
    );
    let mut total = 0usize;

    for (page, content) in pages_with_content(wiki, true) {
        let block = format!("## {}\n{}\n\n", page.title, content);
        total += block.chars().count();
        digest.push_str(&block);
        if total > max_chars {
            break;
        }
    }

    if total < max_chars {
        for (page, content) in pages_with_content(wiki, false) {
            let full = format!("## {}\n{}\n\n", page.title, content);
            let block = if total + full.chars().count() > max_chars {
                let summary =
                    first_paragraph_summary(content).unwrap_or_else(|| NO_SUMMARY.to_string());
                format!("## {}\n{}\n\n", page.title, summary)
            } else {
                full
            };
            total += block.chars().count();
            digest.push_str(&block);
            if total > max_chars {
                break;
            }
        }
    }

    digest
}

/// Planned pages, in plan order, that are (or are not) high importance and have content
fn pages_with_content(
    wiki: &CachedWiki,
    high: bool,
) -> impl Iterator<Item = (&PagePlan, &str)> + '_ {
    wiki.wiki_structure
        .pages
        .iter()
        .filter(move |p| (p.importance == Importance::High) == high)
        .filter_map(move |p| {
            let content = wiki.content(&p.id);
            (!content.is_empty()).then_some((p, content))
        })
}
