//! Deep-research heuristics.
//!
//! A research conversation is a series of model turns; each turn either
//! announces further iterations or concludes. Completion is detected from
//! phrasing alone.

use std::sync::LazyLock;

use regex::Regex;

static SUMMARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"# .*?\n\n(.*?)(?:\n\n|$)").expect("valid regex"));

/// Note appended when the iteration cap is reached without a conclusion
pub const FORCED_CONCLUSION: &str = "\n\n## Final Conclusion\nAfter multiple iterations of deep research, we've gathered significant insights about this topic. This concludes our investigation process, having reached the maximum number of research iterations. The findings presented across all iterations collectively form our comprehensive answer to the original question.";

/// Whether a research turn reads as the final one.
///
/// Any mention of "Dockerfile" described as "This/The Dockerfile" counts as a
/// conclusion unless further steps are announced, even when the research
/// topic has nothing to do with Docker.
pub fn is_research_complete(text: &str) -> bool {
    if text.contains("## Final Conclusion") {
        return true;
    }

    if (text.contains("## Conclusion") || text.contains("## Summary"))
        && !text.contains("I will now proceed to")
        && !text.contains("Next Steps")
        && !text.contains("next iteration")
    {
        return true;
    }

    const CONCLUDING: &[&str] = &[
        "This concludes our research",
        "This completes our investigation",
        "This concludes the deep research process",
        "Key Findings and Implementation Details",
        "In conclusion,",
    ];
    if CONCLUDING.iter().any(|phrase| text.contains(phrase))
        || (text.contains("Final") && text.contains("Conclusion"))
    {
        return true;
    }

    text.contains("Dockerfile")
        && (text.contains("This Dockerfile") || text.contains("The Dockerfile"))
        && !text.contains("Next Steps")
        && !text.contains("In the next iteration")
}

/// Kind of research turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Plan,
    Update,
    Conclusion,
}

/// One recognised research turn
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ResearchStage {
    pub title: String,
    pub kind: StageKind,
    pub iteration: usize,
    pub content: String,
}

impl ResearchStage {
    /// Classify a turn by its headings
    pub fn detect(text: &str, iteration: usize) -> Option<Self> {
        let stage = |title: String, kind: StageKind| Self {
            title,
            kind,
            iteration,
            content: text.to_string(),
        };

        if iteration == 1 && text.contains("## Research Plan") {
            return Some(stage("Research Plan".to_string(), StageKind::Plan));
        }
        if (1..=4).contains(&iteration) {
            let heading = format!("Research Update {}", iteration);
            if text.contains(&format!("## {}", heading)) {
                return Some(stage(heading, StageKind::Update));
            }
        }
        if text.contains("## Final Conclusion") {
            return Some(stage("Final Conclusion".to_string(), StageKind::Conclusion));
        }
        None
    }
}

/// First paragraph after the first `# ` heading line.
///
/// Only single-line paragraphs directly after a blank line qualify.
pub fn first_paragraph_summary(content: &str) -> Option<String> {
    SUMMARY
        .captures(content)
        .map(|caps| caps[1].trim().to_string())
}
