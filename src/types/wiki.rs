//! Wiki domain model: structure plan, sections, generated pages.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Page priority assigned by the planner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    High,
    #[default]
    Medium,
    Low,
}

impl Importance {
    /// Interpret the text of an `<importance>` element.
    ///
    /// Absent means medium; any present value other than high/medium is low.
    pub fn from_tag(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None => Self::Medium,
            Some("high") => Self::High,
            Some("medium") => Self::Medium,
            Some(_) => Self::Low,
        }
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// One planned page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagePlan {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub importance: Importance,
    #[serde(default)]
    pub file_paths: Vec<String>,
    #[serde(default)]
    pub related_pages: Vec<String>,
}

/// A grouping of pages (comprehensive wikis only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikiSection {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub pages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subsections: Vec<String>,
}

/// Table of contents for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StructurePlan {
    #[serde(default = "default_structure_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub pages: Vec<PagePlan>,
    #[serde(default)]
    pub sections: Vec<WikiSection>,
    #[serde(default)]
    pub root_sections: Vec<String>,
}

fn default_structure_id() -> String {
    "wiki".to_string()
}

/// Title keyword buckets used when a stored wiki carries no sections.
/// A page lands in the first category with a keyword contained in its
/// lowercased title.
const CATEGORIES: &[(&str, &str, &[&str])] = &[
    ("overview", "Overview", &["overview", "introduction", "about"]),
    ("architecture", "Architecture", &["architecture", "structure", "design", "system"]),
    ("features", "Core Features", &["feature", "functionality", "core"]),
    ("components", "Components", &["component", "module", "widget"]),
    ("api", "API", &["api", "endpoint", "service", "server"]),
    ("data", "Data Flow", &["data", "flow", "pipeline", "storage"]),
    ("models", "Models", &["model", "ai", "ml", "integration"]),
    ("ui", "User Interface", &["ui", "interface", "frontend", "page"]),
    ("setup", "Setup & Configuration", &["setup", "config", "installation", "deploy"]),
];

impl StructurePlan {
    pub fn page(&self, id: &str) -> Option<&PagePlan> {
        self.pages.iter().find(|p| p.id == id)
    }

    /// Sections not referenced as a subsection of any other section, in declaration order
    pub fn compute_root_sections(sections: &[WikiSection]) -> Vec<String> {
        let referenced: HashSet<&str> = sections
            .iter()
            .flat_map(|s| s.subsections.iter().map(String::as_str))
            .collect();
        sections
            .iter()
            .filter(|s| !referenced.contains(s.id.as_str()))
            .map(|s| s.id.clone())
            .collect()
    }

    /// Fill in sections for a plan stored without them.
    ///
    /// Leaves the plan untouched when it already has both sections and root
    /// sections. Otherwise pages are bucketed by title keyword, unmatched
    /// pages go to a trailing "Other" section, and every section is a root.
    pub fn synthesize_sections(&mut self) {
        if !self.sections.is_empty() && !self.root_sections.is_empty() {
            return;
        }

        let mut buckets: Vec<Vec<String>> = vec![Vec::new(); CATEGORIES.len() + 1];
        for page in &self.pages {
            let title = page.title.to_lowercase();
            let slot = CATEGORIES
                .iter()
                .position(|(_, _, keywords)| keywords.iter().any(|k| title.contains(k)))
                .unwrap_or(CATEGORIES.len());
            buckets[slot].push(page.id.clone());
        }

        let titles = CATEGORIES
            .iter()
            .map(|(id, title, _)| (*id, *title))
            .chain(std::iter::once(("other", "Other")));

        self.sections = titles
            .zip(buckets)
            .filter(|(_, pages)| !pages.is_empty())
            .map(|((id, title), pages)| WikiSection {
                id: format!("section-{}", id),
                title: title.to_string(),
                pages,
                subsections: Vec::new(),
            })
            .collect();
        self.root_sections = self.sections.iter().map(|s| s.id.clone()).collect();
    }
}

/// Lifecycle of a page within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PageStatus {
    #[default]
    Pending,
    InProgress,
    Done,
    Error,
}

impl PageStatus {
    /// Allowed forward transitions: pending → in-progress → done | error
    pub fn can_transition_to(self, next: PageStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::InProgress, Self::Done)
                | (Self::InProgress, Self::Error)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// A page plus its generated content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPage {
    #[serde(flatten)]
    pub plan: PagePlan,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub status: PageStatus,
}

impl GeneratedPage {
    pub fn pending(plan: PagePlan) -> Self {
        Self {
            plan,
            content: String::new(),
            status: PageStatus::Pending,
        }
    }

    pub fn id(&self) -> &str {
        &self.plan.id
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }
}

/// Generated pages keyed by page id
pub type PageMap = HashMap<String, GeneratedPage>;
