//! Wire types for the backend's cache, project and export endpoints.

use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::constants::generation::NOT_GENERATED;
use crate::types::{Language, PageMap, PagePlan, PageStatus, RepositorySpec, StructurePlan};

/// Identity of one cache entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheQuery {
    pub owner: String,
    pub repo: String,
    pub repo_type: String,
    pub language: String,
    pub comprehensive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_model: Option<String>,
}

impl CacheQuery {
    pub fn new(repo: &RepositorySpec, language: &Language, comprehensive: bool) -> Self {
        Self {
            owner: repo.owner.clone(),
            repo: repo.repo.clone(),
            repo_type: repo.host_type.to_string(),
            language: language.code().to_string(),
            comprehensive,
            provider: None,
            model: None,
            custom_model: None,
        }
    }

    /// Attach the model selection (sent when clearing an entry)
    pub fn with_generation(mut self, generation: &GenerationConfig) -> Self {
        self.provider = generation.provider.clone();
        self.model = generation.model.clone();
        if generation.model.as_deref() == Some("custom") {
            self.custom_model = generation.custom_model.clone();
        }
        self
    }
}

/// A completed run as the backend stores it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedWiki {
    pub owner: String,
    pub repo: String,
    pub repo_type: String,
    pub language: String,
    pub comprehensive: bool,
    pub wiki_structure: StructurePlan,
    #[serde(default)]
    pub generated_pages: PageMap,
}

impl CachedWiki {
    pub fn new(query: &CacheQuery, structure: StructurePlan, pages: PageMap) -> Self {
        Self {
            owner: query.owner.clone(),
            repo: query.repo.clone(),
            repo_type: query.repo_type.clone(),
            language: query.language.clone(),
            comprehensive: query.comprehensive,
            wiki_structure: structure,
            generated_pages: pages,
        }
    }

    /// At least one generated page to show
    pub fn is_usable(&self) -> bool {
        !self.generated_pages.is_empty()
    }

    /// Pages loaded from a cache entry are finished, whatever status they were saved with
    pub fn mark_loaded(&mut self) {
        for page in self.generated_pages.values_mut() {
            if page.has_content() && !page.status.is_terminal() {
                page.status = PageStatus::Done;
            }
        }
    }

    /// Generated page content by id, empty when absent
    pub fn content(&self, id: &str) -> &str {
        self.generated_pages
            .get(id)
            .map(|p| p.content.as_str())
            .unwrap_or_default()
    }
}

/// Entry of `/api/processed_projects`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedProject {
    pub id: String,
    pub owner: String,
    pub repo: String,
    pub name: String,
    pub repo_type: String,
    #[serde(rename = "submittedAt")]
    pub submitted_at: i64,
    pub language: String,
}

/// Export file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Markdown,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown export format: {}. Valid values: markdown, json", s)),
        }
    }
}

/// Page as sent to the export endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportPage {
    #[serde(flatten)]
    pub plan: PagePlan,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRequest {
    pub repo_url: String,
    #[serde(rename = "type")]
    pub repo_type: String,
    pub pages: Vec<ExportPage>,
    pub format: ExportFormat,
}

impl ExportRequest {
    /// Every planned page in plan order; pages without content are marked
    pub fn new(
        repo: &RepositorySpec,
        structure: &StructurePlan,
        pages: &PageMap,
        format: ExportFormat,
    ) -> Self {
        let pages = structure
            .pages
            .iter()
            .map(|plan| ExportPage {
                plan: plan.clone(),
                content: pages
                    .get(&plan.id)
                    .filter(|p| p.has_content())
                    .map(|p| p.content.clone())
                    .unwrap_or_else(|| NOT_GENERATED.to_string()),
            })
            .collect();
        Self {
            repo_url: repo.repo_url(),
            repo_type: repo.host_type.to_string(),
            pages,
            format,
        }
    }
}

/// Downloaded export
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub filename: String,
    pub bytes: bytes::Bytes,
}

/// `/models/config`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsConfig {
    pub providers: Vec<ProviderInfo>,
    #[serde(default)]
    pub default_provider: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub models: Vec<ModelInfo>,
    #[serde(default)]
    pub supports_custom_model: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
}

/// `/auth/status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthStatus {
    pub auth_required: bool,
}

/// `/auth/validate` response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthValidation {
    pub success: bool,
}

/// `/local_repo/structure` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalStructure {
    #[serde(default)]
    pub file_tree: String,
    #[serde(default)]
    pub readme: String,
}

