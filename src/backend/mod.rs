//! Backend Client
//!
//! JSON endpoints of the generation backend other than the chat stream:
//! the wiki cache, processed projects, export, model configuration, auth
//! and local repository structure.
//!
//! Every non-success response becomes [`WikiError::Backend`] carrying the
//! status and body, except export which reports [`WikiError::Export`].

mod types;

pub use types::{
    AuthStatus, AuthValidation, CacheQuery, CachedWiki, ExportFile, ExportFormat, ExportPage,
    ExportRequest, LocalStructure, ModelInfo, ModelsConfig, ProcessedProject, ProviderInfo,
};

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::config::BackendConfig;
use crate::constants::backend::{
    AUTH_STATUS_PATH, AUTH_VALIDATE_PATH, EXPORT_PATH, LOCAL_STRUCTURE_PATH, MODELS_CONFIG_PATH,
    PROCESSED_PROJECTS_PATH, WIKI_CACHE_PATH,
};
use crate::constants::network::USER_AGENT;
use crate::transport::TimeoutConfig;
use crate::types::{Result, WikiError};

static FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"filename=(.+)").expect("valid regex"));

#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base: String,
}

impl BackendClient {
    pub fn new(client: reqwest::Client, base: impl Into<String>) -> Self {
        Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Client with the configured whole-request timeout
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let timeouts = TimeoutConfig::from(config);
        let client = reqwest::Client::builder()
            .timeout(timeouts.request)
            .connect_timeout(timeouts.connect)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| WikiError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::new(client, config.base()))
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    // -------------------------------------------------------------------------
    // Wiki cache
    // -------------------------------------------------------------------------

    /// Cached run for the query; `None` when the backend has no entry
    #[instrument(skip(self), fields(owner = %query.owner, repo = %query.repo))]
    pub async fn get_cached_wiki(&self, query: &CacheQuery) -> Result<Option<CachedWiki>> {
        let response = self
            .client
            .get(self.url(WIKI_CACHE_PATH))
            .query(query)
            .send()
            .await?;
        let cached: Option<CachedWiki> = read_json(response).await?;
        debug!(
            "Cache lookup: {}",
            if cached.is_some() { "hit" } else { "miss" }
        );
        Ok(cached)
    }

    #[instrument(skip(self, wiki), fields(owner = %wiki.owner, repo = %wiki.repo))]
    pub async fn save_cached_wiki(&self, wiki: &CachedWiki) -> Result<()> {
        let response = self
            .client
            .post(self.url(WIKI_CACHE_PATH))
            .json(wiki)
            .send()
            .await?;
        check(response).await.map(|_| ())
    }

    #[instrument(skip(self), fields(owner = %query.owner, repo = %query.repo))]
    pub async fn delete_cached_wiki(&self, query: &CacheQuery) -> Result<()> {
        let response = self
            .client
            .delete(self.url(WIKI_CACHE_PATH))
            .query(query)
            .send()
            .await?;
        check(response).await.map(|_| ())
    }

    // -------------------------------------------------------------------------
    // Projects, models, auth
    // -------------------------------------------------------------------------

    pub async fn processed_projects(&self) -> Result<Vec<ProcessedProject>> {
        self.get_json(PROCESSED_PROJECTS_PATH).await
    }

    pub async fn models_config(&self) -> Result<ModelsConfig> {
        self.get_json(MODELS_CONFIG_PATH).await
    }

    pub async fn auth_status(&self) -> Result<AuthStatus> {
        self.get_json(AUTH_STATUS_PATH).await
    }

    pub async fn validate_auth(&self, code: &str) -> Result<AuthValidation> {
        let response = self
            .client
            .post(self.url(AUTH_VALIDATE_PATH))
            .json(&serde_json::json!({ "code": code }))
            .send()
            .await?;
        read_json(response).await
    }

    /// Check the backend's generation gate.
    ///
    /// Passes when no authorization is required; otherwise `code` must be
    /// present and accepted by the backend.
    pub async fn authorize(&self, code: Option<&str>) -> Result<()> {
        if !self.auth_status().await?.auth_required {
            return Ok(());
        }
        let code = code.filter(|c| !c.is_empty()).ok_or_else(|| {
            WikiError::backend(401, "Authorization code required (--auth-code)")
        })?;
        if self.validate_auth(code).await?.success {
            debug!("Authorization code accepted");
            Ok(())
        } else {
            Err(WikiError::backend(401, "Invalid authorization code"))
        }
    }

    /// File tree and README of a repository on the backend's filesystem
    pub async fn local_structure(&self, path: &str) -> Result<LocalStructure> {
        let response = self
            .client
            .get(self.url(LOCAL_STRUCTURE_PATH))
            .query(&[("path", path)])
            .send()
            .await?;
        read_json(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.client.get(self.url(path)).send().await?;
        read_json(response).await
    }

    // -------------------------------------------------------------------------
    // Export
    // -------------------------------------------------------------------------

    /// Render the wiki to a downloadable file
    #[instrument(skip(self, request), fields(pages = request.pages.len(), format = ?request.format))]
    pub async fn export(&self, request: &ExportRequest, repo: &str) -> Result<ExportFile> {
        let response = self
            .client
            .post(self.url(EXPORT_PATH))
            .json(request)
            .send()
            .await
            .map_err(|e| WikiError::Export(format!("Error exporting wiki: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "No error details available".to_string());
            return Err(WikiError::Export(format!(
                "Error exporting wiki: {} - {}",
                status.as_u16(),
                body
            )));
        }

        let filename = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| format!("{}_wiki.{}", repo, request.format.extension()));
        let bytes = response
            .bytes()
            .await
            .map_err(|e| WikiError::Export(format!("Error reading export: {}", e)))?;

        Ok(ExportFile { filename, bytes })
    }
}

/// `filename=...` from a Content-Disposition header, quotes removed
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let caps = FILENAME.captures(header)?;
    let name = caps[1].replace('"', "");
    (!name.is_empty()).then_some(name)
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(WikiError::backend(
        status.as_u16(),
        format!("{} - {}", status.as_u16(), body.trim()),
    ))
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let response = check(response).await?;
    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}
