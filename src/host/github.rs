//! GitHub REST API.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{RepoHost, RepoSnapshot, TreeEntry, join_paths, status_details};
use crate::types::{RepositorySpec, Result, WikiError};

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Option<Vec<TreeEntry>>,
}

#[derive(Debug, Deserialize)]
struct ReadmeResponse {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Clone)]
pub struct GithubHost {
    client: reqwest::Client,
    api_base: String,
    branches: Vec<String>,
}

impl GithubHost {
    pub fn new(client: reqwest::Client, api_base: &str, branches: Vec<String>) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            branches,
        }
    }

    fn get(&self, url: &str, repo: &RepositorySpec) -> reqwest::RequestBuilder {
        let request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/vnd.github.v3+json");
        match repo.token_str() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// First branch whose tree lists, with the last failure for reporting
    async fn fetch_tree(&self, repo: &RepositorySpec) -> Result<Vec<TreeEntry>> {
        let mut last_error: Option<String> = None;

        for branch in &self.branches {
            let url = format!(
                "{}/repos/{}/{}/git/trees/{}?recursive=1",
                self.api_base, repo.owner, repo.repo, branch
            );
            debug!("Fetching repository structure from branch: {}", branch);

            let response = match self.get(&url, repo).send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Network error fetching branch {}: {}", branch, e);
                    continue;
                }
            };

            if response.status().is_success() {
                let body: TreeResponse = response.json().await?;
                if let Some(tree) = body.tree {
                    return Ok(tree);
                }
                continue;
            }

            let details = status_details(response).await;
            warn!("Error fetching repository structure: {}", details);
            last_error = Some(details);
        }

        Err(match last_error {
            Some(details) => WikiError::host(
                "github",
                format!("Could not fetch repository structure. API Error: {}", details),
            ),
            None => WikiError::host(
                "github",
                "Could not fetch repository structure. Repository might not exist, be empty or private.",
            ),
        })
    }

    async fn fetch_readme(&self, repo: &RepositorySpec) -> Option<String> {
        let url = format!("{}/repos/{}/{}/readme", self.api_base, repo.owner, repo.repo);
        let response = match self.get(&url, repo).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!("Could not fetch README.md, status: {}", r.status());
                return None;
            }
            Err(e) => {
                warn!("Could not fetch README.md, continuing with empty README: {}", e);
                return None;
            }
        };
        let body: ReadmeResponse = response.json().await.ok()?;
        decode_content(&body.content)
    }
}

/// GitHub wraps base64 content at 60 columns
fn decode_content(content: &str) -> Option<String> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(compact).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

#[async_trait]
impl RepoHost for GithubHost {
    fn name(&self) -> &'static str {
        "github"
    }

    #[instrument(skip(self, repo), fields(owner = %repo.owner, repo = %repo.repo))]
    async fn fetch(&self, repo: &RepositorySpec) -> Result<RepoSnapshot> {
        let tree = self.fetch_tree(repo).await?;
        let file_tree = join_paths(&tree, "blob");
        let readme = self.fetch_readme(repo).await.unwrap_or_default();
        Ok(RepoSnapshot { file_tree, readme })
    }
}
