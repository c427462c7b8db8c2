//! Bitbucket Cloud REST API (2.0).

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{RepoHost, RepoSnapshot, TreeEntry, join_paths, status_details};
use crate::constants::hosts::{MAX_TREE_PAGES, PER_PAGE};
use crate::types::{RepositorySpec, Result, WikiError};

const GENERIC_FAILURE: &str = "Could not fetch repository structure. Repository might not exist, be empty or private.";

#[derive(Debug, Deserialize)]
struct RepositoryInfo {
    mainbranch: Option<Branch>,
}

#[derive(Debug, Deserialize)]
struct Branch {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SourcePage {
    #[serde(default)]
    values: Vec<TreeEntry>,
    next: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BitbucketHost {
    client: reqwest::Client,
    api_base: String,
}

impl BitbucketHost {
    pub fn new(client: reqwest::Client, api_base: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn get(&self, url: &str, repo: &RepositorySpec) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match repo.token_str() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn repository_url(&self, repo: &RepositorySpec) -> String {
        format!("{}/repositories/{}", self.api_base, repo.project_path())
    }

    async fn main_branch(&self, repo: &RepositorySpec) -> Result<String> {
        let response = self.get(&self.repository_url(repo), repo).send().await?;
        if !response.status().is_success() {
            let details = status_details(response).await;
            return Err(WikiError::host(
                "bitbucket",
                format!("Could not fetch repository structure. Bitbucket API Error: {}", details),
            ));
        }
        let info: RepositoryInfo = response.json().await?;
        info.mainbranch
            .map(|b| b.name)
            .ok_or_else(|| WikiError::host("bitbucket", GENERIC_FAILURE))
    }

    async fn fetch_tree(&self, repo: &RepositorySpec, branch: &str) -> Result<Vec<TreeEntry>> {
        let mut entries = Vec::new();
        let mut url = Some(format!(
            "{}/src/{}/?recursive=true&per_page={}",
            self.repository_url(repo),
            branch,
            PER_PAGE
        ));

        let mut pages = 0;
        while let Some(current) = url.take() {
            if pages == MAX_TREE_PAGES {
                warn!("Bitbucket tree truncated after {} pages", MAX_TREE_PAGES);
                break;
            }
            pages += 1;

            let response = self.get(&current, repo).send().await?;
            if !response.status().is_success() {
                let details = status_details(response).await;
                return Err(WikiError::host(
                    "bitbucket",
                    format!("Could not fetch repository structure. Bitbucket API Error: {}", details),
                ));
            }
            let page: SourcePage = response.json().await?;
            debug!("Bitbucket tree page {}: {} entries", pages, page.values.len());
            entries.extend(page.values);
            url = page.next;
        }

        Ok(entries)
    }

    async fn fetch_readme(&self, repo: &RepositorySpec, branch: &str) -> Option<String> {
        let url = format!("{}/src/{}/README.md", self.repository_url(repo), branch);
        match self.get(&url, repo).send().await {
            Ok(r) if r.status().is_success() => r.text().await.ok(),
            Ok(r) => {
                warn!("Could not fetch Bitbucket README.md status: {}", r.status());
                None
            }
            Err(e) => {
                warn!("Error fetching Bitbucket README.md: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl RepoHost for BitbucketHost {
    fn name(&self) -> &'static str {
        "bitbucket"
    }

    #[instrument(skip(self, repo), fields(project = %repo.project_path()))]
    async fn fetch(&self, repo: &RepositorySpec) -> Result<RepoSnapshot> {
        let branch = self.main_branch(repo).await?;
        let entries = self.fetch_tree(repo, &branch).await?;

        let file_tree = join_paths(&entries, "commit_file");
        if file_tree.is_empty() {
            return Err(WikiError::host("bitbucket", GENERIC_FAILURE));
        }

        let readme = self.fetch_readme(repo, &branch).await.unwrap_or_default();
        Ok(RepoSnapshot { file_tree, readme })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use crate::types::HostType;
    use axum::extract::{Path, Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Fake {
        addr: Arc<Mutex<Option<SocketAddr>>>,
    }

    async fn repository(Path((workspace, slug)): Path<(String, String)>) -> Response {
        if workspace == "team" && slug == "service" {
            Json(json!({"mainbranch": {"name": "develop"}})).into_response()
        } else {
            (StatusCode::NOT_FOUND, "no such repository").into_response()
        }
    }

    async fn source(
        State(fake): State<Fake>,
        Path((_, _, branch)): Path<(String, String, String)>,
        Query(params): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> Response {
        assert_eq!(branch, "develop");
        assert_eq!(headers["authorization"], "Bearer bb-token");
        let addr = fake.addr.lock().unwrap().expect("address set");
        if params.get("page").map(String::as_str) == Some("2") {
            return Json(json!({"values": [{"path": "docs/guide.md", "type": "commit_file"}]}))
                .into_response();
        }
        Json(json!({
            "values": [
                {"path": "src", "type": "commit_directory"},
                {"path": "src/main.go", "type": "commit_file"}
            ],
            "next": format!(
                "http://{}/2.0/repositories/team/service/src/develop/?recursive=true&page=2",
                addr
            )
        }))
        .into_response()
    }

    async fn readme() -> &'static str {
        "# Service"
    }

    async fn start() -> SocketAddr {
        let fake = Fake::default();
        let router = Router::new()
            .route("/2.0/repositories/{workspace}/{slug}", get(repository))
            .route("/2.0/repositories/{workspace}/{slug}/src/{branch}/", get(source))
            .route(
                "/2.0/repositories/{workspace}/{slug}/src/{branch}/README.md",
                get(readme),
            )
            .with_state(fake.clone());
        let addr = test_support::spawn(router).await;
        *fake.addr.lock().unwrap() = Some(addr);
        addr
    }

    #[tokio::test]
    async fn test_follows_next_and_keeps_files() {
        let addr = start().await;
        let repo = RepositorySpec::new("team", "service", HostType::Bitbucket)
            .with_token(Some("bb-token".into()));
        let host = BitbucketHost::new(reqwest::Client::new(), &format!("http://{}/2.0", addr));

        let snapshot = host.fetch(&repo).await.unwrap();
        assert_eq!(snapshot.file_tree, "src/main.go\ndocs/guide.md");
        assert_eq!(snapshot.readme, "# Service");
    }

    #[tokio::test]
    async fn test_missing_repository_reports_status() {
        let addr = start().await;
        let repo = RepositorySpec::new("team", "ghost", HostType::Bitbucket);
        let host = BitbucketHost::new(reqwest::Client::new(), &format!("http://{}/2.0", addr));

        let err = host.fetch(&repo).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "bitbucket API error: Could not fetch repository structure. Bitbucket API Error: Status: 404, Response: no such repository"
        );
    }
}
