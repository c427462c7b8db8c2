//! GitLab REST API (v4), including self-hosted instances.

use async_trait::async_trait;
use tracing::{debug, instrument, warn};
use url::form_urlencoded::byte_serialize;

use super::{RepoHost, RepoSnapshot, TreeEntry, join_paths, status_details};
use crate::constants::hosts::{MAX_TREE_PAGES, PER_PAGE};
use crate::types::{RepositorySpec, Result, WikiError};

#[derive(Debug, Clone)]
pub struct GitlabHost {
    client: reqwest::Client,
    default_origin: String,
}

impl GitlabHost {
    pub fn new(client: reqwest::Client, default_origin: &str) -> Self {
        Self {
            client,
            default_origin: default_origin.trim_end_matches('/').to_string(),
        }
    }

    /// `<origin>/api/v4/projects/<url-encoded path>`
    fn project_url(&self, repo: &RepositorySpec) -> String {
        let origin = repo
            .remote_origin()
            .unwrap_or_else(|| self.default_origin.clone());
        let encoded: String = byte_serialize(repo.project_path().as_bytes()).collect();
        format!("{}/api/v4/projects/{}", origin, encoded)
    }

    fn get(&self, url: &str, repo: &RepositorySpec) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match repo.token_str() {
            Some(token) => request.header("PRIVATE-TOKEN", token),
            None => request,
        }
    }

    async fn fetch_tree(&self, project_url: &str, repo: &RepositorySpec) -> Result<Vec<TreeEntry>> {
        let mut entries = Vec::new();
        let mut page: u32 = 1;

        for _ in 0..MAX_TREE_PAGES {
            let url = format!(
                "{}/repository/tree?recursive=true&per_page={}&page={}",
                project_url, PER_PAGE, page
            );
            let response = self.get(&url, repo).send().await?;
            if !response.status().is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(WikiError::host(
                    "gitlab",
                    format!(
                        "Error fetching GitLab repository structure (page {}): {}",
                        page, body
                    ),
                ));
            }

            let next_page = response
                .headers()
                .get("x-next-page")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u32>().ok());
            let batch: Vec<TreeEntry> = response.json().await?;
            debug!("GitLab tree page {}: {} entries", page, batch.len());
            entries.extend(batch);

            match next_page {
                Some(next) => page = next,
                None => return Ok(entries),
            }
        }

        warn!("GitLab tree truncated after {} pages", MAX_TREE_PAGES);
        Ok(entries)
    }

    async fn fetch_readme(&self, project_url: &str, repo: &RepositorySpec) -> Option<String> {
        let url = format!("{}/repository/files/README.md/raw", project_url);
        match self.get(&url, repo).send().await {
            Ok(r) if r.status().is_success() => r.text().await.ok(),
            Ok(r) => {
                warn!("Could not fetch GitLab README.md status: {}", r.status());
                None
            }
            Err(e) => {
                warn!("Error fetching GitLab README.md: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl RepoHost for GitlabHost {
    fn name(&self) -> &'static str {
        "gitlab"
    }

    #[instrument(skip(self, repo), fields(project = %repo.project_path()))]
    async fn fetch(&self, repo: &RepositorySpec) -> Result<RepoSnapshot> {
        let project_url = self.project_url(repo);

        let info = self.get(&project_url, repo).send().await?;
        if !info.status().is_success() {
            return Err(WikiError::host(
                "gitlab",
                format!("GitLab project info error: {}", status_details(info).await),
            ));
        }

        let entries = self.fetch_tree(&project_url, repo).await?;
        if entries.is_empty() {
            return Err(WikiError::host(
                "gitlab",
                "Could not fetch repository structure. Repository might be empty or inaccessible.",
            ));
        }

        let file_tree = join_paths(&entries, "blob");
        let readme = self.fetch_readme(&project_url, repo).await.unwrap_or_default();
        Ok(RepoSnapshot { file_tree, readme })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use crate::types::HostType;
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    async fn project(Path(id): Path<String>, headers: HeaderMap) -> Response {
        assert_eq!(headers["private-token"], "glpat");
        if id == "group/sub/project" {
            Json(json!({"id": 7, "default_branch": "main"})).into_response()
        } else {
            (StatusCode::NOT_FOUND, r#"{"message":"404 Project Not Found"}"#).into_response()
        }
    }

    async fn tree(Query(params): Query<HashMap<String, String>>) -> Response {
        assert_eq!(params["recursive"], "true");
        assert_eq!(params["per_page"], "100");
        match params["page"].as_str() {
            "1" => (
                [("x-next-page", "2")],
                Json(json!([
                    {"path": "src", "type": "tree"},
                    {"path": "src/app.py", "type": "blob"}
                ])),
            )
                .into_response(),
            _ => (
                [("x-next-page", "")],
                Json(json!([{"path": "setup.py", "type": "blob"}])),
            )
                .into_response(),
        }
    }

    fn router() -> Router {
        Router::new()
            .route("/api/v4/projects/{id}", get(project))
            .route("/api/v4/projects/{id}/repository/tree", get(tree))
            .route(
                "/api/v4/projects/{id}/repository/files/README.md/raw",
                get(|| async { "# Project" }),
            )
    }

    #[tokio::test]
    async fn test_paginated_tree_and_readme() {
        let addr = test_support::spawn(router()).await;
        let repo = RepositorySpec::parse(&format!("http://{}/group/sub/project", addr))
            .unwrap()
            .with_token(Some("glpat".into()));
        assert_eq!(repo.host_type, HostType::Gitlab);

        let host = GitlabHost::new(reqwest::Client::new(), "https://gitlab.com");
        let snapshot = host.fetch(&repo).await.unwrap();
        assert_eq!(snapshot.file_tree, "src/app.py\nsetup.py");
        assert_eq!(snapshot.readme, "# Project");
    }

    #[tokio::test]
    async fn test_project_info_failure() {
        let addr = test_support::spawn(router()).await;
        let repo = RepositorySpec::parse(&format!("http://{}/group/other", addr))
            .unwrap()
            .with_token(Some("glpat".into()));

        let host = GitlabHost::new(reqwest::Client::new(), "https://gitlab.com");
        let err = host.fetch(&repo).await.unwrap_err();
        assert!(err.to_string().contains("GitLab project info error: Status: 404"));
    }

    #[test]
    fn test_project_url_encodes_path() {
        let host = GitlabHost::new(reqwest::Client::new(), "https://gitlab.example.com/");
        let repo = RepositorySpec::new("group", "project", HostType::Gitlab);
        assert_eq!(
            host.project_url(&repo),
            "https://gitlab.example.com/api/v4/projects/group%2Fproject"
        );
    }
}
