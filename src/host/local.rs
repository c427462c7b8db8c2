//! Local checkout, read by the backend on our behalf.

use async_trait::async_trait;
use tracing::instrument;

use super::{RepoHost, RepoSnapshot};
use crate::backend::BackendClient;
use crate::types::{RepositorySpec, Result, WikiError};

#[derive(Debug, Clone)]
pub struct LocalHost {
    backend: BackendClient,
}

impl LocalHost {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl RepoHost for LocalHost {
    fn name(&self) -> &'static str {
        "local"
    }

    #[instrument(skip(self, repo), fields(path = %repo.repo_url()))]
    async fn fetch(&self, repo: &RepositorySpec) -> Result<RepoSnapshot> {
        let path = repo.repo_url();
        let structure = self
            .backend
            .local_structure(&path)
            .await
            .map_err(|e| match e {
                WikiError::Backend { status, message } => {
                    let prefix = format!("{} - ", status);
                    let body = message.strip_prefix(&prefix).unwrap_or(&message);
                    WikiError::host(
                        "local",
                        format!("Local repository API error ({}): {}", status, body),
                    )
                }
                other => other,
            })?;

        if structure.file_tree.trim().is_empty() {
            return Err(WikiError::host(
                "local",
                format!("Local repository at {} has no readable files", path),
            ));
        }

        Ok(RepoSnapshot {
            file_tree: structure.file_tree,
            readme: structure.readme,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use crate::types::HostType;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    async fn structure(Query(params): Query<HashMap<String, String>>) -> Response {
        match params["path"].as_str() {
            "/srv/engine" => Json(json!({
                "file_tree": "main.rs\nlib.rs",
                "readme": "# Engine"
            }))
            .into_response(),
            _ => (StatusCode::NOT_FOUND, "Directory not found").into_response(),
        }
    }

    fn host(addr: std::net::SocketAddr) -> LocalHost {
        let router_base = format!("http://{}", addr);
        LocalHost::new(BackendClient::new(reqwest::Client::new(), router_base))
    }

    #[tokio::test]
    async fn test_reads_structure_from_backend() {
        let router = Router::new().route("/local_repo/structure", get(structure));
        let addr = test_support::spawn(router).await;

        let repo = RepositorySpec::parse("/srv/engine").unwrap();
        assert_eq!(repo.host_type, HostType::Local);
        let snapshot = host(addr).fetch(&repo).await.unwrap();
        assert_eq!(snapshot.file_count(), 2);
        assert_eq!(snapshot.readme, "# Engine");
    }

    #[tokio::test]
    async fn test_backend_failure_is_host_error() {
        let router = Router::new().route("/local_repo/structure", get(structure));
        let addr = test_support::spawn(router).await;

        let repo = RepositorySpec::parse("/srv/missing").unwrap();
        let err = host(addr).fetch(&repo).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "local API error: Local repository API error (404): Directory not found"
        );
    }
}
