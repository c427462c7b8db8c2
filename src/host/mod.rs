//! Repository Hosts
//!
//! Fetch the two inputs the structure planner needs: a newline-separated
//! list of file paths and the README text.
//!
//! | Host      | Tree                                   | README                       |
//! |-----------|----------------------------------------|------------------------------|
//! | GitHub    | git trees API, first branch that works | `/readme`, base64            |
//! | GitLab    | paginated repository tree              | raw `README.md`              |
//! | Bitbucket | `src/<main branch>` listing            | raw `README.md`              |
//! | Local     | backend `/local_repo/structure`        | same response                |
//!
//! A missing README never fails a fetch; a missing tree always does.

mod bitbucket;
mod github;
mod gitlab;
mod local;

pub use bitbucket::BitbucketHost;
pub use github::GithubHost;
pub use gitlab::GitlabHost;
pub use local::LocalHost;

use async_trait::async_trait;

use crate::backend::BackendClient;
use crate::config::Config;
use crate::constants::network::USER_AGENT;
use crate::types::{HostType, RepositorySpec, Result, WikiError};

/// File tree and README of one repository
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoSnapshot {
    pub file_tree: String,
    pub readme: String,
}

impl RepoSnapshot {
    pub fn file_count(&self) -> usize {
        self.file_tree.lines().filter(|l| !l.is_empty()).count()
    }
}

#[async_trait]
pub trait RepoHost: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, repo: &RepositorySpec) -> Result<RepoSnapshot>;
}

/// Builds the host client for a repository type
pub struct HostFactory;

impl HostFactory {
    pub fn build(
        host_type: HostType,
        config: &Config,
        client: reqwest::Client,
    ) -> Result<Box<dyn RepoHost>> {
        let hosts = &config.hosts;
        Ok(match host_type {
            HostType::Github => Box::new(GithubHost::new(
                client,
                &hosts.github_api,
                config.generation.branches.clone(),
            )),
            HostType::Gitlab => Box::new(GitlabHost::new(client, &hosts.gitlab_url)),
            HostType::Bitbucket => Box::new(BitbucketHost::new(client, &hosts.bitbucket_api)),
            HostType::Local => Box::new(LocalHost::new(BackendClient::from_config(&config.backend)?)),
        })
    }

    /// Client for host API calls, bounded by the request timeout
    pub fn client(config: &Config) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(config.backend.request_timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| WikiError::Config(format!("Failed to create HTTP client: {}", e)))
    }
}

/// Keep entries of one `type` and join their paths
fn join_paths<'a, I>(entries: I, kind: &str) -> String
where
    I: IntoIterator<Item = &'a TreeEntry>,
{
    entries
        .into_iter()
        .filter(|e| e.kind == kind)
        .map(|e| e.path.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Tree listing entry shared by the GitHub, GitLab and Bitbucket APIs
#[derive(Debug, Clone, serde::Deserialize)]
struct TreeEntry {
    #[serde(rename = "type")]
    kind: String,
    path: String,
}

/// `Status: N, Response: body` for error messages
async fn status_details(response: reqwest::Response) -> String {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    format!("Status: {}, Response: {}", status, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_paths_keeps_kind() {
        let entries = vec![
            TreeEntry {
                kind: "tree".into(),
                path: "src".into(),
            },
            TreeEntry {
                kind: "blob".into(),
                path: "src/lib.rs".into(),
            },
            TreeEntry {
                kind: "blob".into(),
                path: "README.md".into(),
            },
        ];
        assert_eq!(join_paths(&entries, "blob"), "src/lib.rs\nREADME.md");
        assert_eq!(join_paths(&entries, "commit_file"), "");
    }

    #[test]
    fn test_factory_selects_host() {
        let config = Config::default();
        let client = reqwest::Client::new();
        for (host_type, name) in [
            (HostType::Github, "github"),
            (HostType::Gitlab, "gitlab"),
            (HostType::Bitbucket, "bitbucket"),
            (HostType::Local, "local"),
        ] {
            let host = HostFactory::build(host_type, &config, client.clone()).unwrap();
            assert_eq!(host.name(), name);
        }
    }

    #[test]
    fn test_snapshot_file_count() {
        let snapshot = RepoSnapshot {
            file_tree: "a.rs\nb.rs\n".into(),
            readme: String::new(),
        };
        assert_eq!(snapshot.file_count(), 2);
    }
}
