//! Repository identity for a generation run.

use std::fmt;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use super::error::{Result, WikiError};

/// Where the repository lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HostType {
    #[default]
    Github,
    Gitlab,
    Bitbucket,
    Local,
}

impl HostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Gitlab => "gitlab",
            Self::Bitbucket => "bitbucket",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" => Ok(Self::Github),
            "gitlab" => Ok(Self::Gitlab),
            "bitbucket" => Ok(Self::Bitbucket),
            "local" => Ok(Self::Local),
            _ => Err(format!(
                "Unknown repository type: {}. Valid values: github, gitlab, bitbucket, local",
                s
            )),
        }
    }
}

/// Immutable description of the repository a run documents.
///
/// The access token is kept in a [`SecretString`] and never serialized or
/// printed by the `Debug` impl.
#[derive(Clone)]
pub struct RepositorySpec {
    pub owner: String,
    pub repo: String,
    pub host_type: HostType,
    pub token: Option<SecretString>,
    pub local_path: Option<String>,
    pub remote_url: Option<String>,
}

impl fmt::Debug for RepositorySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositorySpec")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("host_type", &self.host_type)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("local_path", &self.local_path)
            .field("remote_url", &self.remote_url)
            .finish()
    }
}

impl RepositorySpec {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, host_type: HostType) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            host_type,
            token: None,
            local_path: None,
            remote_url: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty()).map(SecretString::from);
        self
    }

    /// Parse user input into a repository spec.
    ///
    /// Accepts `owner/repo` (GitHub), full GitHub/GitLab/Bitbucket URLs
    /// (GitLab may carry nested groups), and absolute local paths.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(WikiError::InvalidRepository("empty input".to_string()));
        }

        if is_local_path(input) {
            let trimmed = input.trim_end_matches(['/', '\\']);
            let repo = trimmed
                .rsplit(['/', '\\'])
                .next()
                .filter(|s| !s.is_empty())
                .unwrap_or("local")
                .to_string();
            let mut spec = Self::new("local", repo, HostType::Local);
            spec.local_path = Some(input.to_string());
            return Ok(spec);
        }

        if input.starts_with("http://") || input.starts_with("https://") {
            return Self::parse_url(input);
        }

        let parts: Vec<&str> = input.split('/').collect();
        let owner = parts.first().map(|s| s.trim()).unwrap_or_default();
        let repo = parts
            .get(1)
            .map(|s| s.trim().trim_end_matches(".git"))
            .unwrap_or_default();
        if owner.is_empty() || repo.is_empty() {
            return Err(WikiError::InvalidRepository(format!(
                "'{}'. Use \"owner/repo\", a repository URL, or an absolute local path",
                input
            )));
        }
        Ok(Self::new(owner, repo, HostType::Github))
    }

    fn parse_url(input: &str) -> Result<Self> {
        let url = Url::parse(input)
            .map_err(|e| WikiError::InvalidRepository(format!("{}: {}", input, e)))?;
        let host = url.host_str().unwrap_or_default().to_lowercase();
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();
        if segments.len() < 2 {
            return Err(WikiError::InvalidRepository(format!(
                "'{}' does not name an owner and repository",
                input
            )));
        }

        let host_type = if host.contains("github") {
            HostType::Github
        } else if host.contains("bitbucket") {
            HostType::Bitbucket
        } else {
            HostType::Gitlab
        };

        // GitLab groups nest; the repository is the last segment.
        let (owner, repo) = match host_type {
            HostType::Gitlab => (segments[0], segments[segments.len() - 1]),
            _ => (segments[0], segments[1]),
        };

        let mut spec = Self::new(owner, repo.trim_end_matches(".git"), host_type);
        spec.remote_url = Some(input.trim_end_matches('/').trim_end_matches(".git").to_string());
        Ok(spec)
    }

    /// URL or path the backend should clone/read.
    pub fn repo_url(&self) -> String {
        if self.host_type == HostType::Local
            && let Some(path) = &self.local_path
        {
            return path.clone();
        }
        if let Some(url) = &self.remote_url {
            return url.clone();
        }
        match self.host_type {
            HostType::Github => format!("https://github.com/{}/{}", self.owner, self.repo),
            HostType::Gitlab => format!("https://gitlab.com/{}/{}", self.owner, self.repo),
            HostType::Bitbucket => format!("https://bitbucket.org/{}/{}", self.owner, self.repo),
            HostType::Local => format!("http://example/{}/{}", self.owner, self.repo),
        }
    }

    /// Full project path on the host (`group/sub/repo` for nested GitLab groups).
    pub fn project_path(&self) -> String {
        self.remote_url
            .as_deref()
            .and_then(|u| Url::parse(u).ok())
            .map(|u| u.path().trim_matches('/').to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| format!("{}/{}", self.owner, self.repo))
    }

    /// Origin (`scheme://host[:port]`) of the remote, when known.
    pub fn remote_origin(&self) -> Option<String> {
        let url = Url::parse(self.remote_url.as_deref()?).ok()?;
        Some(url.origin().ascii_serialization())
    }

    pub fn token_str(&self) -> Option<&str> {
        self.token.as_ref().map(|t| t.expose_secret())
    }

    /// Stable key for per-run bookkeeping
    pub fn key(&self) -> String {
        format!("{}_{}_{}", self.host_type, self.owner, self.repo)
    }
}

fn is_local_path(input: &str) -> bool {
    input.starts_with('/')
        || input.starts_with("~/")
        || (input.len() > 2 && input.as_bytes()[1] == b':' && input[2..].starts_with(['\\', '/']))
}
