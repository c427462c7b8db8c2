//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/deepwiki/) and project (.deepwiki/) level configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{backend, generation, hosts, network};
use crate::types::{Result, WikiError};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Backend service endpoints and timeouts
    pub backend: BackendConfig,

    /// Generation settings (model, language, concurrency)
    pub generation: GenerationConfig,

    /// Repository host API locations
    pub hosts: HostsConfig,

    /// Proxy server settings
    pub server: ServerConfig,

    /// Local cache settings
    pub cache: CacheSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            backend: BackendConfig::default(),
            generation: GenerationConfig::default(),
            hosts: HostsConfig::default(),
            server: ServerConfig::default(),
            cache: CacheSettings::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `WikiError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if self.generation.concurrency == 0 {
            return Err(WikiError::Config(
                "generation.concurrency must be greater than 0".to_string(),
            ));
        }

        if self.backend.connect_timeout_secs == 0 || self.backend.slide_connect_timeout_secs == 0
        {
            return Err(WikiError::Config(
                "backend connect timeouts must be greater than 0".to_string(),
            ));
        }

        if self.backend.request_timeout_secs == 0 {
            return Err(WikiError::Config(
                "backend.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        for (name, value) in [
            ("backend.base_url", &self.backend.base_url),
            ("hosts.github_api", &self.hosts.github_api),
            ("hosts.gitlab_url", &self.hosts.gitlab_url),
            ("hosts.bitbucket_api", &self.hosts.bitbucket_api),
        ] {
            check_http_url(name, value)?;
        }

        if self.generation.branches.is_empty() {
            return Err(WikiError::Config(
                "generation.branches must list at least one branch".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_http_url(name: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| WikiError::Config(format!("{} is not a valid URL ({}): {}", name, value, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(WikiError::Config(format!(
            "{} must use http or https, got {}",
            name, other
        ))),
    }
}

// =============================================================================
// Backend Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend base URL (overridden by SERVER_BASE_URL)
    pub base_url: String,

    /// Try WebSocket before HTTP streaming
    pub ws_enabled: bool,

    /// WebSocket open timeout for structure and page calls
    pub connect_timeout_secs: u64,

    /// WebSocket open timeout for slide and workshop calls
    pub slide_connect_timeout_secs: u64,

    /// Timeout for non-streaming JSON calls (cache, export, config)
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: backend::DEFAULT_BASE_URL.to_string(),
            ws_enabled: true,
            connect_timeout_secs: network::WS_CONNECT_TIMEOUT_SECS,
            slide_connect_timeout_secs: network::WS_SLIDE_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: network::REQUEST_TIMEOUT_SECS,
        }
    }
}

impl BackendConfig {
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Streaming HTTP endpoint
    pub fn http_chat_url(&self) -> String {
        format!("{}{}", self.base(), backend::HTTP_CHAT_PATH)
    }

    /// WebSocket endpoint: the base URL with its `http` scheme prefix replaced by `ws`
    pub fn ws_chat_url(&self) -> String {
        let base = self.base();
        let ws_base = match base.strip_prefix("http") {
            Some(rest) => format!("ws{}", rest),
            None => base.to_string(),
        };
        format!("{}{}", ws_base, backend::WS_CHAT_PATH)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base(), path)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn slide_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.slide_connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// =============================================================================
// Generation Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Maximum concurrent page generations
    pub concurrency: usize,

    /// Output language code
    pub language: String,

    /// Comprehensive (sections, 8-12 pages) or concise (4-6 pages)
    pub comprehensive: bool,

    /// Model provider forwarded to the backend
    pub provider: Option<String>,

    /// Model name forwarded to the backend
    pub model: Option<String>,

    /// Custom model name (used when model = "custom")
    pub custom_model: Option<String>,

    /// Directories the backend should skip
    pub excluded_dirs: Vec<String>,

    /// Files the backend should skip
    pub excluded_files: Vec<String>,

    /// Branches probed on GitHub, in order
    pub branches: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            concurrency: generation::DEFAULT_CONCURRENCY,
            language: "en".to_string(),
            comprehensive: true,
            provider: None,
            model: None,
            custom_model: None,
            excluded_dirs: Vec::new(),
            excluded_files: Vec::new(),
            branches: generation::DEFAULT_BRANCHES
                .iter()
                .map(|b| b.to_string())
                .collect(),
        }
    }
}

// =============================================================================
// Host Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostsConfig {
    /// GitHub REST API base (GitHub Enterprise: https://host/api/v3)
    pub github_api: String,

    /// GitLab instance URL used when the repository has no explicit origin
    pub gitlab_url: String,

    /// Bitbucket 2.0 API base
    pub bitbucket_api: String,
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            github_api: hosts::GITHUB_API.to_string(),
            gitlab_url: hosts::GITLAB_URL.to_string(),
            bitbucket_api: hosts::BITBUCKET_API.to_string(),
        }
    }
}

// =============================================================================
// Server Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for `deepwiki serve`
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

// =============================================================================
// Cache Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Write completed runs to the local cache
    pub enabled: bool,

    /// Override cache directory (default: global cache dir)
    pub dir: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
