//! CLI Common Utilities
//!
//! Shared configuration loading and repository arguments for command handlers.

use std::path::{Path, PathBuf};

use clap::Args;

use crate::backend::{BackendClient, CacheQuery};
use crate::config::{Config, ConfigLoader};
use crate::types::{Language, RepositorySpec, Result};
use crate::wiki::LocalCache;

/// Repository selection shared by every repository-scoped command
#[derive(Args, Debug, Clone)]
pub struct RepoArgs {
    /// owner/repo, a GitHub/GitLab/Bitbucket URL, or an absolute local path
    pub repo: String,

    #[arg(
        long,
        env = "DEEPWIKI_TOKEN",
        hide_env_values = true,
        help = "Access token for private repositories"
    )]
    pub token: Option<String>,

    #[arg(long, short, help = "Output language code (en, ja, zh, ...)")]
    pub language: Option<String>,

    #[arg(long, help = "Concise wiki (4-6 pages) instead of comprehensive")]
    pub concise: bool,
}

impl RepoArgs {
    pub fn spec(&self) -> Result<RepositorySpec> {
        Ok(RepositorySpec::parse(&self.repo)?.with_token(self.token.clone()))
    }
}

/// Model selection overrides applied on top of the loaded config
#[derive(Args, Debug, Clone, Default)]
pub struct ModelArgs {
    #[arg(long, help = "Model provider forwarded to the backend")]
    pub provider: Option<String>,

    #[arg(long, help = "Model name forwarded to the backend")]
    pub model: Option<String>,
}

/// Command execution context: loaded config with CLI overrides applied
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: Config,
}

impl CommandContext {
    /// Load config from the default chain, or with `path` as the project file
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let global = ConfigLoader::global_config_path();
                ConfigLoader::load_from(global.as_deref(), Some(path))?
            }
            None => ConfigLoader::load()?,
        };
        Ok(Self { config })
    }

    pub fn with_models(mut self, models: &ModelArgs) -> Self {
        if let Some(provider) = &models.provider {
            self.config.generation.provider = Some(provider.clone());
        }
        if let Some(model) = &models.model {
            self.config.generation.model = Some(model.clone());
        }
        self
    }

    /// Apply language/concise flags from repository arguments
    pub fn with_repo_args(mut self, args: &RepoArgs) -> Self {
        if let Some(language) = &args.language {
            self.config.generation.language = language.clone();
        }
        if args.concise {
            self.config.generation.comprehensive = false;
        }
        self
    }

    pub fn language(&self) -> Language {
        Language::new(self.config.generation.language.clone())
    }

    pub fn comprehensive(&self) -> bool {
        self.config.generation.comprehensive
    }

    pub fn cache_query(&self, repo: &RepositorySpec) -> CacheQuery {
        CacheQuery::new(repo, &self.language(), self.comprehensive())
            .with_generation(&self.config.generation)
    }

    pub fn backend(&self) -> Result<BackendClient> {
        BackendClient::from_config(&self.config.backend)
    }

    /// Local cache, `None` when disabled in config
    pub fn local_cache(&self) -> Option<LocalCache> {
        self.config
            .cache
            .enabled
            .then(|| LocalCache::new(ConfigLoader::cache_dir(&self.config)))
    }
}

/// Resolve an output file inside `dir`, creating the directory
pub fn output_path(dir: &Path, filename: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    Ok(dir.join(filename))
}
