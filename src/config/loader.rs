//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/deepwiki/config.toml)
//! 3. Project config (.deepwiki/config.toml)
//! 4. Environment variables (DEEPWIKI_* prefix, `__` separates sections)
//! 5. SERVER_BASE_URL (backend base URL)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use tracing::{debug, info};

use super::types::Config;
use crate::constants::backend;
use crate::types::{Result, WikiError};

const APP_DIR: &str = "deepwiki";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        let global = Self::global_config_path();
        let project = Self::project_config_path();
        Self::load_from(global.as_deref(), Some(&project))
    }

    /// Load configuration from explicit file locations plus the environment
    pub fn load_from(global: Option<&Path>, project: Option<&Path>) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = global
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(global_path));
        }

        if let Some(project_path) = project
            && project_path.exists()
        {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(project_path));
        }

        // DEEPWIKI_BACKEND__BASE_URL -> backend.base_url
        figment = figment
            .merge(Env::prefixed("DEEPWIKI_").split("__").lowercase(true))
            .merge(
                Env::raw()
                    .only(&[backend::BASE_URL_ENV])
                    .map(|_| "backend.base_url".into()),
            );

        let config: Config = figment
            .extract()
            .map_err(|e| WikiError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| WikiError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/deepwiki/)
    pub fn global_dir() -> Option<PathBuf> {
        BaseDirs::new().map(|dirs| dirs.config_dir().join(APP_DIR))
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to global cache directory
    pub fn global_cache_dir() -> Option<PathBuf> {
        BaseDirs::new().map(|dirs| dirs.cache_dir().join(APP_DIR))
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    /// Get project data directory
    pub fn project_dir() -> PathBuf {
        PathBuf::from(".deepwiki")
    }

    /// Cache directory for a loaded config
    pub fn cache_dir(config: &Config) -> PathBuf {
        config
            .cache
            .dir
            .clone()
            .or_else(Self::global_cache_dir)
            .unwrap_or_else(|| Self::project_dir().join(crate::constants::cache::DIR_NAME))
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());

        if let Some(cache) = Self::global_cache_dir() {
            let exists = if cache.exists() { "✓" } else { "✗" };
            println!("  Cache:   {} {}", exists, cache.display());
        }
    }

    /// Render the effective configuration in the requested format
    pub fn render_config(config: &Config, format: &str) -> Result<String> {
        match format {
            "json" => Ok(serde_json::to_string_pretty(config)?),
            "yaml" => Ok(serde_yaml::to_string(config)?),
            _ => toml::to_string_pretty(config).map_err(|e| WikiError::Config(e.to_string())),
        }
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            WikiError::Config("Cannot determine global config directory".to_string())
        })?;
        Self::write_default(&global_dir, force)?;

        if let Some(cache_dir) = Self::global_cache_dir() {
            fs::create_dir_all(&cache_dir)?;
        }

        Ok(global_dir)
    }

    /// Initialize project configuration
    pub fn init_project(force: bool) -> Result<PathBuf> {
        let project_dir = Self::project_dir();
        Self::write_default(&project_dir, force)?;
        Ok(project_dir)
    }

    fn write_default(dir: &Path, force: bool) -> Result<()> {
        fs::create_dir_all(dir)?;
        let config_path = dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_config())?;
            info!("Created config: {}", config_path.display());
        } else {
            info!("Config exists: {}", config_path.display());
        }
        Ok(())
    }

    // =========================================================================
    // Internal
    // =========================================================================

    /// Default config file content (TOML)
    fn default_config() -> String {
        r#"# DeepWiki Configuration
# Project settings in .deepwiki/config.toml override the global file.
# Environment: DEEPWIKI_GENERATION__MODEL=... or SERVER_BASE_URL=...

version = "1.0"

[backend]
base_url = "http://localhost:8001"
ws_enabled = true
connect_timeout_secs = 5
slide_connect_timeout_secs = 10

[generation]
concurrency = 3
language = "en"
comprehensive = true
# provider = "google"
# model = "gemini-2.5-flash"
excluded_dirs = []
excluded_files = []
branches = ["main", "master"]

[server]
bind = "127.0.0.1:3000"
"#
        .to_string()
    }
}
