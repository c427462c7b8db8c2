//! Configuration Management
//!
//! Unified configuration system with hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/deepwiki/config.toml)
//! 3. Project config (.deepwiki/config.toml)
//! 4. Environment variables (DEEPWIKI_*, SERVER_BASE_URL)
//! 5. CLI arguments (highest priority)

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::*;
