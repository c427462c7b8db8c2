//! deepwiki - client for an AI-driven repository wiki backend
//!
//! Plans a wiki for a code repository, generates its pages with bounded
//! concurrency over a streaming chat backend, caches the result, and derives
//! slide decks, workshops and research answers from the cached wiki.
//!
//! ## Quick Start
//!
//! ```ignore
//! use deepwiki::{ConfigLoader, GenerationRun, Language, RepositorySpec, WikiGenerator};
//!
//! let config = ConfigLoader::load()?;
//! let repo = RepositorySpec::parse("octo/engine")?;
//! let generator = WikiGenerator::from_config(&config, &repo)?;
//! let language = Language::new(config.generation.language.clone());
//! let run = GenerationRun::new(repo, language, true);
//! let report = generator.run(&run).await?;
//! ```
//!
//! ## Modules
//!
//! - [`transport`]: WebSocket-first chat streaming with HTTP fallback
//! - [`extract`]: loose parsing of model output
//! - [`queue`]: bounded task queue for page generation
//! - [`host`]: GitHub, GitLab, Bitbucket and local repository metadata
//! - [`backend`]: cache, export, project and model endpoints
//! - [`wiki`]: generation runs and derived artifacts
//! - [`server`]: HTTP proxy in front of the backend

pub mod backend;
pub mod cli;
pub mod config;
pub mod constants;
pub mod extract;
pub mod host;
pub mod queue;
pub mod server;
pub mod transport;
pub mod types;
pub mod wiki;

#[cfg(test)]
pub(crate) mod test_support;

// =============================================================================
// Core Re-exports
// =============================================================================

pub use config::{Config, ConfigLoader};
pub use types::{
    ErrorCategory, HostType, Language, RepositorySpec, Result, ResultExt, RunId, WikiError,
};

// =============================================================================
// Generation Re-exports
// =============================================================================

pub use backend::{BackendClient, CacheQuery, CachedWiki};
pub use transport::{ChatRequest, SharedTransport, Transport, TransportFactory};
pub use wiki::{
    GenerationRun, LocalCache, Researcher, RunEvent, RunPhase, SlideGenerator, WikiGenerator,
    WikiRunReport, WorkshopGenerator,
};
