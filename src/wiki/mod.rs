//! Wiki Generation
//!
//! Streaming, bounded-concurrency generation of a repository wiki and the
//! artifacts derived from it.
//!
//! ## Pipeline
//!
//! ```text
//! cache probe → repository metadata → structure plan → pages (≤ N at once)
//!                                                            ↓
//!                                        backend cache + local cache
//! ```
//!
//! Slides, workshops and research all start from a cached wiki condensed
//! into a [`digest`](digest::build_digest).

pub mod cache;
pub mod digest;
pub mod orchestrator;
pub mod prompts;
pub mod research;
pub mod slides;
pub mod store;
pub mod workshop;

pub use cache::{CacheMetadata, CacheStats, LocalCache, LocalCacheEntry};
pub use digest::build_digest;
pub use orchestrator::{GenerationRun, RunEvent, RunPhase, WikiGenerator, WikiRunReport};
pub use research::{ResearchOutcome, ResearchProgress, ResearchReport, Researcher};
pub use slides::{Slide, SlideDeck, SlideGenerator, SlideProgress};
pub use store::PageStore;
pub use workshop::{Workshop, WorkshopGenerator};

use tracing::warn;

use crate::backend::{BackendClient, CacheQuery, CachedWiki};
use crate::config::Config;
use crate::transport::{EndpointConfig, SharedTransport, TimeoutConfig, TransportFactory};
use crate::types::{Result, WikiError};

/// Transport for slide, workshop and research calls (longer socket open timeout)
pub fn artifact_transport(config: &Config) -> Result<SharedTransport> {
    let connect_timeout = TimeoutConfig::from(&config.backend).slide_connect;
    let endpoint = EndpointConfig::from_backend(&config.backend, connect_timeout);
    Ok(TransportFactory::build(
        &endpoint,
        TransportFactory::streaming_client(connect_timeout)?,
    ))
}

/// Cached wiki from the backend, falling back to the local cache
pub async fn find_cached_wiki(
    backend: &BackendClient,
    local: Option<&LocalCache>,
    query: &CacheQuery,
) -> Result<CachedWiki> {
    match backend.get_cached_wiki(query).await {
        Ok(Some(wiki)) if wiki.is_usable() => return Ok(wiki),
        Ok(_) => {}
        Err(err) => warn!("Backend cache unavailable: {}", err),
    }

    if let Some(cache) = local
        && let Some(entry) = cache.load(query).await?
        && entry.wiki.is_usable()
    {
        return Ok(entry.wiki);
    }

    Err(WikiError::Cache(format!(
        "No cached wiki for {}/{} ({}). Run `deepwiki generate` first.",
        query.owner, query.repo, query.language
    )))
}
