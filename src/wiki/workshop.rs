//! Hands-on workshop built from a cached wiki.

use tracing::{info, instrument};

use super::digest::build_digest;
use super::prompts;
use crate::backend::CachedWiki;
use crate::config::GenerationConfig;
use crate::extract::clean_markdown_fence;
use crate::transport::{ChatRequest, SharedTransport, collect_stream};
use crate::types::{Language, RepositorySpec, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workshop {
    pub repo: String,
    pub markdown: String,
}

impl Workshop {
    pub fn filename(&self) -> String {
        format!("{}_workshop.md", self.repo)
    }
}

pub struct WorkshopGenerator {
    transport: SharedTransport,
    generation: GenerationConfig,
}

impl WorkshopGenerator {
    pub fn new(transport: SharedTransport, generation: GenerationConfig) -> Self {
        Self {
            transport,
            generation,
        }
    }

    /// One call over the wiki digest; `on_chunk` sees the raw stream
    #[instrument(skip_all, fields(repo = %repo.key()))]
    pub async fn generate<F>(
        &self,
        repo: &RepositorySpec,
        wiki: &CachedWiki,
        language: &Language,
        on_chunk: F,
    ) -> Result<Workshop>
    where
        F: FnMut(&str),
    {
        let digest = build_digest(wiki);
        let request = ChatRequest::new(repo, prompts::workshop_prompt(repo, &digest, language))
            .with_generation(&self.generation, language);

        let stream = self.transport.send(&request).await?;
        let text = collect_stream(stream, on_chunk).await.into_result()?;
        let markdown = clean_markdown_fence(&text);
        info!("Workshop generated: {} chars", markdown.chars().count());

        Ok(Workshop {
            repo: repo.repo.clone(),
            markdown,
        })
    }
}
