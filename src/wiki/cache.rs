//! Local Wiki Cache
//!
//! Completed runs written to disk as JSON, one file per cache key, so a
//! wiki can be shown, exported or turned into slides without the backend
//! cache.
//!
//! ## Cache Keys
//!
//! `deepwiki_cache_<type>_<owner>_<repo>_<language>_<comprehensive|concise>`,
//! the same identity the backend cache uses.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::backend::{CacheQuery, CachedWiki};
use crate::constants::cache::KEY_PREFIX;
use crate::types::{Result, ResultExt};

/// Cache entry metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub key: String,
    pub owner: String,
    pub repo: String,
    pub created_at: DateTime<Utc>,
    pub page_count: usize,
    /// Total content size in bytes
    pub size_bytes: usize,
    /// SHA-256 of all page contents in id order
    pub content_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalCacheEntry {
    pub metadata: CacheMetadata,
    pub wiki: CachedWiki,
}

/// On-disk cache of completed wikis
#[derive(Debug, Clone)]
pub struct LocalCache {
    dir: PathBuf,
}

impl LocalCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    pub fn cache_key(query: &CacheQuery) -> String {
        format!(
            "{}_{}_{}_{}_{}_{}",
            KEY_PREFIX,
            query.repo_type,
            query.owner,
            query.repo,
            query.language,
            if query.comprehensive {
                "comprehensive"
            } else {
                "concise"
            }
        )
    }

    fn cache_path(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", file))
    }

    pub async fn load(&self, query: &CacheQuery) -> Result<Option<LocalCacheEntry>> {
        let key = Self::cache_key(query);
        let path = self.cache_path(&key);

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let entry: LocalCacheEntry = serde_json::from_str(&content)
                    .with_context_fn(|| format!("Cache parse error ({})", key))?;
                debug!("Loaded cache '{}' with {} pages", key, entry.metadata.page_count);
                Ok(Some(entry))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, wiki: &CachedWiki) -> Result<LocalCacheEntry> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let query = CacheQuery {
            owner: wiki.owner.clone(),
            repo: wiki.repo.clone(),
            repo_type: wiki.repo_type.clone(),
            language: wiki.language.clone(),
            comprehensive: wiki.comprehensive,
            provider: None,
            model: None,
            custom_model: None,
        };
        let key = Self::cache_key(&query);
        let entry = LocalCacheEntry {
            metadata: CacheMetadata {
                key: key.clone(),
                owner: wiki.owner.clone(),
                repo: wiki.repo.clone(),
                created_at: Utc::now(),
                page_count: wiki.generated_pages.len(),
                size_bytes: wiki.generated_pages.values().map(|p| p.content.len()).sum(),
                content_hash: content_hash(wiki),
            },
            wiki: wiki.clone(),
        };

        let path = self.cache_path(&key);
        let content = serde_json::to_string_pretty(&entry)?;
        tokio::fs::write(&path, &content).await?;

        info!(
            "Saved cache '{}' ({} pages, {} bytes)",
            key,
            entry.metadata.page_count,
            content.len()
        );
        Ok(entry)
    }

    pub async fn invalidate(&self, query: &CacheQuery) -> Result<bool> {
        let key = Self::cache_key(query);
        match tokio::fs::remove_file(self.cache_path(&key)).await {
            Ok(()) => {
                info!("Invalidated cache '{}'", key);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn clear_all(&self) -> Result<usize> {
        let mut count = 0;

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                tokio::fs::remove_file(&path).await?;
                count += 1;
            }
        }

        info!("Cleared {} cache entries", count);
        Ok(count)
    }

    /// Metadata of every readable entry, newest first
    pub async fn list_entries(&self) -> Result<Vec<CacheMetadata>> {
        let mut entries = Vec::new();

        let mut dir_entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = dir_entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json")
                && let Ok(content) = tokio::fs::read_to_string(&path).await
                && let Ok(cache_entry) = serde_json::from_str::<LocalCacheEntry>(&content)
            {
                entries.push(cache_entry.metadata);
            }
        }

        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        let entries = self.list_entries().await?;

        Ok(CacheStats {
            entry_count: entries.len(),
            total_pages: entries.iter().map(|e| e.page_count).sum(),
            total_size_bytes: entries.iter().map(|e| e.size_bytes).sum(),
            oldest_entry: entries.last().map(|e| e.created_at),
            newest_entry: entries.first().map(|e| e.created_at),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entry_count: usize,
    pub total_pages: usize,
    pub total_size_bytes: usize,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}

fn content_hash(wiki: &CachedWiki) -> String {
    let mut ids: Vec<&String> = wiki.generated_pages.keys().collect();
    ids.sort();

    let mut hasher = Sha256::new();
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update([0]);
        hasher.update(wiki.content(id).as_bytes());
        hasher.update([0]);
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        GeneratedPage, HostType, Importance, Language, PageMap, PagePlan, PageStatus,
        RepositorySpec, StructurePlan,
    };
    use tempfile::TempDir;

    fn query(comprehensive: bool) -> CacheQuery {
        let repo = RepositorySpec::new("octo", "engine", HostType::Github);
        CacheQuery::new(&repo, &Language::new("ja"), comprehensive)
    }

    fn wiki(content: &str) -> CachedWiki {
        let plan = PagePlan {
            id: "page-1".into(),
            title: "Overview".into(),
            importance: Importance::High,
            file_paths: vec![],
            related_pages: vec![],
        };
        let mut pages = PageMap::new();
        pages.insert(
            "page-1".into(),
            GeneratedPage {
                plan: plan.clone(),
                content: content.into(),
                status: PageStatus::Done,
            },
        );
        let structure = StructurePlan {
            title: "Engine".into(),
            description: "d".into(),
            pages: vec![plan],
            ..Default::default()
        };
        CachedWiki::new(&query(true), structure, pages)
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(
            LocalCache::cache_key(&query(true)),
            "deepwiki_cache_github_octo_engine_ja_comprehensive"
        );
        assert_eq!(
            LocalCache::cache_key(&query(false)),
            "deepwiki_cache_github_octo_engine_ja_concise"
        );
    }

    #[test]
    fn test_content_hash_tracks_content() {
        assert_eq!(content_hash(&wiki("# A")), content_hash(&wiki("# A")));
        assert_ne!(content_hash(&wiki("# A")), content_hash(&wiki("# B")));
        assert_eq!(content_hash(&wiki("# A")).len(), 64);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let cache = LocalCache::new(temp_dir.path());

        let entry = cache.save(&wiki("# Overview")).await.unwrap();
        assert_eq!(entry.metadata.page_count, 1);
        assert_eq!(entry.metadata.size_bytes, 10);

        let loaded = cache.load(&query(true)).await.unwrap().unwrap();
        assert_eq!(loaded.wiki.content("page-1"), "# Overview");
        assert!(cache.load(&query(false)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_cache_error() {
        let temp_dir = TempDir::new().unwrap();
        let cache = LocalCache::new(temp_dir.path());
        let key = LocalCache::cache_key(&query(true));
        std::fs::write(cache.cache_path(&key), "{ not json").unwrap();

        let err = cache.load(&query(true)).await.unwrap_err();
        assert!(matches!(err, crate::types::WikiError::Cache(_)));
        assert!(err.to_string().contains("Cache parse error"));
        assert!(cache.list_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let temp_dir = TempDir::new().unwrap();
        let cache = LocalCache::new(temp_dir.path().join("nested"));

        assert_eq!(cache.clear_all().await.unwrap(), 0);
        cache.save(&wiki("x")).await.unwrap();
        assert_eq!(cache.list_entries().await.unwrap().len(), 1);
        assert_eq!(cache.stats().await.unwrap().total_pages, 1);

        assert!(cache.invalidate(&query(true)).await.unwrap());
        assert!(!cache.invalidate(&query(true)).await.unwrap());

        cache.save(&wiki("y")).await.unwrap();
        assert_eq!(cache.clear_all().await.unwrap(), 1);
        assert!(cache.list_entries().await.unwrap().is_empty());
    }
}
