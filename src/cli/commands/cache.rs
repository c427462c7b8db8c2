//! Cache Command
//!
//! Inspects and clears the local wiki cache; `delete` also removes the
//! backend's cache entry for a repository.
//!
//! Usage:
//!   deepwiki cache list
//!   deepwiki cache stats
//!   deepwiki cache clear
//!   deepwiki cache delete <repo> [--language ja] [--concise]

use tokio::runtime::Runtime;
use tracing::warn;

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, RepoArgs};
use crate::types::{Result, WikiError};
use crate::wiki::LocalCache;

fn require_cache(ctx: &CommandContext) -> Result<LocalCache> {
    ctx.local_cache().ok_or_else(|| {
        WikiError::Config("Local cache is disabled (cache.enabled = false)".to_string())
    })
}

pub fn list(ctx: &CommandContext, out: &Output) -> Result<()> {
    let cache = require_cache(ctx)?;
    let rt = Runtime::new()?;
    let entries = rt.block_on(cache.list_entries())?;

    if entries.is_empty() {
        out.info("No cache entries");
        return Ok(());
    }

    out.section("Wiki Cache Entries");
    for entry in &entries {
        println!(
            "  {}/{} ({} pages, {} bytes)",
            entry.owner, entry.repo, entry.page_count, entry.size_bytes
        );
        println!("    Key:     {}", entry.key);
        println!(
            "    Created: {}",
            entry.created_at.format("%Y-%m-%d %H:%M UTC")
        );
    }
    Ok(())
}

pub fn stats(ctx: &CommandContext, out: &Output) -> Result<()> {
    let cache = require_cache(ctx)?;
    let rt = Runtime::new()?;
    let stats = rt.block_on(cache.stats())?;

    out.section("Wiki Cache");
    out.field("Directory", cache.dir().display());
    out.field("Entries", stats.entry_count);
    out.field("Pages", stats.total_pages);
    out.field("Size", format!("{} bytes", stats.total_size_bytes));
    if let Some(oldest) = stats.oldest_entry {
        out.field("Oldest", oldest.format("%Y-%m-%d %H:%M UTC"));
    }
    if let Some(newest) = stats.newest_entry {
        out.field("Newest", newest.format("%Y-%m-%d %H:%M UTC"));
    }
    Ok(())
}

pub fn clear(ctx: &CommandContext, out: &Output) -> Result<()> {
    let cache = require_cache(ctx)?;
    let rt = Runtime::new()?;
    let cleared = rt.block_on(cache.clear_all())?;

    if cleared > 0 {
        out.success(&format!("Cleared {} wiki cache entries", cleared));
    } else {
        out.info("No cache entries to clear");
    }
    Ok(())
}

/// Remove one wiki from the backend cache and the local cache
pub fn delete(ctx: CommandContext, args: &RepoArgs, out: &Output) -> Result<()> {
    let ctx = ctx.with_repo_args(args);
    let repo = args.spec()?;
    let query = ctx.cache_query(&repo);

    let rt = Runtime::new()?;
    rt.block_on(async {
        match ctx.backend()?.delete_cached_wiki(&query).await {
            Ok(()) => out.success("Deleted backend cache entry"),
            Err(err) => {
                warn!("Backend cache delete failed: {}", err);
                out.warning(&format!("Backend cache entry not deleted: {}", err));
            }
        }

        if let Some(cache) = ctx.local_cache() {
            if cache.invalidate(&query).await? {
                out.success("Deleted local cache entry");
            } else {
                out.info("No local cache entry");
            }
        }
        Ok(())
    })
}
