//! Export Command
//!
//! Exports the cached wiki of a repository as Markdown or JSON through the
//! backend export endpoint.

use std::path::Path;

use tokio::runtime::Runtime;

use crate::backend::{ExportFormat, ExportRequest};
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, RepoArgs, output_path};
use crate::types::Result;
use crate::wiki::find_cached_wiki;

pub fn run(
    ctx: CommandContext,
    args: &RepoArgs,
    format: ExportFormat,
    output_dir: &Path,
    out: &Output,
) -> Result<()> {
    let ctx = ctx.with_repo_args(args);
    let repo = args.spec()?;

    let rt = Runtime::new()?;
    let file = rt.block_on(async {
        let backend = ctx.backend()?;
        let local = ctx.local_cache();
        let wiki = find_cached_wiki(&backend, local.as_ref(), &ctx.cache_query(&repo)).await?;
        let request = ExportRequest::new(&repo, &wiki.wiki_structure, &wiki.generated_pages, format);
        backend.export(&request, &repo.repo).await
    })?;

    let path = output_path(output_dir, &file.filename)?;
    std::fs::write(&path, &file.bytes)?;
    out.saved("Export", &path);
    Ok(())
}
