//! Workshop Command
//!
//! Builds a hands-on Markdown workshop from the cached wiki of a repository.

use std::path::Path;

use tokio::runtime::Runtime;
use tracing::debug;

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, ModelArgs, RepoArgs, output_path};
use crate::types::{Result, WikiError};
use crate::wiki::{WorkshopGenerator, artifact_transport, find_cached_wiki};

pub fn run(
    ctx: CommandContext,
    args: &RepoArgs,
    models: &ModelArgs,
    output_dir: &Path,
    out: &Output,
) -> Result<()> {
    let ctx = ctx.with_repo_args(args).with_models(models);
    let repo = args.spec()?;
    out.header(&format!("Workshop for {}", repo.key()));

    let rt = Runtime::new()?;
    let workshop = rt.block_on(async {
        let backend = ctx.backend()?;
        let local = ctx.local_cache();
        let wiki = find_cached_wiki(&backend, local.as_ref(), &ctx.cache_query(&repo)).await?;

        let generator =
            WorkshopGenerator::new(artifact_transport(&ctx.config)?, ctx.config.generation.clone());
        let mut received = 0usize;
        let workshop = generator
            .generate(&repo, &wiki, &ctx.language(), |chunk| received += chunk.len())
            .await?;
        debug!("Workshop stream: {} bytes", received);
        Ok::<_, WikiError>(workshop)
    })?;

    let path = output_path(output_dir, &workshop.filename())?;
    std::fs::write(&path, &workshop.markdown)?;
    out.saved("Workshop", &path);
    Ok(())
}
