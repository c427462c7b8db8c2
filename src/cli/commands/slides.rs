//! Slides Command
//!
//! Builds an HTML slide deck from the cached wiki of a repository.

use std::path::Path;

use tokio::runtime::Runtime;

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, ModelArgs, RepoArgs, output_path};
use crate::types::Result;
use crate::wiki::{SlideGenerator, SlideProgress, artifact_transport, find_cached_wiki};

pub fn run(
    ctx: CommandContext,
    args: &RepoArgs,
    models: &ModelArgs,
    output_dir: &Path,
    out: &Output,
) -> Result<()> {
    let ctx = ctx.with_repo_args(args).with_models(models);
    let repo = args.spec()?;
    out.header(&format!("Slides for {}", repo.key()));

    let rt = Runtime::new()?;
    let deck = rt.block_on(async {
        let backend = ctx.backend()?;
        let local = ctx.local_cache();
        let wiki = find_cached_wiki(&backend, local.as_ref(), &ctx.cache_query(&repo)).await?;

        let generator =
            SlideGenerator::new(artifact_transport(&ctx.config)?, ctx.config.generation.clone());
        generator
            .generate(&repo, &wiki, &ctx.language(), |progress| match progress {
                SlideProgress::Planned { total } => out.info(&format!("Planned {} slides", total)),
                SlideProgress::Started { number, total, title } => {
                    out.info(&format!("[{}/{}] {}", number, total, title))
                }
                SlideProgress::Finished { .. } => {}
            })
            .await
    })?;

    let templated = deck.slides.iter().filter(|s| s.templated).count();
    if templated > 0 {
        out.field("Templated", format!("{}/{}", templated, deck.slides.len()));
    }
    let path = output_path(output_dir, &deck.filename())?;
    std::fs::write(&path, deck.to_html())?;
    out.saved(&format!("{} slides", deck.slides.len()), &path);
    Ok(())
}
