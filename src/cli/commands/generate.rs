//! Generate Command
//!
//! Usage:
//!   deepwiki generate <repo> [--language ja] [--concise] [--force] [--output dir]

use std::path::{Path, PathBuf};

use tokio::runtime::Runtime;
use tracing::{info, warn};

use crate::cli::progress::{ConsoleRenderer, ProgressTracker};
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, ModelArgs, RepoArgs, output_path};
use crate::types::{PageStatus, Result, WikiError};
use crate::wiki::{GenerationRun, WikiGenerator, WikiRunReport};

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub repo: RepoArgs,
    pub models: ModelArgs,
    pub concurrency: Option<usize>,
    pub force: bool,
    pub output: Option<PathBuf>,
    pub auth_code: Option<String>,
}

pub fn run(
    ctx: CommandContext,
    options: GenerateOptions,
    out: &Output,
    quiet: bool,
) -> Result<()> {
    let mut ctx = ctx.with_repo_args(&options.repo).with_models(&options.models);
    if let Some(concurrency) = options.concurrency {
        if concurrency == 0 {
            return Err(WikiError::Config("--concurrency must be greater than 0".to_string()));
        }
        ctx.config.generation.concurrency = concurrency;
    }
    let repo = options.repo.spec()?;

    out.header(&format!("Generating wiki for {}", repo.key()));
    out.field("Language", ctx.language());
    out.field(
        "Mode",
        if ctx.comprehensive() { "comprehensive" } else { "concise" },
    );
    out.field("Concurrency", ctx.config.generation.concurrency);

    let rt = Runtime::new()?;
    let report = rt.block_on(async {
        match ctx.backend()?.authorize(options.auth_code.as_deref()).await {
            Err(err @ WikiError::Backend { status: 401, .. }) => return Err(err),
            Err(err) => warn!("Could not check authorization: {}", err),
            Ok(()) => {}
        }

        let generator = WikiGenerator::from_config(&ctx.config, &repo)?;
        let run = GenerationRun::new(repo.clone(), ctx.language(), ctx.comprehensive())
            .force(options.force);

        let tracker = ProgressTracker::new();
        let follower = if quiet {
            None
        } else {
            tracker.start();
            let follow = tracker.follow(generator.subscribe());
            let render = ConsoleRenderer::new(tracker.clone()).start_render_loop();
            Some((follow, render))
        };

        let result = generator.run(&run).await;

        tracker.stop();
        if let Some((follow, render)) = follower {
            follow.abort();
            let _ = render.await;
        }
        result
    })?;

    print_report(&report, out);

    if let Some(dir) = options.output {
        let written = write_pages(&report, &dir)?;
        info!("Wrote {} pages to {}", written, dir.display());
        out.saved(&format!("{} pages", written), &dir);
    }

    Ok(())
}

fn print_report(report: &WikiRunReport, out: &Output) {
    out.section(&report.structure.title);
    if !report.structure.description.is_empty() {
        out.info(&report.structure.description);
    }
    for page in report.ordered_pages() {
        if page.status == PageStatus::Error {
            out.error(&format!("{}: {}", page.plan.title, page.content));
        } else {
            out.success(&page.plan.title);
        }
    }

    out.field("Run", report.run_id.short());
    out.field("Pages", format!("{}/{}", report.completed, report.total));
    if report.from_cache {
        out.info("Loaded from cache (use --force to regenerate)");
    } else if report.failed.is_empty() {
        out.field("Cache", if report.cache_saved { "saved" } else { "not saved" });
    } else {
        out.warning(&format!(
            "{} pages failed; cache not saved. Re-run to retry.",
            report.failed.len()
        ));
    }
}

/// Write every generated page as `<id>.md`, returning the number written
pub fn write_pages(report: &WikiRunReport, dir: &Path) -> Result<usize> {
    let mut written = 0;
    for page in report.ordered_pages().filter(|p| p.status == PageStatus::Done) {
        let path = output_path(dir, &format!("{}.md", page.id()))?;
        std::fs::write(path, &page.content)?;
        written += 1;
    }
    Ok(written)
}
