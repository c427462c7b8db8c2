//! Research Command
//!
//! Asks a question about a repository, either once or as a multi-turn deep
//! research loop, streaming the reply to stdout.

use std::io::Write;

use console::style;
use tokio::runtime::Runtime;

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, ModelArgs, RepoArgs};
use crate::types::Result;
use crate::wiki::{ResearchOutcome, ResearchProgress, Researcher, artifact_transport};

pub fn run(
    ctx: CommandContext,
    args: &RepoArgs,
    models: &ModelArgs,
    question: &str,
    deep: bool,
    out: &Output,
) -> Result<()> {
    let ctx = ctx.with_repo_args(args).with_models(models);
    let repo = args.spec()?;

    let rt = Runtime::new()?;
    let report = rt.block_on(async {
        let researcher = Researcher::new(artifact_transport(&ctx.config)?, ctx.config.generation.clone());
        let mut stdout = std::io::stdout();
        let on_progress = |progress: ResearchProgress<'_>| match progress {
            ResearchProgress::Iteration(n) => {
                println!("\n{}", style(format!("── Iteration {} ──", n)).dim());
            }
            ResearchProgress::Chunk(chunk) => {
                let _ = write!(stdout, "{}", chunk);
                let _ = stdout.flush();
            }
            ResearchProgress::Stage(stage) => tracing::debug!("Stage: {}", stage.title),
        };
        if deep {
            researcher.research(&repo, &ctx.language(), question, on_progress).await
        } else {
            researcher.ask(&repo, &ctx.language(), question, on_progress).await
        }
    })?;
    println!();

    match report.outcome {
        ResearchOutcome::Concluded => {
            out.success(&format!("Concluded after {} iterations", report.iterations))
        }
        ResearchOutcome::Forced => {
            out.warning(&format!("Stopped after {} iterations", report.iterations))
        }
        ResearchOutcome::Interrupted => out.error("Research was interrupted"),
        ResearchOutcome::Answered => {}
    }
    if report.outcome == ResearchOutcome::Forced || report.outcome == ResearchOutcome::Interrupted {
        // The appended note never went through the stream
        if let Some(note) = report.final_response.lines().last() {
            out.info(note);
        }
    }
    for stage in &report.stages {
        out.field(&format!("Stage {}", stage.iteration), &stage.title);
    }
    Ok(())
}
