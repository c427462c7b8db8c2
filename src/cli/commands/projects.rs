//! Projects Command
//!
//! Lists the projects the backend has processed, newest first.

use tokio::runtime::Runtime;

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::types::Result;

pub fn run(ctx: &CommandContext, format: &str, out: &Output) -> Result<()> {
    let rt = Runtime::new()?;
    let mut projects = rt.block_on(async { ctx.backend()?.processed_projects().await })?;
    projects.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&projects)?);
        return Ok(());
    }

    if projects.is_empty() {
        out.info("No processed projects");
        return Ok(());
    }

    out.section("Processed Projects");
    for project in &projects {
        let submitted = chrono::DateTime::from_timestamp_millis(project.submitted_at)
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_default();
        println!(
            "  {:<40} {:<10} {:<4} {}",
            project.name, project.repo_type, project.language, submitted
        );
    }
    Ok(())
}
