//! Config Command
//!
//! Usage:
//!   deepwiki config show [-g] [-f json|yaml|toml]
//!   deepwiki config path
//!   deepwiki config init [-g] [--force]

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::config::ConfigLoader;
use crate::types::Result;

/// Show the effective configuration, or the raw global file with `global`
pub fn show(ctx: &CommandContext, global: bool, format: &str, out: &Output) -> Result<()> {
    if !global {
        println!("{}", ConfigLoader::render_config(&ctx.config, format)?);
        return Ok(());
    }

    match ConfigLoader::global_config_path() {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(&path)?;
            out.info(&format!("Global config: {}", path.display()));
            println!("{}", content);
        }
        Some(_) => {
            out.warning("No global config found.");
            out.info("Run 'deepwiki config init --global' to create one.");
        }
        None => out.error("Cannot determine global config directory."),
    }
    Ok(())
}

pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

pub fn init(global: bool, force: bool, out: &Output) -> Result<()> {
    if global {
        let dir = ConfigLoader::init_global(force)?;
        out.success("Initialized global configuration");
        out.field("Directory", dir.display());
        if let Some(config_path) = ConfigLoader::global_config_path() {
            out.field("Config", config_path.display());
        }
    } else {
        let dir = ConfigLoader::init_project(force)?;
        out.success("Initialized project configuration");
        out.field("Directory", dir.display());
        out.field("Config", ConfigLoader::project_config_path().display());
    }
    Ok(())
}
