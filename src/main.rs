use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deepwiki::WikiError;
use deepwiki::backend::ExportFormat;
use deepwiki::cli::commands;
use deepwiki::cli::commands::generate::GenerateOptions;
use deepwiki::cli::ui::Output;
use deepwiki::cli::{CommandContext, ModelArgs, RepoArgs};

/// Parse export format from string
fn parse_export_format(s: &str) -> Result<ExportFormat, String> {
    s.parse()
}

#[derive(Parser)]
#[command(name = "deepwiki")]
#[command(
    version,
    about = "Generate, cache and export AI-written wikis for code repositories"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(
        long,
        short,
        global = true,
        help = "Project config file (default: .deepwiki/config.toml)"
    )]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a wiki for a repository
    Generate {
        #[command(flatten)]
        repo: RepoArgs,
        #[command(flatten)]
        models: ModelArgs,
        #[arg(long, help = "Maximum pages generated at once")]
        concurrency: Option<usize>,
        #[arg(long, help = "Ignore and replace any cached wiki")]
        force: bool,
        #[arg(long, short, help = "Write each page to <dir>/<page-id>.md")]
        output: Option<PathBuf>,
        #[arg(
            long,
            env = "DEEPWIKI_AUTH_CODE",
            hide_env_values = true,
            help = "Authorization code when the backend requires one"
        )]
        auth_code: Option<String>,
    },

    /// Build an HTML slide deck from a cached wiki
    Slides {
        #[command(flatten)]
        repo: RepoArgs,
        #[command(flatten)]
        models: ModelArgs,
        #[arg(long, short, default_value = ".", help = "Output directory")]
        output: PathBuf,
    },

    /// Build a Markdown workshop from a cached wiki
    Workshop {
        #[command(flatten)]
        repo: RepoArgs,
        #[command(flatten)]
        models: ModelArgs,
        #[arg(long, short, default_value = ".", help = "Output directory")]
        output: PathBuf,
    },

    /// Ask a question about a repository
    Research {
        #[command(flatten)]
        repo: RepoArgs,
        #[command(flatten)]
        models: ModelArgs,
        #[arg(long, short = 'Q', help = "Question to ask")]
        question: String,
        #[arg(long, help = "Run the multi-turn deep research loop")]
        deep: bool,
    },

    /// Export a cached wiki through the backend
    Export {
        #[command(flatten)]
        repo: RepoArgs,
        #[arg(
            long,
            short = 'f',
            default_value = "markdown",
            value_parser = parse_export_format,
            help = "Export format: markdown, json"
        )]
        format: ExportFormat,
        #[arg(long, short, default_value = ".", help = "Output directory")]
        output: PathBuf,
    },

    /// Manage the wiki cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// List projects processed by the backend
    Projects {
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// Run the HTTP proxy in front of the backend
    Serve {
        #[arg(long, help = "Bind address (default from config)")]
        bind: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List local cache entries
    List,
    /// Show local cache statistics
    Stats,
    /// Remove every local cache entry
    Clear,
    /// Remove one repository's wiki from the backend and local caches
    Delete {
        #[command(flatten)]
        repo: RepoArgs,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'g', long, help = "Show global config file only")]
        global: bool,
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json, yaml"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mdeepwiki encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Backtrace with RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<WikiError>() {
                Some(err) => {
                    eprintln!("\x1b[31mError [{}]:\x1b[0m {}", err.category(), err);
                    if !err.is_phase_fatal() {
                        eprintln!("\x1b[90mNothing is retried automatically; run the command again to retry.\x1b[0m");
                    }
                }
                None => eprintln!("\x1b[31mError:\x1b[0m {}", e),
            }
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let out = Output::new().quiet(cli.quiet);

    // Init and path work without a loadable config
    if let Commands::Config { action } = &cli.command {
        match action {
            ConfigAction::Path => return Ok(commands::config::path()?),
            ConfigAction::Init { global, force } => {
                return Ok(commands::config::init(*global, *force, &out)?);
            }
            ConfigAction::Show { .. } => {}
        }
    }

    let ctx = CommandContext::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate {
            repo,
            models,
            concurrency,
            force,
            output,
            auth_code,
        } => {
            commands::generate::run(
                ctx,
                GenerateOptions {
                    repo,
                    models,
                    concurrency,
                    force,
                    output,
                    auth_code,
                },
                &out,
                cli.quiet,
            )?;
        }
        Commands::Slides {
            repo,
            models,
            output,
        } => {
            commands::slides::run(ctx, &repo, &models, &output, &out)?;
        }
        Commands::Workshop {
            repo,
            models,
            output,
        } => {
            commands::workshop::run(ctx, &repo, &models, &output, &out)?;
        }
        Commands::Research {
            repo,
            models,
            question,
            deep,
        } => {
            commands::research::run(ctx, &repo, &models, &question, deep, &out)?;
        }
        Commands::Export {
            repo,
            format,
            output,
        } => {
            commands::export::run(ctx, &repo, format, &output, &out)?;
        }
        Commands::Cache { action } => match action {
            CacheAction::List => commands::cache::list(&ctx, &out)?,
            CacheAction::Stats => commands::cache::stats(&ctx, &out)?,
            CacheAction::Clear => commands::cache::clear(&ctx, &out)?,
            CacheAction::Delete { repo } => commands::cache::delete(ctx, &repo, &out)?,
        },
        Commands::Projects { format } => {
            commands::projects::run(&ctx, &format, &out)?;
        }
        Commands::Serve { bind } => {
            commands::serve::run(ctx, bind, &out)?;
        }
        Commands::Config { action } => {
            if let ConfigAction::Show { global, format } = action {
                commands::config::show(&ctx, global, &format, &out)?;
            }
        }
    }

    Ok(())
}
