#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use cmd::CommandContext;
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use runway_core::config::resolve_config;
use runway_core::error::ErrorCode;
use runway_core::timing;
use std::env;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "runway: resolve free-text queries to airports",
    long_about = None
)]
struct Cli {
    /// Enable verbose (debug) logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit command timing report to stderr.
    #[arg(long, global = true)]
    timing: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Catalog database path (default: .runway/catalog.db).
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(next_help_heading = "Search")]
    Search(cmd::search::SearchArgs),

    #[command(next_help_heading = "Catalog")]
    Import(cmd::import::ImportArgs),

    #[command(next_help_heading = "Catalog")]
    Index(cmd::index::IndexArgs),

    #[command(next_help_heading = "Catalog")]
    Stats(cmd::stats::StatsArgs),

    #[command(
        next_help_heading = "Shell",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    # Bash\n    runway completions bash > ~/.local/share/bash-completion/completions/runway\n\n\
                      # Zsh\n    runway completions zsh > ~/.zfunc/_runway"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("RUNWAY_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "runway=debug,info"
        } else {
            "runway=info,warn"
        })
    });

    let format = env::var("RUNWAY_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn build_context(cli: &Cli) -> anyhow::Result<CommandContext> {
    let project_root = env::current_dir()?;
    let effective = match resolve_config(&project_root, cli.json) {
        Ok(effective) => effective,
        Err(err) => {
            let mode = cli
                .format
                .unwrap_or(if cli.json { OutputMode::Json } else { OutputMode::Text });
            render_error(
                mode,
                &CliError::from_code(ErrorCode::ConfigParseError, format!("{err:#}")),
            )?;
            return Err(err);
        }
    };

    let output = resolve_output_mode(cli.format, &effective.resolved_output);
    let db_path = cli.db.clone().map_or_else(
        || effective.project.catalog.resolve_path(&project_root),
        |path| {
            if path.is_absolute() {
                path
            } else {
                project_root.join(path)
            }
        },
    );
    debug!(db = %db_path.display(), ?output, "resolved context");

    Ok(CommandContext {
        config: effective.project,
        db_path,
        output,
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let timing_enabled = cli.timing || timing::timing_enabled_from_env();
    timing::set_timing_enabled(timing_enabled);
    timing::clear_timings();

    let command_result = match cli.command {
        Commands::Completions(ref args) => timing::timed("cmd.completions", || {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }),
        ref command => build_context(&cli).and_then(|ctx| match command {
            Commands::Search(args) => {
                timing::timed("cmd.search", || cmd::search::run_search(args, &ctx))
            }
            Commands::Import(args) => {
                timing::timed("cmd.import", || cmd::import::run_import(args, &ctx))
            }
            Commands::Index(args) => {
                timing::timed("cmd.index", || cmd::index::run_index(args, &ctx))
            }
            Commands::Stats(args) => {
                timing::timed("cmd.stats", || cmd::stats::run_stats(args, &ctx))
            }
            Commands::Completions(_) => Ok(()),
        }),
    };

    if timing_enabled {
        let report = timing::collect_report();
        if report.is_empty() {
            eprintln!("timing report: no samples recorded");
        } else {
            eprintln!("timing report:");
            eprintln!("{}", report.display_table());
            eprintln!("timing report (json):");
            eprintln!("{}", serde_json::to_string_pretty(&report.to_json())?);
        }
    }

    command_result
}
