//! lns CLI
//!
//! Command-line interface for reconciling declared symlink sets.

mod commands;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::LevelFilter;

use lns::{Config, PathResolver, Reconciler, RunStatus, SyncOptions};

use commands::status::{StatusArgs, run_status};

#[derive(Parser)]
#[command(name = "lns")]
#[command(
    author,
    version,
    about = "Maintain a declared set of symbolic links in a directory"
)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (default: ~/.lnsconfig.toml)
    #[arg(short, long, global = true, env = "LNS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create missing links and remove stray ones (default)
    Apply(ApplyArgs),

    /// Show what apply would change, without changing anything
    Status(StatusArgs),
}

#[derive(Args, Debug, Default)]
struct ApplyArgs {
    /// Show what would be done without making changes
    #[arg(short, long)]
    dry_run: bool,

    /// Show detailed output
    #[arg(short, long)]
    verbose: bool,

    /// Only process these apps (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    apps: Option<Vec<String>>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()
            .context("Could not determine home directory; pass --config")?,
    };

    match cli.command.unwrap_or_else(|| Commands::Apply(ApplyArgs::default())) {
        Commands::Apply(args) => {
            init_tracing(args.verbose);
            run_apply(args, &config_path)
        }
        Commands::Status(args) => {
            init_tracing(false);
            run_status(args, &config_path)
        }
    }
}

fn run_apply(args: ApplyArgs, config_path: &Path) -> Result<()> {
    if args.verbose {
        println!(
            "Using config: {}",
            config_path.display().to_string().dimmed()
        );
    }

    let config = Config::load(config_path)?;
    let resolver = PathResolver::from_config_path(config_path);

    let options = SyncOptions {
        dry_run: args.dry_run,
        verbose: args.verbose,
        quiet: false,
        apps: args.apps,
    };
    let report = Reconciler::new(options).run_config(&config, &resolver);

    let (created, removed, unchanged) = report.totals();
    let warnings = report.warnings.len()
        + report.reports().map(|r| r.warnings.len()).sum::<usize>();
    let failed = report.failures().count();

    println!("\n{}", "✨ Sync complete!".green().bold());
    println!(
        "  Created: {}, Removed: {}, Unchanged: {}, Warnings: {}, Failed: {}",
        created.to_string().green(),
        removed.to_string().yellow(),
        unchanged.to_string().dimmed(),
        if warnings > 0 {
            warnings.to_string().yellow()
        } else {
            warnings.to_string().dimmed()
        },
        if failed > 0 {
            failed.to_string().red()
        } else {
            failed.to_string().dimmed()
        }
    );

    if report.status() == RunStatus::Failed {
        std::process::exit(2);
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
