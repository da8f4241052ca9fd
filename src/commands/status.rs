use anyhow::Result;
use clap::Args;
use colored::Colorize;
use lns::{Config, PathResolver, Reconciler, RunReport, SyncOptions, Warning};
use serde::Serialize;
use std::path::Path;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only check these apps (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub apps: Option<Vec<String>>,

    /// Output machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize, Debug)]
pub(crate) struct StatusEntry {
    pub app: String,
    pub state: AppState,
    pub would_create: Vec<String>,
    pub would_remove: Vec<String>,
    pub warnings: Vec<Warning>,
    pub error: Option<String>,
}

/// JSON document printed by `status --json`
#[derive(Serialize, Debug)]
pub(crate) struct StatusOutput<'a> {
    /// Problems with apps that never ran, such as malformed entries
    pub warnings: &'a [Warning],
    pub apps: &'a [StatusEntry],
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum AppState {
    Ok,
    Drift,
    Failed,
}

pub fn run_status(args: StatusArgs, config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let resolver = PathResolver::from_config_path(config_path);

    let options = SyncOptions {
        dry_run: true,
        verbose: false,
        quiet: true,
        apps: args.apps,
    };
    let report = Reconciler::new(options).run_config(&config, &resolver);
    let entries = status_entries(&report);

    if args.json {
        let output = StatusOutput {
            warnings: &report.warnings,
            apps: &entries,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for warning in &report.warnings {
            println!("{} {}", "!".yellow(), warning);
        }
        for e in &entries {
            print_entry(e);
        }
    }

    let drift = entries.iter().filter(|e| e.state == AppState::Drift).count();
    let failed = entries.iter().filter(|e| e.state == AppState::Failed).count();

    if !args.json {
        if drift + failed > 0 {
            println!(
                "\nStatus: {} app(s) out of sync, {} failed",
                drift, failed
            );
        } else {
            println!("\nStatus: All good");
        }
    }

    if failed > 0 {
        std::process::exit(2);
    } else if drift > 0 {
        std::process::exit(1);
    }

    Ok(())
}

pub(crate) fn status_entries(report: &RunReport) -> Vec<StatusEntry> {
    report
        .apps
        .iter()
        .map(|run| match &run.result {
            Ok(app) => StatusEntry {
                app: run.name.clone(),
                state: if app.has_changes() {
                    AppState::Drift
                } else {
                    AppState::Ok
                },
                would_create: app
                    .created
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect(),
                would_remove: app
                    .removed
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect(),
                warnings: app.warnings.clone(),
                error: None,
            },
            Err(e) => StatusEntry {
                app: run.name.clone(),
                state: AppState::Failed,
                would_create: Vec::new(),
                would_remove: Vec::new(),
                warnings: Vec::new(),
                error: Some(e.to_string()),
            },
        })
        .collect()
}

fn print_entry(e: &StatusEntry) {
    match e.state {
        AppState::Ok => println!("{} {}", "✔".green(), e.app.bold()),
        AppState::Drift => println!("{} {}", "!".yellow(), e.app.bold()),
        AppState::Failed => {
            println!(
                "{} {}: {}",
                "✗".red(),
                e.app.bold(),
                e.error.as_deref().unwrap_or("<unknown>")
            );
        }
    }

    for path in &e.would_create {
        println!("  {} Missing: {}", "+".green(), path);
    }
    for path in &e.would_remove {
        println!("  {} Stray: {}", "-".red(), path);
    }
    for warning in &e.warnings {
        println!("  {} {}", "!".yellow(), warning);
    }
}
