//! Symbolic link reconciliation
//!
//! Brings each app's destination directory in line with its declared entry
//! list: missing links are created, stray ones removed, and the marker links
//! between the two directories are kept in place.

use colored::Colorize;
use serde::Serialize;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{AppConfig, Config};
use crate::error::{DirRole, ReconcileError, Result, Warning};
use crate::marker::{MarkerOutcome, ensure_marker, symlink};
use crate::paths::{PathResolver, is_readable, require_dir};

/// Options for a reconciliation run
#[derive(Debug, Default, Clone)]
pub struct SyncOptions {
    /// Show what would be done without making changes
    pub dry_run: bool,
    /// Show detailed output
    pub verbose: bool,
    /// Print nothing; results are only returned
    pub quiet: bool,
    /// Only process apps with these names
    pub apps: Option<Vec<String>>,
}

impl SyncOptions {
    pub(crate) fn show(&self) -> bool {
        !self.quiet
    }

    pub(crate) fn show_detail(&self) -> bool {
        self.verbose && !self.quiet
    }
}

/// What happened to one app
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct AppReport {
    pub name: String,
    /// Links created (entries and markers)
    pub created: Vec<PathBuf>,
    /// Stray entries removed from the destination
    pub removed: Vec<PathBuf>,
    /// Entries that were already present
    pub unchanged: usize,
    /// Entries not linked because their source is unreadable
    pub skipped: Vec<Warning>,
    /// Problems that need attention
    pub warnings: Vec<Warning>,
}

impl AppReport {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn merge(&mut self, other: AppReport) {
        self.created.extend(other.created);
        self.removed.extend(other.removed);
        self.unchanged += other.unchanged;
        self.skipped.extend(other.skipped);
        self.warnings.extend(other.warnings);
    }

    fn record_marker(&mut self, outcome: MarkerOutcome) {
        match outcome {
            MarkerOutcome::Created(path) => self.created.push(path),
            MarkerOutcome::Conflict(warning) => self.warnings.push(warning),
            MarkerOutcome::AlreadyCorrect | MarkerOutcome::NotWritable => {}
        }
    }

    /// Whether anything was (or would be) changed
    pub fn has_changes(&self) -> bool {
        !self.created.is_empty() || !self.removed.is_empty()
    }
}

/// One app's result within a run
#[derive(Debug)]
pub struct AppRun {
    pub name: String,
    pub result: Result<AppReport>,
}

/// Overall severity of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Clean,
    Warnings,
    Failed,
}

/// Result of reconciling every configured app
#[derive(Debug, Default)]
pub struct RunReport {
    /// Warnings raised before any app ran, such as dropped apps
    pub warnings: Vec<Warning>,
    pub apps: Vec<AppRun>,
}

impl RunReport {
    /// Worst severity seen across all apps
    pub fn status(&self) -> RunStatus {
        if self.apps.iter().any(|run| run.result.is_err()) {
            RunStatus::Failed
        } else if !self.warnings.is_empty()
            || self
                .reports()
                .any(|report| !report.warnings.is_empty())
        {
            RunStatus::Warnings
        } else {
            RunStatus::Clean
        }
    }

    /// Reports of apps that completed
    pub fn reports(&self) -> impl Iterator<Item = &AppReport> {
        self.apps.iter().filter_map(|run| run.result.as_ref().ok())
    }

    /// Apps that failed, with their errors
    pub fn failures(&self) -> impl Iterator<Item = (&str, &ReconcileError)> {
        self.apps
            .iter()
            .filter_map(|run| run.result.as_ref().err().map(|e| (run.name.as_str(), e)))
    }

    /// Whether any app changed (or would change) the filesystem
    pub fn has_changes(&self) -> bool {
        self.reports().any(AppReport::has_changes)
    }

    /// Total counts as (created, removed, unchanged)
    pub fn totals(&self) -> (usize, usize, usize) {
        self.reports().fold((0, 0, 0), |(c, r, u), report| {
            (
                c + report.created.len(),
                r + report.removed.len(),
                u + report.unchanged,
            )
        })
    }
}

/// Drives reconciliation of a list of apps
pub struct Reconciler {
    options: SyncOptions,
}

impl Reconciler {
    pub fn new(options: SyncOptions) -> Self {
        Self { options }
    }

    /// Get the options
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Validate the apps in `config` and reconcile them
    pub fn run_config(&self, config: &Config, resolver: &PathResolver) -> RunReport {
        let (apps, warnings) = config.apps(resolver);
        if self.options.show() {
            for warning in &warnings {
                println!("{} {}", "!".yellow(), warning);
            }
        }

        let mut report = self.run(&apps);
        report.warnings = warnings;
        report
    }

    /// Reconcile each app in order.
    ///
    /// A failing app is recorded and the remaining apps still run.
    pub fn run(&self, apps: &[AppConfig]) -> RunReport {
        let mut report = RunReport::default();

        if self.options.dry_run && self.options.show() {
            println!("{}", "Running in dry-run mode".cyan());
        }

        for app in apps {
            if let Some(ref filter) = self.options.apps
                && !filter.iter().any(|name| name == &app.name)
            {
                if self.options.show_detail() {
                    println!("  {} Skipping filtered app: {}", "○".yellow(), app.name);
                }
                continue;
            }

            if self.options.show() {
                println!("\n{}", app.name.bold());
            }

            let result = self.reconcile_app(app);
            if let Err(ref e) = result {
                if self.options.show() {
                    println!("  {} {}", "✗".red(), e);
                }
                tracing::error!(app = %app.name, error = %e, "Error processing app");
            }

            report.apps.push(AppRun {
                name: app.name.clone(),
                result,
            });
        }

        report
    }

    /// Resolve directories, ensure markers, then converge the entry set
    pub fn reconcile_app(&self, app: &AppConfig) -> Result<AppReport> {
        require_dir(&app.name, DirRole::Source, &app.source_dir)?;
        require_dir(&app.name, DirRole::Destination, &app.dest_dir)?;

        let mut report = AppReport::new(&app.name);

        if let Some(ref marker) = app.src_to_dst_marker {
            let outcome =
                ensure_marker(&app.name, &app.source_dir, marker, &app.dest_dir, &self.options)?;
            report.record_marker(outcome);
        }
        if let Some(ref marker) = app.dst_to_src_marker {
            let outcome =
                ensure_marker(&app.name, &app.dest_dir, marker, &app.source_dir, &self.options)?;
            report.record_marker(outcome);
        }

        report.merge(create_missing(app, &self.options)?);
        report.merge(destroy_stray(app, &self.options)?);

        Ok(report)
    }
}

/// Link every readable source entry that is not yet present at the destination.
///
/// With a destination-to-source marker the link goes through it
/// (`<marker>/<entry>`), otherwise straight to the absolute source path.
pub fn create_missing(app: &AppConfig, options: &SyncOptions) -> Result<AppReport> {
    let mut result = AppReport::new(&app.name);

    for entry in &app.entries {
        let src_path = app.source_dir.join(entry);

        if !is_readable(&src_path) {
            let warning = Warning::SourceEntryUnreadable {
                app: app.name.clone(),
                path: src_path,
            };
            if options.show_detail() {
                println!("  {} {}", "!".yellow(), warning);
            }
            tracing::debug!("{warning}");
            result.skipped.push(warning);
            continue;
        }

        let dest_path = app.dest_dir.join(entry);

        if is_readable(&dest_path) {
            if options.show_detail() {
                println!("  {} Already present: {}", "✔".green(), dest_path.display());
            }
            result.unchanged += 1;
            continue;
        }

        let target = match app.dst_to_src_marker {
            Some(ref marker) => Path::new(marker).join(entry),
            None => src_path,
        };

        if options.dry_run {
            if options.show() {
                println!(
                    "  {} Would link: {} -> {}",
                    "→".cyan(),
                    dest_path.display(),
                    target.display()
                );
            }
            result.created.push(dest_path);
            continue;
        }

        match symlink(&target, &dest_path) {
            Ok(()) => {
                if options.show() {
                    println!(
                        "  {} Linked: {} -> {}",
                        "✔".green(),
                        dest_path.display(),
                        target.display()
                    );
                }
                result.created.push(dest_path);
            }
            // Present but unresolvable, or created concurrently.
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                tracing::debug!(path = %dest_path.display(), "Link already exists");
                result.unchanged += 1;
            }
            Err(e) => return Err(ReconcileError::io(&dest_path, e)),
        }
    }

    Ok(result)
}

/// Remove destination entries that still exist in the source but are no
/// longer declared.
///
/// Only the top level of the destination is inspected. Hidden names and
/// marker names are ignored, directories are never removed, and anything
/// without a readable counterpart in the source is left alone.
pub fn destroy_stray(app: &AppConfig, options: &SyncOptions) -> Result<AppReport> {
    let mut result = AppReport::new(&app.name);

    for entry in WalkDir::new(&app.dest_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| ReconcileError::io(&app.dest_dir, e.into()))?;
        let name = entry.file_name();

        if name.as_encoded_bytes().first() == Some(&b'.') || is_marker_name(app, name) {
            continue;
        }
        if app.entries.iter().any(|e| OsStr::new(e) == name) {
            continue;
        }
        if !is_readable(&app.source_dir.join(name)) {
            tracing::debug!(path = %entry.path().display(), "No source counterpart, leaving alone");
            continue;
        }

        let path = entry.path();
        if entry.file_type().is_dir() {
            if options.show_detail() {
                println!("  {} Not removing directory: {}", "○".yellow(), path.display());
            }
            continue;
        }

        if options.dry_run {
            if options.show() {
                println!("  {} Would remove: {}", "→".cyan(), path.display());
            }
            result.removed.push(path.to_path_buf());
            continue;
        }

        match fs::remove_file(path) {
            Ok(()) => {
                if options.show() {
                    println!("  {} Removed: {}", "✔".green(), path.display());
                }
                result.removed.push(path.to_path_buf());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(ReconcileError::io(path, e)),
        }
    }

    Ok(result)
}

fn is_marker_name(app: &AppConfig, name: &OsStr) -> bool {
    [&app.dst_to_src_marker, &app.src_to_dst_marker]
        .into_iter()
        .flatten()
        .any(|marker| OsStr::new(marker) == name)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        root: TempDir,
        app: AppConfig,
    }

    impl Fixture {
        fn new(entries: &[&str], sources: &[&str]) -> Self {
            let root = TempDir::new().unwrap();
            let source_dir = root.path().join("src");
            let dest_dir = root.path().join("dst");
            fs::create_dir_all(&dest_dir).unwrap();
            for name in sources {
                fs::create_dir_all(source_dir.join(name)).unwrap();
            }
            fs::create_dir_all(&source_dir).unwrap();

            let app = AppConfig {
                name: "test".to_string(),
                source_dir,
                dest_dir,
                src_to_dst_marker: None,
                dst_to_src_marker: None,
                entries: entries.iter().map(|e| e.to_string()).collect(),
            };
            Self { root, app }
        }

        fn dst(&self, name: &str) -> PathBuf {
            self.app.dest_dir.join(name)
        }

        fn src(&self, name: &str) -> PathBuf {
            self.app.source_dir.join(name)
        }
    }

    // ==========================================================================
    // CREATE MISSING
    // ==========================================================================

    #[test]
    fn test_create_missing_links_absolute_source() {
        let fx = Fixture::new(&["pluginA", "pluginB"], &["pluginA", "pluginB"]);

        let result = create_missing(&fx.app, &SyncOptions::default()).unwrap();

        assert_eq!(result.created, vec![fx.dst("pluginA"), fx.dst("pluginB")]);
        assert_eq!(fs::read_link(fx.dst("pluginA")).unwrap(), fx.src("pluginA"));
        assert_eq!(fs::read_link(fx.dst("pluginB")).unwrap(), fx.src("pluginB"));
    }

    #[test]
    fn test_create_missing_routes_through_marker() {
        let mut fx = Fixture::new(&["pluginA"], &["pluginA"]);
        fx.app.dst_to_src_marker = Some(".src".to_string());
        symlink(&fx.app.source_dir, &fx.dst(".src")).unwrap();

        create_missing(&fx.app, &SyncOptions::default()).unwrap();

        assert_eq!(
            fs::read_link(fx.dst("pluginA")).unwrap(),
            PathBuf::from(".src/pluginA")
        );
        assert_eq!(
            fs::canonicalize(fx.dst("pluginA")).unwrap(),
            fs::canonicalize(fx.src("pluginA")).unwrap()
        );
    }

    #[test]
    fn test_create_missing_skips_unreadable_source() {
        let fx = Fixture::new(&["present", "absent"], &["present"]);

        let result = create_missing(&fx.app, &SyncOptions::default()).unwrap();

        assert_eq!(result.created, vec![fx.dst("present")]);
        assert_eq!(result.skipped.len(), 1);
        assert!(!fx.dst("absent").exists());
        assert!(fs::symlink_metadata(fx.dst("absent")).is_err());
    }

    #[test]
    fn test_create_missing_leaves_existing_content() {
        let fx = Fixture::new(&["pluginA"], &["pluginA"]);
        fs::create_dir(fx.dst("pluginA")).unwrap();

        let result = create_missing(&fx.app, &SyncOptions::default()).unwrap();

        assert!(result.created.is_empty());
        assert_eq!(result.unchanged, 1);
        assert!(!fx.dst("pluginA").is_symlink());
    }

    #[test]
    fn test_create_missing_tolerates_dangling_link() {
        let fx = Fixture::new(&["pluginA"], &["pluginA"]);
        symlink(&fx.root.path().join("gone"), &fx.dst("pluginA")).unwrap();

        let result = create_missing(&fx.app, &SyncOptions::default()).unwrap();

        assert!(result.created.is_empty());
        assert_eq!(result.unchanged, 1);
    }

    #[test]
    fn test_create_missing_links_fifo_without_blocking() {
        use nix::sys::stat::Mode;
        use std::sync::mpsc;
        use std::time::Duration;

        let fx = Fixture::new(&["pipe"], &[]);
        nix::unistd::mkfifo(&fx.src("pipe"), Mode::S_IRUSR | Mode::S_IWUSR).unwrap();

        let (tx, rx) = mpsc::channel();
        let app = fx.app.clone();
        std::thread::spawn(move || {
            let _ = tx.send(create_missing(&app, &SyncOptions::default()));
        });
        let result = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("create_missing blocked on a FIFO")
            .unwrap();

        assert_eq!(result.created, vec![fx.dst("pipe")]);
        assert_eq!(fs::read_link(fx.dst("pipe")).unwrap(), fx.src("pipe"));
    }

    #[test]
    fn test_create_missing_dry_run() {
        let fx = Fixture::new(&["pluginA"], &["pluginA"]);
        let options = SyncOptions {
            dry_run: true,
            ..Default::default()
        };

        let result = create_missing(&fx.app, &options).unwrap();

        assert_eq!(result.created, vec![fx.dst("pluginA")]);
        assert!(fs::symlink_metadata(fx.dst("pluginA")).is_err());
    }

    // ==========================================================================
    // DESTROY STRAY
    // ==========================================================================

    #[test]
    fn test_destroy_stray_removes_undeclared_link() {
        let fx = Fixture::new(&["pluginA"], &["pluginA", "pluginC"]);
        symlink(&fx.src("pluginA"), &fx.dst("pluginA")).unwrap();
        symlink(&fx.src("pluginC"), &fx.dst("pluginC")).unwrap();

        let result = destroy_stray(&fx.app, &SyncOptions::default()).unwrap();

        assert_eq!(result.removed, vec![fx.dst("pluginC")]);
        assert!(fs::symlink_metadata(fx.dst("pluginC")).is_err());
        assert!(fx.dst("pluginA").is_symlink());
        assert!(fx.src("pluginC").is_dir());
    }

    #[test]
    fn test_destroy_stray_keeps_items_unknown_to_source() {
        let fx = Fixture::new(&["pluginA"], &["pluginA"]);
        fs::write(fx.dst("notes.txt"), "mine").unwrap();
        symlink(&fx.root.path().join("elsewhere"), &fx.dst("foreign")).unwrap();

        let result = destroy_stray(&fx.app, &SyncOptions::default()).unwrap();

        assert!(result.removed.is_empty());
        assert_eq!(fs::read_to_string(fx.dst("notes.txt")).unwrap(), "mine");
        assert!(fx.dst("foreign").is_symlink());
    }

    #[test]
    fn test_destroy_stray_never_removes_directories() {
        let fx = Fixture::new(&[], &["pluginC"]);
        fs::create_dir(fx.dst("pluginC")).unwrap();

        let result = destroy_stray(&fx.app, &SyncOptions::default()).unwrap();

        assert!(result.removed.is_empty());
        assert!(fx.dst("pluginC").is_dir());
    }

    #[test]
    fn test_destroy_stray_ignores_hidden_and_marker_names() {
        let mut fx = Fixture::new(&["pluginA"], &["pluginA", ".git", "link"]);
        fx.app.dst_to_src_marker = Some("link".to_string());
        symlink(&fx.src(".git"), &fx.dst(".git")).unwrap();
        symlink(&fx.app.source_dir, &fx.dst("link")).unwrap();

        let result = destroy_stray(&fx.app, &SyncOptions::default()).unwrap();

        assert!(result.removed.is_empty());
        assert!(fx.dst(".git").is_symlink());
        assert!(fx.dst("link").is_symlink());
    }

    #[test]
    fn test_destroy_stray_removes_non_utf8_name() {
        use std::os::unix::ffi::OsStrExt;

        let fx = Fixture::new(&["pluginA"], &["pluginA"]);
        let name = OsStr::from_bytes(b"plug\xffC");
        fs::create_dir(fx.app.source_dir.join(name)).unwrap();
        let stray = fx.app.dest_dir.join(name);
        symlink(&fx.app.source_dir.join(name), &stray).unwrap();

        let result = destroy_stray(&fx.app, &SyncOptions::default()).unwrap();

        assert_eq!(result.removed, vec![stray.clone()]);
        assert!(fs::symlink_metadata(&stray).is_err());
    }

    #[test]
    fn test_destroy_stray_dry_run() {
        let fx = Fixture::new(&[], &["pluginC"]);
        symlink(&fx.src("pluginC"), &fx.dst("pluginC")).unwrap();
        let options = SyncOptions {
            dry_run: true,
            ..Default::default()
        };

        let result = destroy_stray(&fx.app, &options).unwrap();

        assert_eq!(result.removed, vec![fx.dst("pluginC")]);
        assert!(fx.dst("pluginC").is_symlink());
    }

    // ==========================================================================
    // RECONCILER
    // ==========================================================================

    #[test]
    fn test_reconcile_app_creates_markers_and_links() {
        let mut fx = Fixture::new(&["pluginA"], &["pluginA"]);
        fx.app.dst_to_src_marker = Some(".src".to_string());
        fx.app.src_to_dst_marker = Some(".dst".to_string());

        let reconciler = Reconciler::new(SyncOptions::default());
        let report = reconciler.reconcile_app(&fx.app).unwrap();

        assert_eq!(report.created.len(), 3);
        assert!(report.warnings.is_empty());
        assert_eq!(fs::read_link(fx.src(".dst")).unwrap(), fx.app.dest_dir);
        assert_eq!(fs::read_link(fx.dst(".src")).unwrap(), fx.app.source_dir);
        assert!(fx.dst("pluginA").join(".").is_dir());
    }

    #[test]
    fn test_reconcile_app_missing_source_is_fatal() {
        let mut fx = Fixture::new(&["pluginA"], &[]);
        fx.app.source_dir = fx.root.path().join("nope");

        let err = Reconciler::new(SyncOptions::default())
            .reconcile_app(&fx.app)
            .unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::DirectoryUnavailable {
                role: DirRole::Source,
                ..
            }
        ));
    }

    #[test]
    fn test_run_isolates_failing_app() {
        let good = Fixture::new(&["pluginA"], &["pluginA"]);
        let mut bad = Fixture::new(&["pluginA"], &["pluginA"]);
        bad.app.name = "bad".to_string();
        bad.app.dest_dir = bad.root.path().join("missing");

        let reconciler = Reconciler::new(SyncOptions::default());
        let report = reconciler.run(&[bad.app.clone(), good.app.clone()]);

        assert_eq!(report.apps.len(), 2);
        assert_eq!(report.status(), RunStatus::Failed);
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.failures().next().unwrap().0, "bad");
        assert!(good.dst("pluginA").is_symlink());
    }

    #[test]
    fn test_run_filters_apps_by_name() {
        let fx = Fixture::new(&["pluginA"], &["pluginA"]);
        let options = SyncOptions {
            apps: Some(vec!["other".to_string()]),
            ..Default::default()
        };

        let report = Reconciler::new(options).run(&[fx.app.clone()]);

        assert!(report.apps.is_empty());
        assert!(!fx.dst("pluginA").is_symlink());
    }

    #[test]
    fn test_run_status_reports_marker_conflict_as_warning() {
        let mut fx = Fixture::new(&["pluginA"], &["pluginA"]);
        fx.app.dst_to_src_marker = Some(".src".to_string());
        fs::write(fx.dst(".src"), "not a link").unwrap();

        let report = Reconciler::new(SyncOptions::default()).run(&[fx.app.clone()]);

        assert_eq!(report.status(), RunStatus::Warnings);
        assert_eq!(fs::read_to_string(fx.dst(".src")).unwrap(), "not a link");
    }

    #[test]
    fn test_run_twice_is_idempotent() {
        let mut fx = Fixture::new(&["pluginA", "pluginB"], &["pluginA", "pluginB"]);
        fx.app.dst_to_src_marker = Some(".src".to_string());
        let reconciler = Reconciler::new(SyncOptions::default());

        let first = reconciler.run(&[fx.app.clone()]);
        let second = reconciler.run(&[fx.app.clone()]);

        assert!(first.has_changes());
        assert!(!second.has_changes());
        assert_eq!(second.status(), RunStatus::Clean);
        assert_eq!(second.totals(), (0, 0, 2));
    }

    #[test]
    fn test_run_status_ordering() {
        assert!(RunStatus::Clean < RunStatus::Warnings);
        assert!(RunStatus::Warnings < RunStatus::Failed);
    }
}
