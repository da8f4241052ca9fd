//! Marker links
//!
//! Each app may keep a symlink inside one of its directories that points at
//! the other one. Entry links can route through the destination's marker, so
//! moving the source directory only means updating that one link.

use colored::Colorize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{ConflictKind, ReconcileError, Result, Warning};
use crate::paths::is_writable_dir;
use crate::reconciler::SyncOptions;

/// What [`ensure_marker`] found or did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerOutcome {
    /// The link was created (or would be, in dry-run mode)
    Created(PathBuf),
    /// A link to the right directory is already there
    AlreadyCorrect,
    /// The base directory cannot be written; nothing was attempted
    NotWritable,
    /// Something else holds the name; left untouched
    Conflict(Warning),
}

/// Ensure `base_dir/marker_name` is a symlink to `other_dir`.
///
/// Existing content under that name is never replaced. A non-symlink, or a
/// symlink resolving anywhere but `other_dir`, is reported as a conflict.
pub fn ensure_marker(
    app: &str,
    base_dir: &Path,
    marker_name: &str,
    other_dir: &Path,
    options: &SyncOptions,
) -> Result<MarkerOutcome> {
    if !is_writable_dir(base_dir) {
        tracing::debug!(app, dir = %base_dir.display(), "Marker directory not writable");
        return Ok(MarkerOutcome::NotWritable);
    }

    let link_path = base_dir.join(marker_name);

    let meta = match fs::symlink_metadata(&link_path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return create_marker(&link_path, other_dir, options);
        }
        Err(e) => return Err(ReconcileError::io(&link_path, e)),
    };

    if !meta.file_type().is_symlink() {
        return Ok(conflict(app, link_path, ConflictKind::NotASymlink, options));
    }

    let resolved = match fs::canonicalize(&link_path) {
        Ok(resolved) => resolved,
        Err(_) => {
            let target = fs::read_link(&link_path)
                .map_err(|e| ReconcileError::io(&link_path, e))?;
            return Ok(conflict(
                app,
                link_path,
                ConflictKind::Dangling { target },
                options,
            ));
        }
    };
    let expected =
        fs::canonicalize(other_dir).map_err(|e| ReconcileError::io(other_dir, e))?;

    if resolved == expected {
        if options.show_detail() {
            println!("  {} Marker in place: {}", "✔".green(), link_path.display());
        }
        Ok(MarkerOutcome::AlreadyCorrect)
    } else {
        Ok(conflict(
            app,
            link_path,
            ConflictKind::PointsElsewhere { resolved },
            options,
        ))
    }
}

fn create_marker(link_path: &Path, other_dir: &Path, options: &SyncOptions) -> Result<MarkerOutcome> {
    if options.dry_run {
        if options.show() {
            println!(
                "  {} Would link marker: {} -> {}",
                "→".cyan(),
                link_path.display(),
                other_dir.display()
            );
        }
        return Ok(MarkerOutcome::Created(link_path.to_path_buf()));
    }

    match symlink(other_dir, link_path) {
        Ok(()) => {
            if options.show() {
                println!(
                    "  {} Linked marker: {} -> {}",
                    "✔".green(),
                    link_path.display(),
                    other_dir.display()
                );
            }
            Ok(MarkerOutcome::Created(link_path.to_path_buf()))
        }
        // Someone else got there first.
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(MarkerOutcome::AlreadyCorrect),
        Err(e) => Err(ReconcileError::io(link_path, e)),
    }
}

fn conflict(
    app: &str,
    link_path: PathBuf,
    kind: ConflictKind,
    options: &SyncOptions,
) -> MarkerOutcome {
    let warning = Warning::marker_conflict(app, link_path, kind);
    if options.show() {
        println!("  {} {}", "!".yellow(), warning);
    }
    tracing::warn!("{warning}");
    MarkerOutcome::Conflict(warning)
}

/// Create a symlink at `link` pointing to `target`.
pub(crate) fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link)
    }

    #[cfg(windows)]
    {
        // Relative targets resolve against the link's own directory.
        let resolved = link.parent().map(|p| p.join(target));
        if resolved.is_some_and(|p| p.is_dir()) {
            std::os::windows::fs::symlink_dir(target, link)
        } else {
            std::os::windows::fs::symlink_file(target, link)
        }
    }
}
