//! Path expansion and directory checks
//!
//! Paths are always resolved by joining, never by changing the process
//! working directory.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{DirRole, ReconcileError, Result};

/// Expands configured paths into absolute ones
#[derive(Debug, Clone)]
pub struct PathResolver {
    home: Option<PathBuf>,
    base_dir: PathBuf,
}

impl PathResolver {
    /// Create a resolver with an explicit home and base directory
    pub fn new(home: Option<PathBuf>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            home,
            base_dir: base_dir.into(),
        }
    }

    /// Resolver for a config file: relative paths are taken from the
    /// directory that holds it, `~` is the current user's home.
    pub fn from_config_path(config_path: &Path) -> Self {
        let parent = config_path.parent().unwrap_or(config_path);
        let base_dir = if parent.is_absolute() {
            parent.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(parent))
                .unwrap_or_else(|_| parent.to_path_buf())
        };
        Self::new(dirs::home_dir(), base_dir)
    }

    /// Expand `~`, then anchor relative paths at the base directory.
    ///
    /// This is purely lexical: symlinks along the way are not resolved.
    pub fn expand(&self, raw: &str) -> PathBuf {
        let expanded = match (raw.strip_prefix('~'), &self.home) {
            (Some(""), Some(home)) => home.clone(),
            (Some(rest), Some(home)) if rest.starts_with('/') => {
                home.join(rest.trim_start_matches('/'))
            }
            _ => PathBuf::from(raw),
        };

        let absolute = if expanded.is_absolute() {
            expanded
        } else {
            self.base_dir.join(expanded)
        };
        normalize(&absolute)
    }
}

/// Verify `path` is an existing, listable directory.
pub fn require_dir(app: &str, role: DirRole, path: &Path) -> Result<()> {
    if path.is_dir() && is_readable(path) {
        Ok(())
    } else {
        Err(ReconcileError::DirectoryUnavailable {
            app: app.to_string(),
            role,
            path: path.to_path_buf(),
        })
    }
}

/// Whether `path` can be read, following symlinks.
///
/// Directories must be listable. Anything else only needs read permission;
/// it is never opened, so FIFOs and devices cannot block. A dangling symlink
/// is not readable.
pub fn is_readable(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => fs::read_dir(path).is_ok(),
        Ok(_) => has_read_access(path),
        Err(_) => false,
    }
}

#[cfg(unix)]
fn has_read_access(path: &Path) -> bool {
    nix::unistd::access(path, nix::unistd::AccessFlags::R_OK).is_ok()
}

#[cfg(not(unix))]
fn has_read_access(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|meta| meta.is_file())
}

/// Whether new entries can be created inside `dir`.
pub fn is_writable_dir(dir: &Path) -> bool {
    dir.is_dir()
        && tempfile::Builder::new()
            .prefix(".lns-probe")
            .tempfile_in(dir)
            .is_ok()
}

// Drop `.` and fold `..` so reported paths stay readable.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
