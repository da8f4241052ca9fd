//! Error and warning types for reconciliation
//!
//! Fatal problems abort a single app and are returned as [`ReconcileError`].
//! Everything else is collected as a [`Warning`] and processing continues.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Result type for reconciliation operations
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Which of an app's two directories a message refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DirRole {
    Source,
    Destination,
}

impl fmt::Display for DirRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirRole::Source => write!(f, "source"),
            DirRole::Destination => write!(f, "destination"),
        }
    }
}

/// Errors that stop processing of one app
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("{role} directory {} is not a readable directory (app `{app}`)", path.display())]
    DirectoryUnavailable {
        app: String,
        role: DirRole,
        path: PathBuf,
    },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReconcileError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Why an existing marker path could not be accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConflictKind {
    /// Something other than a symlink occupies the marker name
    NotASymlink,
    /// A symlink exists but resolves to a different directory
    PointsElsewhere { resolved: PathBuf },
    /// A symlink exists but its target cannot be resolved
    Dangling { target: PathBuf },
}

/// Non-fatal problems, reported and then skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum Warning {
    #[error("marker {} conflicts with existing content: {} (app `{app}`)", path.display(), describe_conflict(conflict))]
    MarkerConflict {
        app: String,
        path: PathBuf,
        conflict: ConflictKind,
    },

    #[error("source entry {} is not readable (app `{app}`)", path.display())]
    SourceEntryUnreadable { app: String, path: PathBuf },

    #[error("entry list of app `{app}` is malformed: {reason}")]
    MalformedAppEntryList { app: String, reason: String },

    #[error("marker name `{marker}` of app `{app}` is not a plain file name")]
    InvalidMarkerName { app: String, marker: String },
}

impl Warning {
    pub fn marker_conflict(app: &str, path: PathBuf, conflict: ConflictKind) -> Self {
        Self::MarkerConflict {
            app: app.to_string(),
            path,
            conflict,
        }
    }

    /// Name of the app the warning belongs to
    pub fn app(&self) -> &str {
        match self {
            Warning::MarkerConflict { app, .. }
            | Warning::SourceEntryUnreadable { app, .. }
            | Warning::MalformedAppEntryList { app, .. }
            | Warning::InvalidMarkerName { app, .. } => app,
        }
    }
}

fn describe_conflict(kind: &ConflictKind) -> String {
    match kind {
        ConflictKind::NotASymlink => "not a symlink".to_string(),
        ConflictKind::PointsElsewhere { resolved } => {
            format!("already links to {}", resolved.display())
        }
        ConflictKind::Dangling { target } => {
            format!("dangling link to {}", target.display())
        }
    }
}
