//! lns - declarative symlink sets
//!
//! Keeps a destination directory populated with symbolic links to a chosen
//! set of names in a source directory. Declared names are linked, undeclared
//! links that still have a source counterpart are removed, and a pair of
//! marker links records which directories belong together.

pub mod config;
pub mod error;
pub mod marker;
pub mod paths;
pub mod reconciler;

pub use config::{AppConfig, Config};
pub use error::{ReconcileError, Warning};
pub use paths::PathResolver;
pub use reconciler::{Reconciler, RunReport, RunStatus, SyncOptions};
