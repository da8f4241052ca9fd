//! Configuration parsing for lns
//!
//! Handles TOML configuration files that declare, per app, which names in a
//! source directory should be linked into a destination directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::Warning;
use crate::paths::PathResolver;

/// Default configuration file name, looked up in the home directory
pub const CONFIG_FILE_NAME: &str = ".lnsconfig.toml";

/// Root configuration structure
#[derive(Debug, Deserialize)]
pub struct Config {
    /// App definitions, in file order
    #[serde(default, rename = "app")]
    pub apps: Vec<RawApp>,
}

/// A single `[[app]]` table as written in the file
#[derive(Debug, Deserialize)]
pub struct RawApp {
    /// Unique app name, used in diagnostics
    pub name: String,

    /// Whether this app is processed at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Where the symlinks should point to
    #[serde(alias = "src")]
    pub source: String,

    /// Where the symlinks should live
    #[serde(alias = "dst")]
    pub destination: String,

    /// Marker created inside the source directory, pointing at the destination
    #[serde(default, alias = "s2d")]
    pub src2dst: Option<String>,

    /// Marker created inside the destination directory, pointing at the source
    #[serde(default, alias = "d2s")]
    pub dst2src: Option<String>,

    /// Names to link; validated in [`Config::apps`] so a bad list only drops
    /// its own app
    #[serde(default)]
    pub entries: Option<toml::Value>,
}

fn default_true() -> bool {
    true
}

/// A validated app, ready for reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub name: String,
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    pub src_to_dst_marker: Option<String>,
    pub dst_to_src_marker: Option<String>,
    pub entries: Vec<String>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;

        let mut seen = HashSet::new();
        for app in &config.apps {
            if !seen.insert(app.name.as_str()) {
                anyhow::bail!("Duplicate app name: {}", app.name);
            }
        }

        Ok(config)
    }

    /// `~/.lnsconfig.toml`, if a home directory is known
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_FILE_NAME))
    }

    /// Build validated apps in file order.
    ///
    /// Disabled apps are skipped. Apps with an unusable entry list or marker
    /// name are dropped and reported as warnings.
    pub fn apps(&self, resolver: &PathResolver) -> (Vec<AppConfig>, Vec<Warning>) {
        let mut apps = Vec::new();
        let mut warnings = Vec::new();

        for raw in &self.apps {
            if !raw.enabled {
                tracing::debug!(app = %raw.name, "Skipping disabled app");
                continue;
            }

            match build_app(raw, resolver) {
                Ok(app) => apps.push(app),
                Err(warning) => {
                    tracing::warn!("{warning}");
                    warnings.push(warning);
                }
            }
        }

        (apps, warnings)
    }
}

fn build_app(raw: &RawApp, resolver: &PathResolver) -> std::result::Result<AppConfig, Warning> {
    for marker in [&raw.src2dst, &raw.dst2src].into_iter().flatten() {
        if !is_plain_name(marker) {
            return Err(Warning::InvalidMarkerName {
                app: raw.name.clone(),
                marker: marker.clone(),
            });
        }
    }

    let entries =
        validate_entries(raw.entries.as_ref()).map_err(|reason| Warning::MalformedAppEntryList {
            app: raw.name.clone(),
            reason,
        })?;

    Ok(AppConfig {
        name: raw.name.clone(),
        source_dir: resolver.expand(&raw.source),
        dest_dir: resolver.expand(&raw.destination),
        src_to_dst_marker: raw.src2dst.clone(),
        dst_to_src_marker: raw.dst2src.clone(),
        entries,
    })
}

fn validate_entries(value: Option<&toml::Value>) -> std::result::Result<Vec<String>, String> {
    let items = match value {
        None => return Err("no `entries` list given".to_string()),
        Some(toml::Value::Array(items)) => items,
        Some(other) => return Err(format!("`entries` must be an array, got {}", other.type_str())),
    };

    if items.is_empty() {
        return Err("`entries` is empty".to_string());
    }

    items
        .iter()
        .map(|item| match item.as_str() {
            Some(name) if is_plain_name(name) => Ok(name.to_string()),
            Some(name) => Err(format!("`{name}` is not a plain file name")),
            None => Err(format!("entry {item} is not a string")),
        })
        .collect()
}

// A single normal path component: no separators, no `.` or `..`.
fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains('/')
}
