//! Configuration for discovery, editor launch and watching.
//!
//! Settings are read from TOML. Every section and key is optional:
//!
//! ```toml
//! [index]
//! include = "**/*.json"
//! exclude = ["**/node_modules", "**/.git"]
//!
//! [files]
//! include = "**/*"
//! exclude = ["**/node_modules", "**/target"]
//!
//! [editor]
//! command = "code"
//!
//! [watch]
//! enabled = true
//! ```
//!
//! The `[index]` listing always filters to diagram files; `[files]` never does.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Deserialize;

use crate::error::{CodeflowError, Result};
use crate::index::{default_excludes, ScanOptions};

/// Name of the per-workspace configuration file.
pub const WORKSPACE_CONFIG_FILE: &str = ".codeflow.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Options for the diagram index.
    pub index: ScanOptions,
    /// Options for the `listFiles` listing.
    pub files: ScanOptions,
    pub editor: EditorConfig,
    pub watch: WatchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index: ScanOptions::diagrams(),
            files: ScanOptions::all_files(),
            editor: EditorConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditorConfig {
    /// Editor binary to launch for links. Falls back to `$VISUAL`, `$EDITOR`
    /// and well-known GUI editors when unset.
    #[serde(default)]
    pub command: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    /// Refresh the index when diagram files change on disk.
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    index: RawScan,
    files: RawScan,
    editor: EditorConfig,
    watch: WatchConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawScan {
    include: Option<String>,
    exclude: Option<Vec<String>>,
}

impl RawScan {
    fn apply(self, mut base: ScanOptions) -> ScanOptions {
        if let Some(include) = self.include {
            base.include = include;
        }
        base.exclude = self.exclude.unwrap_or_else(default_excludes);
        base
    }
}

impl Config {
    /// Parses a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Self::parse(source).map_err(|e| CodeflowError::Config(e.to_string()))
    }

    fn parse(source: &str) -> Result<Self, toml::de::Error> {
        let raw: RawConfig = toml::from_str(source)?;
        Ok(Self {
            index: raw.index.apply(ScanOptions::diagrams()),
            files: raw.files.apply(ScanOptions::all_files()),
            editor: raw.editor,
            watch: raw.watch,
        })
    }

    fn from_file(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path).map_err(|e| {
            CodeflowError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&source)
            .map_err(|e| CodeflowError::Config(format!("{}: {e}", path.display())))
    }
}

/// User-level configuration file, e.g. `~/.config/codeflow/config.toml`.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("codeflow").join("config.toml"))
}

/// Loads configuration.
///
/// Lookup order: `explicit`, then `<workspace>/.codeflow.toml`, then
/// [`user_config_path`], then defaults. Only the first file found is read.
///
/// # Errors
///
/// Returns [`CodeflowError::Config`] if `explicit` cannot be read, or if the
/// selected file is not valid configuration.
pub fn load_config(explicit: Option<&Path>, workspace: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        info!(path:? = path; "Loading configuration");
        return Config::from_file(path);
    }

    let candidates = workspace
        .map(|root| root.join(WORKSPACE_CONFIG_FILE))
        .into_iter()
        .chain(user_config_path());
    for candidate in candidates {
        if candidate.is_file() {
            info!(path:? = candidate; "Loading configuration");
            return Config::from_file(&candidate);
        }
    }

    debug!("No configuration file found, using defaults");
    Ok(Config::default())
}
