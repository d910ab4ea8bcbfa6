//! Settings for the index, the scanner and search.
//!
//! File format: TOML.
//! Default path (Linux/XDG): `$XDG_CONFIG_HOME/audio-everything/config.toml`
//! or `~/.config/audio-everything/config.toml`.
//!
//! Precedence (highest wins):
//! 1) Environment variables (prefix `AE__`, `__` as nested separator)
//! 2) Config file (if present)
//! 3) Struct defaults

use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub scan: ScanSettings,
    pub search: SearchSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file holding the index
    pub path: PathBuf,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("media_index.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Emit a progress event after this many successfully scanned files.
    pub progress_interval: usize,
    /// Follow symbolic links while walking directories.
    pub follow_links: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            progress_interval: 5,
            follow_links: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Candidates must score strictly above this (0-100) to be returned.
    pub threshold: f64,
    /// Default number of results.
    pub limit: usize,
    /// Settle time after the last keystroke before a query runs.
    pub debounce_ms: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            threshold: 30.0,
            limit: 1000,
            debounce_ms: 300,
        }
    }
}

impl Settings {
    /// Load settings from environment and optional config file.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        Self::load_from(resolve_config_path())
    }

    /// Load settings using an explicit (optional) config file path.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self, ::config::ConfigError> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = &config_path {
            builder = builder.add_source(::config::File::from(path.as_path()).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("AE")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;
        let settings: Settings = cfg.try_deserialize()?;
        Ok(settings)
    }

    /// Perform basic validation checks on loaded settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.database.path.as_os_str().is_empty() {
            return Err("database.path must not be empty".to_string());
        }
        if self.scan.progress_interval == 0 {
            return Err("scan.progress_interval must be >= 1".to_string());
        }
        if !(0.0..=100.0).contains(&self.search.threshold) {
            return Err("search.threshold must be between 0 and 100".to_string());
        }
        if self.search.limit == 0 {
            return Err("search.limit must be >= 1".to_string());
        }
        Ok(())
    }
}

/// Resolve the config path from `AE_CONFIG_PATH` or XDG defaults.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os("AE_CONFIG_PATH") {
        return Some(PathBuf::from(p));
    }
    default_config_path()
}

/// Compute the default config path under
/// `$XDG_CONFIG_HOME/audio-everything/config.toml`, or
/// `~/.config/audio-everything/config.toml` when `XDG_CONFIG_HOME` is not set.
pub fn default_config_path() -> Option<PathBuf> {
    let config_home = if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
        Some(PathBuf::from(xdg))
    } else {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
    };

    config_home.map(|d| d.join("audio-everything").join("config.toml"))
}
