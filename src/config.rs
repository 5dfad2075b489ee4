//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILFERRY_CONFIG` (environment variable)
//! 2. `~/.config/mailferry/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailferry\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Command-line flags override whatever is loaded here.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::fetch::{FetchOptions, OnError};
use crate::sink::MailboxFormat;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Defaults for `mailferry fetch`.
    pub fetch: FetchConfig,
    /// Local mailbox settings.
    pub mailbox: MailboxConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Defaults for a fetch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Only fetch items not yet marked read.
    pub unread_only: bool,
    /// Maximum number of items per run.
    pub limit: Option<usize>,
    /// Mark each item read after it has been appended.
    pub mark_read: bool,
    /// Skip items whose Message-ID is already in the mailbox.
    pub check_dupes: bool,
    /// "abort" or "continue" when a single item fails.
    pub on_error: OnError,
}

/// Local mailbox settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    /// "auto", "mbox" or "mh".
    pub format: MailboxFormat,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            unread_only: true,
            limit: None,
            mark_read: true,
            check_dupes: false,
            on_error: OnError::Abort,
        }
    }
}

impl FetchConfig {
    /// Fetch options with these defaults, before any flag overrides.
    pub fn to_options(&self) -> FetchOptions {
        FetchOptions {
            unread_only: self.unread_only,
            limit: self.limit,
            mark_read: self.mark_read,
            pretend: false,
            check_dupes: self.check_dupes,
            on_error: self.on_error,
        }
    }
}

pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match load_config_from(&path) {
                Ok(cfg) => {
                    tracing::info!(path = %path.display(), "Loaded config");
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to load config, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Read and parse one config file.
pub fn load_config_from(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let cfg = toml::from_str::<Config>(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(cfg)
}

pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILFERRY_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailferry").join("config.toml"))
}

pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailferry")
}

pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("mailferry.log")
}
