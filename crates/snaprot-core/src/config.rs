use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use crate::error::SnaprotError;
use crate::source::SourceEntry;

/// Environment variable naming an alternate config file.
pub const CONFIG_ENV: &str = "SNAPROT_CONFIG";

const SYSTEM_CONFIG: &str = "/etc/snaprot/config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    #[serde(default = "default_lock_path")]
    pub lock_path: PathBuf,
    #[serde(default)]
    pub keep: KeepConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceEntry>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: None,
            lock_path: default_lock_path(),
            keep: KeepConfig::default(),
            transport: TransportConfig::default(),
            log: LogConfig::default(),
            sources: Vec::new(),
        }
    }
}

impl Settings {
    /// The backup root, or the fatal `RootUnset`.
    pub fn require_root(&self) -> Result<&Path, SnaprotError> {
        self.root.as_deref().ok_or(SnaprotError::RootUnset)
    }
}

/// Per-generation overrides of the retained slot count. Zero is rejected
/// when parsing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct KeepConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly: Option<NonZeroU32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily: Option<NonZeroU32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly: Option<NonZeroU32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly: Option<NonZeroU32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yearly: Option<NonZeroU32>,
}

/// Extra arguments for the mirror transport.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct TransportConfig {
    /// Appended to every `rsync` invocation.
    #[serde(default)]
    pub mirror_args: Vec<String>,
    /// Appended to the `ssh` command used for remote copies.
    #[serde(default)]
    pub ssh_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct LogConfig {
    /// Also write log events to this file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// Pick the config file: explicit flag, then `SNAPROT_CONFIG`, then the
/// user config dir if a file exists there, then `/etc/snaprot/config.toml`.
#[must_use]
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    let env_path = env::var_os(CONFIG_ENV).map(PathBuf::from);
    let user_path = dirs::config_dir().map(|dir| dir.join("snaprot/config.toml"));
    resolve_config_path(explicit, env_path, user_path)
}

fn resolve_config_path(
    explicit: Option<&Path>,
    env_path: Option<PathBuf>,
    user_path: Option<PathBuf>,
) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Some(path) = env_path.filter(|p| !p.as_os_str().is_empty()) {
        return path;
    }
    match user_path {
        Some(path) if path.exists() => path,
        _ => PathBuf::from(SYSTEM_CONFIG),
    }
}

/// Load settings from `path`; a missing file yields defaults.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file missing, using defaults");
        return Ok(Settings::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    parse_settings(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn parse_settings(content: &str) -> Result<Settings> {
    Ok(toml::from_str::<Settings>(content)?)
}

fn default_lock_path() -> PathBuf {
    PathBuf::from("/run/lock/snaprot.lock")
}
