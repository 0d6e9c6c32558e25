use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::StoreSettings;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HEADER_ROWS: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("No store endpoint configured (set SHEETRACK_ENDPOINT or `endpoint` in .sheetrack.toml)")]
    MissingEndpoint,
    #[error("No store token configured (set SHEETRACK_TOKEN or `token` in .sheetrack.toml)")]
    MissingToken,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetrackConfig {
    /// URL of the sheet's web-app endpoint.
    pub endpoint: Option<String>,
    /// Shared secret the endpoint expects in the `token` query parameter.
    pub token: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Rows above the first record (1 for a single header row).
    pub header_rows: Option<u32>,
}

pub fn config_filename_candidates() -> [&'static str; 2] {
    [".sheetrack.toml", ".sheetrackrc"]
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(".sheetrack.toml")
}

pub fn resolve_user_home_dir() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    if let Ok(profile) = std::env::var("USERPROFILE") {
        let trimmed = profile.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    None
}

pub fn resolve_sheetrack_home_dir() -> Option<PathBuf> {
    if let Ok(value) = std::env::var("SHEETRACK_HOME") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    resolve_user_home_dir().map(|home| home.join(".sheetrack"))
}

pub fn global_config_path() -> Option<PathBuf> {
    resolve_sheetrack_home_dir().map(|home| home.join("config.toml"))
}

fn read_config_file(path: &Path) -> Result<SheetrackConfig, ConfigError> {
    let text = fs::read_to_string(path)?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// First project config file found under `root`. A file that exists but does not parse is an
/// error, not a miss.
pub fn load_config(root: &Path) -> Result<Option<SheetrackConfig>, ConfigError> {
    for name in config_filename_candidates() {
        let path = root.join(name);
        if path.is_file() {
            return read_config_file(&path).map(Some);
        }
    }
    Ok(None)
}

pub fn load_global_config() -> Result<Option<SheetrackConfig>, ConfigError> {
    match global_config_path() {
        Some(path) if path.is_file() => read_config_file(&path).map(Some),
        _ => Ok(None),
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Env, then project file, then global file.
fn resolve_string_with_source(
    root: &Path,
    env_key: &str,
    field: fn(SheetrackConfig) -> Option<String>,
) -> Result<(Option<String>, &'static str), ConfigError> {
    if let Some(value) = env_value(env_key) {
        return Ok((Some(value), "env"));
    }
    if let Some(value) = non_blank(load_config(root)?.and_then(field)) {
        return Ok((Some(value), "project"));
    }
    if let Some(value) = non_blank(load_global_config()?.and_then(field)) {
        return Ok((Some(value), "global"));
    }
    Ok((None, "default"))
}

pub fn resolve_endpoint_with_source(
    root: &Path,
) -> Result<(Option<String>, &'static str), ConfigError> {
    resolve_string_with_source(root, "SHEETRACK_ENDPOINT", |config| config.endpoint)
}

pub fn resolve_token_with_source(
    root: &Path,
) -> Result<(Option<String>, &'static str), ConfigError> {
    resolve_string_with_source(root, "SHEETRACK_TOKEN", |config| config.token)
}

pub fn resolve_timeout_with_source(root: &Path) -> Result<(u64, &'static str), ConfigError> {
    if let Some(value) = load_config(root)?.and_then(|config| config.timeout_secs) {
        return Ok((value, "project"));
    }
    if let Some(value) = load_global_config()?.and_then(|config| config.timeout_secs) {
        return Ok((value, "global"));
    }
    Ok((DEFAULT_TIMEOUT_SECS, "default"))
}

pub fn resolve_header_rows_with_source(root: &Path) -> Result<(u32, &'static str), ConfigError> {
    if let Some(value) = load_config(root)?.and_then(|config| config.header_rows) {
        return Ok((value, "project"));
    }
    if let Some(value) = load_global_config()?.and_then(|config| config.header_rows) {
        return Ok((value, "global"));
    }
    Ok((DEFAULT_HEADER_ROWS, "default"))
}

/// Everything needed to talk to the store, or which required value is missing.
pub fn resolve_store_settings(root: &Path) -> Result<StoreSettings, ConfigError> {
    let endpoint = resolve_endpoint_with_source(root)?
        .0
        .ok_or(ConfigError::MissingEndpoint)?;
    let token = resolve_token_with_source(root)?
        .0
        .ok_or(ConfigError::MissingToken)?;
    Ok(StoreSettings {
        endpoint,
        token,
        timeout: Duration::from_secs(resolve_timeout_with_source(root)?.0),
        header_rows: resolve_header_rows_with_source(root)?.0,
    })
}

pub fn write_config(root: &Path, config: &SheetrackConfig) -> Result<PathBuf, ConfigError> {
    let path = config_path(root);
    let body = toml::to_string_pretty(config)?;
    fs::write(&path, body)?;
    Ok(path)
}

/// Merge `update` over the existing project config (set fields win) and write it back.
pub fn update_config(root: &Path, update: SheetrackConfig) -> Result<PathBuf, ConfigError> {
    let mut config = load_config(root)?.unwrap_or_default();
    if update.endpoint.is_some() {
        config.endpoint = update.endpoint;
    }
    if update.token.is_some() {
        config.token = update.token;
    }
    if update.timeout_secs.is_some() {
        config.timeout_secs = update.timeout_secs;
    }
    if update.header_rows.is_some() {
        config.header_rows = update.header_rows;
    }
    write_config(root, &config)
}
