//! Configuration resolution for `SendTrack`.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/sendtrack/settings.json)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables
//! 5. CLI arguments (applied by the binary, highest priority)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Complete `SendTrack` configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Connection settings for the remote Sendy `MySQL` database.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Upper bound on pooled remote connections.
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 3306,
            user: String::new(),
            password: String::new(),
            database: String::new(),
            max_connections: 5,
            acquire_timeout_secs: 10,
        }
    }
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .finish()
    }
}

/// Local cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LocalConfig {
    /// `SQLite` file; falls back to [`database_path`] when unset.
    pub database_path: Option<PathBuf>,
}

/// Sync engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum campaigns fetched per run.
    pub campaign_limit: u32,
    /// Maximum subscribers fetched per run.
    pub subscriber_limit: u32,
    /// Polling interval; `None` disables the scheduler.
    pub interval_secs: Option<u64>,
    /// Age after which a `running` run is reported as stale.
    pub stale_after_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            campaign_limit: 100,
            subscriber_limit: 500,
            interval_secs: None,
            stale_after_secs: 60 * 60,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:3000".to_string(),
            log_json: false,
        }
    }
}

impl Config {
    /// Check the settings a sync run depends on.
    pub fn validate_for_sync(&self) -> Result<()> {
        if self.remote.host.trim().is_empty() {
            return Err(Error::Config("remote.host must not be empty".to_string()));
        }
        if self.remote.database.trim().is_empty() {
            return Err(Error::Config(
                "remote.database must not be empty".to_string(),
            ));
        }
        if self.remote.max_connections == 0 {
            return Err(Error::Config(
                "remote.max_connections must be positive".to_string(),
            ));
        }
        if self.sync.campaign_limit == 0 || self.sync.subscriber_limit == 0 {
            return Err(Error::Config("sync limits must be positive".to_string()));
        }
        if self.sync.interval_secs == Some(0) {
            return Err(Error::Config(
                "sync.interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(explicit_path: Option<&Path>) -> Result<Config> {
    let mut merged = serde_json::to_value(Config::default())?;

    // Load global config
    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            merge_json(&mut merged, read_config_file(&global_path)?);
        }
    }

    // Load explicit config
    if let Some(path) = explicit_path {
        merge_json(&mut merged, read_config_file(path)?);
    }

    let mut config: Config = serde_json::from_value(merged)
        .map_err(|e| Error::Config(format!("Invalid configuration: {e}")))?;

    // Apply environment overrides
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("settings.json"))
}

/// Get the default path of the local cache database.
pub fn database_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("cache.db"))
}

fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".sendtrack"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/sendtrack"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("sendtrack"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

fn read_config_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

/// Recursively overlay `overlay` onto `base`; objects merge key by key,
/// anything else replaces.
fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Apply environment overrides read through `lookup`.
///
/// The `DB_*` names match the variables the Sendy installation already uses.
/// A numeric variable that does not parse is an error rather than ignored.
pub fn apply_env_overrides(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(val) = lookup("DB_HOST") {
        config.remote.host = val;
    }
    if let Some(port) = parse_env(&lookup, "DB_PORT")? {
        config.remote.port = port;
    }
    if let Some(val) = lookup("DB_USER") {
        config.remote.user = val;
    }
    if let Some(val) = lookup("DB_PASSWORD") {
        config.remote.password = val;
    }
    if let Some(val) = lookup("DB_NAME") {
        config.remote.database = val;
    }
    if let Some(val) = lookup("SENDTRACK_DB_PATH") {
        config.local.database_path = Some(PathBuf::from(val));
    }
    if let Some(limit) = parse_env(&lookup, "SENDTRACK_CAMPAIGN_LIMIT")? {
        config.sync.campaign_limit = limit;
    }
    if let Some(limit) = parse_env(&lookup, "SENDTRACK_SUBSCRIBER_LIMIT")? {
        config.sync.subscriber_limit = limit;
    }
    if let Some(secs) = parse_env(&lookup, "SENDTRACK_SYNC_INTERVAL_SECS")? {
        config.sync.interval_secs = Some(secs);
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    lookup(key)
        .map(|value| {
            value.trim().parse().map_err(|_| Error::InvalidEnv {
                key: key.to_string(),
                value,
            })
        })
        .transpose()
}
