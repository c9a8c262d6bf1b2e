//! Configuration loading, validation, and management for Linkwise.
//!
//! Loads configuration from `~/.linkwise/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use linkwise_core::ValidationRules;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Backends understood by `linkwise-store`.
pub const STORE_BACKENDS: &[&str] = &["sqlite", "postgres", "memory"];

/// The root configuration structure.
///
/// Maps directly to `~/.linkwise/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Contact store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Reconciliation engine tuning
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Inbound field validation
    #[serde(default)]
    pub validation: ValidationConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// Connection URL. Defaults to `sqlite://~/.linkwise/contacts.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Upper bound on waiting for a pooled connection.
    #[serde(default = "default_timeout_secs")]
    pub acquire_timeout_secs: u64,

    /// How long SQLite waits on a locked database before giving up.
    #[serde(default = "default_timeout_secs")]
    pub busy_timeout_secs: u64,
}

fn default_store_backend() -> String {
    "sqlite".into()
}
fn default_max_connections() -> u32 {
    8
}
fn default_timeout_secs() -> u64 {
    5
}

impl StoreConfig {
    /// The configured URL, or the default SQLite file under the config dir.
    pub fn resolved_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!(
                "sqlite://{}",
                AppConfig::config_dir().join("contacts.db").display()
            ),
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            url: None,
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_timeout_secs(),
            busy_timeout_secs: default_timeout_secs(),
        }
    }
}

/// Redact credentials embedded in a connection URL for Debug output.
fn redact_url(url: &Option<String>) -> String {
    match url {
        Some(u) => match (u.find("://"), u.rfind('@')) {
            (Some(scheme_end), Some(at)) if at > scheme_end => {
                format!("{}://[REDACTED]{}", &u[..scheme_end], &u[at..])
            }
            _ => u.clone(),
        },
        None => "None".into(),
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("backend", &self.backend)
            .field("url", &redact_url(&self.url))
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("busy_timeout_secs", &self.busy_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_port() -> u16 {
    5000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// How many times a conflicting reconciliation is re-run from scratch.
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,
}

fn default_conflict_retries() -> u32 {
    1
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            conflict_retries: default_conflict_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_min_phone_digits")]
    pub min_phone_digits: usize,

    #[serde(default = "default_max_phone_digits")]
    pub max_phone_digits: usize,
}

fn default_min_phone_digits() -> usize {
    ValidationRules::default().min_phone_digits
}
fn default_max_phone_digits() -> usize {
    ValidationRules::default().max_phone_digits
}

impl ValidationConfig {
    pub fn rules(&self) -> ValidationRules {
        ValidationRules {
            min_phone_digits: self.min_phone_digits,
            max_phone_digits: self.max_phone_digits,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_phone_digits: default_min_phone_digits(),
            max_phone_digits: default_max_phone_digits(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.linkwise/config.toml).
    ///
    /// Environment variables override the file:
    /// - `LINKWISE_STORE_URL`, then `DATABASE_URL`
    /// - `LINKWISE_STORE_BACKEND`
    /// - `LINKWISE_PORT`, then `PORT`
    /// - `LINKWISE_HOST`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path`, then apply process environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup (highest priority).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("LINKWISE_STORE_URL").or_else(|| lookup("DATABASE_URL")) {
            if self.store.backend == "sqlite" && url.starts_with("postgres") {
                self.store.backend = "postgres".into();
            }
            self.store.url = Some(url);
        }

        if let Some(backend) = lookup("LINKWISE_STORE_BACKEND") {
            self.store.backend = backend;
        }

        if let Some(port) = lookup("LINKWISE_PORT").or_else(|| lookup("PORT")) {
            self.gateway.port = port.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("port '{port}' is not a valid u16"))
            })?;
        }

        if let Some(host) = lookup("LINKWISE_HOST") {
            self.gateway.host = host;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".linkwise")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !STORE_BACKENDS.contains(&self.store.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "store.backend must be one of {STORE_BACKENDS:?}, got '{}'",
                self.store.backend
            )));
        }

        if self.store.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "store.max_connections must be >= 1".into(),
            ));
        }

        if self.validation.min_phone_digits == 0 {
            return Err(ConfigError::ValidationError(
                "validation.min_phone_digits must be >= 1".into(),
            ));
        }

        if self.validation.min_phone_digits > self.validation.max_phone_digits {
            return Err(ConfigError::ValidationError(
                "validation.min_phone_digits must not exceed max_phone_digits".into(),
            ));
        }

        if self.reconcile.conflict_retries > 10 {
            return Err(ConfigError::ValidationError(
                "reconcile.conflict_retries must be <= 10".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for linkwise_core::Error {
    fn from(err: ConfigError) -> Self {
        linkwise_core::Error::Config {
            message: err.to_string(),
        }
    }
}
