//! Configuration file parser for ~/.config/shelf/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as warnings, since they are
//! usually typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::api::ApiOptions;
use crate::query::{CacheOptions, DEFAULT_CAPACITY};

/// Environment variable holding the API key; wins over the config file.
pub const API_KEY_ENV: &str = "SHELF_API_KEY";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid server_url '{url}': {reason}")]
    InvalidServerUrl { url: String, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// The `Debug` impl masks `api_key`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the bookmarks server.
    pub server_url: String,

    /// API key sent as a bearer token (alternative to SHELF_API_KEY).
    pub api_key: Option<String>,

    /// Seconds a fetched result counts as fresh. 0 = always refetch on view.
    ///
    /// Above 0, switching to criteria whose cached result is still fresh
    /// settles straight away from the cache: there is no placeholder phase
    /// and no refetch until the result goes stale or is invalidated.
    pub stale_time_secs: u64,

    /// Cached results kept per query namespace.
    pub cache_capacity: usize,

    /// Automatic refresh interval in minutes. 0 = manual refresh only.
    pub refresh_interval_minutes: u64,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Retries for transient request failures.
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3000".to_string(),
            api_key: None,
            stale_time_secs: 0,
            cache_capacity: DEFAULT_CAPACITY.get(),
            refresh_interval_minutes: 0,
            request_timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server_url", &self.server_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("stale_time_secs", &self.stale_time_secs)
            .field("cache_capacity", &self.cache_capacity)
            .field("refresh_interval_minutes", &self.refresh_interval_minutes)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "server_url",
        "api_key",
        "stale_time_secs",
        "cache_capacity",
        "refresh_interval_minutes",
        "request_timeout_secs",
        "max_retries",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing or empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    /// - Unparseable `server_url` → `Err(ConfigError::InvalidServerUrl)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check size before reading so a huge file can't exhaust memory
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(path = %path.display(), server_url = %config.server_url, "Loaded configuration");
        Ok(config)
    }

    /// Check that `server_url` is an absolute http(s) URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidServerUrl {
            url: self.server_url.clone(),
            reason,
        };
        let url = url::Url::parse(&self.server_url).map_err(|e| invalid(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(invalid(format!("unsupported scheme '{}'", scheme))),
        }
    }

    /// API key from the environment, falling back to the config file.
    pub fn resolve_api_key(&self) -> Option<SecretString> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.api_key.clone())
            .map(SecretString::from)
    }

    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            stale_time: Duration::from_secs(self.stale_time_secs),
            // A zero capacity would make the cache useless; fall back to the default
            capacity: NonZeroUsize::new(self.cache_capacity).unwrap_or(DEFAULT_CAPACITY),
        }
    }

    pub fn api_options(&self) -> ApiOptions {
        ApiOptions {
            timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
            max_retries: self.max_retries,
        }
    }

    /// Auto-refresh period, if enabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_minutes > 0)
            .then(|| Duration::from_secs(self.refresh_interval_minutes.saturating_mul(60)))
    }
}

// ============================================================================
// Tests
// ============================================================================
