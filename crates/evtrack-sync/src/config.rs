//! # Tracker Configuration
//!
//! Configuration management for the tracker.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     EVTRACK_URL=https://collector.example.com                          │
//! │     EVTRACK_FLUSH_INTERVAL_MS=1000                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/evtrack/tracker.toml (Linux)                             │
//! │     ~/Library/Application Support/dev.evtrack.evtrack/tracker.toml     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     name = "EventTracker", flush every 1000 ms                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # tracker.toml
//! [tracker]
//! name = "EventTracker"
//! url = "https://collector.example.com"
//! flush_interval_ms = 1000
//! send_timeout_ms = 30000
//! max_batch_size = 0
//!
//! [storage]
//! database_path = "/var/lib/evtrack/evtrack.db"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use evtrack_core::validation::validate_tracker_name;
use evtrack_core::{batch_track_endpoint, DEFAULT_FLUSH_INTERVAL_MS, DEFAULT_TRACKER_NAME};

use crate::error::{TrackerError, TrackerResult};

// =============================================================================
// Tracker Settings
// =============================================================================

/// Delivery behavior settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSettings {
    /// Storage namespace. Trackers sharing a name share a queue and identity.
    #[serde(default = "default_name")]
    pub name: String,

    /// Base URL of the collector. Required.
    #[serde(default)]
    pub url: Option<String>,

    /// Period between scheduled flushes (milliseconds).
    #[serde(default = "default_flush_interval")]
    pub flush_interval_ms: u64,

    /// Upper bound on a single batch send (milliseconds).
    #[serde(default = "default_send_timeout")]
    pub send_timeout_ms: u64,

    /// Maximum events per batch. 0 means unlimited.
    #[serde(default)]
    pub max_batch_size: usize,
}

fn default_name() -> String {
    DEFAULT_TRACKER_NAME.to_string()
}

fn default_flush_interval() -> u64 {
    DEFAULT_FLUSH_INTERVAL_MS
}

fn default_send_timeout() -> u64 {
    30_000
}

impl Default for TrackerSettings {
    fn default() -> Self {
        TrackerSettings {
            name: default_name(),
            url: None,
            flush_interval_ms: default_flush_interval(),
            send_timeout_ms: default_send_timeout(),
            max_batch_size: 0,
        }
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

/// Where the persistent store lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// SQLite file path. Defaults to the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

// =============================================================================
// Main Tracker Configuration
// =============================================================================

/// Complete tracker configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub tracker: TrackerSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

impl TrackerConfig {
    /// Creates a config with defaults pointing at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.tracker.url = Some(url.into());
        config
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (tracker.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> TrackerResult<Self> {
        let config = Self::load_unvalidated(config_path)?;
        config.validate()?;
        Ok(config)
    }

    /// Same as [`TrackerConfig::load`] without the final validation, for
    /// callers that layer further overrides (CLI flags) on top.
    pub fn load_unvalidated(config_path: Option<PathBuf>) -> TrackerResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading tracker config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> TrackerResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| TrackerError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Tracker config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> TrackerResult<()> {
        validate_tracker_name(&self.tracker.name)
            .map_err(|e| TrackerError::InvalidConfig(e.to_string()))?;

        let raw = self.tracker.url.as_deref().ok_or(TrackerError::MissingUrl)?;
        if raw.trim().is_empty() {
            return Err(TrackerError::MissingUrl);
        }

        let parsed = Url::parse(raw)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TrackerError::InvalidUrl(format!(
                "URL must start with http:// or https://, got: {}",
                raw
            )));
        }

        if self.tracker.flush_interval_ms == 0 {
            return Err(TrackerError::InvalidConfig(
                "flush_interval_ms must be greater than 0".into(),
            ));
        }

        if self.tracker.send_timeout_ms == 0 {
            return Err(TrackerError::InvalidConfig(
                "send_timeout_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(name) = std::env::var("EVTRACK_NAME") {
            debug!(name = %name, "Overriding tracker name from environment");
            self.tracker.name = name;
        }

        if let Ok(url) = std::env::var("EVTRACK_URL") {
            debug!(url = %url, "Overriding collector URL from environment");
            self.tracker.url = Some(url);
        }

        if let Ok(value) = std::env::var("EVTRACK_FLUSH_INTERVAL_MS") {
            match value.parse::<u64>() {
                Ok(ms) => self.tracker.flush_interval_ms = ms,
                Err(_) => warn!(value = %value, "Ignoring invalid EVTRACK_FLUSH_INTERVAL_MS"),
            }
        }

        if let Ok(value) = std::env::var("EVTRACK_SEND_TIMEOUT_MS") {
            match value.parse::<u64>() {
                Ok(ms) => self.tracker.send_timeout_ms = ms,
                Err(_) => warn!(value = %value, "Ignoring invalid EVTRACK_SEND_TIMEOUT_MS"),
            }
        }

        if let Ok(value) = std::env::var("EVTRACK_MAX_BATCH_SIZE") {
            match value.parse::<usize>() {
                Ok(size) => self.tracker.max_batch_size = size,
                Err(_) => warn!(value = %value, "Ignoring invalid EVTRACK_MAX_BATCH_SIZE"),
            }
        }

        if let Ok(path) = std::env::var("EVTRACK_DB_PATH") {
            self.storage.database_path = Some(PathBuf::from(path));
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "evtrack", "evtrack")
            .map(|dirs| dirs.config_dir().join("tracker.toml"))
    }

    /// Returns the default SQLite path in the platform data directory.
    pub fn default_database_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "evtrack", "evtrack")
            .map(|dirs| dirs.data_dir().join("evtrack.db"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.tracker.name
    }

    pub fn url(&self) -> Option<&str> {
        self.tracker.url.as_deref()
    }

    /// Full batch endpoint, `None` when no URL is configured.
    pub fn endpoint(&self) -> Option<String> {
        self.url().map(batch_track_endpoint)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.tracker.flush_interval_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.tracker.send_timeout_ms)
    }

    /// Configured database path, else the platform default.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.storage
            .database_path
            .clone()
            .or_else(Self::default_database_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrackerConfig::default();
        assert_eq!(config.name(), "EventTracker");
        assert_eq!(config.flush_interval(), Duration::from_millis(1000));
        assert_eq!(config.send_timeout(), Duration::from_secs(30));
        assert_eq!(config.tracker.max_batch_size, 0);
        assert!(config.url().is_none());
    }

    #[test]
    fn test_config_validation() {
        let mut config = TrackerConfig::default();
        assert!(matches!(config.validate(), Err(TrackerError::MissingUrl)));

        config.tracker.url = Some("ftp://collector".into());
        assert!(matches!(config.validate(), Err(TrackerError::InvalidUrl(_))));

        config.tracker.url = Some("not a url".into());
        assert!(matches!(config.validate(), Err(TrackerError::InvalidUrl(_))));

        config.tracker.url = Some("https://collector.example.com".into());
        assert!(config.validate().is_ok());

        config.tracker.name = "bad::name".into();
        assert!(matches!(config.validate(), Err(TrackerError::InvalidConfig(_))));

        config.tracker.name = "EventTracker".into();
        config.tracker.flush_interval_ms = 0;
        assert!(matches!(config.validate(), Err(TrackerError::InvalidConfig(_))));
    }

    #[test]
    fn test_endpoint() {
        let config = TrackerConfig::new("https://collector.example.com/");
        assert_eq!(
            config.endpoint().as_deref(),
            Some("https://collector.example.com/events/batch_track")
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: TrackerConfig = toml::from_str(
            r#"
            [tracker]
            url = "http://localhost:8080"
            max_batch_size = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.name(), "EventTracker");
        assert_eq!(config.tracker.flush_interval_ms, 1000);
        assert_eq!(config.tracker.max_batch_size, 50);
        assert!(config.storage.database_path.is_none());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tracker.toml");

        let mut config = TrackerConfig::new("https://collector.example.com");
        config.tracker.name = "Checkout".into();
        config.storage.database_path = Some(dir.path().join("evtrack.db"));
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[tracker]"));

        let loaded: TrackerConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded, config);
    }
}
