//! Dashboard configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no file)
//! is a valid configuration.
//!
//! ```toml
//! history_capacity = 100
//! log_filter = "warden_state=debug,info"
//! log_format = "json"
//!
//! [persist]
//! enabled = true
//! path = "warden-state.json"
//! keys = ["currentGuildId", "ui.theme", "filters"]
//! ```

use crate::defaults::DEFAULT_PERSIST_KEYS;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use warden_state::{StatePath, DEFAULT_HISTORY_CAPACITY};

/// Default snapshot file name
pub const DEFAULT_SNAPSHOT_FILE: &str = "warden-state.json";

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Snapshot persistence settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    /// Restore at bootstrap and save after every relevant change
    pub enabled: bool,
    /// Snapshot file
    pub path: PathBuf,
    /// Dotted paths to persist
    pub keys: Vec<String>,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from(DEFAULT_SNAPSHOT_FILE),
            keys: DEFAULT_PERSIST_KEYS.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Dashboard configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Maximum retained history entries
    pub history_capacity: usize,
    /// Default tracing filter, overridden by `RUST_LOG`
    pub log_filter: String,
    /// Log output format
    pub log_format: LogFormat,
    /// Snapshot persistence
    pub persist: PersistConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            log_filter: "info".to_string(),
            log_format: LogFormat::default(),
            persist: PersistConfig::default(),
        }
    }
}

impl DashboardConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With history capacity
    #[inline]
    #[must_use]
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// With default log filter
    #[inline]
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// With persistence switched on or off
    #[inline]
    #[must_use]
    pub fn with_persistence(mut self, enabled: bool) -> Self {
        self.persist.enabled = enabled;
        self
    }

    /// With snapshot file
    #[inline]
    #[must_use]
    pub fn with_persist_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.persist.path = path.into();
        self
    }

    /// With persisted keys
    #[must_use]
    pub fn with_persist_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.persist.keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] or [`ConfigError::Validation`].
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Self::parse(raw, "inline")
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError::Read`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, &path.display().to_string())
    }

    /// Check persisted keys
    ///
    /// # Errors
    /// Returns [`ConfigError::Validation`] for an unparsable or root key, or
    /// for persistence enabled with no keys.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for key in &self.persist.keys {
            let path = StatePath::parse(key)
                .map_err(|err| ConfigError::validation(format!("persist.keys: {err}")))?;
            if path.is_root() {
                return Err(ConfigError::validation(
                    "persist.keys: the root path cannot be persisted",
                ));
            }
        }
        if self.persist.enabled && self.persist.keys.is_empty() {
            return Err(ConfigError::validation(
                "persistence is enabled but persist.keys is empty",
            ));
        }
        Ok(())
    }

    fn parse(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }
}
