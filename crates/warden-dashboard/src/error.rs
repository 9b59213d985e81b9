//! Error types for the dashboard context
//!
//! Each concern gets its own enum; [`DashboardError`] wraps them for callers
//! that only need to know that bootstrapping or saving failed.

use std::path::PathBuf;
use warden_state::{PathError, StoreError};

/// Configuration loading error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// Config file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for the config shape
    #[error("failed to parse config from {origin}: {source}")]
    Parse {
        /// File path, or `inline` for string input
        origin: String,
        /// Underlying TOML error
        #[source]
        source: toml::de::Error,
    },

    /// Parsed but semantically invalid
    #[error("config validation failed: {message}")]
    Validation {
        /// What is wrong
        message: String,
    },
}

impl ConfigError {
    /// Create validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Snapshot persistence error
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Persisted key is not a usable path
    #[error("invalid persisted key '{key}': {source}")]
    InvalidKey {
        /// Offending key
        key: String,
        /// Parse failure
        #[source]
        source: PathError,
    },

    /// The root path cannot be persisted as a key
    #[error("the root path cannot be a persisted key")]
    RootKey,

    /// Snapshot file could not be read or written
    #[error("snapshot I/O failed at '{path}': {source}")]
    Io {
        /// Snapshot file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Snapshot file exists but cannot be decoded
    #[error("snapshot at '{path}' is corrupt: {reason}")]
    Corrupt {
        /// Snapshot file
        path: PathBuf,
        /// Decode failure
        reason: String,
    },

    /// Restoring a value into the store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PersistError {
    /// Create I/O error for `path`
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create corrupt-snapshot error for `path`
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Dashboard context error
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    /// Configuration problem
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// State store rejected a request
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Snapshot persistence failed
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Result type alias for dashboard operations
pub type DashboardResult<T> = Result<T, DashboardError>;
