//! Snapshot persistence
//!
//! Saves a fixed set of state paths to a JSON file and restores them into a
//! store. Only the listed paths are kept; everything else starts from the
//! default shape each session.

use crate::config::PersistConfig;
use crate::error::PersistError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use warden_state::{SetOptions, StatePath, StateStore};

/// Snapshot file format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// On-disk snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Format version
    pub version: u32,
    /// When the snapshot was taken
    pub saved_at: DateTime<Utc>,
    /// Persisted values keyed by dotted path
    pub entries: Map<String, Value>,
}

/// Reads and writes snapshots for a fixed key set
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
    keys: Vec<StatePath>,
}

impl SnapshotStore {
    /// Create store for `keys` at `path`
    ///
    /// # Errors
    /// Returns [`PersistError::InvalidKey`] or [`PersistError::RootKey`].
    pub fn new<I, S>(path: impl Into<PathBuf>, keys: I) -> Result<Self, PersistError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = keys
            .into_iter()
            .map(|key| {
                let key = key.as_ref();
                let path = StatePath::parse(key).map_err(|source| PersistError::InvalidKey {
                    key: key.to_string(),
                    source,
                })?;
                if path.is_root() {
                    return Err(PersistError::RootKey);
                }
                Ok(path)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            path: path.into(),
            keys,
        })
    }

    /// Create store from config
    ///
    /// # Errors
    /// As [`new`](Self::new).
    pub fn from_config(config: &PersistConfig) -> Result<Self, PersistError> {
        Self::new(&config.path, &config.keys)
    }

    /// Snapshot file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persisted paths
    #[inline]
    #[must_use]
    pub fn keys(&self) -> &[StatePath] {
        &self.keys
    }

    /// Check if a write at `path` can change a persisted value
    ///
    /// True when `path` equals a key, lies under one, or contains one.
    #[must_use]
    pub fn covers(&self, path: &StatePath) -> bool {
        self.keys
            .iter()
            .any(|key| key.is_prefix_of(path) || path.is_prefix_of(key))
    }

    /// Collect the current values of every persisted path
    ///
    /// Paths with no value are left out.
    #[must_use]
    pub fn capture(&self, store: &StateStore) -> Snapshot {
        let entries = self
            .keys
            .iter()
            .filter_map(|key| store.get_state(key).map(|value| (key.to_string(), value)))
            .collect();
        Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            entries,
        }
    }

    /// Write the current snapshot of `store` to disk
    ///
    /// # Errors
    /// Returns [`PersistError::Io`] if the file cannot be written.
    pub fn save(&self, store: &StateStore) -> Result<(), PersistError> {
        let snapshot = self.capture(store);
        let encoded = serde_json::to_string_pretty(&snapshot)
            .map_err(|err| PersistError::corrupt(&self.path, err.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| PersistError::io(parent, err))?;
        }
        fs::write(&self.path, encoded).map_err(|err| PersistError::io(&self.path, err))?;

        debug!(
            path = %self.path.display(),
            entries = snapshot.entries.len(),
            "snapshot saved"
        );
        Ok(())
    }

    /// Read the snapshot file
    ///
    /// Returns `Ok(None)` when the file does not exist.
    ///
    /// # Errors
    /// Returns [`PersistError::Corrupt`] for undecodable content or an
    /// unsupported version, [`PersistError::Io`] for other read failures.
    pub fn load(&self) -> Result<Option<Snapshot>, PersistError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(PersistError::io(&self.path, err)),
        };

        let snapshot: Snapshot = serde_json::from_str(&raw)
            .map_err(|err| PersistError::corrupt(&self.path, err.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(PersistError::corrupt(
                &self.path,
                format!("unsupported snapshot version {}", snapshot.version),
            ));
        }
        Ok(Some(snapshot))
    }

    /// Load the snapshot and write its values into `store` silently
    ///
    /// Entries for paths that are no longer persisted are ignored. Returns
    /// the number of values restored.
    ///
    /// # Errors
    /// As [`load`](Self::load), plus [`PersistError::Store`] if a value
    /// cannot be written.
    pub fn restore(&self, store: &StateStore) -> Result<usize, PersistError> {
        let Some(mut snapshot) = self.load()? else {
            debug!(path = %self.path.display(), "no snapshot to restore");
            return Ok(0);
        };

        let mut restored = 0;
        for key in &self.keys {
            if let Some(value) = snapshot.entries.remove(&key.to_string()) {
                store.set_state(key, value, SetOptions::new().silent())?;
                restored += 1;
            }
        }
        if !snapshot.entries.is_empty() {
            debug!(
                ignored = snapshot.entries.len(),
                "snapshot entries for paths no longer persisted"
            );
        }

        info!(path = %self.path.display(), restored, "snapshot restored");
        Ok(restored)
    }

    /// Delete the snapshot file if present
    ///
    /// # Errors
    /// Returns [`PersistError::Io`] if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<(), PersistError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(PersistError::io(&self.path, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(s: &str) -> StatePath {
        StatePath::parse(s).unwrap()
    }

    #[test]
    fn new_rejects_bad_keys() {
        assert!(matches!(
            SnapshotStore::new("x.json", ["ui..theme"]),
            Err(PersistError::InvalidKey { .. })
        ));
        assert!(matches!(
            SnapshotStore::new("x.json", [""]),
            Err(PersistError::RootKey)
        ));
    }

    #[test]
    fn covers_related_paths_only() {
        let snapshots = SnapshotStore::new("x.json", ["ui.theme", "filters"]).unwrap();
        assert!(snapshots.covers(&p("ui.theme")));
        assert!(snapshots.covers(&p("ui")));
        assert!(snapshots.covers(&p("filters.actions.type")));
        assert!(!snapshots.covers(&p("ui.loading")));
        assert!(!snapshots.covers(&p("guilds")));
    }

    #[test]
    fn capture_skips_missing_paths() {
        let store = StateStore::builder()
            .initial_state(json!({ "ui": { "theme": "light" } }))
            .build()
            .unwrap();
        let snapshots = SnapshotStore::new("x.json", ["ui.theme", "filters"]).unwrap();

        let snapshot = snapshots.capture(&store);

        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert_eq!(Value::Object(snapshot.entries), json!({ "ui.theme": "light" }));
    }
}
