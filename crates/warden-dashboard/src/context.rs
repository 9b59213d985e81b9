//! Application context
//!
//! One [`EventBus`] and one [`StateStore`] per application, handed to
//! components explicitly. Cloning an [`AppContext`] shares the same
//! instances.

use crate::config::DashboardConfig;
use crate::defaults::default_dashboard_state;
use crate::error::{DashboardResult, PersistError};
use crate::persist::SnapshotStore;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info};
use warden_bus::{events, listener, EventBus, Listener};
use warden_state::{StatePath, StateStore, WriteOutcome};

/// Shared bus and store for one dashboard session
#[derive(Clone)]
pub struct AppContext {
    bus: Arc<EventBus>,
    store: Arc<StateStore>,
    autosave: Arc<Mutex<Option<Autosave>>>,
}

struct Autosave {
    snapshots: Arc<SnapshotStore>,
    listener: Listener,
}

impl AppContext {
    /// Build bus and store from `config`
    ///
    /// The store starts from [`default_dashboard_state`] and mirrors its
    /// changes onto the bus. With persistence enabled, the snapshot is
    /// restored and autosave is switched on.
    ///
    /// # Errors
    /// Returns an error if the snapshot configuration is invalid or the
    /// snapshot file cannot be read.
    pub fn bootstrap(config: &DashboardConfig) -> DashboardResult<Self> {
        let bus = Arc::new(EventBus::new());
        let store = StateStore::builder()
            .initial_state(default_dashboard_state())
            .history_capacity(config.history_capacity)
            .bus(Arc::clone(&bus))
            .build()?;

        let context = Self {
            bus,
            store: Arc::new(store),
            autosave: Arc::new(Mutex::new(None)),
        };

        if config.persist.enabled {
            let snapshots = SnapshotStore::from_config(&config.persist)?;
            snapshots.restore(&context.store)?;
            context.enable_persistence(snapshots);
        }

        info!(
            history_capacity = config.history_capacity,
            persistence = context.is_persisting(),
            "dashboard context ready"
        );
        Ok(context)
    }

    /// Shared event bus
    #[inline]
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Shared state store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Save `snapshots` after every committed change that touches a
    /// persisted path
    ///
    /// Replaces any previous autosave.
    pub fn enable_persistence(&self, snapshots: SnapshotStore) {
        self.disable_persistence();

        let snapshots = Arc::new(snapshots);
        let store: Weak<StateStore> = Arc::downgrade(&self.store);
        let target = Arc::clone(&snapshots);
        let autosave = listener(move |change| {
            let Some(store) = store.upgrade() else {
                return Ok(());
            };
            let Some(path) = change["path"].as_str() else {
                return Ok(());
            };
            if target.covers(&StatePath::parse(path)?) {
                target.save(&store)?;
            }
            Ok(())
        });

        self.bus.on(events::STATE_CHANGED, Arc::clone(&autosave));
        debug!(path = %snapshots.path().display(), "autosave enabled");
        *self.autosave.lock() = Some(Autosave {
            snapshots,
            listener: autosave,
        });
    }

    /// Stop autosaving; returns `true` if it was on
    pub fn disable_persistence(&self) -> bool {
        let Some(previous) = self.autosave.lock().take() else {
            return false;
        };
        self.bus.off(events::STATE_CHANGED, &previous.listener);
        debug!("autosave disabled");
        true
    }

    /// Check if autosave is on
    #[must_use]
    pub fn is_persisting(&self) -> bool {
        self.autosave.lock().is_some()
    }

    /// Snapshot store used by autosave
    #[must_use]
    pub fn snapshots(&self) -> Option<Arc<SnapshotStore>> {
        self.autosave
            .lock()
            .as_ref()
            .map(|autosave| Arc::clone(&autosave.snapshots))
    }

    /// Save now, if persistence is on
    ///
    /// # Errors
    /// Returns [`PersistError`] if the snapshot cannot be written.
    pub fn save(&self) -> Result<bool, PersistError> {
        match self.snapshots() {
            Some(snapshots) => snapshots.save(&self.store).map(|()| true),
            None => Ok(false),
        }
    }

    /// Restore the default state
    ///
    /// Every subscriber is re-notified. With persistence on, the restored
    /// defaults are saved.
    ///
    /// # Errors
    /// Returns [`PersistError`] if the snapshot cannot be written.
    pub fn reset(&self) -> Result<(), PersistError> {
        self.store.reset();
        self.save()?;
        Ok(())
    }

    /// Switch the active section and announce it on the bus
    ///
    /// `navigate` is emitted only when the write commits. A queued write
    /// (issued from inside a subscriber) or a vetoed one announces nothing.
    ///
    /// # Errors
    /// Propagates store errors for the section write.
    pub fn navigate(&self, section: &str) -> DashboardResult<WriteOutcome> {
        let from = self.store.get_state("ui.activeSection").unwrap_or(Value::Null);
        let outcome = self.store.set("ui.activeSection", json!(section))?;
        if outcome.is_committed() {
            self.bus
                .emit(events::NAVIGATE, &json!({ "section": section, "from": from }));
        }
        Ok(outcome)
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("bus", &self.bus)
            .field("store", &self.store)
            .field("persisting", &self.is_persisting())
            .finish()
    }
}
