//! Path subscriptions
//!
//! Provides the subscriber registry, the [`StateChange`] payload delivered to
//! callbacks and the [`Subscription`] handle returned by `subscribe`.

use crate::path::StatePath;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Subscriber callback
pub type SubscriberFn = dyn Fn(&StateChange) -> anyhow::Result<()> + Send + Sync;

/// Opaque subscription identity, used only for removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Generate a fresh id
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Change delivered to a subscriber
///
/// `old_value` is `None` for deep ancestor notifications, immediate
/// deliveries and reset broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChange {
    /// Path the subscriber registered at
    pub path: StatePath,
    /// Current value at `path`
    pub value: Option<Value>,
    /// Previous value at `path`, when tracked
    pub old_value: Option<Value>,
}

impl StateChange {
    /// Create change payload
    #[inline]
    #[must_use]
    pub fn new(path: StatePath, value: Option<Value>, old_value: Option<Value>) -> Self {
        Self {
            path,
            value,
            old_value,
        }
    }
}

/// Options for `subscribe`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Deliver the current value once, synchronously, on registration
    pub immediate: bool,
    /// Also fire when any descendant path is written
    pub deep: bool,
}

impl SubscribeOptions {
    /// Default options: exact path, no immediate delivery
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver current value on registration
    #[inline]
    #[must_use]
    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    /// Watch descendants too
    #[inline]
    #[must_use]
    pub fn deep(mut self) -> Self {
        self.deep = true;
        self
    }
}

#[derive(Clone)]
pub(crate) struct Entry {
    pub(crate) id: SubscriptionId,
    pub(crate) deep: bool,
    pub(crate) callback: Arc<SubscriberFn>,
}

/// Subscribers grouped by path, each group in registration order
#[derive(Default)]
pub(crate) struct Registry {
    by_path: IndexMap<StatePath, Vec<Entry>>,
}

/// Callbacks to run for one path
pub(crate) type Targets = Vec<(StatePath, Vec<Arc<SubscriberFn>>)>;

impl Registry {
    pub(crate) fn insert(&mut self, path: StatePath, entry: Entry) {
        self.by_path.entry(path).or_default().push(entry);
    }

    pub(crate) fn remove(&mut self, path: &StatePath, id: SubscriptionId) -> bool {
        let Some(entries) = self.by_path.get_mut(path) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.by_path.shift_remove(path);
        }
        removed
    }

    /// Exact subscribers of `path`
    pub(crate) fn exact(&self, path: &StatePath) -> Vec<Arc<SubscriberFn>> {
        self.by_path
            .get(path)
            .map(|entries| entries.iter().map(|e| Arc::clone(&e.callback)).collect())
            .unwrap_or_default()
    }

    /// Deep subscribers of each strict ancestor of `path`, nearest first
    pub(crate) fn deep_ancestors(&self, path: &StatePath) -> Targets {
        path.ancestors()
            .filter_map(|ancestor| {
                let callbacks: Vec<_> = self
                    .by_path
                    .get(&ancestor)?
                    .iter()
                    .filter(|e| e.deep)
                    .map(|e| Arc::clone(&e.callback))
                    .collect();
                (!callbacks.is_empty()).then_some((ancestor, callbacks))
            })
            .collect()
    }

    /// Every subscriber, grouped by path in registration order
    pub(crate) fn all(&self) -> Targets {
        self.by_path
            .iter()
            .map(|(path, entries)| {
                let callbacks = entries.iter().map(|e| Arc::clone(&e.callback)).collect();
                (path.clone(), callbacks)
            })
            .collect()
    }

    pub(crate) fn count(&self, path: &StatePath) -> usize {
        self.by_path.get(path).map_or(0, Vec::len)
    }

    pub(crate) fn total(&self) -> usize {
        self.by_path.values().map(Vec::len).sum()
    }

    pub(crate) fn clear(&mut self) {
        self.by_path.clear();
    }
}

/// Handle to one registration
///
/// Call [`unsubscribe`](Self::unsubscribe) to remove exactly this
/// registration. Dropping the handle leaves the subscription active.
#[must_use = "dropping a Subscription keeps it registered; call unsubscribe() or detach()"]
pub struct Subscription {
    id: SubscriptionId,
    path: StatePath,
    registry: Weak<RwLock<Registry>>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, path: StatePath, registry: &Arc<RwLock<Registry>>) -> Self {
        Self {
            id,
            path,
            registry: Arc::downgrade(registry),
        }
    }

    /// Registration id
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Subscribed path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &StatePath {
        &self.path
    }

    /// Remove this registration
    ///
    /// Idempotent; returns `true` only on the call that removed it.
    pub fn unsubscribe(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.write().remove(&self.path, self.id))
    }

    /// Keep the subscription for the store's lifetime
    pub fn detach(self) {}
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("path", &self.path.to_string())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> StatePath {
        StatePath::parse(s).unwrap()
    }

    fn entry(deep: bool) -> (SubscriptionId, Entry) {
        let id = SubscriptionId::generate();
        let callback: Arc<SubscriberFn> = Arc::new(|_: &StateChange| -> anyhow::Result<()> { Ok(()) });
        (id, Entry { id, deep, callback })
    }

    #[test]
    fn registry_insert_and_count() {
        let mut registry = Registry::default();
        registry.insert(p("ui"), entry(false).1);
        registry.insert(p("ui"), entry(true).1);
        registry.insert(p("filters"), entry(false).1);
        assert_eq!(registry.count(&p("ui")), 2);
        assert_eq!(registry.total(), 3);
    }

    #[test]
    fn registry_remove_by_id() {
        let mut registry = Registry::default();
        let (keep, keep_entry) = entry(false);
        let (drop_id, drop_entry) = entry(false);
        registry.insert(p("ui"), keep_entry);
        registry.insert(p("ui"), drop_entry);

        assert!(registry.remove(&p("ui"), drop_id));
        assert!(!registry.remove(&p("ui"), drop_id));
        assert_eq!(registry.count(&p("ui")), 1);
        assert!(registry.remove(&p("ui"), keep));
        assert_eq!(registry.total(), 0);
    }

    #[test]
    fn deep_ancestors_skip_non_deep() {
        let mut registry = Registry::default();
        registry.insert(p("ui"), entry(true).1);
        registry.insert(p("ui.filters"), entry(false).1);
        registry.insert(p("ui.filters.spam"), entry(true).1);

        let targets = registry.deep_ancestors(&p("ui.filters.spam"));
        let paths: Vec<String> = targets.iter().map(|(path, _)| path.to_string()).collect();
        assert_eq!(paths, vec!["ui"]);
    }

    #[test]
    fn subscription_unsubscribe_after_registry_dropped() {
        let registry = Arc::new(RwLock::new(Registry::default()));
        let (id, e) = entry(false);
        registry.write().insert(p("a"), e);
        let sub = Subscription::new(id, p("a"), &registry);
        drop(registry);
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn subscribe_options_builders() {
        let opts = SubscribeOptions::new().deep().immediate();
        assert!(opts.deep);
        assert!(opts.immediate);
        assert_eq!(SubscribeOptions::default(), SubscribeOptions::new());
    }
}
