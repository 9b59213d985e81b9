//! Observable state store
//!
//! Provides [`StateStore`]: a single JSON tree addressed by [`StatePath`],
//! with a middleware pipeline in front of every write and path-scoped
//! subscriber notification behind it.
//!
//! # Write lifecycle
//!
//! ```text
//! set_state ──→ middleware ──→ mutate ──→ history ──→ notify ──→ bus
//!                   │                                   ↑
//!                   └── veto: nothing else happens      └── deferred inside batch()
//! ```
//!
//! # Reentrancy
//!
//! The first write on the stack owns the drain. Any write or reset issued
//! while it is in flight (from a subscriber, a bus listener or a middleware
//! stage) is queued and applied in FIFO order once the current fan-out is
//! done. If the owner unwinds, the drain is released and the queue dropped.

use crate::action::{Action, History, DEFAULT_HISTORY_CAPACITY};
use crate::error::{StoreError, StoreResult};
use crate::middleware::{Middleware, Pipeline, Verdict};
use crate::path::{IntoStatePath, StatePath};
use crate::subscription::{
    Entry, Registry, StateChange, SubscribeOptions, SubscriberFn, Subscription, SubscriptionId,
};
use crate::tree::{get_at, set_at};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use warden_bus::{events, isolate, EventBus};

/// Options for `set_state`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Commit without notifying subscribers or the bus
    pub silent: bool,
    /// Shallow-merge objects instead of replacing
    pub merge: bool,
}

impl SetOptions {
    /// Default options: notify, replace
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip notification
    #[inline]
    #[must_use]
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Shallow-merge objects
    #[inline]
    #[must_use]
    pub fn merge(mut self) -> Self {
        self.merge = true;
        self
    }
}

/// What happened to a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Tree mutated and recorded
    Committed,
    /// A middleware stage rejected the write
    Vetoed,
    /// Issued during an in-flight dispatch; will commit after it
    Queued,
}

impl WriteOutcome {
    /// Check if the write was applied synchronously
    #[inline]
    #[must_use]
    pub fn is_committed(self) -> bool {
        matches!(self, Self::Committed)
    }
}

#[derive(Debug)]
struct PendingWrite {
    path: StatePath,
    value: Value,
    options: SetOptions,
}

#[derive(Debug)]
enum Pending {
    Write(PendingWrite),
    Reset,
}

#[derive(Debug)]
struct CoalescedChange {
    value: Option<Value>,
    old_value: Option<Value>,
}

#[derive(Debug, Default)]
struct Dispatch {
    draining: bool,
    queue: VecDeque<Pending>,
    batch_depth: usize,
    batched: IndexMap<StatePath, CoalescedChange>,
}

/// Builder for [`StateStore`]
#[derive(Debug)]
pub struct StoreBuilder {
    initial_state: Value,
    history_capacity: usize,
    bus: Option<Arc<EventBus>>,
}

impl StoreBuilder {
    /// Tree used at construction and restored by `reset`
    #[must_use]
    pub fn initial_state(mut self, state: Value) -> Self {
        self.initial_state = state;
        self
    }

    /// Maximum retained history entries
    #[must_use]
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Bus receiving `state:changed` events
    #[must_use]
    pub fn bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Build the store
    ///
    /// # Errors
    /// Returns [`StoreError::RootNotObject`] if the initial state is not an object.
    pub fn build(self) -> StoreResult<StateStore> {
        if !self.initial_state.is_object() {
            return Err(StoreError::RootNotObject);
        }
        Ok(StateStore {
            tree: RwLock::new(self.initial_state.clone()),
            initial: self.initial_state,
            history: Mutex::new(History::with_capacity(self.history_capacity)),
            pipeline: RwLock::new(Pipeline::default()),
            subscribers: Arc::new(RwLock::new(Registry::default())),
            dispatch: Mutex::new(Dispatch::default()),
            bus: self.bus,
        })
    }
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self {
            initial_state: Value::Object(Map::new()),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            bus: None,
        }
    }
}

/// Path-addressed observable store
///
/// # Characteristics
/// - Root is always an object; intermediates are created on write
/// - Exact-path subscribers get `(new, old)`; deep ancestors get their own
///   current value with no old value
/// - Subscriber and middleware failures are logged, never propagated
/// - No lock is held while user callbacks run
pub struct StateStore {
    tree: RwLock<Value>,
    initial: Value,
    history: Mutex<History>,
    pipeline: RwLock<Pipeline>,
    subscribers: Arc<RwLock<Registry>>,
    dispatch: Mutex<Dispatch>,
    bus: Option<Arc<EventBus>>,
}

impl StateStore {
    /// Create store with an empty root, default history and no bus
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(Value::Object(Map::new())),
            initial: Value::Object(Map::new()),
            history: Mutex::new(History::default()),
            pipeline: RwLock::new(Pipeline::default()),
            subscribers: Arc::new(RwLock::new(Registry::default())),
            dispatch: Mutex::new(Dispatch::default()),
            bus: None,
        }
    }

    /// Start building a store
    #[inline]
    #[must_use]
    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    /// Bus this store publishes to, if any
    #[inline]
    #[must_use]
    pub fn bus(&self) -> Option<&Arc<EventBus>> {
        self.bus.as_ref()
    }

    /// Copy of the whole tree
    #[must_use]
    pub fn state(&self) -> Value {
        self.tree.read_recursive().clone()
    }

    /// Value at `path`, or `None` if any segment is missing
    ///
    /// An unparsable path reads as missing.
    #[must_use]
    pub fn get_state(&self, path: impl IntoStatePath) -> Option<Value> {
        match path.into_state_path() {
            Ok(path) => get_at(&self.tree.read_recursive(), &path).cloned(),
            Err(err) => {
                debug!(error = %err, "read of unparsable path");
                None
            }
        }
    }

    /// Write with default options
    ///
    /// # Errors
    /// See [`set_state`](Self::set_state).
    #[inline]
    pub fn set(&self, path: impl IntoStatePath, value: Value) -> StoreResult<WriteOutcome> {
        self.set_state(path, value, SetOptions::default())
    }

    /// Write `value` at `path`
    ///
    /// # Errors
    /// - [`StoreError::InvalidPath`] for an unparsable path
    /// - [`StoreError::RootNotObject`] for a non-object root write
    /// - [`StoreError::KeyOnArray`] when a key segment meets an array
    /// - [`StoreError::IndexOutOfRange`] when an index is past the end of an array
    ///
    /// Queued writes report errors to the log instead.
    pub fn set_state(
        &self,
        path: impl IntoStatePath,
        value: Value,
        options: SetOptions,
    ) -> StoreResult<WriteOutcome> {
        let path = path.into_state_path()?;
        if path.is_root() && !value.is_object() {
            return Err(StoreError::RootNotObject);
        }

        let write = PendingWrite {
            path,
            value,
            options,
        };

        {
            let mut dispatch = self.dispatch.lock();
            if dispatch.draining {
                debug!(path = %write.path, "write queued behind in-flight dispatch");
                dispatch.queue.push_back(Pending::Write(write));
                return Ok(WriteOutcome::Queued);
            }
            dispatch.draining = true;
        }

        let drain = DrainGuard::new(self);
        let outcome = self.commit(write);
        drain.finish();
        outcome
    }

    /// Register `callback` for changes at `path`
    ///
    /// # Errors
    /// Returns [`StoreError::InvalidPath`] for an unparsable path.
    pub fn subscribe<F>(
        &self,
        path: impl IntoStatePath,
        callback: F,
        options: SubscribeOptions,
    ) -> StoreResult<Subscription>
    where
        F: Fn(&StateChange) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let path = path.into_state_path()?;
        let id = SubscriptionId::generate();
        let callback: Arc<SubscriberFn> = Arc::new(callback);

        self.subscribers.write().insert(
            path.clone(),
            Entry {
                id,
                deep: options.deep,
                callback: Arc::clone(&callback),
            },
        );
        debug!(path = %path, %id, deep = options.deep, "subscribed");

        if options.immediate {
            let change = StateChange::new(path.clone(), self.get_state(&path), None);
            Self::deliver(&[callback], &change);
        }

        Ok(Subscription::new(id, path, &self.subscribers))
    }

    /// Remove the registration `id` at `path`
    pub fn unsubscribe(&self, path: &StatePath, id: SubscriptionId) -> bool {
        self.subscribers.write().remove(path, id)
    }

    /// Subscribers registered exactly at `path`
    #[must_use]
    pub fn subscriber_count(&self, path: impl IntoStatePath) -> usize {
        path.into_state_path()
            .map_or(0, |path| self.subscribers.read().count(&path))
    }

    /// Subscribers across all paths
    #[must_use]
    pub fn subscriber_total(&self) -> usize {
        self.subscribers.read().total()
    }

    /// Drop every subscription
    pub fn clear_subscribers(&self) {
        self.subscribers.write().clear();
    }

    /// Append a middleware stage
    pub fn add_middleware(&self, middleware: Arc<dyn Middleware>) {
        debug!(middleware = middleware.name(), "middleware added");
        self.pipeline.write().push(middleware);
    }

    /// Number of middleware stages
    #[must_use]
    pub fn middleware_count(&self) -> usize {
        self.pipeline.read().len()
    }

    /// Run `f` with notifications deferred and coalesced per path
    ///
    /// Writes inside `f` commit immediately. When the outermost batch ends,
    /// each touched path is notified once with its latest value and the
    /// value it held before the batch, in order of first touch. Deep
    /// ancestors of the touched paths are then notified once each, and the
    /// `state:changed` events follow in the same path order. Writes made
    /// by a batch that itself runs inside a subscriber are queued like any
    /// other reentrant write and are not coalesced.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.dispatch.lock().batch_depth += 1;
        let _scope = BatchScope(self);
        f()
    }

    /// Copy of the change history, oldest first
    #[must_use]
    pub fn history(&self) -> Vec<Action> {
        self.history.lock().snapshot()
    }

    /// Drop all history entries
    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    /// Maximum retained history entries
    #[must_use]
    pub fn history_capacity(&self) -> usize {
        self.history.lock().capacity()
    }

    /// Restore the initial tree and re-notify every subscriber
    ///
    /// Each subscriber fires once with the value now at its path and no old
    /// value, whether or not that value changed. History is cleared. Called
    /// during an in-flight dispatch, the reset is queued behind it like a
    /// write and [`WriteOutcome::Queued`] is returned.
    pub fn reset(&self) -> WriteOutcome {
        {
            let mut dispatch = self.dispatch.lock();
            if dispatch.draining {
                debug!("reset queued behind in-flight dispatch");
                dispatch.queue.push_back(Pending::Reset);
                return WriteOutcome::Queued;
            }
            dispatch.draining = true;
        }

        let drain = DrainGuard::new(self);
        self.restore_initial();
        drain.finish();
        WriteOutcome::Committed
    }

    fn restore_initial(&self) {
        *self.tree.write() = self.initial.clone();
        self.history.lock().clear();
        info!("state reset to initial shape");

        let targets = self.subscribers.read().all();
        for (path, callbacks) in targets {
            let change = StateChange::new(path.clone(), self.get_state(&path), None);
            Self::deliver(&callbacks, &change);
        }
    }

    fn commit(&self, write: PendingWrite) -> StoreResult<WriteOutcome> {
        let PendingWrite {
            path,
            value,
            options,
        } = write;

        let verdict = {
            let tree = self.tree.read_recursive();
            let old_value = get_at(&tree, &path).cloned();
            let pipeline = self.pipeline.read().clone();
            pipeline.run(Action::set_state(path.clone(), value, old_value), &tree)
        };

        let mut action = match verdict {
            Verdict::Commit(action) => action,
            Verdict::Veto { stage } => {
                debug!(path = %path, stage, "write dropped");
                return Ok(WriteOutcome::Vetoed);
            }
        };

        let stored = {
            let mut tree = self.tree.write();
            if action.path != path {
                action.old_value = get_at(&tree, &action.path).cloned();
            }
            set_at(&mut tree, &action.path, action.value.clone(), options.merge)?;
            get_at(&tree, &action.path).cloned()
        };

        debug!(
            path = %action.path,
            silent = options.silent,
            merge = options.merge,
            "state committed"
        );
        let path = action.path.clone();
        let old_value = action.old_value.clone();
        self.history.lock().push(action);

        if options.silent {
            return Ok(WriteOutcome::Committed);
        }

        let deferred = {
            let mut dispatch = self.dispatch.lock();
            if dispatch.batch_depth > 0 {
                dispatch
                    .batched
                    .entry(path.clone())
                    .and_modify(|change| change.value.clone_from(&stored))
                    .or_insert_with(|| CoalescedChange {
                        value: stored.clone(),
                        old_value: old_value.clone(),
                    });
                true
            } else {
                false
            }
        };

        if !deferred {
            let mut changes = IndexMap::with_capacity(1);
            changes.insert(
                path,
                CoalescedChange {
                    value: stored,
                    old_value,
                },
            );
            self.broadcast(changes);
        }
        Ok(WriteOutcome::Committed)
    }

    fn drain_queue(&self) {
        loop {
            let next = {
                let mut dispatch = self.dispatch.lock();
                match dispatch.queue.pop_front() {
                    Some(next) => next,
                    None => {
                        dispatch.draining = false;
                        return;
                    }
                }
            };

            match next {
                Pending::Write(write) => {
                    let path = write.path.clone();
                    if let Err(err) = self.commit(write) {
                        warn!(path = %path, error = %err, "queued write failed");
                    }
                }
                Pending::Reset => self.restore_initial(),
            }
        }
    }

    fn end_batch(&self) {
        let (changes, owns_drain) = {
            let mut dispatch = self.dispatch.lock();
            dispatch.batch_depth = dispatch.batch_depth.saturating_sub(1);
            if dispatch.batch_depth > 0 {
                return;
            }
            let changes = std::mem::take(&mut dispatch.batched);
            let owns = !dispatch.draining;
            dispatch.draining = true;
            (changes, owns)
        };
        let drain = owns_drain.then(|| DrainGuard::new(self));

        if !changes.is_empty() {
            debug!(paths = changes.len(), "flushing batched notifications");
        }
        self.broadcast(changes);

        if let Some(drain) = drain {
            drain.finish();
        }
    }

    // Exact subscribers per path, then each deep ancestor once, then the bus
    // per path.
    fn broadcast(&self, changes: IndexMap<StatePath, CoalescedChange>) {
        let mut ancestors: IndexMap<StatePath, Vec<Arc<SubscriberFn>>> = IndexMap::new();
        for (path, change) in &changes {
            let (exact, deep) = {
                let registry = self.subscribers.read();
                (registry.exact(path), registry.deep_ancestors(path))
            };

            if !exact.is_empty() {
                let event = StateChange::new(
                    path.clone(),
                    change.value.clone(),
                    change.old_value.clone(),
                );
                Self::deliver(&exact, &event);
            }

            for (ancestor, callbacks) in deep {
                ancestors.entry(ancestor).or_insert(callbacks);
            }
        }

        for (ancestor, callbacks) in ancestors {
            let current = self.get_state(&ancestor);
            let event = StateChange::new(ancestor, current, None);
            Self::deliver(&callbacks, &event);
        }

        let Some(bus) = &self.bus else {
            return;
        };
        for (path, change) in changes {
            let payload = json!({
                "path": path.to_string(),
                "value": change.value,
                "oldValue": change.old_value,
            });
            bus.emit(events::STATE_CHANGED, &payload);
        }
    }

    fn deliver(callbacks: &[Arc<SubscriberFn>], change: &StateChange) {
        for callback in callbacks {
            if let Err(failure) = isolate(|| callback(change)) {
                error!(path = %change.path, error = %failure, "state subscriber failed");
            }
        }
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("subscribers", &self.subscriber_total())
            .field("middleware", &self.middleware_count())
            .field("history", &self.history.lock().len())
            .field("bus", &self.bus.is_some())
            .finish_non_exhaustive()
    }
}

struct BatchScope<'a>(&'a StateStore);

impl Drop for BatchScope<'_> {
    fn drop(&mut self) {
        self.0.end_batch();
    }
}

// Held by the drain owner. Dropped without `finish` (an unwind), it
// releases the drain and discards whatever is still queued.
struct DrainGuard<'a>(Option<&'a StateStore>);

impl<'a> DrainGuard<'a> {
    fn new(store: &'a StateStore) -> Self {
        Self(Some(store))
    }

    fn finish(mut self) {
        if let Some(store) = self.0 {
            store.drain_queue();
        }
        self.0 = None;
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        let Some(store) = self.0.take() else {
            return;
        };
        let mut dispatch = store.dispatch.lock();
        let dropped = dispatch.queue.len();
        dispatch.queue.clear();
        dispatch.draining = false;
        error!(dropped, "dispatch unwound, queued work discarded");
    }
}
