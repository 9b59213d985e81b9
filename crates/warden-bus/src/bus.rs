//! Event bus implementation
//!
//! Provides [`EventBus`], a synchronous publish/subscribe registry keyed by
//! event name.

use crate::isolate::isolate;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

/// Shared listener callback
///
/// Two registrations are "the same listener" when they hold the same `Arc`,
/// which is what [`EventBus::off`] compares.
pub type Listener = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;

/// Wrap a closure as a [`Listener`]
#[inline]
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Default)]
struct Registry {
    persistent: IndexMap<String, Vec<Listener>>,
    once: IndexMap<String, Vec<Listener>>,
}

/// Named-topic publish/subscribe bus
///
/// # Characteristics
/// - Persistent listeners fire on every emit, in registration order
/// - One-shot listeners fire on the next emit only, after persistent ones
/// - A failing listener is logged and skipped; dispatch continues
/// - No lock is held while listeners run, so they may re-enter the bus
#[derive(Default)]
pub struct EventBus {
    registry: RwLock<Registry>,
}

impl EventBus {
    /// Create empty bus
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a persistent listener
    ///
    /// Registering the same listener twice makes it fire twice.
    pub fn on(&self, event: &str, listener: Listener) {
        self.registry
            .write()
            .persistent
            .entry(event.to_string())
            .or_default()
            .push(listener);
    }

    /// Register a listener that fires at most once
    pub fn once(&self, event: &str, listener: Listener) {
        self.registry
            .write()
            .once
            .entry(event.to_string())
            .or_default()
            .push(listener);
    }

    /// Remove the first persistent registration of `listener`
    ///
    /// One-shot registrations are not affected. Returns `true` if a
    /// registration was removed.
    pub fn off(&self, event: &str, listener: &Listener) -> bool {
        let mut registry = self.registry.write();
        let Some(listeners) = registry.persistent.get_mut(event) else {
            return false;
        };

        let Some(pos) = listeners.iter().position(|l| Arc::ptr_eq(l, listener)) else {
            return false;
        };

        listeners.remove(pos);
        if listeners.is_empty() {
            registry.persistent.shift_remove(event);
        }
        true
    }

    /// Publish `data` to every listener of `event`
    ///
    /// Persistent listeners run first, then the one-shot list. The one-shot
    /// list is detached before any callback runs, so a `once` registered
    /// during this dispatch waits for the next emit.
    pub fn emit(&self, event: &str, data: &Value) {
        let (persistent, once) = {
            let mut registry = self.registry.write();
            let persistent = registry.persistent.get(event).cloned().unwrap_or_default();
            let once = registry.once.shift_remove(event).unwrap_or_default();
            (persistent, once)
        };

        if persistent.is_empty() && once.is_empty() {
            return;
        }

        debug!(
            event,
            persistent = persistent.len(),
            once = once.len(),
            "emitting event"
        );

        for listener in persistent.iter().chain(once.iter()) {
            if let Err(failure) = isolate(|| listener(data)) {
                error!(event, error = %failure, "event listener failed");
            }
        }
    }

    /// Remove listeners for one event, or for all events when `event` is `None`
    pub fn remove_all_listeners(&self, event: Option<&str>) {
        match event {
            Some(event) => {
                let mut registry = self.registry.write();
                registry.persistent.shift_remove(event);
                registry.once.shift_remove(event);
            }
            None => self.clear(),
        }
    }

    /// Drop every registration
    pub fn clear(&self) {
        let mut registry = self.registry.write();
        registry.persistent.clear();
        registry.once.clear();
    }

    /// Names with at least one persistent or pending one-shot listener
    #[must_use]
    pub fn event_names(&self) -> BTreeSet<String> {
        let registry = self.registry.read();
        registry
            .persistent
            .keys()
            .chain(registry.once.keys())
            .cloned()
            .collect()
    }

    /// Persistent plus pending one-shot listeners for `event`
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        let registry = self.registry.read();
        let persistent = registry.persistent.get(event).map_or(0, Vec::len);
        let once = registry.once.get(event).map_or(0, Vec::len);
        persistent + once
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("events", &self.event_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    fn recorder() -> (Listener, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let l = listener(move |data| {
            sink.lock().push(data.clone());
            Ok(())
        });
        (l, seen)
    }

    #[test]
    fn bus_new_empty() {
        let bus = EventBus::new();
        assert!(bus.event_names().is_empty());
        assert_eq!(bus.listener_count("x"), 0);
    }

    #[test]
    fn on_fires_every_emit() {
        let bus = EventBus::new();
        let (l, seen) = recorder();
        bus.on("tick", l);

        bus.emit("tick", &json!(1));
        bus.emit("tick", &json!(2));

        assert_eq!(*seen.lock(), vec![json!(1), json!(2)]);
    }

    #[test]
    fn duplicate_registration_fires_twice() {
        let bus = EventBus::new();
        let (l, seen) = recorder();
        bus.on("tick", Arc::clone(&l));
        bus.on("tick", l);

        bus.emit("tick", &json!("a"));
        assert_eq!(seen.lock().len(), 2);
        assert_eq!(bus.listener_count("tick"), 2);
    }

    #[test]
    fn once_fires_once() {
        let bus = EventBus::new();
        let (l, seen) = recorder();
        bus.once("x", l);

        bus.emit("x", &json!(1));
        bus.emit("x", &json!(2));

        assert_eq!(*seen.lock(), vec![json!(1)]);
        assert_eq!(bus.listener_count("x"), 0);
    }

    #[test]
    fn persistent_before_once() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o = Arc::clone(&order);
        bus.once("x", listener(move |_| {
            o.lock().push("once");
            Ok(())
        }));
        let o = Arc::clone(&order);
        bus.on("x", listener(move |_| {
            o.lock().push("on");
            Ok(())
        }));

        bus.emit("x", &Value::Null);
        assert_eq!(*order.lock(), vec!["on", "once"]);
    }

    #[test]
    fn off_removes_first_match_only() {
        let bus = EventBus::new();
        let (l, seen) = recorder();
        bus.on("x", Arc::clone(&l));
        bus.on("x", Arc::clone(&l));

        assert!(bus.off("x", &l));
        bus.emit("x", &json!(0));
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn off_ignores_once_registrations() {
        let bus = EventBus::new();
        let (l, seen) = recorder();
        bus.once("x", Arc::clone(&l));

        assert!(!bus.off("x", &l));
        bus.emit("x", &json!(0));
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn off_unknown_is_noop() {
        let bus = EventBus::new();
        let (l, _) = recorder();
        assert!(!bus.off("missing", &l));
    }

    #[test]
    fn off_requires_same_arc() {
        let bus = EventBus::new();
        let (l, _) = recorder();
        let (other, _) = recorder();
        bus.on("x", l);
        assert!(!bus.off("x", &other));
        assert_eq!(bus.listener_count("x"), 1);
    }

    #[test]
    fn failing_listener_is_isolated() {
        let bus = EventBus::new();
        let (first, first_seen) = recorder();
        let (last, last_seen) = recorder();
        let (late_once, once_seen) = recorder();

        bus.on("x", first);
        bus.on("x", listener(|_| Err(anyhow::anyhow!("listener broke"))));
        bus.on("x", listener(|_| panic!("listener panicked")));
        bus.on("x", last);
        bus.once("x", late_once);

        bus.emit("x", &json!(5));

        assert_eq!(first_seen.lock().len(), 1);
        assert_eq!(last_seen.lock().len(), 1);
        assert_eq!(once_seen.lock().len(), 1);
    }

    #[test]
    fn once_registered_during_dispatch_survives() {
        let bus = Arc::new(EventBus::new());
        let (inner, inner_seen) = recorder();

        let bus_ref = Arc::clone(&bus);
        bus.once("x", listener(move |_| {
            bus_ref.once("x", Arc::clone(&inner));
            Ok(())
        }));

        bus.emit("x", &json!(1));
        assert!(inner_seen.lock().is_empty());
        assert_eq!(bus.listener_count("x"), 1);

        bus.emit("x", &json!(2));
        assert_eq!(*inner_seen.lock(), vec![json!(2)]);
    }

    #[test]
    fn listener_may_emit_reentrantly() {
        let bus = Arc::new(EventBus::new());
        let (l, seen) = recorder();
        bus.on("inner", l);

        let bus_ref = Arc::clone(&bus);
        bus.on("outer", listener(move |data| {
            bus_ref.emit("inner", data);
            Ok(())
        }));

        bus.emit("outer", &json!("relay"));
        assert_eq!(*seen.lock(), vec![json!("relay")]);
    }

    #[test]
    fn remove_all_for_event() {
        let bus = EventBus::new();
        let (a, _) = recorder();
        let (b, _) = recorder();
        bus.on("x", Arc::clone(&a));
        bus.once("x", b);
        bus.on("y", a);

        bus.remove_all_listeners(Some("x"));
        assert_eq!(bus.listener_count("x"), 0);
        assert_eq!(bus.listener_count("y"), 1);
    }

    #[test]
    fn remove_all_without_event_clears() {
        let bus = EventBus::new();
        let (a, _) = recorder();
        bus.on("x", Arc::clone(&a));
        bus.once("y", a);

        bus.remove_all_listeners(None);
        assert!(bus.event_names().is_empty());
    }

    #[test]
    fn event_names_union() {
        let bus = EventBus::new();
        let (a, _) = recorder();
        bus.on("persistent", Arc::clone(&a));
        bus.once("pending", a);

        let names: Vec<_> = bus.event_names().into_iter().collect();
        assert_eq!(names, vec!["pending".to_string(), "persistent".to_string()]);
    }

    #[test]
    fn listener_count_sums_registries() {
        let bus = EventBus::new();
        let (a, _) = recorder();
        bus.on("x", Arc::clone(&a));
        bus.on("x", Arc::clone(&a));
        bus.once("x", a);
        assert_eq!(bus.listener_count("x"), 3);
    }
}
