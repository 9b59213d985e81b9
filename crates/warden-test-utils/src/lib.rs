//! Testing utilities for the Warden workspace
//!
//! Shared recorders, fixtures and failing callbacks.

#![allow(missing_docs)]

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use warden_bus::{listener, EventBus, Listener};
use warden_state::{StateChange, StatePath, StateStore};

/// Shared log of everything a callback received
#[derive(Debug)]
pub struct Recorder<T> {
    calls: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            calls: Arc::clone(&self.calls),
        }
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone> Recorder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, item: T) {
        self.calls.lock().push(item);
    }

    pub fn calls(&self) -> Vec<T> {
        self.calls.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

pub fn recording_subscriber() -> (
    Recorder<StateChange>,
    impl Fn(&StateChange) -> anyhow::Result<()> + Send + Sync + 'static,
) {
    let recorder = Recorder::new();
    let sink = recorder.clone();
    (recorder, move |change: &StateChange| {
        sink.record(change.clone());
        Ok(())
    })
}

pub fn recording_listener() -> (Recorder<Value>, Listener) {
    let recorder = Recorder::new();
    let sink = recorder.clone();
    let l = listener(move |data| {
        sink.record(data.clone());
        Ok(())
    });
    (recorder, l)
}

/// Subscriber that appends `tag` to a shared order log
pub fn tagged_subscriber(
    order: &Recorder<&'static str>,
    tag: &'static str,
) -> impl Fn(&StateChange) -> anyhow::Result<()> + Send + Sync + 'static {
    let sink = order.clone();
    move |_: &StateChange| {
        sink.record(tag);
        Ok(())
    }
}

/// Listener that appends `tag` to a shared order log
pub fn tagged_listener(order: &Recorder<&'static str>, tag: &'static str) -> Listener {
    let sink = order.clone();
    listener(move |_| {
        sink.record(tag);
        Ok(())
    })
}

pub fn failing_listener() -> Listener {
    listener(|_| Err(anyhow::anyhow!("listener failed on purpose")))
}

pub fn panicking_listener() -> Listener {
    listener(|_| panic!("listener panicked on purpose"))
}

pub fn failing_subscriber(_: &StateChange) -> anyhow::Result<()> {
    Err(anyhow::anyhow!("subscriber failed on purpose"))
}

pub fn panicking_subscriber(_: &StateChange) -> anyhow::Result<()> {
    panic!("subscriber panicked on purpose")
}

pub fn path(raw: &str) -> StatePath {
    StatePath::parse(raw).unwrap()
}

/// Small dashboard-shaped tree
pub fn dashboard_fixture() -> Value {
    json!({
        "currentGuildId": null,
        "guilds": [
            { "id": "g1", "name": "Alpha" },
            { "id": "g2", "name": "Beta" }
        ],
        "ui": {
            "activeSection": "overview",
            "loading": false,
            "theme": "dark"
        },
        "filters": {
            "actions": { "type": "all", "moderator": "all", "dateRange": "7d" },
            "appeals": { "status": "pending" },
            "search": ""
        }
    })
}

pub fn store_with(initial: Value) -> StateStore {
    StateStore::builder().initial_state(initial).build().unwrap()
}

pub fn dashboard_store() -> StateStore {
    store_with(dashboard_fixture())
}

/// Store wired to a fresh bus
pub fn store_on_bus(initial: Value) -> (Arc<EventBus>, StateStore) {
    let bus = Arc::new(EventBus::new());
    let store = StateStore::builder()
        .initial_state(initial)
        .bus(Arc::clone(&bus))
        .build()
        .unwrap();
    (bus, store)
}
