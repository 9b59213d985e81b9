//! Warden State Store
//!
//! Centralized, path-addressed state for the moderation dashboard. The tree
//! is plain JSON; every write runs through middleware, lands in a bounded
//! history and fans out to subscribers registered at the written path or
//! at a deep-watching ancestor.
//!
//! # Core Concepts
//!
//! - [`StatePath`]: Dotted address parsed once into key/index segments
//! - [`StateStore`]: The tree plus subscribers, middleware and history
//! - [`Middleware`]: Pre-commit hook that may rewrite or veto a write
//! - [`Subscription`]: Handle that removes exactly one registration
//! - [`StoreBuilder::bus`]: Mirrors every notifying write onto an
//!   [`EventBus`](warden_bus::EventBus) as `state:changed`
//!
//! # Example
//!
//! ```rust
//! use warden_state::{SetOptions, StateStore, SubscribeOptions};
//! use serde_json::json;
//!
//! let store = StateStore::builder()
//!     .initial_state(json!({ "ui": { "theme": "dark" } }))
//!     .build()?;
//!
//! let sub = store.subscribe(
//!     "ui",
//!     |change| {
//!         println!("ui is now {:?}", change.value);
//!         Ok(())
//!     },
//!     SubscribeOptions::new().deep(),
//! )?;
//!
//! store.set_state("ui.theme", json!("light"), SetOptions::new())?;
//! assert_eq!(store.get_state("ui.theme"), Some(json!("light")));
//! sub.unsubscribe();
//! # Ok::<(), warden_state::StoreError>(())
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod action;
pub mod error;
pub mod middleware;
pub mod path;
pub mod store;
pub mod subscription;
pub mod tree;

// Re-exports
pub use action::{Action, ActionKind, History, DEFAULT_HISTORY_CAPACITY};
pub use error::{StoreError, StoreResult};
pub use middleware::{middleware_fn, Middleware};
pub use path::{IntoStatePath, PathError, PathSegment, StatePath};
pub use store::{SetOptions, StateStore, StoreBuilder, WriteOutcome};
pub use subscription::{StateChange, SubscribeOptions, SubscriberFn, Subscription, SubscriptionId};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn deep_subscriber_sees_descendant_writes_with_own_value() {
        let store = StateStore::builder()
            .initial_state(json!({ "filters": { "actions": { "type": "all" } } }))
            .build()
            .unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store
            .subscribe(
                "filters",
                move |change: &StateChange| {
                    sink.lock().push((
                        change.path.to_string(),
                        change.value.clone(),
                        change.old_value.clone(),
                    ));
                    Ok(())
                },
                SubscribeOptions::new().deep(),
            )
            .unwrap()
            .detach();

        store.set("filters.actions.type", json!("ban")).unwrap();

        assert_eq!(
            *seen.lock(),
            vec![(
                "filters".to_string(),
                Some(json!({ "actions": { "type": "ban" } })),
                None
            )]
        );
    }

    #[test]
    fn subscription_handle_removes_only_itself() {
        let store = StateStore::new();
        let hits = Arc::new(Mutex::new(0_u32));
        let a = {
            let hits = Arc::clone(&hits);
            store
                .subscribe(
                    "x",
                    move |_: &StateChange| {
                        *hits.lock() += 1;
                        Ok(())
                    },
                    SubscribeOptions::new(),
                )
                .unwrap()
        };
        let b = {
            let hits = Arc::clone(&hits);
            store
                .subscribe(
                    "x",
                    move |_: &StateChange| {
                        *hits.lock() += 10;
                        Ok(())
                    },
                    SubscribeOptions::new(),
                )
                .unwrap()
        };

        assert!(a.unsubscribe());
        assert!(!a.unsubscribe());
        store.set("x", json!(1)).unwrap();
        assert_eq!(*hits.lock(), 10);
        assert!(store.unsubscribe(b.path(), b.id()));
        assert_eq!(store.subscriber_count("x"), 0);
    }
}
