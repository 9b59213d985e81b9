//! Warden Event Bus
//!
//! Named-topic publish/subscribe for ad-hoc dashboard events that are not
//! modelled as state (navigation requests, data loaded/failed notices).
//!
//! # Core Concepts
//!
//! - [`EventBus`]: Registry of persistent and one-shot listeners per event name
//! - [`Listener`]: Shared callback handle; identity is `Arc` pointer identity
//! - [`isolate`]: Runs user callbacks so that errors and panics stay local
//! - [`events`]: Well-known event names
//!
//! # Example
//!
//! ```rust
//! use warden_bus::{listener, EventBus};
//! use serde_json::json;
//!
//! let bus = EventBus::new();
//! bus.once("dataLoaded", listener(|data| {
//!     println!("loaded {data}");
//!     Ok(())
//! }));
//!
//! bus.emit("dataLoaded", &json!({ "rows": 3 }));
//! assert_eq!(bus.listener_count("dataLoaded"), 0);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod bus;
pub mod events;
mod isolate;

// Re-exports
pub use bus::{listener, EventBus, Listener};
pub use isolate::{isolate, CallbackFailure};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
