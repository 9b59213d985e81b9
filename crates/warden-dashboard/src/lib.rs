//! Warden Dashboard
//!
//! Wires the event bus and state store into one application context for the
//! moderation dashboard: default state shape, configuration, snapshot
//! persistence and logging setup.
//!
//! # Core Concepts
//!
//! - [`AppContext`]: The single bus/store pair, passed to components explicitly
//! - [`DashboardConfig`]: TOML configuration with per-field defaults
//! - [`SnapshotStore`]: Saves and restores selected state paths as JSON
//! - [`default_dashboard_state`]: Tree the store starts from and resets to
//!
//! # Example
//!
//! ```rust
//! use warden_dashboard::{AppContext, DashboardConfig};
//! use serde_json::json;
//!
//! let ctx = AppContext::bootstrap(&DashboardConfig::default())?;
//! ctx.navigate("appeals")?;
//! assert_eq!(ctx.store().get_state("ui.activeSection"), Some(json!("appeals")));
//!
//! ctx.reset()?;
//! assert_eq!(ctx.store().get_state("ui.activeSection"), Some(json!("overview")));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod context;
pub mod defaults;
pub mod error;
pub mod persist;
pub mod telemetry;

// Re-exports
pub use config::{DashboardConfig, LogFormat, PersistConfig};
pub use context::AppContext;
pub use defaults::{default_dashboard_state, DEFAULT_PERSIST_KEYS, DEFAULT_SECTION};
pub use error::{ConfigError, DashboardError, DashboardResult, PersistError};
pub use persist::{Snapshot, SnapshotStore, SNAPSHOT_VERSION};
pub use telemetry::init_tracing;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
