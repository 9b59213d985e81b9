//! Well-known event names shared across the dashboard

/// Published by the state store after every committed, non-silent write
pub const STATE_CHANGED: &str = "state:changed";

/// Request to switch the active dashboard section
pub const NAVIGATE: &str = "navigate";

/// A data-fetch completed and its result was written to the store
pub const DATA_LOADED: &str = "dataLoaded";

/// A data-fetch failed
pub const DATA_ERROR: &str = "dataError";
