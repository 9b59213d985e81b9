//! Actions and bounded change history
//!
//! Every committed write is recorded as an [`Action`] in a [`History`]. The
//! history is for inspection only and is never replayed.

use crate::path::StatePath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

/// Default number of actions retained
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Kind of state action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    /// Path write through `set_state`
    SetState,
}

/// A pending or committed state write
///
/// Middleware receives and may rewrite the pending action; the committed
/// form is what lands in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Action kind
    #[serde(rename = "type")]
    pub kind: ActionKind,
    /// Target path
    pub path: StatePath,
    /// New value
    pub value: Value,
    /// Value at `path` before the write (`None` when absent)
    pub old_value: Option<Value>,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

impl Action {
    /// Create a `SET_STATE` action stamped now
    #[must_use]
    pub fn set_state(path: StatePath, value: Value, old_value: Option<Value>) -> Self {
        Self {
            kind: ActionKind::SetState,
            path,
            value,
            old_value,
            timestamp: Utc::now(),
        }
    }
}

/// Bounded FIFO of committed actions
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<Action>,
    capacity: usize,
}

impl History {
    /// Create empty history holding at most `capacity` actions
    #[inline]
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity,
        }
    }

    /// Append, evicting the oldest entries beyond capacity
    pub fn push(&mut self, action: Action) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(action);
    }

    /// Copy of entries, oldest first
    #[must_use]
    pub fn snapshot(&self) -> Vec<Action> {
        self.entries.iter().cloned().collect()
    }

    /// Most recent entry
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&Action> {
        self.entries.back()
    }

    /// Drop all entries
    #[inline]
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if history is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}
