//! Error types for the state store
//!
//! Only malformed requests are errors. Missing paths, middleware vetoes and
//! failing subscribers are ordinary outcomes and never surface here.

use crate::path::{PathError, StatePath};

/// State store error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Path string could not be parsed
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),

    /// Root writes must keep the tree an object
    #[error("root state must be an object")]
    RootNotObject,

    /// A key segment was applied to an array
    #[error("cannot address array at '{at}' with key '{key}'")]
    KeyOnArray {
        /// Path of the array
        at: StatePath,
        /// Offending key
        key: String,
    },

    /// An index segment was past the end of an array
    #[error("index {index} is out of range for array at '{at}' of length {len}")]
    IndexOutOfRange {
        /// Path of the array
        at: StatePath,
        /// Requested index
        index: usize,
        /// Array length at write time
        len: usize,
    },
}

impl StoreError {
    /// Create key-on-array error
    pub fn key_on_array(at: StatePath, key: impl Into<String>) -> Self {
        Self::KeyOnArray {
            at,
            key: key.into(),
        }
    }

    /// Create index-out-of-range error
    #[must_use]
    pub fn index_out_of_range(at: StatePath, index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { at, index, len }
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
