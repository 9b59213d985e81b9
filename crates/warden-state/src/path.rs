//! State paths for addressing within the state tree
//!
//! Provides [`StatePath`] for hierarchical addressing of values in the store.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// One step of a [`StatePath`]
///
/// A segment in canonical decimal form (ASCII digits, no leading zero
/// unless it is `0`, fits in `usize`) parses as an [`Index`](Self::Index).
/// Anything else, `007` included, stays a [`Key`](Self::Key) so the text
/// survives unchanged. An index addresses an array element when the container is an array, and
/// the decimal key when the container is an object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSegment {
    /// Object key
    Key(String),
    /// Array position (or numeric object key)
    Index(usize),
}

impl PathSegment {
    /// Key form of this segment, as used for object lookups
    #[must_use]
    pub fn as_key(&self) -> String {
        match self {
            Self::Key(k) => k.clone(),
            Self::Index(i) => i.to_string(),
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        let canonical = raw == "0" || !raw.starts_with('0');
        if canonical && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = raw.parse() {
                return Some(Self::Index(index));
            }
        }
        Some(Self::Key(raw.to_string()))
    }
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(k) => f.write_str(k),
            Self::Index(i) => write!(f, "{i}"),
        }
    }
}

/// Path within the state tree
///
/// Parsed once from a dotted string; all ancestor/descendant comparisons are
/// exact over segments.
///
/// # Examples
/// - `"ui.activeSection"` → `[Key(ui), Key(activeSection)]`
/// - `"guilds.0.name"` → `[Key(guilds), Index(0), Key(name)]`
/// - `""` → root
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StatePath(Vec<PathSegment>);

impl StatePath {
    /// Create new path from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }

    /// Empty path (root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse a dotted path
    ///
    /// # Errors
    /// Returns [`PathError::Malformed`] for `"a..b"`, `".a"` or `"a."`.
    pub fn parse(s: &str) -> Result<Self, PathError> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        s.split('.')
            .map(PathSegment::parse)
            .collect::<Option<Vec<_>>>()
            .map(Self)
            .ok_or_else(|| PathError::Malformed(s.to_string()))
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path is the root
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Check if path is empty (root)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get parent path (if not root)
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Get last segment (if not root)
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    /// Append a key segment, returning new path
    #[inline]
    #[must_use]
    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.0.push(PathSegment::Key(key.into()));
        new
    }

    /// Check if this path is a prefix of another
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.0.len() <= other.0.len() && self.0 == other.0[..self.0.len()]
    }

    /// Check if this path is an ancestor of another (strict prefix)
    #[inline]
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.0.len() < other.0.len() && self.is_prefix_of(other)
    }

    /// Strict, non-root ancestors, nearest first
    ///
    /// For `ui.filters.spam` yields `ui.filters`, then `ui`.
    pub fn ancestors(&self) -> impl Iterator<Item = StatePath> + '_ {
        (1..self.0.len())
            .rev()
            .map(move |len| Self(self.0[..len].to_vec()))
    }
}

impl Display for StatePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for StatePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Vec<PathSegment>> for StatePath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}

impl Serialize for StatePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StatePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Conversion into a [`StatePath`]
///
/// Lets store methods accept `&str`, `String` or an already-parsed path.
pub trait IntoStatePath {
    /// Parse or clone into a path
    ///
    /// # Errors
    /// Returns [`PathError`] if the input is not a valid dotted path.
    fn into_state_path(self) -> Result<StatePath, PathError>;
}

impl IntoStatePath for StatePath {
    fn into_state_path(self) -> Result<StatePath, PathError> {
        Ok(self)
    }
}

impl IntoStatePath for &StatePath {
    fn into_state_path(self) -> Result<StatePath, PathError> {
        Ok(self.clone())
    }
}

impl IntoStatePath for &str {
    fn into_state_path(self) -> Result<StatePath, PathError> {
        StatePath::parse(self)
    }
}

impl IntoStatePath for String {
    fn into_state_path(self) -> Result<StatePath, PathError> {
        StatePath::parse(&self)
    }
}

impl IntoStatePath for &String {
    fn into_state_path(self) -> Result<StatePath, PathError> {
        StatePath::parse(self)
    }
}

/// Errors related to state paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Path string could not be parsed
    #[error("malformed path '{0}': segments must be non-empty")]
    Malformed(String),
}
