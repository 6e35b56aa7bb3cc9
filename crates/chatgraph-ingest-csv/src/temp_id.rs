//! Temporary (CSV-local) identifiers.

use serde::Serialize;
use std::fmt;

/// Blank-node marker that may prefix a temporary id in the CSV exports.
pub const BLANK_NODE_PREFIX: &str = "_:";

/// A normalized temporary id: no blank-node marker, no surrounding whitespace.
///
/// `"_:u1"` and `"u1"` parse to the same `TempId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TempId(String);

impl TempId {
    /// Strip whitespace and an optional leading `_:`.
    ///
    /// This is the only normalization applied to temporary ids; every lookup
    /// and insertion goes through it.
    pub fn normalize(raw: &str) -> &str {
        let trimmed = raw.trim();
        trimmed
            .strip_prefix(BLANK_NODE_PREFIX)
            .unwrap_or(trimmed)
            .trim()
    }

    /// `None` when the id is empty after normalization.
    pub fn parse(raw: &str) -> Option<Self> {
        let id = Self::normalize(raw);
        if id.is_empty() {
            None
        } else {
            Some(Self(id.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The blank-node form used in a set mutation (`_:u1`).
    pub fn blank_node(&self) -> String {
        format!("{BLANK_NODE_PREFIX}{}", self.0)
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TempId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
