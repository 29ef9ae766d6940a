// ABOUTME: Deployment version identifiers derived from creation time.
// ABOUTME: Orders numerically so "300" sorts after "200" and "1000".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Key of a deployment record in the history file.
///
/// Identifiers written by tugboat are Unix seconds. Hand-edited keys that are
/// not numeric still round-trip and sort after every numeric key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(String);

impl VersionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Identifier for a deployment created at `now`, strictly greater than
    /// every identifier in `existing`.
    pub fn next_after<'a>(
        now: DateTime<Utc>,
        existing: impl IntoIterator<Item = &'a VersionId>,
    ) -> Self {
        let candidate = now.timestamp().max(0) as u64;
        let highest = existing.into_iter().filter_map(VersionId::as_number).max();
        match highest {
            Some(max) if max >= candidate => Self((max + 1).to_string()),
            _ => Self(candidate.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn as_number(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl Ord for VersionId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for VersionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VersionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
