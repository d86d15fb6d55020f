//! Changesets: append-only write provenance.
//!
//! Every fact write happens under a changeset recording who wrote and
//! when. Changesets are created once and never mutated; at most they are
//! archived by an external housekeeping process.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a changeset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangesetId(Uuid);

impl ChangesetId {
    /// Creates a new random changeset identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a changeset identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ChangesetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChangesetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Provenance record for one or more fact writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changeset {
    /// Identifier referenced by every fact written under this changeset.
    pub id: ChangesetId,
    /// Who performed the write.
    pub author: String,
    /// When the write happened.
    pub timestamp: DateTime<Utc>,
}

impl Changeset {
    /// Creates a changeset stamped with the current time.
    #[must_use]
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            id: ChangesetId::new(),
            author: author.into(),
            timestamp: Utc::now(),
        }
    }

    /// Creates a changeset with an explicit timestamp.
    #[must_use]
    pub fn at(author: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: ChangesetId::new(),
            author: author.into(),
            timestamp,
        }
    }
}
