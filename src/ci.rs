//! Configuration item identity.
//!
//! A CI is an opaque, stable identity anchor. It carries no data itself;
//! every piece of information about a CI is a layer-scoped fact that
//! references it. CIs are created once and never destroyed, and a CI with
//! zero facts is perfectly valid.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Globally unique, stable identifier of a configuration item.
///
/// Once created, a `CiId` never changes. Facts, relations and merged views
/// all reference CIs through this identifier.
///
/// # Examples
///
/// ```
/// use stratum::CiId;
///
/// let id = CiId::new();
/// assert!(!id.is_nil());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CiId(Uuid);

impl CiId {
    /// Creates a new random CI identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a CI identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns true if this is a nil (all zeros) UUID.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Creates a nil CI identifier (for testing or sentinel values).
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for CiId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CiId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<CiId> for Uuid {
    fn from(id: CiId) -> Self {
        id.0
    }
}
