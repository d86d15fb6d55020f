//! Layer-scoped relation facts.
//!
//! A relation fact is keyed by (from, to, predicate, layer). Temporal
//! visibility works exactly like attributes; in addition a relation fact
//! can carry the mask flag, which suppresses same-keyed relations from
//! all lower-precedence layers during merging.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::changeset::ChangesetId;
use crate::ci::CiId;
use crate::layer::LayerId;

/// Lifecycle state of a relation fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationState {
    /// First fact for its key.
    New,
    /// Tombstone; the key has no visible relation in this layer.
    Removed,
    /// Re-assertion after a removal.
    Renewed,
}

impl RelationState {
    /// Removed facts never win a merge.
    #[must_use]
    pub const fn is_removed(&self) -> bool {
        matches!(self, Self::Removed)
    }
}

/// The layer-independent identity of a relation: who relates to whom, how.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationKey {
    pub from_ci_id: CiId,
    pub to_ci_id: CiId,
    pub predicate_id: String,
}

impl RelationKey {
    /// Creates a relation key.
    #[must_use]
    pub fn new(from_ci_id: CiId, to_ci_id: CiId, predicate_id: impl Into<String>) -> Self {
        Self {
            from_ci_id,
            to_ci_id,
            predicate_id: predicate_id.into(),
        }
    }
}

impl fmt::Display for RelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -{}-> {}",
            self.from_ci_id, self.predicate_id, self.to_ci_id
        )
    }
}

/// A single layer-scoped relation fact between two CIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Identifier of this individual fact.
    pub id: Uuid,
    /// Source CI.
    pub from_ci_id: CiId,
    /// Target CI.
    pub to_ci_id: CiId,
    /// Relation predicate, e.g. `runs_on` or `depends_on`.
    pub predicate_id: String,
    /// When this fact supersedes its predecessor.
    pub activation_time: DateTime<Utc>,
    /// Lifecycle state.
    pub state: RelationState,
    /// Masking facts assert absence: they suppress same-keyed relations
    /// from all lower-precedence layers and are never merge winners
    /// themselves.
    pub mask: bool,
    /// Changeset that wrote this fact.
    pub changeset_id: ChangesetId,
    /// Layer asserting this fact.
    pub layer_id: LayerId,
}

impl Relation {
    /// Creates a relation fact.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        from_ci_id: CiId,
        to_ci_id: CiId,
        predicate_id: impl Into<String>,
        activation_time: DateTime<Utc>,
        state: RelationState,
        changeset_id: ChangesetId,
        layer_id: LayerId,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_ci_id,
            to_ci_id,
            predicate_id: predicate_id.into(),
            activation_time,
            state,
            mask: false,
            changeset_id,
            layer_id,
        }
    }

    /// Marks this fact as a mask.
    #[must_use]
    pub fn with_mask(mut self) -> Self {
        self.mask = true;
        self
    }

    /// The layer-independent key of this fact.
    #[must_use]
    pub fn key(&self) -> RelationKey {
        RelationKey::new(self.from_ci_id, self.to_ci_id, self.predicate_id.clone())
    }

    /// Whether this relation involves the given CI on either end.
    #[must_use]
    pub fn involves(&self, ci: CiId) -> bool {
        self.from_ci_id == ci || self.to_ci_id == ci
    }
}

/// The merge result for one relation key across a layer set.
///
/// Same layer-stack convention as merged attributes: ascending
/// precedence, winner last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRelation {
    /// The fact from the highest-precedence layer with a visible relation.
    pub relation: Relation,
    /// Layers holding a visible current fact, ascending precedence.
    pub layer_stack: Vec<LayerId>,
}

impl MergedRelation {
    /// The layer the winning fact came from.
    #[must_use]
    pub fn winning_layer(&self) -> LayerId {
        self.relation.layer_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relation(layer: i64) -> Relation {
        Relation::new(
            CiId::new(),
            CiId::new(),
            "runs_on",
            Utc::now(),
            RelationState::New,
            ChangesetId::new(),
            LayerId::new(layer),
        )
    }

    #[test]
    fn test_relation_key_identity() {
        let r = relation(1);
        let key = r.key();
        assert_eq!(key.from_ci_id, r.from_ci_id);
        assert_eq!(key.to_ci_id, r.to_ci_id);
        assert_eq!(key.predicate_id, "runs_on");
    }

    #[test]
    fn test_relation_key_display() {
        let key = RelationKey::new(CiId::nil(), CiId::nil(), "runs_on");
        assert!(format!("{key}").contains("-runs_on->"));
    }

    #[test]
    fn test_with_mask() {
        let r = relation(1).with_mask();
        assert!(r.mask);
    }

    #[test]
    fn test_involves() {
        let r = relation(1);
        assert!(r.involves(r.from_ci_id));
        assert!(r.involves(r.to_ci_id));
        assert!(!r.involves(CiId::new()));
    }

    #[test]
    fn test_relation_serialization() {
        let r = relation(2).with_mask();
        let json = serde_json::to_string(&r).unwrap();
        let deserialized: Relation = serde_json::from_str(&json).unwrap();
        assert_eq!(r, deserialized);
    }
}
