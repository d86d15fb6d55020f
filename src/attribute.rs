//! Layer-scoped attribute facts.
//!
//! An attribute fact is keyed by (name, CI, layer). Facts are appended,
//! never updated in place; removal is itself a new fact with
//! [`AttributeState::Removed`]. At most one fact per key is current at a
//! given time cursor, and the history of a key is the sequence of
//! superseding facts ordered by activation time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::changeset::ChangesetId;
use crate::ci::CiId;
use crate::layer::LayerId;
use crate::value::AttributeValue;

/// Lifecycle state of an attribute fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeState {
    /// First fact for its key.
    New,
    /// Supersedes a fact with a different value.
    Changed,
    /// Tombstone; the key has no visible value in this layer.
    Removed,
    /// Re-assertion after a removal.
    Renewed,
}

impl AttributeState {
    /// Removed facts never win a merge.
    #[must_use]
    pub const fn is_removed(&self) -> bool {
        matches!(self, Self::Removed)
    }
}

/// A single layer-scoped attribute fact about a CI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiAttribute {
    /// Identifier of this individual fact.
    pub id: Uuid,
    /// Attribute name, unique per (CI, layer) at any one cursor.
    pub name: String,
    /// The CI this fact is about.
    pub ci_id: CiId,
    /// The typed value asserted by this fact.
    pub value: AttributeValue,
    /// When this fact supersedes its predecessor.
    pub activation_time: DateTime<Utc>,
    /// Lifecycle state.
    pub state: AttributeState,
    /// Changeset that wrote this fact.
    pub changeset_id: ChangesetId,
    /// Layer asserting this fact.
    pub layer_id: LayerId,
}

impl CiAttribute {
    /// Creates an attribute fact.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        ci_id: CiId,
        value: AttributeValue,
        activation_time: DateTime<Utc>,
        state: AttributeState,
        changeset_id: ChangesetId,
        layer_id: LayerId,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            ci_id,
            value,
            activation_time,
            state,
            changeset_id,
            layer_id,
        }
    }
}

/// The merge result for one attribute name across a layer set.
///
/// Carries the winning fact plus the layer stack: the layers (in
/// ascending precedence, within the queried layer set) holding a visible
/// current fact for the name. The winner is always the last stack entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedCiAttribute {
    /// The fact from the highest-precedence layer with a visible value.
    pub attribute: CiAttribute,
    /// Layers holding a visible current fact, ascending precedence.
    pub layer_stack: Vec<LayerId>,
}

impl MergedCiAttribute {
    /// The layer the winning fact came from.
    #[must_use]
    pub fn winning_layer(&self) -> LayerId {
        self.attribute.layer_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::AttributeValue;

    fn fact(layer: i64) -> CiAttribute {
        CiAttribute::new(
            "hostname",
            CiId::new(),
            AttributeValue::Text("web-01".into()),
            Utc::now(),
            AttributeState::New,
            ChangesetId::new(),
            LayerId::new(layer),
        )
    }

    #[test]
    fn test_attribute_state_removed() {
        assert!(AttributeState::Removed.is_removed());
        assert!(!AttributeState::Renewed.is_removed());
        assert!(!AttributeState::Changed.is_removed());
    }

    #[test]
    fn test_winning_layer_is_fact_layer() {
        let f = fact(4);
        let merged = MergedCiAttribute {
            attribute: f,
            layer_stack: vec![LayerId::new(1), LayerId::new(4)],
        };
        assert_eq!(merged.winning_layer(), LayerId::new(4));
    }

    #[test]
    fn test_attribute_serialization() {
        let f = fact(1);
        let json = serde_json::to_string(&f).unwrap();
        let deserialized: CiAttribute = serde_json::from_str(&json).unwrap();
        assert_eq!(f, deserialized);
    }
}
