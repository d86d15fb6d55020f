//! Collaborator contracts for fact and trait storage.
//!
//! The core engines are pure functions over already-fetched data; these
//! traits specify exactly what they consume. A provider must hand the
//! merge engine a consistent snapshot: for each (layer, key) the single
//! fact current at the queried cursor, drawn from an isolated read at
//! one time cursor. The core manages no transaction boundaries.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

use crate::attribute::CiAttribute;
use crate::ci::CiId;
use crate::layer::{LayerId, LayerSet};
use crate::relation::Relation;
use crate::time::TimeThreshold;
use crate::traits::definition::RecursiveTrait;

/// Errors raised by storage collaborators.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// CI not known to the store.
    #[error("CI not found: {0}")]
    CiNotFound(CiId),

    /// Layer not known to the store.
    #[error("layer not found: {0}")]
    LayerNotFound(LayerId),

    /// Backend failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Which attribute names to load for a CI.
///
/// Trait filtering over many CIs loads only the names its templates
/// target; everything else stays in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeSelection {
    /// Load every attribute.
    All,
    /// Load only the named attributes.
    Named(BTreeSet<String>),
}

impl AttributeSelection {
    /// Selection covering the attribute names a trait's templates target.
    #[must_use]
    pub fn for_trait(generic_trait: &crate::traits::definition::GenericTrait) -> Self {
        Self::Named(generic_trait.relevant_attribute_names())
    }

    /// Whether the named attribute is covered by this selection.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Named(names) => names.contains(name),
        }
    }
}

/// Which relations to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationSelection {
    /// Every relation.
    All,
    /// Relations with the given CI as source.
    From(CiId),
    /// Relations with the given CI as target.
    To(CiId),
    /// Relations with the given CI on either end.
    Involving(CiId),
}

impl RelationSelection {
    /// Whether the relation is covered by this selection.
    #[must_use]
    pub fn matches(&self, relation: &Relation) -> bool {
        match self {
            Self::All => true,
            Self::From(ci) => relation.from_ci_id == *ci,
            Self::To(ci) => relation.to_ci_id == *ci,
            Self::Involving(ci) => relation.involves(*ci),
        }
    }
}

/// Supplies current attribute facts, temporal resolution already applied.
///
/// For each (layer, name) of the queried CI there is at most one fact in
/// the result: the one current at the cursor. Removed facts are included
/// so the merge can honor tombstones.
pub trait AttributeFactProvider: Send + Sync {
    /// Current attribute facts for one CI across the layers of the set.
    fn current_attributes(
        &self,
        ci: CiId,
        selection: &AttributeSelection,
        layer_set: &LayerSet,
        at: TimeThreshold,
    ) -> Result<Vec<CiAttribute>, StoreError>;

    /// Full history of one attribute key in one layer, ordered by
    /// activation time.
    fn attribute_history(
        &self,
        ci: CiId,
        name: &str,
        layer: LayerId,
    ) -> Result<Vec<CiAttribute>, StoreError>;
}

/// Supplies current relation facts, temporal resolution already applied.
pub trait RelationFactProvider: Send + Sync {
    /// Current relation facts matching the selection across the layers
    /// of the set.
    fn current_relations(
        &self,
        selection: &RelationSelection,
        layer_set: &LayerSet,
        at: TimeThreshold,
    ) -> Result<Vec<Relation>, StoreError>;
}

/// Supplies the authored trait definition set.
pub trait TraitProvider: Send + Sync {
    /// The trait definitions active at the cursor, keyed by trait id.
    fn active_traits(
        &self,
        at: TimeThreshold,
    ) -> Result<HashMap<String, RecursiveTrait>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test: ensure contracts are object-safe
    fn _assert_attribute_provider_object_safe(_: &dyn AttributeFactProvider) {}
    fn _assert_relation_provider_object_safe(_: &dyn RelationFactProvider) {}
    fn _assert_trait_provider_object_safe(_: &dyn TraitProvider) {}

    #[test]
    fn test_store_error_display() {
        let err = StoreError::CiNotFound(CiId::nil());
        assert!(err.to_string().contains("CI not found"));

        let err = StoreError::Backend("disk on fire".to_string());
        assert!(err.to_string().contains("disk on fire"));
    }

    #[test]
    fn test_attribute_selection() {
        assert!(AttributeSelection::All.contains("anything"));
        let named = AttributeSelection::Named(["hostname".to_string()].into());
        assert!(named.contains("hostname"));
        assert!(!named.contains("os"));
    }

    #[test]
    fn test_relation_selection() {
        use chrono::Utc;
        use crate::changeset::ChangesetId;
        use crate::relation::RelationState;

        let from = CiId::new();
        let to = CiId::new();
        let rel = Relation::new(
            from,
            to,
            "runs_on",
            Utc::now(),
            RelationState::New,
            ChangesetId::new(),
            LayerId::new(1),
        );
        assert!(RelationSelection::All.matches(&rel));
        assert!(RelationSelection::From(from).matches(&rel));
        assert!(!RelationSelection::From(to).matches(&rel));
        assert!(RelationSelection::To(to).matches(&rel));
        assert!(RelationSelection::Involving(from).matches(&rel));
        assert!(RelationSelection::Involving(to).matches(&rel));
        assert!(!RelationSelection::Involving(CiId::new()).matches(&rel));
    }
}
