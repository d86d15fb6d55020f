//! Storage collaborator contracts and the in-memory reference store.
//!
//! The contracts describe what the core consumes from a persistence
//! collaborator; [`InMemoryFactStore`] implements them for embedded use
//! and tests. Durable backends live outside this crate.

pub mod memory;
pub mod traits;

pub use memory::{InMemoryFactStore, InMemoryTraitStore};
pub use traits::{
    AttributeFactProvider, AttributeSelection, RelationFactProvider, RelationSelection,
    StoreError, TraitProvider,
};

use crate::ci::CiId;
use crate::error::StratumResult;
use crate::layer::LayerSet;
use crate::merge::{merge_ci, MergedCi};
use crate::time::TimeThreshold;

/// Loads and merges one CI: fetches its current facts from the providers
/// and resolves them into a [`MergedCi`].
///
/// `selection` bounds which attributes are fetched; trait filtering over
/// many CIs passes [`AttributeSelection::for_trait`] so irrelevant
/// attributes never leave the store.
///
/// # Errors
///
/// Propagates provider failures and merge precondition violations.
pub fn load_merged_ci<A, R>(
    attributes: &A,
    relations: &R,
    ci: CiId,
    layer_set: &LayerSet,
    at: TimeThreshold,
    selection: &AttributeSelection,
) -> StratumResult<MergedCi>
where
    A: AttributeFactProvider + ?Sized,
    R: RelationFactProvider + ?Sized,
{
    let attribute_facts = attributes.current_attributes(ci, selection, layer_set, at)?;
    let relation_facts =
        relations.current_relations(&RelationSelection::Involving(ci), layer_set, at)?;
    Ok(merge_ci(
        ci,
        layer_set.clone(),
        at,
        attribute_facts,
        relation_facts,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayerId;
    use crate::value::AttributeValue;

    #[test]
    fn test_load_merged_ci_composes_providers_and_merge() {
        let store = InMemoryFactStore::new();
        let ci = store.create_ci();
        let other = store.create_ci();
        let base = LayerId::new(1);
        let overrides = LayerId::new(2);

        store
            .insert_attribute(base, ci, "hostname", AttributeValue::Text("old".into()), "t")
            .unwrap();
        store
            .insert_attribute(overrides, ci, "hostname", AttributeValue::Text("new".into()), "t")
            .unwrap();
        store.insert_relation(base, ci, other, "runs_on", "t").unwrap();

        let layer_set = LayerSet::build(vec![base, overrides]).unwrap();
        let merged = load_merged_ci(
            &store,
            &store,
            ci,
            &layer_set,
            TimeThreshold::latest(),
            &AttributeSelection::All,
        )
        .unwrap();

        assert_eq!(
            merged.attribute("hostname").unwrap().attribute.value,
            AttributeValue::Text("new".into())
        );
        assert_eq!(merged.relations.len(), 1);
    }
}
