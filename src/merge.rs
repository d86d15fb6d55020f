//! The layer merge engine.
//!
//! Merging resolves the per-layer facts about a CI into one authoritative
//! fact per key, honoring layer-set precedence, removal tombstones and
//! relation masking. The engine is a pure function over already-fetched
//! facts: the persistence collaborator supplies the fact current at the
//! queried cursor per (layer, key), and the merge never touches storage.
//!
//! Contract with the collaborator: exactly zero or one current fact per
//! (layer, key), every fact drawn from a layer of the queried
//! [`LayerSet`], every fact about the CI being merged. Violations are
//! fatal [`MergeError`]s, never silently resolved.

use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use crate::attribute::{CiAttribute, MergedCiAttribute};
use crate::ci::CiId;
use crate::error::MergeError;
use crate::layer::{LayerId, LayerSet};
use crate::relation::{MergedRelation, Relation, RelationKey};
use crate::time::TimeThreshold;

/// The merged, layer-resolved view of one CI at one time cursor.
///
/// Recomputed on demand and never persisted (which is why it has no
/// serialized form); for a fixed fact snapshot, layer-set order and
/// cursor the view is fully deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedCi {
    /// The CI this view describes.
    pub id: CiId,
    /// Cursor the underlying facts were resolved at.
    pub at_time: TimeThreshold,
    /// Layer set that defined merge precedence.
    pub layers: LayerSet,
    /// One merged attribute per visible name.
    pub attributes: BTreeMap<String, MergedCiAttribute>,
    /// One merged relation per visible key, outgoing and incoming.
    pub relations: HashMap<RelationKey, MergedRelation>,
}

impl MergedCi {
    /// Looks up a merged attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&MergedCiAttribute> {
        self.attributes.get(name)
    }

    /// Iterates merged relations with the given predicate where this CI
    /// is the source.
    pub fn outgoing_relations<'a>(
        &'a self,
        predicate_id: &'a str,
    ) -> impl Iterator<Item = &'a MergedRelation> {
        self.relations
            .values()
            .filter(move |r| r.relation.predicate_id == predicate_id && r.relation.from_ci_id == self.id)
    }

    /// Iterates merged relations with the given predicate where this CI
    /// is the target.
    pub fn incoming_relations<'a>(
        &'a self,
        predicate_id: &'a str,
    ) -> impl Iterator<Item = &'a MergedRelation> {
        self.relations
            .values()
            .filter(move |r| r.relation.predicate_id == predicate_id && r.relation.to_ci_id == self.id)
    }
}

/// Merges per-layer current attribute facts into one fact per name.
///
/// Walks the layer set highest-to-lowest precedence per name; the first
/// non-removed current fact wins and is emitted together with the stack
/// of layers holding a visible fact for that name. Names whose every
/// current fact is removed are absent from the result; no placeholder is
/// emitted.
///
/// # Errors
///
/// Returns [`MergeError`] on contract violations: duplicate current
/// facts for one (layer, name), a fact from a layer outside the set, or
/// facts about more than one CI.
pub fn merge_attributes(
    layer_set: &LayerSet,
    facts: impl IntoIterator<Item = CiAttribute>,
) -> Result<BTreeMap<String, MergedCiAttribute>, MergeError> {
    let mut by_name: BTreeMap<String, HashMap<LayerId, CiAttribute>> = BTreeMap::new();
    let mut ci: Option<CiId> = None;

    for fact in facts {
        if !layer_set.contains(fact.layer_id) {
            return Err(MergeError::LayerNotInSet {
                layer: fact.layer_id,
            });
        }
        match ci {
            None => ci = Some(fact.ci_id),
            Some(expected) if expected != fact.ci_id => {
                return Err(MergeError::CiMismatch {
                    expected,
                    found: fact.ci_id,
                });
            }
            Some(_) => {}
        }

        let layer = fact.layer_id;
        let name = fact.name.clone();
        if by_name.entry(name.clone()).or_default().insert(layer, fact).is_some() {
            return Err(MergeError::DuplicateAttributeFact { layer, name });
        }
    }

    let mut merged = BTreeMap::new();
    for (name, mut per_layer) in by_name {
        let stack: Vec<LayerId> = layer_set
            .iter()
            .filter(|layer| per_layer.get(layer).is_some_and(|f| !f.state.is_removed()))
            .collect();

        let Some(winner_layer) = stack.last().copied() else {
            continue; // every current fact for this name is removed
        };
        let winner = per_layer
            .remove(&winner_layer)
            .expect("winning layer taken from the stack");
        merged.insert(
            name,
            MergedCiAttribute {
                attribute: winner,
                layer_stack: stack,
            },
        );
    }
    Ok(merged)
}

/// Merges per-layer current relation facts into one fact per key.
///
/// Masking is evaluated first: for a key, the highest-precedence layer
/// asserting the mask flag excludes every lower-precedence fact for that
/// key from consideration, independent of the masking fact's own state.
/// A masking fact asserts absence and never becomes a merge winner
/// itself. The standard precedence walk then runs among the remaining
/// layers.
///
/// # Errors
///
/// Returns [`MergeError`] on duplicate current facts for one
/// (layer, key) or a fact from a layer outside the set.
pub fn merge_relations(
    layer_set: &LayerSet,
    facts: impl IntoIterator<Item = Relation>,
) -> Result<HashMap<RelationKey, MergedRelation>, MergeError> {
    let mut by_key: HashMap<RelationKey, HashMap<LayerId, Relation>> = HashMap::new();

    for fact in facts {
        if !layer_set.contains(fact.layer_id) {
            return Err(MergeError::LayerNotInSet {
                layer: fact.layer_id,
            });
        }
        let key = fact.key();
        let layer = fact.layer_id;
        if by_key.entry(key.clone()).or_default().insert(layer, fact).is_some() {
            return Err(MergeError::DuplicateRelationFact { layer, key });
        }
    }

    let mut merged = HashMap::new();
    for (key, mut per_layer) in by_key {
        // mask cutoff: facts strictly below the highest masking layer are
        // out of consideration, whatever their state
        let mask_cutoff = per_layer
            .values()
            .filter(|f| f.mask)
            .filter_map(|f| layer_set.precedence(f.layer_id))
            .max();

        let stack: Vec<LayerId> = layer_set
            .iter()
            .enumerate()
            .filter(|(pos, _)| mask_cutoff.map_or(true, |cutoff| *pos > cutoff))
            .filter(|(_, layer)| {
                per_layer
                    .get(layer)
                    .is_some_and(|f| !f.mask && !f.state.is_removed())
            })
            .map(|(_, layer)| layer)
            .collect();

        let Some(winner_layer) = stack.last().copied() else {
            continue;
        };
        let winner = per_layer
            .remove(&winner_layer)
            .expect("winning layer taken from the stack");
        merged.insert(
            key,
            MergedRelation {
                relation: winner,
                layer_stack: stack,
            },
        );
    }
    Ok(merged)
}

/// Builds the merged view of one CI from its current attribute and
/// relation facts.
///
/// # Errors
///
/// Returns [`MergeError`] on any merge contract violation, including
/// facts that do not belong to `id`.
pub fn merge_ci(
    id: CiId,
    layers: LayerSet,
    at_time: TimeThreshold,
    attribute_facts: impl IntoIterator<Item = CiAttribute>,
    relation_facts: impl IntoIterator<Item = Relation>,
) -> Result<MergedCi, MergeError> {
    let attribute_facts: Vec<CiAttribute> = attribute_facts.into_iter().collect();
    if let Some(fact) = attribute_facts.iter().find(|f| f.ci_id != id) {
        return Err(MergeError::CiMismatch {
            expected: id,
            found: fact.ci_id,
        });
    }
    let relation_facts: Vec<Relation> = relation_facts.into_iter().collect();
    if let Some(fact) = relation_facts.iter().find(|f| !f.involves(id)) {
        return Err(MergeError::CiMismatch {
            expected: id,
            found: fact.from_ci_id,
        });
    }

    let attributes = merge_attributes(&layers, attribute_facts)?;
    let relations = merge_relations(&layers, relation_facts)?;
    trace!(
        ci = %id,
        attributes = attributes.len(),
        relations = relations.len(),
        "merged ci"
    );
    Ok(MergedCi {
        id,
        at_time,
        layers,
        attributes,
        relations,
    })
}
