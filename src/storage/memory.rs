//! In-memory fact store.
//!
//! A thread-safe, append-only reference implementation of the storage
//! contracts, intended for embedded use and tests. Facts are only ever
//! appended: a write that changes a value appends a superseding fact and
//! a delete appends a removal tombstone, each under a fresh changeset.
//! Temporal resolution picks, per (layer, key), the fact with the
//! greatest activation time not after the cursor.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::attribute::{AttributeState, CiAttribute};
use crate::changeset::{Changeset, ChangesetId};
use crate::ci::CiId;
use crate::layer::{LayerId, LayerSet};
use crate::relation::{Relation, RelationState};
use crate::storage::traits::{
    AttributeFactProvider, AttributeSelection, RelationFactProvider, RelationSelection,
    StoreError, TraitProvider,
};
use crate::time::TimeThreshold;
use crate::traits::definition::RecursiveTrait;
use crate::value::AttributeValue;

fn lock_err(context: &'static str) -> StoreError {
    StoreError::Backend(format!("poisoned lock: {context}"))
}

#[derive(Debug, Default)]
struct StoreState {
    cis: BTreeSet<CiId>,
    attributes: Vec<CiAttribute>,
    relations: Vec<Relation>,
    changesets: Vec<Changeset>,
}

impl StoreState {
    /// The fact current at the cursor for one attribute key, with
    /// insertion order breaking activation-time ties (later write wins).
    fn current_attribute(
        &self,
        layer: LayerId,
        ci: CiId,
        name: &str,
        at: TimeThreshold,
    ) -> Option<&CiAttribute> {
        self.attributes
            .iter()
            .enumerate()
            .filter(|(_, a)| {
                a.layer_id == layer
                    && a.ci_id == ci
                    && a.name == name
                    && at.includes(a.activation_time)
            })
            .max_by_key(|(idx, a)| (a.activation_time, *idx))
            .map(|(_, a)| a)
    }

    fn current_relation(
        &self,
        layer: LayerId,
        from: CiId,
        to: CiId,
        predicate: &str,
        at: TimeThreshold,
    ) -> Option<&Relation> {
        self.relations
            .iter()
            .enumerate()
            .filter(|(_, r)| {
                r.layer_id == layer
                    && r.from_ci_id == from
                    && r.to_ci_id == to
                    && r.predicate_id == predicate
                    && at.includes(r.activation_time)
            })
            .max_by_key(|(idx, r)| (r.activation_time, *idx))
            .map(|(_, r)| r)
    }

    fn open_changeset(&mut self, author: &str, timestamp: DateTime<Utc>) -> ChangesetId {
        let changeset = Changeset::at(author, timestamp);
        let id = changeset.id;
        self.changesets.push(changeset);
        id
    }
}

/// Append-only, layer-scoped fact store held entirely in memory.
///
/// # Examples
///
/// ```
/// use stratum::storage::InMemoryFactStore;
/// use stratum::{AttributeValue, LayerId};
///
/// let store = InMemoryFactStore::new();
/// let ci = store.create_ci();
/// store
///     .insert_attribute(
///         LayerId::new(1),
///         ci,
///         "hostname",
///         AttributeValue::Text("web-01".into()),
///         "importer",
///     )
///     .unwrap();
/// ```
#[derive(Debug, Default)]
pub struct InMemoryFactStore {
    state: RwLock<StoreState>,
}

impl InMemoryFactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh CI. CIs are identity only; creating one writes no
    /// facts.
    #[must_use]
    pub fn create_ci(&self) -> CiId {
        let id = CiId::new();
        if let Ok(mut state) = self.state.write() {
            state.cis.insert(id);
        }
        id
    }

    /// Registers an externally minted CI id.
    pub fn register_ci(&self, id: CiId) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| lock_err("register_ci"))?;
        state.cis.insert(id);
        Ok(())
    }

    /// All CIs ever created, including those without any facts.
    pub fn ci_ids(&self) -> Result<Vec<CiId>, StoreError> {
        let state = self.state.read().map_err(|_| lock_err("ci_ids"))?;
        Ok(state.cis.iter().copied().collect())
    }

    /// All changesets ever opened, in write order.
    pub fn changesets(&self) -> Result<Vec<Changeset>, StoreError> {
        let state = self.state.read().map_err(|_| lock_err("changesets"))?;
        Ok(state.changesets.clone())
    }

    /// Writes an attribute value, stamping the current time.
    ///
    /// Appends a superseding fact with the appropriate state (`New`,
    /// `Changed` or `Renewed`). Writing the value already current is a
    /// no-op and returns `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    pub fn insert_attribute(
        &self,
        layer: LayerId,
        ci: CiId,
        name: &str,
        value: AttributeValue,
        author: &str,
    ) -> Result<Option<ChangesetId>, StoreError> {
        self.insert_attribute_at(layer, ci, name, value, author, Utc::now())
    }

    /// Writes an attribute value with an explicit activation time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    pub fn insert_attribute_at(
        &self,
        layer: LayerId,
        ci: CiId,
        name: &str,
        value: AttributeValue,
        author: &str,
        activation_time: DateTime<Utc>,
    ) -> Result<Option<ChangesetId>, StoreError> {
        let mut state = self.state.write().map_err(|_| lock_err("insert_attribute"))?;

        let next_state = match state.current_attribute(layer, ci, name, TimeThreshold::latest()) {
            None => AttributeState::New,
            Some(current) if current.state.is_removed() => AttributeState::Renewed,
            Some(current) if current.value == value => return Ok(None),
            Some(_) => AttributeState::Changed,
        };

        let changeset_id = state.open_changeset(author, activation_time);
        state.cis.insert(ci);
        state.attributes.push(CiAttribute::new(
            name,
            ci,
            value,
            activation_time,
            next_state,
            changeset_id,
            layer,
        ));
        Ok(Some(changeset_id))
    }

    /// Removes an attribute by appending a tombstone carrying the last
    /// visible value. Removing an attribute that is not visible is a
    /// no-op and returns `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    pub fn remove_attribute(
        &self,
        layer: LayerId,
        ci: CiId,
        name: &str,
        author: &str,
    ) -> Result<Option<ChangesetId>, StoreError> {
        self.remove_attribute_at(layer, ci, name, author, Utc::now())
    }

    /// Removes an attribute with an explicit activation time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    pub fn remove_attribute_at(
        &self,
        layer: LayerId,
        ci: CiId,
        name: &str,
        author: &str,
        activation_time: DateTime<Utc>,
    ) -> Result<Option<ChangesetId>, StoreError> {
        let mut state = self.state.write().map_err(|_| lock_err("remove_attribute"))?;

        let last_value = match state.current_attribute(layer, ci, name, TimeThreshold::latest()) {
            None => return Ok(None),
            Some(current) if current.state.is_removed() => return Ok(None),
            Some(current) => current.value.clone(),
        };

        let changeset_id = state.open_changeset(author, activation_time);
        state.attributes.push(CiAttribute::new(
            name,
            ci,
            last_value,
            activation_time,
            AttributeState::Removed,
            changeset_id,
            layer,
        ));
        Ok(Some(changeset_id))
    }

    /// Asserts a relation, stamping the current time. Asserting a
    /// relation that is already visible is a no-op and returns `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    pub fn insert_relation(
        &self,
        layer: LayerId,
        from: CiId,
        to: CiId,
        predicate: &str,
        author: &str,
    ) -> Result<Option<ChangesetId>, StoreError> {
        self.insert_relation_at(layer, from, to, predicate, author, Utc::now(), false)
    }

    /// Masks a relation key: lower-precedence layers stop contributing
    /// facts for it during merging.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    pub fn mask_relation(
        &self,
        layer: LayerId,
        from: CiId,
        to: CiId,
        predicate: &str,
        author: &str,
    ) -> Result<Option<ChangesetId>, StoreError> {
        self.insert_relation_at(layer, from, to, predicate, author, Utc::now(), true)
    }

    /// Asserts a relation fact with explicit activation time and mask
    /// flag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_relation_at(
        &self,
        layer: LayerId,
        from: CiId,
        to: CiId,
        predicate: &str,
        author: &str,
        activation_time: DateTime<Utc>,
        mask: bool,
    ) -> Result<Option<ChangesetId>, StoreError> {
        let mut state = self.state.write().map_err(|_| lock_err("insert_relation"))?;

        let next_state =
            match state.current_relation(layer, from, to, predicate, TimeThreshold::latest()) {
                None => RelationState::New,
                Some(current) if current.state.is_removed() => RelationState::Renewed,
                Some(current) if current.mask == mask => return Ok(None),
                Some(_) => RelationState::Renewed,
            };

        let changeset_id = state.open_changeset(author, activation_time);
        state.cis.insert(from);
        state.cis.insert(to);
        let mut relation = Relation::new(
            from,
            to,
            predicate,
            activation_time,
            next_state,
            changeset_id,
            layer,
        );
        if mask {
            relation = relation.with_mask();
        }
        state.relations.push(relation);
        Ok(Some(changeset_id))
    }

    /// Removes a relation by appending a tombstone. Removing a relation
    /// that is not visible is a no-op and returns `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    pub fn remove_relation(
        &self,
        layer: LayerId,
        from: CiId,
        to: CiId,
        predicate: &str,
        author: &str,
    ) -> Result<Option<ChangesetId>, StoreError> {
        let mut state = self.state.write().map_err(|_| lock_err("remove_relation"))?;

        match state.current_relation(layer, from, to, predicate, TimeThreshold::latest()) {
            None => return Ok(None),
            Some(current) if current.state.is_removed() => return Ok(None),
            Some(_) => {}
        }

        let now = Utc::now();
        let changeset_id = state.open_changeset(author, now);
        state.relations.push(Relation::new(
            from,
            to,
            predicate,
            now,
            RelationState::Removed,
            changeset_id,
            layer,
        ));
        Ok(Some(changeset_id))
    }
}

impl AttributeFactProvider for InMemoryFactStore {
    fn current_attributes(
        &self,
        ci: CiId,
        selection: &AttributeSelection,
        layer_set: &LayerSet,
        at: TimeThreshold,
    ) -> Result<Vec<CiAttribute>, StoreError> {
        let state = self.state.read().map_err(|_| lock_err("current_attributes"))?;

        // resolve per (layer, name): latest activation wins, insertion
        // order breaks ties
        let mut current: HashMap<(LayerId, &str), (usize, &CiAttribute)> = HashMap::new();
        for (idx, fact) in state.attributes.iter().enumerate() {
            if fact.ci_id != ci
                || !layer_set.contains(fact.layer_id)
                || !selection.contains(&fact.name)
                || !at.includes(fact.activation_time)
            {
                continue;
            }
            let key = (fact.layer_id, fact.name.as_str());
            match current.get(&key) {
                Some((prev_idx, prev))
                    if (prev.activation_time, *prev_idx)
                        > (fact.activation_time, idx) => {}
                _ => {
                    current.insert(key, (idx, fact));
                }
            }
        }
        Ok(current.into_values().map(|(_, fact)| fact.clone()).collect())
    }

    fn attribute_history(
        &self,
        ci: CiId,
        name: &str,
        layer: LayerId,
    ) -> Result<Vec<CiAttribute>, StoreError> {
        let state = self.state.read().map_err(|_| lock_err("attribute_history"))?;
        let mut history: Vec<CiAttribute> = state
            .attributes
            .iter()
            .filter(|a| a.ci_id == ci && a.name == name && a.layer_id == layer)
            .cloned()
            .collect();
        history.sort_by_key(|a| a.activation_time);
        Ok(history)
    }
}

impl RelationFactProvider for InMemoryFactStore {
    fn current_relations(
        &self,
        selection: &RelationSelection,
        layer_set: &LayerSet,
        at: TimeThreshold,
    ) -> Result<Vec<Relation>, StoreError> {
        let state = self.state.read().map_err(|_| lock_err("current_relations"))?;

        let mut current: HashMap<(LayerId, CiId, CiId, &str), (usize, &Relation)> = HashMap::new();
        for (idx, fact) in state.relations.iter().enumerate() {
            if !selection.matches(fact)
                || !layer_set.contains(fact.layer_id)
                || !at.includes(fact.activation_time)
            {
                continue;
            }
            let key = (
                fact.layer_id,
                fact.from_ci_id,
                fact.to_ci_id,
                fact.predicate_id.as_str(),
            );
            match current.get(&key) {
                Some((prev_idx, prev))
                    if (prev.activation_time, *prev_idx)
                        > (fact.activation_time, idx) => {}
                _ => {
                    current.insert(key, (idx, fact));
                }
            }
        }
        Ok(current.into_values().map(|(_, fact)| fact.clone()).collect())
    }
}

/// In-memory trait definition store.
///
/// Definitions are replaced wholesale; the store hands out the full set
/// regardless of cursor, which suits embedded use where definitions are
/// not themselves versioned.
#[derive(Debug, Default)]
pub struct InMemoryTraitStore {
    traits: RwLock<HashMap<String, RecursiveTrait>>,
}

impl InMemoryTraitStore {
    /// Creates an empty definition store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a trait definition.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    pub fn upsert(&self, definition: RecursiveTrait) -> Result<(), StoreError> {
        let mut traits = self.traits.write().map_err(|_| lock_err("upsert"))?;
        traits.insert(definition.id.clone(), definition);
        Ok(())
    }

    /// Removes a trait definition by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    pub fn remove(&self, id: &str) -> Result<Option<RecursiveTrait>, StoreError> {
        let mut traits = self.traits.write().map_err(|_| lock_err("remove"))?;
        Ok(traits.remove(id))
    }
}

impl TraitProvider for InMemoryTraitStore {
    fn active_traits(
        &self,
        _at: TimeThreshold,
    ) -> Result<HashMap<String, RecursiveTrait>, StoreError> {
        let traits = self.traits.read().map_err(|_| lock_err("active_traits"))?;
        Ok(traits.clone())
    }
}
