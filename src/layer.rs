//! Layers and layer sets.
//!
//! A layer is a named data source that asserts facts about CIs
//! independently of every other layer. A [`LayerSet`] is an ordered,
//! duplicate-free sequence of layers that defines merge precedence for a
//! query: later entries win on conflict.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a data layer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LayerId(i64);

impl LayerId {
    /// Creates a layer identifier from a raw number.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw numeric identifier.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for LayerId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A named data source for layer-scoped facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    /// Identifier referenced by facts and layer sets.
    pub id: LayerId,
    /// Human-readable name.
    pub name: String,

    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Layer {
    /// Creates a new layer.
    #[must_use]
    pub fn new(id: LayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Error raised when a layer set is built with a repeated layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("layer {0} appears more than once in the layer set")]
pub struct DuplicateLayerError(pub LayerId);

/// An ordered, duplicate-free sequence of layers defining merge precedence.
///
/// Precedence is positional: the later a layer appears in the set, the
/// higher its precedence during merging. The derived [`hash`](Self::hash)
/// is stable for a fixed order and usable as a cache key.
///
/// # Examples
///
/// ```
/// use stratum::{LayerId, LayerSet};
///
/// let base = LayerId::new(1);
/// let overrides = LayerId::new(2);
/// let set = LayerSet::build(vec![base, overrides]).unwrap();
///
/// // later entries win: `overrides` has the higher precedence
/// assert!(set.precedence(overrides) > set.precedence(base));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LayerId>", into = "Vec<LayerId>")]
pub struct LayerSet {
    ids: Vec<LayerId>,
}

impl TryFrom<Vec<LayerId>> for LayerSet {
    type Error = DuplicateLayerError;

    fn try_from(ids: Vec<LayerId>) -> Result<Self, Self::Error> {
        Self::build(ids)
    }
}

impl From<LayerSet> for Vec<LayerId> {
    fn from(set: LayerSet) -> Self {
        set.ids
    }
}

impl LayerSet {
    /// Builds a layer set from an ordered sequence of layer ids.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateLayerError`] if any layer appears twice.
    pub fn build(ids: Vec<LayerId>) -> Result<Self, DuplicateLayerError> {
        for (i, id) in ids.iter().enumerate() {
            if ids[..i].contains(id) {
                return Err(DuplicateLayerError(*id));
            }
        }
        Ok(Self { ids })
    }

    /// Builds a layer set containing a single layer.
    #[must_use]
    pub fn single(id: LayerId) -> Self {
        Self { ids: vec![id] }
    }

    /// Builds the empty layer set. Merging over it yields nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self { ids: Vec::new() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: LayerId) -> bool {
        self.ids.contains(&id)
    }

    /// Returns the precedence index of a layer: higher means it wins over
    /// lower. `None` if the layer is not part of the set.
    #[must_use]
    pub fn precedence(&self, id: LayerId) -> Option<usize> {
        self.ids.iter().position(|l| *l == id)
    }

    /// Iterates layers in ascending precedence (lowest first).
    pub fn iter(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.ids.iter().copied()
    }

    /// Iterates layers in descending precedence (highest first), the order
    /// of the merge walk.
    pub fn iter_highest_first(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.ids.iter().rev().copied()
    }

    /// Stable hash over the ordered layer ids, usable as a cache key.
    ///
    /// Two layer sets with the same layers in the same order hash
    /// identically; reordering changes the hash.
    #[must_use]
    pub fn hash(&self) -> LayerSetHash {
        let mut hasher = blake3::Hasher::new();
        for id in &self.ids {
            hasher.update(&id.as_i64().to_le_bytes());
        }
        LayerSetHash(*hasher.finalize().as_bytes())
    }
}

impl fmt::Display for LayerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, id) in self.ids.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{id}")?;
        }
        write!(f, "]")
    }
}

/// Derived hash of a [`LayerSet`], stable across processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerSetHash([u8; 32]);

impl fmt::Display for LayerSetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_set_rejects_duplicates() {
        let err = LayerSet::build(vec![LayerId::new(1), LayerId::new(2), LayerId::new(1)]);
        assert_eq!(err, Err(DuplicateLayerError(LayerId::new(1))));
    }

    #[test]
    fn test_layer_set_precedence() {
        let set = LayerSet::build(vec![LayerId::new(3), LayerId::new(7)]).unwrap();
        assert_eq!(set.precedence(LayerId::new(3)), Some(0));
        assert_eq!(set.precedence(LayerId::new(7)), Some(1));
        assert_eq!(set.precedence(LayerId::new(9)), None);
    }

    #[test]
    fn test_layer_set_iteration_orders() {
        let set = LayerSet::build(vec![LayerId::new(1), LayerId::new(2), LayerId::new(3)]).unwrap();
        let ascending: Vec<i64> = set.iter().map(|l| l.as_i64()).collect();
        let descending: Vec<i64> = set.iter_highest_first().map(|l| l.as_i64()).collect();
        assert_eq!(ascending, vec![1, 2, 3]);
        assert_eq!(descending, vec![3, 2, 1]);
    }

    #[test]
    fn test_layer_set_empty() {
        let set = LayerSet::empty();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn test_layer_set_hash_depends_on_order() {
        let a = LayerSet::build(vec![LayerId::new(1), LayerId::new(2)]).unwrap();
        let b = LayerSet::build(vec![LayerId::new(2), LayerId::new(1)]).unwrap();
        let a2 = LayerSet::build(vec![LayerId::new(1), LayerId::new(2)]).unwrap();
        assert_eq!(a.hash(), a2.hash());
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_layer_set_display() {
        let set = LayerSet::build(vec![LayerId::new(1), LayerId::new(2)]).unwrap();
        assert_eq!(format!("{set}"), "[1,2]");
    }

    #[test]
    fn test_layer_builder() {
        let layer = Layer::new(LayerId::new(5), "cmdb-import").with_description("nightly import");
        assert_eq!(layer.name, "cmdb-import");
        assert_eq!(layer.description.as_deref(), Some("nightly import"));
    }

    #[test]
    fn test_layer_set_serialization() {
        let set = LayerSet::build(vec![LayerId::new(1), LayerId::new(2)]).unwrap();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, "[1,2]");
        let deserialized: LayerSet = serde_json::from_str(&json).unwrap();
        assert_eq!(set, deserialized);
    }
}
