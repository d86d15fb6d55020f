//! Caching of flattened trait sets.
//!
//! Flattening is deterministic, so its result can be cached keyed by a
//! hash of the definition set. The cache is an explicit object owned by
//! the calling service, not global state, and publishes snapshots by
//! atomic whole-replacement: a concurrent reader observes either the
//! entire old or the entire new flattened set, never a mix.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::TraitDefinitionError;
use crate::traits::definition::{GenericTrait, RecursiveTrait};
use crate::traits::flatten::{flatten, trait_set_hash, TraitSetHash};

/// An immutable, fully-flattened trait set snapshot.
#[derive(Debug, Clone)]
pub struct FlattenedTraitSet {
    hash: TraitSetHash,
    traits: HashMap<String, GenericTrait>,
}

impl FlattenedTraitSet {
    /// Hash of the definition set this snapshot was flattened from.
    #[must_use]
    pub const fn hash(&self) -> TraitSetHash {
        self.hash
    }

    /// Looks up a flattened trait by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&GenericTrait> {
        self.traits.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.traits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.traits.is_empty()
    }

    /// Iterates all flattened traits.
    pub fn iter(&self) -> impl Iterator<Item = &GenericTrait> {
        self.traits.values()
    }
}

/// Cache for flattened trait sets with atomic snapshot replacement.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use stratum::{RecursiveTrait, TraitOrigin, TraitsCache};
///
/// let cache = TraitsCache::new();
/// let mut defs = HashMap::new();
/// defs.insert(
///     "host".to_string(),
///     RecursiveTrait::new("host", TraitOrigin::core()),
/// );
///
/// let first = cache.get_or_flatten(&defs).unwrap();
/// let second = cache.get_or_flatten(&defs).unwrap();
/// // unchanged definitions are served from the cache
/// assert!(std::sync::Arc::ptr_eq(&first, &second));
/// ```
#[derive(Debug, Default)]
pub struct TraitsCache {
    current: RwLock<Option<Arc<FlattenedTraitSet>>>,
}

impl TraitsCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// Returns the flattened form of `defs`, reusing the cached snapshot
    /// when the definition set is unchanged.
    ///
    /// On change the whole new snapshot replaces the old one atomically.
    /// Two racing writers both publish valid snapshots; the later write
    /// wins.
    ///
    /// # Errors
    ///
    /// Propagates [`TraitDefinitionError`] from flattening; the cached
    /// snapshot is left untouched in that case.
    pub fn get_or_flatten(
        &self,
        defs: &HashMap<String, RecursiveTrait>,
    ) -> Result<Arc<FlattenedTraitSet>, TraitDefinitionError> {
        let hash = trait_set_hash(defs);

        if let Ok(guard) = self.current.read() {
            if let Some(snapshot) = guard.as_ref() {
                if snapshot.hash == hash {
                    return Ok(Arc::clone(snapshot));
                }
            }
        }

        let traits = flatten(defs)?;
        let snapshot = Arc::new(FlattenedTraitSet { hash, traits });
        if let Ok(mut guard) = self.current.write() {
            *guard = Some(Arc::clone(&snapshot));
        }
        debug!(hash = %hash, traits = snapshot.len(), "published flattened trait set");
        Ok(snapshot)
    }

    /// Drops the cached snapshot; the next call re-flattens.
    pub fn invalidate(&self) {
        if let Ok(mut guard) = self.current.write() {
            *guard = None;
        }
    }

    /// The currently published snapshot, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<FlattenedTraitSet>> {
        self.current.read().ok().and_then(|guard| guard.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::definition::TraitOrigin;

    fn defs(ids: &[&str]) -> HashMap<String, RecursiveTrait> {
        ids.iter()
            .map(|id| ((*id).to_string(), RecursiveTrait::new(*id, TraitOrigin::data())))
            .collect()
    }

    #[test]
    fn test_cache_hit_on_unchanged_set() {
        let cache = TraitsCache::new();
        let set = defs(&["a", "b"]);
        let first = cache.get_or_flatten(&set).unwrap();
        let second = cache.get_or_flatten(&set).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_cache_invalidated_on_change() {
        let cache = TraitsCache::new();
        let first = cache.get_or_flatten(&defs(&["a"])).unwrap();
        let second = cache.get_or_flatten(&defs(&["a", "b"])).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn test_explicit_invalidate() {
        let cache = TraitsCache::new();
        let set = defs(&["a"]);
        let first = cache.get_or_flatten(&set).unwrap();
        cache.invalidate();
        assert!(cache.snapshot().is_none());
        let second = cache.get_or_flatten(&set).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.hash(), second.hash());
    }

    #[test]
    fn test_failed_flatten_keeps_old_snapshot() {
        let cache = TraitsCache::new();
        let good = defs(&["a"]);
        cache.get_or_flatten(&good).unwrap();

        let mut bad = HashMap::new();
        bad.insert(
            "x".to_string(),
            RecursiveTrait::new("x", TraitOrigin::data())
                .with_required_traits(vec!["missing".into()]),
        );
        assert!(cache.get_or_flatten(&bad).is_err());

        let snapshot = cache.snapshot().expect("old snapshot still published");
        assert!(snapshot.get("a").is_some());
    }

    #[test]
    fn test_old_snapshot_remains_readable_after_replacement() {
        let cache = TraitsCache::new();
        let first = cache.get_or_flatten(&defs(&["a"])).unwrap();
        let _second = cache.get_or_flatten(&defs(&["b"])).unwrap();
        // a reader holding the old Arc still sees the whole old set
        assert!(first.get("a").is_some());
        assert!(first.get("b").is_none());
    }
}
