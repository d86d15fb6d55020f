//! The trait model: definitions, flattening and caching.
//!
//! Traits give layered facts their semantics. An authored
//! [`RecursiveTrait`] composes other traits by reference; flattening
//! resolves the composition into a [`GenericTrait`] the matching engine
//! can evaluate directly.

pub mod cache;
pub mod definition;
pub mod flatten;

pub use cache::{FlattenedTraitSet, TraitsCache};
pub use definition::{
    GenericTrait, RecursiveTrait, RelationDirection, RelationTemplate, TraitAttribute,
    TraitOrigin, TraitOriginType, TraitRelation,
};
pub use flatten::{flatten, flatten_single, trait_set_hash, TraitSetHash};
