//! # stratum - a versioned, multi-layer CMDB core
//!
//! stratum is the computational core of a configuration management
//! database: a graph of configuration items (CIs) about which any number
//! of independent, ordered data layers assert time-stamped facts without
//! overwriting each other.
//!
//! ## Core Concepts
//!
//! - **CI**: an opaque, stable identity; all data about it is layer-scoped
//! - **Layer / LayerSet**: independent fact sources and the ordered set
//!   defining merge precedence (later entries win)
//! - **Merge**: the deterministic resolution of per-layer facts into one
//!   fact per key, honoring tombstones and relation masking
//! - **Trait**: a composable schema of required/optional attributes and
//!   relations, flattened before evaluation
//! - **Effective Trait**: the typed payload extracted when a merged CI
//!   satisfies a trait
//!
//! ## Usage
//!
//! ```rust
//! use stratum::storage::{AttributeSelection, InMemoryFactStore};
//! use stratum::{
//!     flatten_single, load_merged_ci, match_ci, AttributeValue, AttributeValueType,
//!     CiAttributeTemplate, LayerId, LayerSet, RecursiveTrait, TimeThreshold, TraitAttribute,
//!     TraitOrigin,
//! };
//!
//! // two layers assert facts about the same CI
//! let store = InMemoryFactStore::new();
//! let ci = store.create_ci();
//! let base = LayerId::new(1);
//! let manual = LayerId::new(2);
//! store
//!     .insert_attribute(base, ci, "hostname", AttributeValue::Text("imported".into()), "import")
//!     .unwrap();
//! store
//!     .insert_attribute(manual, ci, "hostname", AttributeValue::Text("web-01".into()), "admin")
//!     .unwrap();
//!
//! // the later layer of the set wins the merge
//! let layers = LayerSet::build(vec![base, manual]).unwrap();
//! let merged = load_merged_ci(
//!     &store,
//!     &store,
//!     ci,
//!     &layers,
//!     TimeThreshold::latest(),
//!     &AttributeSelection::All,
//! )
//! .unwrap();
//!
//! // evaluate a trait against the merged view
//! let host = flatten_single(
//!     &RecursiveTrait::new("host", TraitOrigin::core()).with_required_attributes(vec![
//!         TraitAttribute::new(
//!             "hostname",
//!             CiAttributeTemplate::new("hostname").with_type(AttributeValueType::Text),
//!         ),
//!     ]),
//! )
//! .unwrap();
//! let effective = match_ci(&merged, &host).expect("ci satisfies the trait");
//! assert_eq!(
//!     effective.attributes["hostname"].attribute.value,
//!     AttributeValue::Text("web-01".into())
//! );
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Identity and time primitives
pub mod changeset;
pub mod ci;
pub mod error;
pub mod layer;
pub mod time;

// Layer-scoped facts and their values
pub mod attribute;
pub mod relation;
pub mod value;

// Engines
pub mod matching;
pub mod merge;
pub mod template;
pub mod traits;

// Collaborator contracts and the in-memory reference store
pub mod storage;

// Re-export primary types at crate root for convenience
pub use attribute::{AttributeState, CiAttribute, MergedCiAttribute};
pub use changeset::{Changeset, ChangesetId};
pub use ci::CiId;
pub use error::{
    MergeError, StratumError, StratumResult, TraitDefinitionError, ValueError,
};
pub use layer::{DuplicateLayerError, Layer, LayerId, LayerSet, LayerSetHash};
pub use matching::{ci_has_trait, filter_by_trait, match_ci, EffectiveTrait, RelatedCi};
pub use merge::{merge_attributes, merge_ci, merge_relations, MergedCi};
pub use relation::{MergedRelation, Relation, RelationKey, RelationState};
pub use storage::load_merged_ci;
pub use template::{
    calculate_errors, check_attribute, AttributeValueConstraint, CiAttributeTemplate,
    ConstraintError, ConstraintRegex, RegexOptions, TemplateError,
};
pub use time::TimeThreshold;
pub use traits::{
    flatten, flatten_single, trait_set_hash, FlattenedTraitSet, GenericTrait, RecursiveTrait,
    RelationDirection, RelationTemplate, TraitAttribute, TraitOrigin, TraitOriginType,
    TraitRelation, TraitSetHash, TraitsCache,
};
pub use value::{AttributeValue, AttributeValueType};
