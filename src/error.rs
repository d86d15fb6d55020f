//! Error types for stratum.
//!
//! Errors are grouped by contract: trait-definition errors are
//! configuration-time and surfaced to an administrator; merge errors are
//! fatal precondition violations by the persistence collaborator; value
//! errors are codec failures. A CI not matching a trait is a normal
//! `None` result and constraint violations are returned data; neither
//! ever appears here.

use thiserror::Error;

use crate::ci::CiId;
use crate::layer::LayerId;
use crate::relation::RelationKey;
use crate::storage::StoreError;
use crate::value::AttributeValueType;

/// Errors in the trait definition set, detected during flattening.
///
/// These are configuration-time: the definition set must be fixed by an
/// administrator, retrying cannot help.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TraitDefinitionError {
    /// Trait references form a cycle; names the cycle path.
    #[error("cyclic trait dependency: {}", cycle.join(" -> "))]
    CyclicDependency {
        cycle: Vec<String>,
    },

    /// A trait requires a trait that is not part of the definition set.
    #[error("trait \"{referencing}\" requires unknown trait \"{referenced}\"")]
    UnknownTraitReference {
        referencing: String,
        referenced: String,
    },

    /// The same template identifier denotes non-identical templates
    /// within the flattened union of a trait.
    #[error("template \"{identifier}\" denotes conflicting definitions while flattening trait \"{trait_id}\"")]
    TemplateConflict {
        trait_id: String,
        identifier: String,
    },

    /// A length constraint was declared with minimum above maximum.
    #[error("constraint minimum {minimum} must not be larger than maximum {maximum}")]
    InvalidConstraintBounds {
        minimum: usize,
        maximum: usize,
    },

    /// A regex constraint failed to compile.
    #[error("invalid regex constraint \"{pattern}\": {reason}")]
    InvalidRegex {
        pattern: String,
        reason: String,
    },
}

/// Fatal precondition violations detected by the merge engine.
///
/// The persistence collaborator promised one current fact per
/// (layer, key) drawn from the queried layer set; contradictory input
/// aborts the query instead of guessing a resolution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MergeError {
    #[error("duplicate current attribute fact for name \"{name}\" in layer {layer}")]
    DuplicateAttributeFact {
        layer: LayerId,
        name: String,
    },

    #[error("duplicate current relation fact for key {key} in layer {layer}")]
    DuplicateRelationFact {
        layer: LayerId,
        key: RelationKey,
    },

    #[error("fact references layer {layer} which is not part of the layer set")]
    LayerNotInSet {
        layer: LayerId,
    },

    #[error("fact belongs to CI {found} while merging CI {expected}")]
    CiMismatch {
        expected: CiId,
        found: CiId,
    },
}

/// Codec failures when building typed attribute values from raw strings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("cannot parse \"{raw}\" as integer")]
    InvalidInteger {
        raw: String,
    },

    #[error("cannot parse value as JSON: {reason}")]
    InvalidJson {
        reason: String,
    },

    #[error("scalar value of type {value_type} requires exactly one raw string, got {count}")]
    ScalarArity {
        value_type: AttributeValueType,
        count: usize,
    },
}

/// Top-level error type for stratum operations.
#[derive(Debug, Error)]
pub enum StratumError {
    #[error("trait definition error: {0}")]
    TraitDefinition(#[from] TraitDefinitionError),

    #[error("merge precondition violated: {0}")]
    Merge(#[from] MergeError),

    #[error("value error: {0}")]
    Value(#[from] ValueError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl StratumError {
    /// True for configuration-time definition errors.
    #[must_use]
    pub const fn is_definition(&self) -> bool {
        matches!(self, Self::TraitDefinition(_))
    }

    /// True for fatal precondition violations by a collaborator.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(self, Self::Merge(_))
    }
}

/// Result type alias for stratum operations.
pub type StratumResult<T> = Result<T, StratumError>;
