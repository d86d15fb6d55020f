//! Trait definitions.
//!
//! A trait is a named, composable schema: which attributes and relations
//! a CI must (or may) carry to count as an instance of the trait.
//! [`RecursiveTrait`] is the authored form and may require other traits;
//! [`GenericTrait`] is the fully-resolved form produced by flattening,
//! with every inherited requirement folded in.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::template::CiAttributeTemplate;

/// Where a trait definition comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitOriginType {
    /// Shipped with the system.
    Core,
    /// Contributed by a plugin.
    Plugin,
    /// Defined as data by an administrator.
    Data,
}

/// Origin of a trait definition, with optional detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitOrigin {
    pub origin_type: TraitOriginType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

impl TraitOrigin {
    #[must_use]
    pub const fn core() -> Self {
        Self {
            origin_type: TraitOriginType::Core,
            info: None,
        }
    }

    #[must_use]
    pub const fn data() -> Self {
        Self {
            origin_type: TraitOriginType::Data,
            info: None,
        }
    }

    #[must_use]
    pub fn plugin(info: impl Into<String>) -> Self {
        Self {
            origin_type: TraitOriginType::Plugin,
            info: Some(info.into()),
        }
    }
}

impl Default for TraitOrigin {
    fn default() -> Self {
        Self::data()
    }
}

/// Direction of a required relation, seen from the candidate CI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationDirection {
    /// The candidate CI is the source of the relation.
    Forward,
    /// The candidate CI is the target of the relation.
    Backward,
}

impl fmt::Display for RelationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => write!(f, "forward"),
            Self::Backward => write!(f, "backward"),
        }
    }
}

/// Schema for one relation: predicate, direction and optional hints
/// naming traits the related CIs are expected to satisfy.
///
/// Trait hints are carried as data for consumers (documentation,
/// UI, derived computations); the matching engine does not enforce them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationTemplate {
    pub predicate_id: String,
    pub direction: RelationDirection,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trait_hints: Vec<String>,
}

impl RelationTemplate {
    #[must_use]
    pub fn new(predicate_id: impl Into<String>, direction: RelationDirection) -> Self {
        Self {
            predicate_id: predicate_id.into(),
            direction,
            trait_hints: Vec::new(),
        }
    }

    /// Attaches trait hints for the related CIs.
    #[must_use]
    pub fn with_trait_hints(mut self, hints: Vec<String>) -> Self {
        self.trait_hints = hints;
        self
    }
}

/// An identified attribute requirement within a trait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitAttribute {
    /// Identifier the effective trait keys this attribute under.
    pub identifier: String,
    /// The template the merged attribute must satisfy.
    pub template: CiAttributeTemplate,
}

impl TraitAttribute {
    #[must_use]
    pub fn new(identifier: impl Into<String>, template: CiAttributeTemplate) -> Self {
        Self {
            identifier: identifier.into(),
            template,
        }
    }
}

/// An identified relation requirement within a trait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitRelation {
    /// Identifier the effective trait keys the related CIs under.
    pub identifier: String,
    /// The template the merged relations must satisfy.
    pub template: RelationTemplate,
}

impl TraitRelation {
    #[must_use]
    pub fn new(identifier: impl Into<String>, template: RelationTemplate) -> Self {
        Self {
            identifier: identifier.into(),
            template,
        }
    }
}

/// The authored form of a trait, possibly requiring other traits.
///
/// # Examples
///
/// ```
/// use stratum::{
///     AttributeValueType, CiAttributeTemplate, RecursiveTrait, TraitAttribute, TraitOrigin,
/// };
///
/// let host = RecursiveTrait::new("host", TraitOrigin::core()).with_required_attributes(vec![
///     TraitAttribute::new(
///         "hostname",
///         CiAttributeTemplate::new("hostname").with_type(AttributeValueType::Text),
///     ),
/// ]);
/// let linux = RecursiveTrait::new("linux_host", TraitOrigin::core())
///     .with_required_traits(vec!["host".to_string()]);
/// assert_eq!(linux.required_traits, vec!["host".to_string()]);
/// # let _ = host;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecursiveTrait {
    /// Trait name; referenced by `required_traits` of other traits.
    pub id: String,
    /// Where the definition comes from.
    #[serde(default)]
    pub origin: TraitOrigin,

    #[serde(default)]
    pub required_attributes: Vec<TraitAttribute>,
    #[serde(default)]
    pub optional_attributes: Vec<TraitAttribute>,
    #[serde(default)]
    pub required_relations: Vec<TraitRelation>,
    #[serde(default)]
    pub optional_relations: Vec<TraitRelation>,

    /// Ids of traits whose requirements this trait inherits.
    #[serde(default)]
    pub required_traits: Vec<String>,
}

impl RecursiveTrait {
    #[must_use]
    pub fn new(id: impl Into<String>, origin: TraitOrigin) -> Self {
        Self {
            id: id.into(),
            origin,
            required_attributes: Vec::new(),
            optional_attributes: Vec::new(),
            required_relations: Vec::new(),
            optional_relations: Vec::new(),
            required_traits: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_required_attributes(mut self, attributes: Vec<TraitAttribute>) -> Self {
        self.required_attributes = attributes;
        self
    }

    #[must_use]
    pub fn with_optional_attributes(mut self, attributes: Vec<TraitAttribute>) -> Self {
        self.optional_attributes = attributes;
        self
    }

    #[must_use]
    pub fn with_required_relations(mut self, relations: Vec<TraitRelation>) -> Self {
        self.required_relations = relations;
        self
    }

    #[must_use]
    pub fn with_optional_relations(mut self, relations: Vec<TraitRelation>) -> Self {
        self.optional_relations = relations;
        self
    }

    #[must_use]
    pub fn with_required_traits(mut self, traits: Vec<String>) -> Self {
        self.required_traits = traits;
        self
    }
}

/// The fully-resolved form of a trait: every requirement of every
/// transitively required trait folded in.
///
/// Only flattening produces this type, so holding a `GenericTrait` is
/// proof that the definition set it came from was acyclic and
/// conflict-free. Serializable for observability but deliberately not
/// deserializable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenericTrait {
    id: String,
    origin: TraitOrigin,
    ancestors: BTreeSet<String>,
    required_attributes: Vec<TraitAttribute>,
    optional_attributes: Vec<TraitAttribute>,
    required_relations: Vec<TraitRelation>,
    optional_relations: Vec<TraitRelation>,
}

impl GenericTrait {
    pub(crate) fn assemble(
        id: String,
        origin: TraitOrigin,
        ancestors: BTreeSet<String>,
        required_attributes: Vec<TraitAttribute>,
        optional_attributes: Vec<TraitAttribute>,
        required_relations: Vec<TraitRelation>,
        optional_relations: Vec<TraitRelation>,
    ) -> Self {
        Self {
            id,
            origin,
            ancestors,
            required_attributes,
            optional_attributes,
            required_relations,
            optional_relations,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn origin(&self) -> &TraitOrigin {
        &self.origin
    }

    /// Ids of the traits this trait transitively required.
    #[must_use]
    pub fn ancestors(&self) -> &BTreeSet<String> {
        &self.ancestors
    }

    #[must_use]
    pub fn required_attributes(&self) -> &[TraitAttribute] {
        &self.required_attributes
    }

    #[must_use]
    pub fn optional_attributes(&self) -> &[TraitAttribute] {
        &self.optional_attributes
    }

    #[must_use]
    pub fn required_relations(&self) -> &[TraitRelation] {
        &self.required_relations
    }

    #[must_use]
    pub fn optional_relations(&self) -> &[TraitRelation] {
        &self.optional_relations
    }

    /// Names of every attribute any template of this trait targets.
    ///
    /// Callers use this to restrict which attributes they load into a
    /// merged CI before matching.
    #[must_use]
    pub fn relevant_attribute_names(&self) -> BTreeSet<String> {
        self.required_attributes
            .iter()
            .chain(self.optional_attributes.iter())
            .map(|a| a.template.name.clone())
            .collect()
    }
}
