//! The effective-trait matching engine.
//!
//! Matching decides whether a merged CI satisfies a flattened trait and,
//! on success, extracts the typed payload: the merged attribute behind
//! each attribute template and the related CIs behind each relation
//! template. Matching consumes only the merged projection, never raw
//! per-layer facts, so the outcome is stable for a fixed
//! (merged CI, trait) pair. A CI simply not having a trait is the
//! frequent, normal outcome and is `None`, not an error.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::trace;

use crate::attribute::MergedCiAttribute;
use crate::ci::CiId;
use crate::merge::MergedCi;
use crate::relation::MergedRelation;
use crate::template::check_attribute;
use crate::traits::definition::{GenericTrait, RelationDirection, RelationTemplate};

/// One CI related to the matched CI through a satisfied relation
/// template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedCi {
    /// The CI on the far end of the relation.
    pub ci_id: CiId,
    /// The merged relation connecting the two.
    pub relation: MergedRelation,
}

/// The concrete result of a successful trait match for one CI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveTrait {
    /// Id of the matched trait.
    pub trait_id: String,
    /// Satisfied attribute templates, keyed by template identifier.
    pub attributes: BTreeMap<String, MergedCiAttribute>,
    /// Satisfying related CIs, keyed by relation-template identifier.
    pub relations: BTreeMap<String, Vec<RelatedCi>>,
}

fn resolve_relation_template(ci: &MergedCi, template: &RelationTemplate) -> Vec<RelatedCi> {
    let mut related: Vec<RelatedCi> = ci
        .relations
        .values()
        .filter(|r| r.relation.predicate_id == template.predicate_id)
        .filter_map(|r| match template.direction {
            RelationDirection::Forward if r.relation.from_ci_id == ci.id => Some(RelatedCi {
                ci_id: r.relation.to_ci_id,
                relation: r.clone(),
            }),
            RelationDirection::Backward if r.relation.to_ci_id == ci.id => Some(RelatedCi {
                ci_id: r.relation.from_ci_id,
                relation: r.clone(),
            }),
            _ => None,
        })
        .collect();
    // merged relations live in a hash map; give consumers a stable order
    related.sort_by(|a, b| {
        a.ci_id
            .cmp(&b.ci_id)
            .then_with(|| a.relation.relation.predicate_id.cmp(&b.relation.relation.predicate_id))
    });
    related
}

/// Whether a merged CI satisfies every required template of a trait.
///
/// Short-circuits on the first failing requirement and never resolves
/// optional templates; use [`match_ci`] for the full payload.
#[must_use]
pub fn ci_has_trait(ci: &MergedCi, generic_trait: &GenericTrait) -> bool {
    for required in generic_trait.required_attributes() {
        let (_, errors) = check_attribute(ci, &required.template);
        if !errors.is_empty() {
            return false;
        }
    }
    for required in generic_trait.required_relations() {
        if resolve_relation_template(ci, &required.template).is_empty() {
            return false;
        }
    }
    true
}

/// Evaluates a merged CI against a flattened trait.
///
/// Returns the effective trait when every required attribute template is
/// satisfied (present, right kind, right shape, all constraints passing)
/// and every required relation template has at least one satisfying
/// relation. Optional templates are resolved afterwards against the same
/// merged view; an unsatisfied optional is simply omitted.
///
/// # Examples
///
/// ```
/// use stratum::{
///     flatten_single, match_ci, merge_ci, AttributeState, AttributeValue, AttributeValueType,
///     ChangesetId, CiAttribute, CiAttributeTemplate, CiId, LayerId, LayerSet, RecursiveTrait,
///     TimeThreshold, TraitAttribute, TraitOrigin,
/// };
///
/// let ci = CiId::new();
/// let layer = LayerId::new(1);
/// let merged = merge_ci(
///     ci,
///     LayerSet::single(layer),
///     TimeThreshold::latest(),
///     vec![CiAttribute::new(
///         "hostname",
///         ci,
///         AttributeValue::Text("web-01".into()),
///         chrono::Utc::now(),
///         AttributeState::New,
///         ChangesetId::new(),
///         layer,
///     )],
///     vec![],
/// )
/// .unwrap();
///
/// let host = flatten_single(
///     &RecursiveTrait::new("host", TraitOrigin::core()).with_required_attributes(vec![
///         TraitAttribute::new(
///             "hostname",
///             CiAttributeTemplate::new("hostname").with_type(AttributeValueType::Text),
///         ),
///     ]),
/// )
/// .unwrap();
///
/// let effective = match_ci(&merged, &host).expect("ci has the trait");
/// assert!(effective.attributes.contains_key("hostname"));
/// ```
#[must_use]
pub fn match_ci(ci: &MergedCi, generic_trait: &GenericTrait) -> Option<EffectiveTrait> {
    let mut attributes = BTreeMap::new();
    for required in generic_trait.required_attributes() {
        let (found, errors) = check_attribute(ci, &required.template);
        if !errors.is_empty() {
            trace!(
                ci = %ci.id,
                trait_id = generic_trait.id(),
                identifier = %required.identifier,
                "required attribute template not satisfied"
            );
            return None;
        }
        let found = found?; // satisfied template always yields the attribute
        attributes.insert(required.identifier.clone(), found.clone());
    }

    let mut relations = BTreeMap::new();
    for required in generic_trait.required_relations() {
        let related = resolve_relation_template(ci, &required.template);
        if related.is_empty() {
            return None;
        }
        relations.insert(required.identifier.clone(), related);
    }

    for optional in generic_trait.optional_attributes() {
        let (found, errors) = check_attribute(ci, &optional.template);
        if let (Some(found), true) = (found, errors.is_empty()) {
            attributes.insert(optional.identifier.clone(), found.clone());
        }
    }
    for optional in generic_trait.optional_relations() {
        let related = resolve_relation_template(ci, &optional.template);
        if !related.is_empty() {
            relations.insert(optional.identifier.clone(), related);
        }
    }

    Some(EffectiveTrait {
        trait_id: generic_trait.id().to_string(),
        attributes,
        relations,
    })
}

/// Batch form of trait matching: keeps the CIs satisfying the trait.
///
/// Each CI is checked with the short-circuiting [`ci_has_trait`], so a
/// non-matching CI costs no optional-template work.
#[must_use]
pub fn filter_by_trait<'a>(
    cis: impl IntoIterator<Item = &'a MergedCi>,
    generic_trait: &GenericTrait,
) -> Vec<&'a MergedCi> {
    cis.into_iter()
        .filter(|ci| ci_has_trait(ci, generic_trait))
        .collect()
}
