//! Trait flattening.
//!
//! Flattening resolves `required_traits` references: the flattened form
//! of a trait is its own templates unioned, by identifier, with the
//! flattened forms of every directly required trait. References form a
//! dependency graph processed in topological order with explicit cycle
//! detection; a cycle or a dangling reference is a definition error, not
//! something to paper over.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use tracing::debug;

use crate::error::TraitDefinitionError;
use crate::traits::definition::{GenericTrait, RecursiveTrait, TraitAttribute, TraitRelation};

/// Stable hash of a trait definition set, usable as a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraitSetHash([u8; 32]);

impl fmt::Display for TraitSetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Hashes a trait definition set canonically: ids in sorted order, each
/// definition in its serialized form.
///
/// Two sets with equal definitions hash identically regardless of map
/// iteration order.
#[must_use]
pub fn trait_set_hash(traits: &HashMap<String, RecursiveTrait>) -> TraitSetHash {
    let mut ids: Vec<&String> = traits.keys().collect();
    ids.sort();

    let mut hasher = blake3::Hasher::new();
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update(&[0]);
        // serialization of a definition is deterministic: only structs,
        // enums and vecs, no maps
        let encoded = serde_json::to_vec(&traits[id]).unwrap_or_default();
        hasher.update(&encoded);
        hasher.update(&[0]);
    }
    TraitSetHash(*hasher.finalize().as_bytes())
}

/// Flattens a trait definition set into fully-resolved traits.
///
/// The definition set is keyed by trait id; `required_traits` references
/// are resolved against those keys.
///
/// # Errors
///
/// - [`TraitDefinitionError::CyclicDependency`] naming the cycle path
/// - [`TraitDefinitionError::UnknownTraitReference`] for a dangling
///   reference
/// - [`TraitDefinitionError::TemplateConflict`] when one identifier
///   denotes non-identical templates within a union
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use stratum::{flatten, CiAttributeTemplate, RecursiveTrait, TraitAttribute, TraitOrigin};
///
/// let mut defs = HashMap::new();
/// defs.insert(
///     "host".to_string(),
///     RecursiveTrait::new("host", TraitOrigin::core()).with_required_attributes(vec![
///         TraitAttribute::new("hostname", CiAttributeTemplate::new("hostname")),
///     ]),
/// );
/// defs.insert(
///     "linux_host".to_string(),
///     RecursiveTrait::new("linux_host", TraitOrigin::core())
///         .with_required_attributes(vec![TraitAttribute::new(
///             "os_family",
///             CiAttributeTemplate::new("os_family"),
///         )])
///         .with_required_traits(vec!["host".to_string()]),
/// );
///
/// let flattened = flatten(&defs).unwrap();
/// assert_eq!(flattened["linux_host"].required_attributes().len(), 2);
/// ```
pub fn flatten(
    traits: &HashMap<String, RecursiveTrait>,
) -> Result<HashMap<String, GenericTrait>, TraitDefinitionError> {
    let mut flattened: HashMap<String, GenericTrait> = HashMap::with_capacity(traits.len());
    let mut in_progress: Vec<String> = Vec::new();

    let mut ids: Vec<&String> = traits.keys().collect();
    ids.sort(); // deterministic processing and error reporting

    for id in ids {
        flatten_into(id, traits, &mut flattened, &mut in_progress)?;
    }
    debug!(traits = flattened.len(), "flattened trait definition set");
    Ok(flattened)
}

/// Flattens a single self-contained trait.
///
/// # Errors
///
/// Returns [`TraitDefinitionError::UnknownTraitReference`] if the trait
/// requires other traits, plus any template conflict within the trait
/// itself.
pub fn flatten_single(t: &RecursiveTrait) -> Result<GenericTrait, TraitDefinitionError> {
    let mut defs = HashMap::with_capacity(1);
    defs.insert(t.id.clone(), t.clone());
    let mut flattened = flatten(&defs)?;
    flattened
        .remove(&t.id)
        .ok_or_else(|| TraitDefinitionError::UnknownTraitReference {
            referencing: t.id.clone(),
            referenced: t.id.clone(),
        })
}

fn flatten_into(
    id: &str,
    traits: &HashMap<String, RecursiveTrait>,
    flattened: &mut HashMap<String, GenericTrait>,
    in_progress: &mut Vec<String>,
) -> Result<(), TraitDefinitionError> {
    if flattened.contains_key(id) {
        return Ok(());
    }
    if let Some(start) = in_progress.iter().position(|t| t == id) {
        let mut cycle: Vec<String> = in_progress[start..].to_vec();
        cycle.push(id.to_string());
        return Err(TraitDefinitionError::CyclicDependency { cycle });
    }

    let trait_def = traits
        .get(id)
        .expect("flatten_into is only called with known ids");
    in_progress.push(id.to_string());

    let mut required_attributes = trait_def.required_attributes.clone();
    let mut optional_attributes = trait_def.optional_attributes.clone();
    let mut required_relations = trait_def.required_relations.clone();
    let mut optional_relations = trait_def.optional_relations.clone();
    let mut ancestors: BTreeSet<String> = BTreeSet::new();

    for required in &trait_def.required_traits {
        if !traits.contains_key(required) {
            in_progress.pop();
            return Err(TraitDefinitionError::UnknownTraitReference {
                referencing: id.to_string(),
                referenced: required.clone(),
            });
        }
        flatten_into(required, traits, flattened, in_progress)?;
        let parent = &flattened[required];

        union_attributes(&mut required_attributes, parent.required_attributes(), id)?;
        union_attributes(&mut optional_attributes, parent.optional_attributes(), id)?;
        union_relations(&mut required_relations, parent.required_relations(), id)?;
        union_relations(&mut optional_relations, parent.optional_relations(), id)?;

        ancestors.insert(required.clone());
        ancestors.extend(parent.ancestors().iter().cloned());
    }
    in_progress.pop();

    // an identifier required anywhere never stays optional: identical
    // duplicates resolve to required, divergent ones are conflicts
    let mut pruned_optional_attributes = Vec::with_capacity(optional_attributes.len());
    for opt in optional_attributes {
        match required_attributes.iter().find(|r| r.identifier == opt.identifier) {
            Some(req) if req.template == opt.template => {}
            Some(_) => {
                return Err(TraitDefinitionError::TemplateConflict {
                    trait_id: id.to_string(),
                    identifier: opt.identifier,
                });
            }
            None => pruned_optional_attributes.push(opt),
        }
    }
    let mut pruned_optional_relations = Vec::with_capacity(optional_relations.len());
    for opt in optional_relations {
        match required_relations.iter().find(|r| r.identifier == opt.identifier) {
            Some(req) if req.template == opt.template => {}
            Some(_) => {
                return Err(TraitDefinitionError::TemplateConflict {
                    trait_id: id.to_string(),
                    identifier: opt.identifier,
                });
            }
            None => pruned_optional_relations.push(opt),
        }
    }

    flattened.insert(
        id.to_string(),
        GenericTrait::assemble(
            trait_def.id.clone(),
            trait_def.origin.clone(),
            ancestors,
            required_attributes,
            pruned_optional_attributes,
            required_relations,
            pruned_optional_relations,
        ),
    );
    Ok(())
}

fn union_attributes(
    target: &mut Vec<TraitAttribute>,
    incoming: &[TraitAttribute],
    trait_id: &str,
) -> Result<(), TraitDefinitionError> {
    for attribute in incoming {
        match target.iter().find(|t| t.identifier == attribute.identifier) {
            Some(existing) if existing.template == attribute.template => {}
            Some(_) => {
                return Err(TraitDefinitionError::TemplateConflict {
                    trait_id: trait_id.to_string(),
                    identifier: attribute.identifier.clone(),
                });
            }
            None => target.push(attribute.clone()),
        }
    }
    Ok(())
}

fn union_relations(
    target: &mut Vec<TraitRelation>,
    incoming: &[TraitRelation],
    trait_id: &str,
) -> Result<(), TraitDefinitionError> {
    for relation in incoming {
        match target.iter().find(|t| t.identifier == relation.identifier) {
            Some(existing) if existing.template == relation.template => {}
            Some(_) => {
                return Err(TraitDefinitionError::TemplateConflict {
                    trait_id: trait_id.to_string(),
                    identifier: relation.identifier.clone(),
                });
            }
            None => target.push(relation.clone()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::CiAttributeTemplate;
    use crate::traits::definition::{RelationDirection, RelationTemplate, TraitOrigin};
    use crate::value::AttributeValueType;

    fn attr(identifier: &str, name: &str) -> TraitAttribute {
        TraitAttribute::new(identifier, CiAttributeTemplate::new(name))
    }

    fn defs(traits: Vec<RecursiveTrait>) -> HashMap<String, RecursiveTrait> {
        traits.into_iter().map(|t| (t.id.clone(), t)).collect()
    }

    #[test]
    fn test_flatten_unions_required_attributes() {
        // X requires {a}; Y requires {b} and trait X => flattened Y
        // requires {a, b}
        let x = RecursiveTrait::new("x", TraitOrigin::data())
            .with_required_attributes(vec![attr("a", "a")]);
        let y = RecursiveTrait::new("y", TraitOrigin::data())
            .with_required_attributes(vec![attr("b", "b")])
            .with_required_traits(vec!["x".into()]);

        let flattened = flatten(&defs(vec![x, y])).unwrap();
        let y = &flattened["y"];
        let mut identifiers: Vec<&str> = y
            .required_attributes()
            .iter()
            .map(|a| a.identifier.as_str())
            .collect();
        identifiers.sort_unstable();
        assert_eq!(identifiers, vec!["a", "b"]);
        assert!(y.ancestors().contains("x"));
    }

    #[test]
    fn test_flatten_is_transitive() {
        let a = RecursiveTrait::new("a", TraitOrigin::data())
            .with_required_attributes(vec![attr("base", "base")]);
        let b = RecursiveTrait::new("b", TraitOrigin::data())
            .with_required_traits(vec!["a".into()]);
        let c = RecursiveTrait::new("c", TraitOrigin::data())
            .with_required_traits(vec!["b".into()]);

        let flattened = flatten(&defs(vec![a, b, c])).unwrap();
        assert_eq!(flattened["c"].required_attributes().len(), 1);
        assert!(flattened["c"].ancestors().contains("a"));
        assert!(flattened["c"].ancestors().contains("b"));
    }

    #[test]
    fn test_cycle_is_detected_not_looped() {
        let x = RecursiveTrait::new("x", TraitOrigin::data())
            .with_required_traits(vec!["y".into()]);
        let y = RecursiveTrait::new("y", TraitOrigin::data())
            .with_required_traits(vec!["x".into()]);

        let err = flatten(&defs(vec![x, y])).unwrap_err();
        let TraitDefinitionError::CyclicDependency { cycle } = err else {
            panic!("expected cycle, got {err:?}");
        };
        assert_eq!(cycle.first(), cycle.last());
        assert!(cycle.contains(&"x".to_string()));
        assert!(cycle.contains(&"y".to_string()));
    }

    #[test]
    fn test_self_cycle_is_detected() {
        let x = RecursiveTrait::new("x", TraitOrigin::data())
            .with_required_traits(vec!["x".into()]);
        let err = flatten(&defs(vec![x])).unwrap_err();
        assert!(matches!(err, TraitDefinitionError::CyclicDependency { .. }));
    }

    #[test]
    fn test_unknown_reference() {
        let x = RecursiveTrait::new("x", TraitOrigin::data())
            .with_required_traits(vec!["missing".into()]);
        let err = flatten(&defs(vec![x])).unwrap_err();
        assert_eq!(
            err,
            TraitDefinitionError::UnknownTraitReference {
                referencing: "x".into(),
                referenced: "missing".into(),
            }
        );
    }

    #[test]
    fn test_identical_duplicate_templates_union_cleanly() {
        let x = RecursiveTrait::new("x", TraitOrigin::data())
            .with_required_attributes(vec![attr("shared", "shared")]);
        let y = RecursiveTrait::new("y", TraitOrigin::data())
            .with_required_attributes(vec![attr("shared", "shared")])
            .with_required_traits(vec!["x".into()]);

        let flattened = flatten(&defs(vec![x, y])).unwrap();
        assert_eq!(flattened["y"].required_attributes().len(), 1);
    }

    #[test]
    fn test_conflicting_duplicate_templates_error() {
        let x = RecursiveTrait::new("x", TraitOrigin::data()).with_required_attributes(vec![
            TraitAttribute::new(
                "shared",
                CiAttributeTemplate::new("shared").with_type(AttributeValueType::Text),
            ),
        ]);
        let y = RecursiveTrait::new("y", TraitOrigin::data())
            .with_required_attributes(vec![TraitAttribute::new(
                "shared",
                CiAttributeTemplate::new("shared").with_type(AttributeValueType::Integer),
            )])
            .with_required_traits(vec!["x".into()]);

        let err = flatten(&defs(vec![x, y])).unwrap_err();
        assert_eq!(
            err,
            TraitDefinitionError::TemplateConflict {
                trait_id: "y".into(),
                identifier: "shared".into(),
            }
        );
    }

    #[test]
    fn test_optional_never_promoted_to_required() {
        let x = RecursiveTrait::new("x", TraitOrigin::data())
            .with_optional_attributes(vec![attr("opt", "opt")]);
        let y = RecursiveTrait::new("y", TraitOrigin::data())
            .with_required_traits(vec!["x".into()]);

        let flattened = flatten(&defs(vec![x, y])).unwrap();
        assert!(flattened["y"].required_attributes().is_empty());
        assert_eq!(flattened["y"].optional_attributes().len(), 1);
    }

    #[test]
    fn test_required_wins_over_identical_optional() {
        let x = RecursiveTrait::new("x", TraitOrigin::data())
            .with_optional_attributes(vec![attr("a", "a")]);
        let y = RecursiveTrait::new("y", TraitOrigin::data())
            .with_required_attributes(vec![attr("a", "a")])
            .with_required_traits(vec!["x".into()]);

        let flattened = flatten(&defs(vec![x, y])).unwrap();
        assert_eq!(flattened["y"].required_attributes().len(), 1);
        assert!(flattened["y"].optional_attributes().is_empty());
    }

    #[test]
    fn test_relations_union_by_identifier() {
        let x = RecursiveTrait::new("x", TraitOrigin::data()).with_required_relations(vec![
            TraitRelation::new(
                "runs_on",
                RelationTemplate::new("runs_on", RelationDirection::Forward),
            ),
        ]);
        let y = RecursiveTrait::new("y", TraitOrigin::data())
            .with_required_relations(vec![TraitRelation::new(
                "hosted_vms",
                RelationTemplate::new("runs_on", RelationDirection::Backward),
            )])
            .with_required_traits(vec!["x".into()]);

        let flattened = flatten(&defs(vec![x, y])).unwrap();
        assert_eq!(flattened["y"].required_relations().len(), 2);
    }

    #[test]
    fn test_flatten_is_idempotent() {
        let x = RecursiveTrait::new("x", TraitOrigin::data())
            .with_required_attributes(vec![attr("a", "a")]);
        let y = RecursiveTrait::new("y", TraitOrigin::data())
            .with_required_traits(vec!["x".into()]);
        let set = defs(vec![x, y]);

        let first = flatten(&set).unwrap();
        let second = flatten(&set).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_flatten_single() {
        let t = RecursiveTrait::new("standalone", TraitOrigin::data())
            .with_required_attributes(vec![attr("a", "a")]);
        let flattened = flatten_single(&t).unwrap();
        assert_eq!(flattened.id(), "standalone");

        let dependent = RecursiveTrait::new("dependent", TraitOrigin::data())
            .with_required_traits(vec!["other".into()]);
        assert!(flatten_single(&dependent).is_err());
    }

    #[test]
    fn test_trait_set_hash_is_order_independent_and_content_sensitive() {
        let x = RecursiveTrait::new("x", TraitOrigin::data())
            .with_required_attributes(vec![attr("a", "a")]);
        let y = RecursiveTrait::new("y", TraitOrigin::data());

        let forward = defs(vec![x.clone(), y.clone()]);
        let reverse = defs(vec![y.clone(), x]);
        assert_eq!(trait_set_hash(&forward), trait_set_hash(&reverse));

        let changed = defs(vec![
            RecursiveTrait::new("x", TraitOrigin::data())
                .with_required_attributes(vec![attr("a", "renamed")]),
            y,
        ]);
        assert_ne!(trait_set_hash(&forward), trait_set_hash(&changed));
    }
}
