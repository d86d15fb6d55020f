use chrono::{Duration, Utc};

use stratum::storage::{AttributeSelection, InMemoryFactStore, RelationFactProvider, RelationSelection};
use stratum::{
    load_merged_ci, merge_relations, AttributeValue, CiId, LayerId, LayerSet, RelationKey,
    TimeThreshold,
};

fn layer_set(ids: &[i64]) -> LayerSet {
    LayerSet::build(ids.iter().copied().map(LayerId::new).collect()).unwrap()
}

#[test]
fn layered_writes_merge_with_later_layer_winning() {
    let store = InMemoryFactStore::new();
    let ci = store.create_ci();
    let import = LayerId::new(1);
    let monitoring = LayerId::new(2);
    let manual = LayerId::new(3);

    // three independent sources assert overlapping facts
    store
        .insert_attribute(import, ci, "hostname", AttributeValue::Text("imported-name".into()), "import")
        .unwrap();
    store
        .insert_attribute(import, ci, "os", AttributeValue::Text("linux".into()), "import")
        .unwrap();
    store
        .insert_attribute(monitoring, ci, "cpu_load", AttributeValue::Integer(85), "monitor")
        .unwrap();
    store
        .insert_attribute(manual, ci, "hostname", AttributeValue::Text("web-01".into()), "admin")
        .unwrap();

    let merged = load_merged_ci(
        &store,
        &store,
        ci,
        &layer_set(&[1, 2, 3]),
        TimeThreshold::latest(),
        &AttributeSelection::All,
    )
    .unwrap();

    assert_eq!(merged.attributes.len(), 3);
    let hostname = merged.attribute("hostname").unwrap();
    assert_eq!(hostname.attribute.value, AttributeValue::Text("web-01".into()));
    assert_eq!(hostname.winning_layer(), manual);
    // provenance: both asserting layers appear in the stack, winner last
    assert_eq!(hostname.layer_stack, vec![import, manual]);

    // facts from layers outside the queried set stay invisible
    let narrow = load_merged_ci(
        &store,
        &store,
        ci,
        &layer_set(&[1]),
        TimeThreshold::latest(),
        &AttributeSelection::All,
    )
    .unwrap();
    assert_eq!(
        narrow.attribute("hostname").unwrap().attribute.value,
        AttributeValue::Text("imported-name".into())
    );
    assert!(narrow.attribute("cpu_load").is_none());
}

#[test]
fn removal_in_one_layer_unmasks_lower_layer_value() {
    let store = InMemoryFactStore::new();
    let ci = store.create_ci();
    let base = LayerId::new(1);
    let overrides = LayerId::new(2);

    store
        .insert_attribute(base, ci, "owner", AttributeValue::Text("team-a".into()), "t")
        .unwrap();
    store
        .insert_attribute(overrides, ci, "owner", AttributeValue::Text("team-b".into()), "t")
        .unwrap();

    let set = layer_set(&[1, 2]);
    let merged = load_merged_ci(&store, &store, ci, &set, TimeThreshold::latest(), &AttributeSelection::All).unwrap();
    assert_eq!(
        merged.attribute("owner").unwrap().attribute.value,
        AttributeValue::Text("team-b".into())
    );

    // removing the override exposes the base value again
    store.remove_attribute(overrides, ci, "owner", "t").unwrap();
    let merged = load_merged_ci(&store, &store, ci, &set, TimeThreshold::latest(), &AttributeSelection::All).unwrap();
    assert_eq!(
        merged.attribute("owner").unwrap().attribute.value,
        AttributeValue::Text("team-a".into())
    );

    // removing the base value too drops the attribute entirely
    store.remove_attribute(base, ci, "owner", "t").unwrap();
    let merged = load_merged_ci(&store, &store, ci, &set, TimeThreshold::latest(), &AttributeSelection::All).unwrap();
    assert!(merged.attribute("owner").is_none());
}

#[test]
fn time_travel_reproduces_past_merge_results() {
    let store = InMemoryFactStore::new();
    let ci = store.create_ci();
    let layer = LayerId::new(1);
    let t0 = Utc::now();
    let t1 = t0 + Duration::hours(1);

    store
        .insert_attribute_at(layer, ci, "state", AttributeValue::Text("staging".into()), "t", t0)
        .unwrap();
    store
        .insert_attribute_at(layer, ci, "state", AttributeValue::Text("production".into()), "t", t1)
        .unwrap();

    let set = layer_set(&[1]);
    let past = load_merged_ci(
        &store,
        &store,
        ci,
        &set,
        TimeThreshold::at_time(t0 + Duration::minutes(5)),
        &AttributeSelection::All,
    )
    .unwrap();
    assert_eq!(
        past.attribute("state").unwrap().attribute.value,
        AttributeValue::Text("staging".into())
    );

    let now = load_merged_ci(&store, &store, ci, &set, TimeThreshold::latest(), &AttributeSelection::All).unwrap();
    assert_eq!(
        now.attribute("state").unwrap().attribute.value,
        AttributeValue::Text("production".into())
    );
}

#[test]
fn masking_hides_lower_layer_relations_end_to_end() {
    let store = InMemoryFactStore::new();
    let vm = store.create_ci();
    let old_host = store.create_ci();
    let discovery = LayerId::new(1);
    let corrections = LayerId::new(2);

    // discovery keeps asserting a stale placement; a correction layer
    // masks it without writing a replacement
    store
        .insert_relation(discovery, vm, old_host, "runs_on", "discovery")
        .unwrap();
    store
        .mask_relation(corrections, vm, old_host, "runs_on", "admin")
        .unwrap();

    let set = layer_set(&[1, 2]);
    let facts = store
        .current_relations(&RelationSelection::Involving(vm), &set, TimeThreshold::latest())
        .unwrap();
    let merged = merge_relations(&set, facts).unwrap();
    assert!(!merged.contains_key(&RelationKey::new(vm, old_host, "runs_on")));

    // querying only the discovery layer still shows the stale relation
    let discovery_only = layer_set(&[1]);
    let facts = store
        .current_relations(&RelationSelection::Involving(vm), &discovery_only, TimeThreshold::latest())
        .unwrap();
    let merged = merge_relations(&discovery_only, facts).unwrap();
    assert!(merged.contains_key(&RelationKey::new(vm, old_host, "runs_on")));
}

#[test]
fn unrelated_fact_free_layer_leaves_merge_untouched() {
    let store = InMemoryFactStore::new();
    let ci = store.create_ci();
    store
        .insert_attribute(LayerId::new(1), ci, "hostname", AttributeValue::Text("a".into()), "t")
        .unwrap();
    store
        .insert_attribute(LayerId::new(3), ci, "hostname", AttributeValue::Text("b".into()), "t")
        .unwrap();

    let with_empty_layer = load_merged_ci(
        &store,
        &store,
        ci,
        &layer_set(&[1, 2, 3]),
        TimeThreshold::latest(),
        &AttributeSelection::All,
    )
    .unwrap();
    let without = load_merged_ci(
        &store,
        &store,
        ci,
        &layer_set(&[1, 3]),
        TimeThreshold::latest(),
        &AttributeSelection::All,
    )
    .unwrap();

    let a = with_empty_layer.attribute("hostname").unwrap();
    let b = without.attribute("hostname").unwrap();
    assert_eq!(a.attribute, b.attribute);
    assert_eq!(a.layer_stack, b.layer_stack);
}

#[test]
fn changesets_record_provenance_for_every_write() {
    let store = InMemoryFactStore::new();
    let ci = store.create_ci();

    let first = store
        .insert_attribute(LayerId::new(1), ci, "a", AttributeValue::Integer(1), "alice")
        .unwrap()
        .expect("first write is not a no-op");
    store
        .insert_attribute(LayerId::new(1), ci, "a", AttributeValue::Integer(2), "bob")
        .unwrap();

    let changesets = store.changesets().unwrap();
    assert_eq!(changesets.len(), 2);
    assert_eq!(changesets[0].id, first);

    // the merged fact points back at the changeset that wrote it
    let merged = load_merged_ci(
        &store,
        &store,
        ci,
        &layer_set(&[1]),
        TimeThreshold::latest(),
        &AttributeSelection::All,
    )
    .unwrap();
    assert_eq!(
        merged.attribute("a").unwrap().attribute.changeset_id,
        changesets[1].id
    );
}

#[test]
fn ci_without_facts_merges_to_empty_view() {
    let store = InMemoryFactStore::new();
    let ci: CiId = store.create_ci();
    let merged = load_merged_ci(
        &store,
        &store,
        ci,
        &layer_set(&[1]),
        TimeThreshold::latest(),
        &AttributeSelection::All,
    )
    .unwrap();
    assert!(merged.attributes.is_empty());
    assert!(merged.relations.is_empty());
}
