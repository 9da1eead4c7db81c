//! Integration tests for the collection contract.

use tessera_foundation::{Error, ObjectId};
use tessera_storage::{Collection, CollectionOps};

use crate::fixtures::{Cluster, Hit, HitData};

#[test]
fn two_created_records_get_sequential_ids() {
    let mut hits = Collection::<Hit>::new();
    hits.set_collection_id(7);
    hits.create();
    hits.create();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits.at(0).unwrap().id(), ObjectId::new(0, 7));
    assert_eq!(hits.at(1).unwrap().id(), ObjectId::new(1, 7));
}

#[test]
fn indexing_past_the_end_is_out_of_range() {
    let mut hits = Collection::<Hit>::new();
    hits.create();

    let err = hits.at(3).unwrap_err();
    assert!(matches!(err, Error::OutOfRange { index: 3, len: 1 }));
    assert!(hits.get(3).is_none());
}

#[test]
fn iteration_follows_slot_order() {
    let mut hits = Collection::<Hit>::new();
    hits.set_collection_id(1);
    for cell in 0..4u64 {
        hits.create_with(HitData { cell, charge: 0.0 });
    }

    let cells: Vec<_> = hits.iter().map(|record| record.payload().cell).collect();
    assert_eq!(cells, vec![0, 1, 2, 3]);
}

#[test]
fn a_late_id_assignment_restamps_every_record() {
    let mut clusters = Collection::<Cluster>::new();
    let first = clusters.create();
    let second = clusters.create();

    // The collection existed before it was registered by name.
    assert_eq!(first.id(), ObjectId::new(0, 0));

    clusters.set_collection_id(5);
    assert_eq!(first.id(), ObjectId::new(0, 5));
    assert_eq!(second.id(), ObjectId::new(1, 5));
}

#[test]
fn clear_returns_the_collection_to_empty() {
    let mut hits = Collection::<Hit>::new();
    hits.set_collection_id(1);
    hits.create();
    hits.prepare_for_write();

    hits.clear();
    assert!(hits.is_empty());
    assert!(!hits.is_valid());
    assert!(hits.buffers().is_empty());

    // The collection is reusable for the next event.
    hits.create();
    assert_eq!(hits.len(), 1);
    assert!(hits.is_valid());
}

#[test]
fn clear_unlinks_relations_held_by_surviving_handles() {
    let mut clusters = Collection::<Cluster>::new();
    clusters.set_collection_id(2);
    let a = clusters.create();
    let b = clusters.create();
    a.set_relation("seed", &b).unwrap();
    b.set_relation("seed", &a).unwrap();

    clusters.clear();

    // The cycle is broken: surviving handles read unset relations.
    assert!(!a.has_relation("seed"));
    assert!(!b.has_relation("seed"));
}
