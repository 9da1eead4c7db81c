//! Integration tests for the record ownership protocol.
//!
//! Free-floating records are reference counted; tracked records belong to
//! their collection until it is cleared.

use tessera_foundation::{Error, ObjectId};
use tessera_storage::{Collection, CollectionOps, Record, RecordMut};

use crate::fixtures::{Hit, HitData};

// =============================================================================
// Free-floating records
// =============================================================================

#[test]
fn a_new_record_has_one_handle() {
    let record = RecordMut::<Hit>::new();
    assert_eq!(record.ref_count(), 1);
    assert_eq!(record.id(), ObjectId::UNTRACKED);
}

#[test]
fn acquire_then_release_leaves_the_count_unchanged() {
    let record = RecordMut::<Hit>::new();
    for _ in 0..10 {
        let copy = record.clone();
        assert_eq!(copy.ref_count(), 2);
    }
    assert_eq!(record.ref_count(), 1);
}

#[test]
fn second_handle_keeps_the_record_alive() {
    // Mirrors the canonical scenario: one more acquire brings the count to
    // two; the first release leaves the record alive, the second frees it.
    let record = RecordMut::<Hit>::with_payload(HitData {
        cell: 1,
        charge: 0.5,
    });
    let second = record.clone();
    assert_eq!(record.ref_count(), 2);

    drop(record);
    assert_eq!(second.ref_count(), 1);
    assert_eq!(second.payload().cell, 1, "still readable after first release");
    // `second` drops here, freeing the record.
}

#[test]
fn frozen_views_participate_in_the_count() {
    let record = RecordMut::<Hit>::new();
    let view: Record<Hit> = record.clone().freeze();
    assert_eq!(view.ref_count(), 2);
    drop(record);
    assert_eq!(view.ref_count(), 1);
}

// =============================================================================
// Tracked records
// =============================================================================

#[test]
fn tracked_records_are_not_counted() {
    let mut hits = Collection::<Hit>::new();
    hits.set_collection_id(1);
    let record = hits.create();
    assert!(record.is_tracked());

    let before = record.ref_count();
    let copies: Vec<_> = (0..5).map(|_| record.clone()).collect();
    assert_eq!(record.ref_count(), before);
    drop(copies);
    assert_eq!(record.ref_count(), before);
}

#[test]
fn dropping_all_handles_leaves_collection_entries_alive() {
    let mut hits = Collection::<Hit>::new();
    hits.set_collection_id(1);
    {
        let record = hits.create_with(HitData {
            cell: 42,
            charge: 2.0,
        });
        drop(record);
    }
    assert_eq!(hits.len(), 1);
    assert_eq!(hits.at(0).unwrap().payload().cell, 42);
}

// =============================================================================
// Single ownership
// =============================================================================

#[test]
fn push_back_transfers_ownership_once() {
    let mut hits = Collection::<Hit>::new();
    hits.set_collection_id(1);

    let record = RecordMut::<Hit>::new();
    hits.push_back(&record).unwrap();
    assert_eq!(record.id(), ObjectId::new(0, 1));
}

#[test]
fn push_back_into_a_second_collection_fails() {
    let mut x = Collection::<Hit>::new();
    x.set_collection_id(1);
    let mut y = Collection::<Hit>::new();
    y.set_collection_id(2);

    let record = RecordMut::<Hit>::new();
    x.push_back(&record).unwrap();

    let err = y.push_back(&record).unwrap_err();
    assert!(matches!(err, Error::AlreadyOwned(_)));
    assert_eq!(y.len(), 0, "the failed insert never re-parents");
    assert_eq!(record.id(), ObjectId::new(0, 1), "ownership is unchanged");
}

#[test]
fn push_back_twice_into_the_same_collection_fails() {
    let mut hits = Collection::<Hit>::new();
    hits.set_collection_id(1);

    let record = RecordMut::<Hit>::new();
    hits.push_back(&record).unwrap();
    assert!(matches!(
        hits.push_back(&record),
        Err(Error::AlreadyOwned(_))
    ));
    assert_eq!(hits.len(), 1);
}
