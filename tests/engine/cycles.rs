//! Integration tests for cycle-safe reference resolution.
//!
//! A collection's stored references may point at the collection itself, at
//! records later in the same collection, or around a loop through other
//! collections. Resolution must terminate, resolve every reference exactly
//! once, and leave every relation pointing at the right slot.

use tessera_engine::{EventReader, EventStore, EventWriter, MemoryReader, MemoryWriter, StoreConfig};
use tessera_foundation::ObjectId;
use tessera_storage::{CollectionOps, Record};

use crate::fixtures::{registry, Cluster, ClusterData, Hit, HitData, Track, TrackData};

/// Runs one produced event through the memory backend and hands back a
/// reading store.
fn round_trip(produce: impl FnOnce(&EventStore), names: &[&str]) -> EventStore {
    let store = EventStore::new(registry());
    produce(&store);

    let mut writer = MemoryWriter::new();
    for name in names {
        writer.register_for_write(name);
    }
    writer.write_event(&store).unwrap();

    let mut reader = MemoryReader::new(writer.into_archive(), registry());
    reader.open("in-memory").unwrap();
    EventStore::with_reader(registry(), Box::new(reader), StoreConfig::default())
}

#[test]
fn a_two_record_cycle_resolves_to_live_handles() {
    let store = round_trip(
        |store| {
            let clusters = store.register::<Cluster>("clusters").unwrap();
            let a = clusters.borrow_mut().create_with(ClusterData { energy: 1.0 });
            let b = clusters.borrow_mut().create_with(ClusterData { energy: 2.0 });
            a.set_relation("seed", &b).unwrap();
            b.set_relation("seed", &a).unwrap();
        },
        &["clusters"],
    );

    let clusters = store.get::<Cluster>("clusters").unwrap();
    let a = clusters.borrow().at(0).unwrap();
    let b = clusters.borrow().at(1).unwrap();

    let a_seed = a.relation("seed").unwrap();
    let b_seed = b.relation("seed").unwrap();
    assert_eq!(a_seed.object_id(), b.id());
    assert_eq!(b_seed.object_id(), a.id());

    // The handles are live, not just ids.
    let b_through_a: Record<Cluster> = a_seed.downcast().unwrap();
    assert_eq!(b_through_a.payload().energy, 2.0);
}

#[test]
fn a_self_reference_resolves_to_its_own_record() {
    let store = round_trip(
        |store| {
            let clusters = store.register::<Cluster>("clusters").unwrap();
            let only = clusters.borrow_mut().create_with(ClusterData { energy: 5.0 });
            only.set_relation("seed", &only).unwrap();
        },
        &["clusters"],
    );

    let clusters = store.get::<Cluster>("clusters").unwrap();
    let only = clusters.borrow().at(0).unwrap();
    let seed = only.relation("seed").unwrap();

    assert_eq!(seed.object_id(), only.id());
    assert_eq!(seed.downcast::<Cluster>().unwrap().payload().energy, 5.0);
}

#[test]
fn a_cross_collection_cycle_terminates() {
    let store = round_trip(
        |store| {
            let clusters = store.register::<Cluster>("clusters").unwrap();
            let tracks = store.register::<Track>("tracks").unwrap();

            let cluster = clusters.borrow_mut().create_with(ClusterData { energy: 3.0 });
            let track = tracks.borrow_mut().create_with(TrackData { momentum: 7.0 });

            cluster.set_relation("track", &track).unwrap();
            track.set_relation("cluster", &cluster).unwrap();
        },
        &["clusters", "tracks"],
    );

    // Retrieving either side resolves the loop; start from the tracks.
    let tracks = store.get::<Track>("tracks").unwrap();
    let track = tracks.borrow().at(0).unwrap();
    let cluster = track.relation("cluster").unwrap().downcast::<Cluster>().unwrap();
    assert_eq!(cluster.payload().energy, 3.0);

    let back = cluster.relation("track").unwrap();
    assert_eq!(back.object_id(), track.id());
    assert_eq!(back.downcast::<Track>().unwrap().payload().momentum, 7.0);
}

#[test]
fn chains_resolve_across_three_collections() {
    let store = round_trip(
        |store| {
            let hits = store.register::<Hit>("hits").unwrap();
            let clusters = store.register::<Cluster>("clusters").unwrap();
            let tracks = store.register::<Track>("tracks").unwrap();

            let h0 = hits.borrow_mut().create_with(HitData {
                cell: 11,
                charge: 0.5,
            });
            let h1 = hits.borrow_mut().create_with(HitData {
                cell: 12,
                charge: 1.5,
            });
            let cluster = clusters.borrow_mut().create_with(ClusterData { energy: 2.0 });
            cluster.add_relation("hits", &h0).unwrap();
            cluster.add_relation("hits", &h1).unwrap();

            let track = tracks.borrow_mut().create_with(TrackData { momentum: 9.0 });
            track.set_relation("cluster", &cluster).unwrap();
        },
        &["hits", "clusters", "tracks"],
    );

    // A single get pulls the whole chain in.
    let tracks = store.get::<Track>("tracks").unwrap();
    let track = tracks.borrow().at(0).unwrap();
    let cluster = track.relation("cluster").unwrap().downcast::<Cluster>().unwrap();

    let hits = cluster.relations("hits");
    assert_eq!(hits.len(), 2);
    assert_eq!(
        hits[0].downcast::<Hit>().unwrap().payload().cell,
        11
    );
    assert_eq!(
        hits[1].downcast::<Hit>().unwrap().payload().cell,
        12
    );
}

#[test]
fn every_collection_is_resolved_at_most_once_per_event() {
    // Two distinct paths lead to the hits: directly and through the
    // clusters. The second path must hit the cache, not re-resolve.
    let store = round_trip(
        |store| {
            let hits = store.register::<Hit>("hits").unwrap();
            let clusters = store.register::<Cluster>("clusters").unwrap();
            let h = hits.borrow_mut().create();
            let c = clusters.borrow_mut().create();
            c.add_relation("hits", &h).unwrap();
        },
        &["hits", "clusters"],
    );

    let direct = store.get_any("hits").unwrap();
    let clusters = store.get::<Cluster>("clusters").unwrap();
    let through_cluster = clusters.borrow().at(0).unwrap().relations("hits");

    // Same collection cell both ways: the relation target lives in the
    // already-loaded collection.
    assert_eq!(
        through_cluster[0].object_id().collection_id,
        direct.borrow().collection_id()
    );
    assert!(std::rc::Rc::ptr_eq(&direct, &store.get_any("hits").unwrap()));
}

#[test]
fn unresolvable_references_are_lenient_by_default() {
    // Persist only the clusters; their hit references point into a
    // collection the reading side never receives.
    let store = round_trip(
        |store| {
            let hits = store.register::<Hit>("hits").unwrap();
            let clusters = store.register::<Cluster>("clusters").unwrap();
            let h = hits.borrow_mut().create();
            let c = clusters.borrow_mut().create();
            c.add_relation("hits", &h).unwrap();
        },
        &["clusters"],
    );

    let clusters = store.get::<Cluster>("clusters").unwrap();
    let cluster = clusters.borrow().at(0).unwrap();

    // The relation stays observable as unresolved: the stored id is kept,
    // no live handle is produced.
    assert!(cluster.relations("hits").is_empty());
    assert_eq!(cluster.relation_ids("hits"), vec![ObjectId::new(0, 1)]);
}

#[test]
fn strict_resolution_escalates_to_an_error() {
    let producer = EventStore::new(registry());
    let hits = producer.register::<Hit>("hits").unwrap();
    let clusters = producer.register::<Cluster>("clusters").unwrap();
    let h = hits.borrow_mut().create();
    let c = clusters.borrow_mut().create();
    c.add_relation("hits", &h).unwrap();

    let mut writer = MemoryWriter::new();
    writer.register_for_write("clusters");
    writer.write_event(&producer).unwrap();

    let mut reader = MemoryReader::new(writer.into_archive(), registry());
    reader.open("in-memory").unwrap();
    let store = EventStore::with_reader(
        registry(),
        Box::new(reader),
        StoreConfig::new().with_strict_resolution(true),
    );

    let err = store.try_get("clusters").unwrap_err();
    assert!(matches!(
        err,
        tessera_foundation::Error::UnresolvableReference(id) if id == ObjectId::new(0, 1)
    ));
}
