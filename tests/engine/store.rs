//! Integration tests for event store retrieval and lifecycle.

use std::rc::Rc;

use tessera_engine::{EventReader, EventStore, EventWriter, MemoryReader, MemoryWriter, StoreConfig};
use tessera_storage::CollectionOps;

use crate::fixtures::{registry, Hit, HitData, Track};

/// Writes one event with a two-hit collection and returns a reading store.
fn reading_store() -> EventStore {
    let store = EventStore::new(registry());
    let hits = store.register::<Hit>("hits").unwrap();
    hits.borrow_mut().create_with(HitData {
        cell: 1,
        charge: 0.5,
    });
    hits.borrow_mut().create_with(HitData {
        cell: 2,
        charge: 1.5,
    });

    let mut writer = MemoryWriter::new();
    writer.register_for_write("hits");
    writer.write_event(&store).unwrap();

    let mut reader = MemoryReader::new(writer.into_archive(), registry());
    reader.open("in-memory").unwrap();
    EventStore::with_reader(registry(), Box::new(reader), StoreConfig::default())
}

#[test]
fn collections_load_lazily_from_the_reader() {
    let store = reading_store();
    assert!(store.collection_names().is_empty(), "nothing loaded yet");

    let hits = store.get::<Hit>("hits").unwrap();
    assert_eq!(hits.borrow().len(), 2);
    assert!(hits.borrow().is_valid());
    assert_eq!(store.collection_names(), vec!["hits".to_owned()]);
}

#[test]
fn repeated_gets_hit_the_cache() {
    let store = reading_store();
    let first = store.get_any("hits").unwrap();
    let second = store.get_any("hits").unwrap();
    assert!(Rc::ptr_eq(&first, &second));
}

#[test]
fn loaded_collections_keep_their_persisted_ids() {
    let store = reading_store();
    let expected = store.id_table().id_for("hits").unwrap();

    let hits = store.get::<Hit>("hits").unwrap();
    assert_eq!(hits.borrow().collection_id(), expected);
    assert_eq!(
        hits.borrow().at(0).unwrap().id().collection_id,
        expected
    );
}

#[test]
fn unknown_names_miss_without_error() {
    let store = reading_store();
    assert!(store.get_any("ghosts").is_none());
    assert!(store.try_get("ghosts").unwrap().is_none());
}

#[test]
fn wrong_record_type_misses() {
    let store = reading_store();
    assert!(store.get::<Track>("hits").is_none());
}

#[test]
fn entry_count_comes_from_the_reader() {
    let store = reading_store();
    assert_eq!(store.entry_count(), 1);
}

#[test]
fn clearing_between_events_resets_the_guard_and_cache() {
    let store = reading_store();
    let first = store.get_any("hits").unwrap();

    store.clear_collections();
    assert_eq!(first.borrow().len(), 0, "content cleared at end of event");

    // Next event: nothing left to read (single-event archive), so the miss
    // is reported, not cached stale data.
    store.end_of_event();
    assert!(store.get_any("hits").is_none());
}

#[test]
fn producer_collections_survive_clear_for_the_next_event() {
    let store = EventStore::new(registry());
    let hits = store.register::<Hit>("hits").unwrap();
    hits.borrow_mut().create();
    store.clear_collections();

    assert_eq!(hits.borrow().len(), 0);
    hits.borrow_mut().create();
    hits.borrow_mut().create();
    assert_eq!(store.get::<Hit>("hits").unwrap().borrow().len(), 2);
}
