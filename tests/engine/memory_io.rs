//! Integration tests for the in-memory backend.

use tessera_engine::{
    EventReader, EventStore, EventWriter, MemoryArchive, MemoryReader, MemoryWriter, StoreConfig,
};
use tessera_foundation::Error;

use crate::fixtures::{registry, Hit, HitData};

/// Writes `count` events; event `i` holds `i + 1` hits.
fn archive_with_events(count: usize) -> MemoryArchive {
    let store = EventStore::new(registry());
    let hits = store.register::<Hit>("hits").unwrap();

    let mut writer = MemoryWriter::new();
    writer.register_for_write("hits");

    for event in 0..count {
        for i in 0..=event {
            hits.borrow_mut().create_with(HitData {
                cell: i as u64,
                charge: 1.0,
            });
        }
        store.parameters_mut().set_int("event", event as i64);
        writer.write_event(&store).unwrap();
        store.clear_collections();
    }
    writer.finish().unwrap();
    writer.into_archive()
}

#[test]
fn events_are_stored_in_order() {
    let archive = archive_with_events(3);
    assert_eq!(archive.event_count(), 3);
}

#[test]
fn a_reading_store_walks_all_events() {
    let mut reader = MemoryReader::new(archive_with_events(3), registry());
    reader.open("in-memory").unwrap();
    let store = EventStore::with_reader(registry(), Box::new(reader), StoreConfig::default());

    for event in 0..store.entry_count() {
        let hits = store.get::<Hit>("hits").unwrap();
        assert_eq!(hits.borrow().len(), event + 1);

        store.load_parameters();
        assert_eq!(store.parameters().int("event"), Some(event as i64));

        store.end_of_event();
    }
}

#[test]
fn missing_collections_read_as_none() {
    let mut reader = MemoryReader::new(archive_with_events(1), registry());
    reader.open("in-memory").unwrap();
    assert!(reader.read_collection("ghosts").unwrap().is_none());
}

#[test]
fn an_empty_archive_is_malformed_at_open() {
    let mut reader = MemoryReader::new(MemoryArchive::default(), registry());
    let err = reader.open("in-memory").unwrap_err();
    assert!(matches!(err, Error::MalformedInput(_)));
}

#[test]
fn the_id_table_travels_with_the_archive() {
    let archive = archive_with_events(1);
    let reader = MemoryReader::new(archive, registry());
    assert_eq!(reader.id_table().id_for("hits"), Some(1));
}
