//! In-memory reference backend.
//!
//! Round-trips collections through their encoded buffer images, exactly the
//! way a columnar file backend would, minus the file. Serves as the test
//! backend and as the reference for the logical persisted layout.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use tessera_foundation::{CollectionIdTable, Error, Result};
use tessera_storage::{CollectionOps, SharedCollection, TypeRegistry};

use crate::io::{EventReader, EventWriter};
use crate::parameters::EventParameters;
use crate::store::EventStore;

/// One persisted event: encoded buffers per collection name, plus the
/// event's parameters.
#[derive(Clone, Debug, Default)]
struct EventBlock {
    buffers: HashMap<String, Vec<u8>>,
    parameters: EventParameters,
}

/// Everything a writer produced: per-event blocks plus file-level metadata.
#[derive(Clone, Debug, Default)]
pub struct MemoryArchive {
    events: Vec<EventBlock>,
    /// Record type name per collection name.
    types: HashMap<String, String>,
    table: CollectionIdTable,
}

impl MemoryArchive {
    /// Number of events in the archive.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

/// Writer half of the in-memory backend.
#[derive(Default)]
pub struct MemoryWriter {
    registered: Vec<String>,
    archive: MemoryArchive,
}

impl MemoryWriter {
    /// Creates a writer with nothing registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the writer, returning the finished archive.
    #[must_use]
    pub fn into_archive(self) -> MemoryArchive {
        self.archive
    }
}

impl EventWriter for MemoryWriter {
    fn register_for_write(&mut self, name: &str) {
        if !self.registered.iter().any(|n| n == name) {
            self.registered.push(name.to_owned());
        }
    }

    fn write_event(&mut self, store: &EventStore) -> Result<()> {
        let mut block = EventBlock::default();
        for name in &self.registered {
            let coll = store
                .get_any(name)
                .ok_or_else(|| Error::not_found(name.clone()))?;
            let mut ops = coll.borrow_mut();
            ops.prepare_for_write();
            let bytes = ops.encode_buffers()?;
            debug!(collection = %name, bytes = bytes.len(), "collection encoded");
            self.archive
                .types
                .entry(name.clone())
                .or_insert_with(|| ops.type_name().to_owned());
            block.buffers.insert(name.clone(), bytes);
        }
        block.parameters = store.parameters().clone();
        self.archive.table = (*store.id_table()).clone();
        self.archive.events.push(block);
        Ok(())
    }
}

/// Reader half of the in-memory backend.
pub struct MemoryReader {
    archive: MemoryArchive,
    registry: Arc<TypeRegistry>,
    table: Arc<CollectionIdTable>,
    current: usize,
}

impl MemoryReader {
    /// Creates a reader over a finished archive.
    #[must_use]
    pub fn new(archive: MemoryArchive, registry: Arc<TypeRegistry>) -> Self {
        let table = Arc::new(archive.table.clone());
        Self {
            archive,
            registry,
            table,
            current: 0,
        }
    }

    /// Index of the current event.
    #[must_use]
    pub fn current_event(&self) -> usize {
        self.current
    }
}

impl EventReader for MemoryReader {
    fn open(&mut self, _source: &str) -> Result<()> {
        if self.archive.events.is_empty() {
            return Err(Error::malformed("archive declares zero events"));
        }
        self.current = 0;
        Ok(())
    }

    fn close(&mut self) {}

    fn entry_count(&self) -> usize {
        self.archive.events.len()
    }

    fn read_collection(&mut self, name: &str) -> Result<Option<SharedCollection>> {
        let Some(block) = self.archive.events.get(self.current) else {
            return Err(Error::malformed(format!(
                "event {} out of range ({} available)",
                self.current,
                self.archive.events.len()
            )));
        };
        let Some(bytes) = block.buffers.get(name) else {
            return Ok(None);
        };
        let type_name = self.archive.types.get(name).ok_or_else(|| {
            Error::malformed(format!("no record type recorded for collection '{name}'"))
        })?;
        debug!(collection = %name, record_type = %type_name, "decoding collection");
        self.registry.decode(type_name, bytes).map(Some)
    }

    fn id_table(&self) -> Arc<CollectionIdTable> {
        Arc::clone(&self.table)
    }

    fn read_parameters(&mut self) -> EventParameters {
        self.archive
            .events
            .get(self.current)
            .map(|block| block.parameters.clone())
            .unwrap_or_default()
    }

    fn end_of_event(&mut self) {
        self.current += 1;
    }
}
