//! Reader and writer collaborator seams.
//!
//! The store never inspects storage formats; it sees persisted data only
//! through [`EventReader`], and backends see the store only through
//! [`EventWriter`] plus the buffer accessors on
//! [`CollectionOps`](tessera_storage::CollectionOps).

use std::sync::Arc;

use tessera_foundation::{CollectionIdTable, Result};
use tessera_storage::SharedCollection;

use crate::parameters::EventParameters;
use crate::store::EventStore;

/// Deserializing side of a storage backend.
pub trait EventReader {
    /// Opens an event source.
    ///
    /// # Errors
    ///
    /// Returns [`tessera_foundation::Error::MalformedInput`] if the source
    /// is missing required metadata, declares zero events, or is otherwise
    /// structurally unusable. Fatal at setup, not recoverable mid-event.
    fn open(&mut self, source: &str) -> Result<()>;

    /// Closes the source.
    fn close(&mut self);

    /// Total number of events available.
    fn entry_count(&self) -> usize;

    /// Reads one named collection of the current event.
    ///
    /// The returned collection has its buffers installed but is neither
    /// prepared nor reference-resolved; the store does both. `Ok(None)`
    /// means the event has no such collection: an expected miss, not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns a decode or malformed-input error for damaged data.
    fn read_collection(&mut self, name: &str) -> Result<Option<SharedCollection>>;

    /// The name/id table persisted with the data.
    fn id_table(&self) -> Arc<CollectionIdTable>;

    /// Per-event metadata of the current event.
    fn read_parameters(&mut self) -> EventParameters {
        EventParameters::default()
    }

    /// Advances to the next event.
    fn end_of_event(&mut self);
}

/// Serializing side of a storage backend.
pub trait EventWriter {
    /// Declares a named collection for writing. It is looked up through the
    /// store on every [`EventWriter::write_event`].
    fn register_for_write(&mut self, name: &str);

    /// Prepares every registered collection for writing and persists its
    /// buffers plus the store's event parameters.
    ///
    /// # Errors
    ///
    /// Returns [`tessera_foundation::Error::NotFound`] if a registered name
    /// cannot be retrieved from the store, or an encode error if buffer
    /// serialization fails.
    fn write_event(&mut self, store: &EventStore) -> Result<()>;

    /// Flushes whatever the backend buffers at end of run.
    ///
    /// # Errors
    ///
    /// Backend-specific; the in-memory backend never fails.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
