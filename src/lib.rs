//! Tessera - event-data model runtime
//!
//! This crate re-exports all layers of the Tessera system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 2: tessera_engine     — Event store, I/O seams, memory backend
//! Layer 1: tessera_storage    — Records, collections, buffer layout
//! Layer 0: tessera_foundation — Core types (ObjectId, Error, id table)
//! ```

pub use tessera_engine as engine;
pub use tessera_foundation as foundation;
pub use tessera_storage as storage;
