//! Record and collection storage for Tessera.
//!
//! This crate provides:
//! - [`Record`] / [`RecordMut`] - access-mode-gated record handles
//! - [`AnyRecord`] - type-erased handles held by resolved relations
//! - [`Collection`] - the owning container for all records of one type
//! - [`CollectionOps`] - the engine-facing capability trait
//! - [`CollectionBuffers`] - the structure-of-arrays persistence image
//! - [`TypeRegistry`] - explicit type-name -> factory/decoder registry

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod collection;
mod layout;
mod record;
mod registry;

pub use collection::{
    Collection, CollectionHandle, CollectionOps, RefProvider, SharedCollection,
};
pub use layout::{CollectionBuffers, Payload, RecordDescriptor, RecordType};
pub use record::{AccessMode, AnyRecord, Handle, ReadOnly, ReadWrite, Record, RecordMut};
pub use registry::TypeRegistry;
