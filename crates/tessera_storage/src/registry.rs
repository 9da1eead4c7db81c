//! Explicit record-type registry shared between stores and backends.
//!
//! There is no global registry: a [`TypeRegistry`] is constructed once at
//! setup, populated with every record type the run uses, then frozen into an
//! `Arc` and handed to whichever stores and readers need it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tessera_foundation::{Error, Result};

use crate::collection::{Collection, SharedCollection};
use crate::layout::{CollectionBuffers, RecordType};

/// Factory and decoder for one record type.
struct RegistryEntry {
    make: fn() -> SharedCollection,
    decode: fn(&[u8]) -> Result<SharedCollection>,
}

/// Maps record type names to collection factories and buffer decoders.
#[derive(Default)]
pub struct TypeRegistry {
    entries: HashMap<&'static str, RegistryEntry>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a record type under its descriptor's type name.
    ///
    /// Registering the same type twice is idempotent.
    pub fn register<R: RecordType>(&mut self) {
        self.entries
            .entry(R::descriptor().type_name)
            .or_insert(RegistryEntry {
                make: make_collection::<R>,
                decode: decode_collection::<R>,
            });
    }

    /// Returns true if a type name is registered.
    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }

    /// Creates an empty collection for a registered type name.
    #[must_use]
    pub fn make(&self, type_name: &str) -> Option<SharedCollection> {
        self.entries.get(type_name).map(|entry| (entry.make)())
    }

    /// Decodes persisted buffers into a collection of a registered type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedInput`] for an unregistered type name and
    /// [`Error::Decode`] for undecodable bytes.
    pub fn decode(&self, type_name: &str, bytes: &[u8]) -> Result<SharedCollection> {
        let entry = self.entries.get(type_name).ok_or_else(|| {
            Error::malformed(format!("unregistered record type: {type_name}"))
        })?;
        (entry.decode)(bytes)
    }

    /// Freezes the registry for sharing across slots.
    #[must_use]
    pub fn freeze(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.entries.keys().collect();
        names.sort_unstable();
        f.debug_struct("TypeRegistry").field("types", &names).finish()
    }
}

fn make_collection<R: RecordType>() -> SharedCollection {
    Collection::<R>::new().into_shared()
}

fn decode_collection<R: RecordType>(bytes: &[u8]) -> Result<SharedCollection> {
    let buffers: CollectionBuffers<R> = rmp_serde::from_slice(bytes).map_err(Error::decode)?;
    Ok(Collection::from_buffers(buffers).into_shared())
}
