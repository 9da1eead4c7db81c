//! Name/id registry for collections.
//!
//! Every store owns one table mapping collection names to small integer ids
//! and back. Ids are what relation buffers persist; names are what users and
//! backends address collections by. The table is the one piece of core state
//! that may be shared across worker threads, so it is internally
//! synchronized.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Bidirectional name⟷id registry, one per store.
///
/// `add` is idempotent: registering an existing name returns its existing id.
/// Ids are allocated monotonically starting at 1; 0 is reserved to mean
/// "no id" and is what the `ObjectId` sentinels carry.
#[derive(Default)]
pub struct CollectionIdTable {
    inner: Mutex<TableInner>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct TableInner {
    names: Vec<String>,
    ids: Vec<u32>,
}

impl CollectionIdTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a name, returning its id.
    ///
    /// Returns the existing id if the name is already registered.
    ///
    /// # Panics
    ///
    /// Panics if the number of registered collections exceeds `u32::MAX`.
    pub fn add(&self, name: &str) -> u32 {
        let mut inner = self.inner.lock();
        if let Some(pos) = inner.names.iter().position(|n| n == name) {
            return inner.ids[pos];
        }
        let id = u32::try_from(inner.ids.len()).expect("too many collections") + 1;
        inner.names.push(name.to_owned());
        inner.ids.push(id);
        id
    }

    /// Looks up the id for a name without allocating one.
    #[must_use]
    pub fn id_for(&self, name: &str) -> Option<u32> {
        let inner = self.inner.lock();
        inner
            .names
            .iter()
            .position(|n| n == name)
            .map(|pos| inner.ids[pos])
    }

    /// Looks up the name for an id.
    ///
    /// Returns `None` for an unregistered id, never a default value.
    #[must_use]
    pub fn name_for(&self, id: u32) -> Option<String> {
        let inner = self.inner.lock();
        inner
            .ids
            .iter()
            .position(|&i| i == id)
            .map(|pos| inner.names[pos].clone())
    }

    /// Existence check for a name, without allocating an id.
    #[must_use]
    pub fn present(&self, name: &str) -> bool {
        self.inner.lock().names.iter().any(|n| n == name)
    }

    /// Number of registered names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().names.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().names.is_empty()
    }

    /// Snapshot of all `(name, id)` pairs in registration order.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, u32)> {
        let inner = self.inner.lock();
        inner
            .names
            .iter()
            .cloned()
            .zip(inner.ids.iter().copied())
            .collect()
    }
}

impl Clone for CollectionIdTable {
    fn clone(&self) -> Self {
        Self {
            inner: Mutex::new(self.inner.lock().clone()),
        }
    }
}

impl fmt::Debug for CollectionIdTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CollectionIdTable")
            .field("names", &inner.names)
            .field("ids", &inner.ids)
            .finish()
    }
}

impl Serialize for CollectionIdTable {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.inner.lock().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CollectionIdTable {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        TableInner::deserialize(deserializer).map(|inner| Self {
            inner: Mutex::new(inner),
        })
    }
}
