//! The event store: named collections plus cross-collection resolution.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use tessera_foundation::{CollectionIdTable, Error, ObjectId, Result};
use tessera_storage::{
    AnyRecord, Collection, CollectionHandle, CollectionOps, RecordType, RefProvider,
    SharedCollection, TypeRegistry,
};

use crate::config::StoreConfig;
use crate::io::EventReader;
use crate::parameters::EventParameters;

/// Insertion-ordered name -> collection map.
#[derive(Default)]
struct CollectionMap {
    ordered: Vec<(String, SharedCollection)>,
    by_name: HashMap<String, usize>,
}

impl CollectionMap {
    fn lookup(&self, name: &str) -> Option<SharedCollection> {
        self.by_name
            .get(name)
            .map(|&index| Rc::clone(&self.ordered[index].1))
    }

    fn insert(&mut self, name: &str, coll: &SharedCollection) {
        let index = self.ordered.len();
        self.ordered.push((name.to_owned(), Rc::clone(coll)));
        self.by_name.insert(name.to_owned(), index);
    }

    /// Swaps the collection under an existing name, keeping its position.
    fn replace(&mut self, name: &str, coll: &SharedCollection) {
        if let Some(&index) = self.by_name.get(name) {
            self.ordered[index].1 = Rc::clone(coll);
        } else {
            self.insert(name, coll);
        }
    }
}

/// Per-event registry of named collections plus the reference resolver.
///
/// One store processes one event (or one slot's stream of events) at a time;
/// the type is deliberately not `Send`. The only state shared across slots
/// is the id table and the (read-only) type registry.
///
/// Retrieval through [`EventStore::get`] lazily reads collections from the
/// attached reader and resolves their cross-collection references. A
/// per-event retrieved-ids set guards the resolution: an id is marked seen
/// *before* its collection is fetched and resolved, so when resolution
/// re-enters `get` for the same id (directly for a self-referencing type, or
/// transitively around a cycle), the re-entrant call returns the collection
/// without resolving it again. Every collection is resolved at most once per
/// event and cyclic reference graphs terminate.
pub struct EventStore {
    registry: Arc<TypeRegistry>,
    table: Arc<CollectionIdTable>,
    collections: RefCell<CollectionMap>,
    /// Per-event cache: collection id -> fully resolved collection.
    cache: RefCell<HashMap<u32, SharedCollection>>,
    /// Per-event recursion guard: ids retrieval has seen this event.
    retrieved: RefCell<HashSet<u32>>,
    parameters: RefCell<EventParameters>,
    config: StoreConfig,
    reader: Option<RefCell<Box<dyn EventReader>>>,
}

impl EventStore {
    /// Creates a store with no reader (the producing path).
    #[must_use]
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self::with_config(registry, StoreConfig::default())
    }

    /// Creates a readerless store with an explicit configuration.
    #[must_use]
    pub fn with_config(registry: Arc<TypeRegistry>, config: StoreConfig) -> Self {
        Self {
            registry,
            table: Arc::new(CollectionIdTable::new()),
            collections: RefCell::new(CollectionMap::default()),
            cache: RefCell::new(HashMap::new()),
            retrieved: RefCell::new(HashSet::new()),
            parameters: RefCell::new(EventParameters::new()),
            config,
            reader: None,
        }
    }

    /// Creates a store reading events through the given reader.
    ///
    /// The reader's id table becomes the store's, so ids persisted by the
    /// producing side keep their meaning.
    #[must_use]
    pub fn with_reader(
        registry: Arc<TypeRegistry>,
        reader: Box<dyn EventReader>,
        config: StoreConfig,
    ) -> Self {
        let table = reader.id_table();
        Self {
            registry,
            table,
            collections: RefCell::new(CollectionMap::default()),
            cache: RefCell::new(HashMap::new()),
            retrieved: RefCell::new(HashSet::new()),
            parameters: RefCell::new(EventParameters::new()),
            config,
            reader: Some(RefCell::new(reader)),
        }
    }

    /// The shared name/id table.
    #[must_use]
    pub fn id_table(&self) -> Arc<CollectionIdTable> {
        Arc::clone(&self.table)
    }

    /// The shared type registry.
    #[must_use]
    pub fn registry(&self) -> Arc<TypeRegistry> {
        Arc::clone(&self.registry)
    }

    /// Number of events the attached reader declares; 0 without a reader.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.reader
            .as_ref()
            .map_or(0, |reader| reader.borrow().entry_count())
    }

    /// Read access to the current event's parameters.
    #[must_use]
    pub fn parameters(&self) -> Ref<'_, EventParameters> {
        self.parameters.borrow()
    }

    /// Write access to the current event's parameters.
    #[must_use]
    pub fn parameters_mut(&self) -> RefMut<'_, EventParameters> {
        self.parameters.borrow_mut()
    }

    /// Replaces the current parameters with the reader's, if any.
    pub fn load_parameters(&self) {
        if let Some(reader) = &self.reader {
            *self.parameters.borrow_mut() = reader.borrow_mut().read_parameters();
        }
    }

    /// Names of all owned collections, in registration order.
    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        self.collections
            .borrow()
            .ordered
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Registers a new, empty collection of type `R` under a name.
    ///
    /// The collection receives its id from the table immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the name is already taken.
    pub fn register<R: RecordType>(&self, name: &str) -> Result<CollectionHandle<R>> {
        if self.collections.borrow().by_name.contains_key(name) {
            return Err(Error::internal(format!(
                "collection already registered: {name}"
            )));
        }
        let id = self.table.add(name);
        let shared = Collection::<R>::new().into_shared();
        shared.borrow_mut().set_collection_id(id);
        self.collections.borrow_mut().insert(name, &shared);
        debug!(collection = name, id, "collection registered");
        Ok(CollectionHandle::from_shared(shared).expect("freshly constructed collection"))
    }

    /// Typed retrieval through the resolving path.
    ///
    /// `None` covers the expected misses: unknown name, nothing readable,
    /// or a collection of a different record type.
    #[must_use]
    pub fn get<R: RecordType>(&self, name: &str) -> Option<CollectionHandle<R>> {
        self.get_any(name).and_then(CollectionHandle::from_shared)
    }

    /// Untyped retrieval through the resolving path.
    #[must_use]
    pub fn get_any(&self, name: &str) -> Option<SharedCollection> {
        self.try_get(name).ok().flatten()
    }

    /// Retrieval that surfaces strict-mode resolution failures.
    ///
    /// `Ok(None)` is the expected miss; `Err` carries backend damage or,
    /// under [`StoreConfig::strict_resolution`], the first reference that
    /// could not be resolved.
    ///
    /// # Errors
    ///
    /// See above.
    pub fn try_get(&self, name: &str) -> Result<Option<SharedCollection>> {
        // O(1) path: already resolved this event.
        if let Some(id) = self.table.id_for(name) {
            if let Some(coll) = self.cache.borrow().get(&id) {
                return Ok(Some(Rc::clone(coll)));
            }
        }

        let id = self.table.add(name);
        // The guard is taken before anything is fetched or resolved, so a
        // cyclic reference graph re-enters the skip branch below instead of
        // recursing without bound.
        let first_retrieval = self.retrieved.borrow_mut().insert(id);

        let Some(coll) = self.fetch(name)? else {
            return Ok(None);
        };

        if first_retrieval {
            {
                let mut ops = coll.borrow_mut();
                if ops.is_valid() {
                    if ops.collection_id() != id {
                        ops.set_collection_id(id);
                    }
                } else {
                    ops.set_collection_id(id);
                    ops.prepare_after_read();
                }
            }
            let resolved = coll.borrow().set_references(self);
            if !resolved {
                let missing = coll.borrow().unresolved_ids();
                if self.config.strict_resolution {
                    let first = missing.first().copied().unwrap_or(ObjectId::INVALID);
                    return Err(Error::unresolvable(first));
                }
                warn!(
                    collection = name,
                    missing = missing.len(),
                    "references left unresolved"
                );
            }
            self.cache.borrow_mut().insert(id, Rc::clone(&coll));
        } else {
            // Re-entrant retrieval: the in-flight outer call owns the
            // resolution of this collection and will complete it itself.
            trace!(collection = name, "re-entrant retrieval, resolution skipped");
        }

        Ok(Some(coll))
    }

    /// Finds the collection in the owned map, else reads it from the
    /// backend and takes ownership of it.
    ///
    /// An owned collection left invalid by `clear_collections` is treated
    /// as consumed: with a reader attached, the current event's content is
    /// read afresh and replaces it; without one, the producer gets the
    /// cleared collection back to refill.
    fn fetch(&self, name: &str) -> Result<Option<SharedCollection>> {
        let owned = self.collections.borrow().lookup(name);
        if let Some(coll) = &owned {
            if coll.borrow().is_valid() || self.reader.is_none() {
                return Ok(Some(Rc::clone(coll)));
            }
        }
        let Some(reader) = &self.reader else {
            return Ok(None);
        };
        let Some(read) = reader.borrow_mut().read_collection(name)? else {
            // Nothing persisted under this name; a producer-made collection
            // (cleared at end of event) is handed back to refill.
            return Ok(owned);
        };
        debug!(collection = name, "collection read from backend");
        // Registered before resolution so a self-referencing collection
        // finds itself through the re-entrant path.
        if owned.is_some() {
            self.collections.borrow_mut().replace(name, &read);
        } else {
            self.collections.borrow_mut().insert(name, &read);
        }
        Ok(Some(read))
    }

    /// Ends the current event: clears record content of every owned
    /// collection, the per-event cache, the recursion guard, and the event
    /// parameters. Name/id registrations persist, so a collection is
    /// re-creatable under the same name and id next event.
    pub fn clear_collections(&self) {
        for (_, coll) in &self.collections.borrow().ordered {
            coll.borrow_mut().clear();
        }
        self.cache.borrow_mut().clear();
        self.retrieved.borrow_mut().clear();
        self.parameters.borrow_mut().clear();
    }

    /// Additionally destroys and forgets all collections; used when
    /// switching between input files or runs.
    pub fn clear(&self) {
        self.clear_collections();
        let mut map = self.collections.borrow_mut();
        map.ordered.clear();
        map.by_name.clear();
    }

    /// Advances past the current event on both the store and its reader.
    pub fn end_of_event(&self) {
        self.clear_collections();
        if let Some(reader) = &self.reader {
            reader.borrow_mut().end_of_event();
        }
    }
}

impl RefProvider for EventStore {
    /// Resolves a stored id to a live handle, loading the owning collection
    /// on demand through the guarded retrieval path.
    fn record_at(&self, id: ObjectId) -> Option<AnyRecord> {
        if !id.is_tracked() {
            return None;
        }
        // Fast path: the owning collection is already cached this event.
        let cached = self.cache.borrow().get(&id.collection_id).map(Rc::clone);
        let coll = match cached {
            Some(coll) => coll,
            None => {
                let name = self.table.name_for(id.collection_id)?;
                trace!(collection = %name, "loading reference target");
                self.try_get(&name).ok().flatten()?
            }
        };
        let index = usize::try_from(id.index).ok()?;
        let handle = coll.borrow().handle_at(index);
        handle
    }
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore")
            .field("collections", &self.collection_names())
            .field("registered_names", &self.table.len())
            .field("has_reader", &self.reader.is_some())
            .finish()
    }
}
