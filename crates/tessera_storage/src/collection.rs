//! Collections: the owning containers for all records of one type.
//!
//! A collection moves through two lifecycles. Writing:
//! `Empty -> Populated -> PreparedForWrite`. Reading:
//! `Empty -> BufferInstalled -> PreparedAfterRead -> ReferencesResolved`.
//! `clear` returns to `Empty` from any state.

// Allow usize -> i32/u32 casts - entry counts are bounded by the i32 index space
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;

use tessera_foundation::{Error, IdRange, ObjectId, Result};

use crate::layout::{CollectionBuffers, RecordDescriptor, RecordType};
use crate::record::{
    AnyRecord, ErasedRecord, Handle, Record, RecordCell, RecordMut, RecordState, RelationSlot,
};

/// Source of live record handles during reference resolution.
///
/// Implemented by the event store: given a stored id, it locates the owning
/// collection (loading it on demand) and returns a handle to the slot.
pub trait RefProvider {
    /// Returns a live handle for a stored id, or `None` if the owning
    /// collection or slot cannot be found.
    fn record_at(&self, id: ObjectId) -> Option<AnyRecord>;
}

/// Engine-facing capability contract implemented by every collection.
///
/// The engine depends only on this trait, never on concrete record types.
pub trait CollectionOps: Any {
    /// Name of the stored record type, as known to the type registry.
    fn type_name(&self) -> &'static str;

    /// Static member description of the stored record type.
    fn descriptor(&self) -> &'static RecordDescriptor;

    /// The id stamped onto this collection and its records.
    fn collection_id(&self) -> u32;

    /// Stamps an id onto the collection and every already-created entry.
    fn set_collection_id(&mut self, id: u32);

    /// Number of records.
    fn len(&self) -> usize;

    /// Returns true if the collection holds no records.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true once population completed, via creation or post-read
    /// reconstruction.
    fn is_valid(&self) -> bool;

    /// Flattens entries into the persistable buffers.
    ///
    /// Deterministic; buffers are cleared and fully rewritten on every call,
    /// so repeated writes never accumulate stale entries.
    fn prepare_for_write(&mut self);

    /// Reconstructs entries from installed buffers and marks the collection
    /// valid. Relation members stay as stored ids until `set_references`.
    fn prepare_after_read(&mut self);

    /// Resolves stored relation ids into live handles through the provider.
    ///
    /// Returns false if any non-invalid target could not be resolved; such
    /// slots keep their stored id and stay observable as unresolved. Takes
    /// `&self` (entry state is lock-guarded), so cyclic resolution re-entry
    /// never needs an exclusive borrow of the collection.
    fn set_references(&self, provider: &dyn RefProvider) -> bool;

    /// Stored ids that are still unresolved after `set_references`.
    fn unresolved_ids(&self) -> Vec<ObjectId>;

    /// Drops all entries and buffers, unlinking resolved relation handles.
    fn clear(&mut self);

    /// Type-erased handle to the record in the given slot.
    fn handle_at(&self, index: usize) -> Option<AnyRecord>;

    /// Encodes the prepared buffers for a backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if serialization fails.
    fn encode_buffers(&self) -> Result<Vec<u8>>;

    /// Upcast for typed downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for typed downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl fmt::Debug for dyn CollectionOps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionOps")
            .field("type_name", &self.type_name())
            .field("collection_id", &self.collection_id())
            .field("len", &self.len())
            .finish()
    }
}

/// Shared, dynamically typed collection cell as owned by the store.
pub type SharedCollection = Rc<RefCell<dyn CollectionOps>>;

/// Ordered container owning every record of one type within one event.
///
/// Entry slots are stable: a record's `ObjectId.index` is its position in
/// the entry list for the life of the event.
pub struct Collection<R: RecordType> {
    entries: Vec<Arc<RecordCell<R>>>,
    buffers: CollectionBuffers<R>,
    collection_id: u32,
    valid: bool,
}

impl<R: RecordType> Collection<R> {
    /// Creates an empty, unregistered collection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            buffers: CollectionBuffers::empty(),
            collection_id: 0,
            valid: false,
        }
    }

    /// Creates a collection with buffers installed, ready for
    /// [`CollectionOps::prepare_after_read`].
    #[must_use]
    pub fn from_buffers(buffers: CollectionBuffers<R>) -> Self {
        Self {
            entries: Vec::new(),
            buffers,
            collection_id: 0,
            valid: false,
        }
    }

    /// Wraps the collection in the shared cell the engine works with.
    #[must_use]
    pub fn into_shared(self) -> SharedCollection {
        Rc::new(RefCell::new(self))
    }

    /// Installs raw buffers, replacing current entries and buffers.
    pub fn set_buffers(&mut self, buffers: CollectionBuffers<R>) {
        self.entries.clear();
        self.buffers = buffers;
        self.valid = false;
    }

    /// Read access to the persistable buffers, for writer collaborators.
    #[must_use]
    pub fn buffers(&self) -> &CollectionBuffers<R> {
        &self.buffers
    }

    /// Allocates a new record owned by this collection and returns a live
    /// mutable handle to it.
    pub fn create(&mut self) -> RecordMut<R> {
        self.create_with(R::Payload::default())
    }

    /// Like [`Collection::create`], with an initial payload.
    pub fn create_with(&mut self, payload: R::Payload) -> RecordMut<R> {
        let index = self.entries.len() as i32;
        let cell = RecordCell::tracked(payload, ObjectId::new(index, self.collection_id));
        self.entries.push(Arc::clone(&cell));
        self.valid = true;
        Handle::adopt(cell)
    }

    /// Inserts a free-floating record, transferring ownership to this
    /// collection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyOwned`] if the record is already tracked by
    /// any collection (including this one); the collection is unchanged.
    pub fn push_back(&mut self, record: &RecordMut<R>) -> Result<()> {
        let index = self.entries.len() as i32;
        let cell = Arc::clone(record.cell());
        cell.try_track(ObjectId::new(index, self.collection_id))?;
        self.entries.push(cell);
        self.valid = true;
        Ok(())
    }

    /// Bounds-checked read-only access.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`], distinct from a name-lookup miss,
    /// when the index is past the end.
    pub fn at(&self, index: usize) -> Result<Record<R>> {
        self.entries
            .get(index)
            .map(|cell| Handle::adopt(Arc::clone(cell)))
            .ok_or_else(|| Error::out_of_range(index, self.entries.len()))
    }

    /// Read-only access, `None` past the end.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Record<R>> {
        self.entries
            .get(index)
            .map(|cell| Handle::adopt(Arc::clone(cell)))
    }

    /// Iterates read-only handles in slot order.
    pub fn iter(&self) -> impl Iterator<Item = Record<R>> + '_ {
        self.entries
            .iter()
            .map(|cell| Handle::adopt(Arc::clone(cell)))
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the collection holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true once population completed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The id stamped onto this collection and its records.
    #[must_use]
    pub fn collection_id(&self) -> u32 {
        self.collection_id
    }
}

impl<R: RecordType> Default for Collection<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RecordType> fmt::Debug for Collection<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("type_name", &R::descriptor().type_name)
            .field("collection_id", &self.collection_id)
            .field("len", &self.entries.len())
            .field("valid", &self.valid)
            .finish()
    }
}

fn resolve_slot(slot: &mut RelationSlot, provider: &dyn RefProvider, resolved_all: &mut bool) {
    if let RelationSlot::Stored(id) = *slot {
        if id.is_invalid() {
            *slot = RelationSlot::Unset;
        } else if let Some(handle) = provider.record_at(id) {
            *slot = RelationSlot::Resolved(handle);
        } else {
            *resolved_all = false;
        }
    }
}

impl<R: RecordType> CollectionOps for Collection<R> {
    fn type_name(&self) -> &'static str {
        R::descriptor().type_name
    }

    fn descriptor(&self) -> &'static RecordDescriptor {
        R::descriptor()
    }

    fn collection_id(&self) -> u32 {
        self.collection_id
    }

    fn set_collection_id(&mut self, id: u32) {
        self.collection_id = id;
        for (index, cell) in self.entries.iter().enumerate() {
            cell.store_id(ObjectId::new(index as i32, id));
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn prepare_for_write(&mut self) {
        self.buffers.clear();
        for cell in &self.entries {
            let state = cell.state.lock();
            self.buffers.data.push(state.payload);

            for (member, slot) in state.single.iter().enumerate() {
                self.buffers.single_refs[member].push(slot.persisted_id());
            }
            for (member, slots) in state.multi.iter().enumerate() {
                let column = &mut self.buffers.multi_refs[member];
                let begin = column.len() as u32;
                column.extend(slots.iter().map(RelationSlot::persisted_id));
                let end = column.len() as u32;
                self.buffers.multi_ranges[member].push(IdRange::new(begin, end));
            }
            for (member, values) in state.vectors.iter().enumerate() {
                let column = &mut self.buffers.vector_data[member];
                let begin = column.len() as u32;
                column.extend_from_slice(values);
                let end = column.len() as u32;
                self.buffers.vector_ranges[member].push(IdRange::new(begin, end));
            }
        }
    }

    fn prepare_after_read(&mut self) {
        let desc = R::descriptor();
        let count = self.buffers.data.len();
        self.entries.clear();
        self.entries.reserve(count);

        for i in 0..count {
            let mut state = RecordState::<R>::new(self.buffers.data[i]);

            for member in 0..desc.single_relations.len() {
                let id = self.buffers.single_refs[member]
                    .get(i)
                    .copied()
                    .unwrap_or(ObjectId::INVALID);
                state.single[member] = if id.is_invalid() {
                    RelationSlot::Unset
                } else {
                    RelationSlot::Stored(id)
                };
            }
            for member in 0..desc.multi_relations.len() {
                let range = self.buffers.multi_ranges[member]
                    .get(i)
                    .copied()
                    .unwrap_or_default();
                state.multi[member] = self.buffers.multi_refs[member]
                    .get(range.as_range())
                    .unwrap_or(&[])
                    .iter()
                    .map(|&id| RelationSlot::Stored(id))
                    .collect();
            }
            for member in 0..desc.vector_members.len() {
                let range = self.buffers.vector_ranges[member]
                    .get(i)
                    .copied()
                    .unwrap_or_default();
                state.vectors[member] = self.buffers.vector_data[member]
                    .get(range.as_range())
                    .unwrap_or(&[])
                    .to_vec();
            }

            self.entries.push(RecordCell::tracked_with_state(
                state,
                ObjectId::new(i as i32, self.collection_id),
            ));
        }
        self.valid = true;
    }

    fn set_references(&self, provider: &dyn RefProvider) -> bool {
        let mut resolved_all = true;
        for cell in &self.entries {
            let mut state = cell.state.lock();
            for slot in &mut state.single {
                resolve_slot(slot, provider, &mut resolved_all);
            }
            for slots in &mut state.multi {
                for slot in slots {
                    resolve_slot(slot, provider, &mut resolved_all);
                }
            }
        }
        resolved_all
    }

    fn unresolved_ids(&self) -> Vec<ObjectId> {
        let mut missing = Vec::new();
        for cell in &self.entries {
            let state = cell.state.lock();
            for slot in state.single.iter().chain(state.multi.iter().flatten()) {
                if let RelationSlot::Stored(id) = slot {
                    if !id.is_invalid() {
                        missing.push(*id);
                    }
                }
            }
        }
        missing
    }

    fn clear(&mut self) {
        // Unlink resolved relation handles first so reference cycles between
        // records cannot keep each other alive.
        for cell in &self.entries {
            let mut state = cell.state.lock();
            for slot in &mut state.single {
                *slot = RelationSlot::Unset;
            }
            for slots in &mut state.multi {
                slots.clear();
            }
            for values in &mut state.vectors {
                values.clear();
            }
        }
        self.entries.clear();
        self.buffers.clear();
        self.valid = false;
    }

    fn handle_at(&self, index: usize) -> Option<AnyRecord> {
        self.entries
            .get(index)
            .map(|cell| AnyRecord::adopt(Arc::clone(cell) as Arc<dyn ErasedRecord>))
    }

    fn encode_buffers(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec(&self.buffers).map_err(Error::encode)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Typed wrapper over a [`SharedCollection`].
///
/// Construction verifies the dynamic type once; borrows are then direct.
pub struct CollectionHandle<R: RecordType> {
    shared: SharedCollection,
    _marker: PhantomData<fn() -> R>,
}

impl<R: RecordType> CollectionHandle<R> {
    /// Wraps a shared collection after checking its record type.
    #[must_use]
    pub fn from_shared(shared: SharedCollection) -> Option<Self> {
        if shared.borrow().as_any().is::<Collection<R>>() {
            Some(Self {
                shared,
                _marker: PhantomData,
            })
        } else {
            None
        }
    }

    /// The untyped shared cell.
    #[must_use]
    pub fn shared(&self) -> SharedCollection {
        Rc::clone(&self.shared)
    }

    /// Read borrow of the typed collection.
    ///
    /// # Panics
    ///
    /// Panics if the collection is currently mutably borrowed.
    #[must_use]
    pub fn borrow(&self) -> std::cell::Ref<'_, Collection<R>> {
        std::cell::Ref::map(self.shared.borrow(), |ops| {
            ops.as_any()
                .downcast_ref::<Collection<R>>()
                .expect("record type checked at construction")
        })
    }

    /// Mutable borrow of the typed collection.
    ///
    /// # Panics
    ///
    /// Panics if the collection is currently borrowed.
    #[must_use]
    pub fn borrow_mut(&self) -> std::cell::RefMut<'_, Collection<R>> {
        std::cell::RefMut::map(self.shared.borrow_mut(), |ops| {
            ops.as_any_mut()
                .downcast_mut::<Collection<R>>()
                .expect("record type checked at construction")
        })
    }
}

impl<R: RecordType> Clone for CollectionHandle<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
            _marker: PhantomData,
        }
    }
}

impl<R: RecordType> fmt::Debug for CollectionHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CollectionHandle({:?})", &*self.borrow())
    }
}
