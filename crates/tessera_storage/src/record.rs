//! Record cells and the handles that reference them.
//!
//! A record lives in a [`RecordCell`]: its POD payload plus relation and
//! vector members behind a lock, its identity in one atomic word, and a
//! handle count that matters only while the record is free-floating. Handles
//! ([`Record`] read-only, [`RecordMut`] read-write) hold exactly one acquire
//! for their lifetime: cloning acquires, dropping releases. Once a record is
//! inserted into a collection the count is inert: the collection owns the
//! record until it is cleared.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use parking_lot::Mutex;

use tessera_foundation::{Error, ObjectId, Result};

use crate::layout::RecordType;

/// One declared relation of one record.
#[derive(Clone, Debug, Default)]
pub(crate) enum RelationSlot {
    /// Nothing referenced.
    #[default]
    Unset,
    /// Raw id read from a relation buffer; not yet resolved.
    Stored(ObjectId),
    /// Live handle to the referenced record.
    Resolved(AnyRecord),
}

impl RelationSlot {
    /// The id this slot persists: the live target's current id, the stored
    /// id, or [`ObjectId::INVALID`] when unset.
    pub(crate) fn persisted_id(&self) -> ObjectId {
        match self {
            Self::Unset => ObjectId::INVALID,
            Self::Stored(id) => *id,
            Self::Resolved(handle) => handle.object_id(),
        }
    }
}

/// Mutable interior of a record cell: the payload plus its relation and
/// vector members, shaped by the record type's descriptor.
pub(crate) struct RecordState<R: RecordType> {
    pub(crate) payload: R::Payload,
    pub(crate) single: Vec<RelationSlot>,
    pub(crate) multi: Vec<Vec<RelationSlot>>,
    pub(crate) vectors: Vec<Vec<R::Scalar>>,
}

impl<R: RecordType> RecordState<R> {
    pub(crate) fn new(payload: R::Payload) -> Self {
        let desc = R::descriptor();
        Self {
            payload,
            single: vec![RelationSlot::Unset; desc.single_relations.len()],
            multi: vec![Vec::new(); desc.multi_relations.len()],
            vectors: vec![Vec::new(); desc.vector_members.len()],
        }
    }
}

/// Collection-owned storage cell for one record.
pub(crate) struct RecordCell<R: RecordType> {
    /// Packed [`ObjectId`]; `UNTRACKED` until the one-way insertion.
    id: AtomicU64,
    /// Live handle count; meaningful only while untracked.
    refs: AtomicU32,
    pub(crate) state: Mutex<RecordState<R>>,
}

impl<R: RecordType> RecordCell<R> {
    /// Creates a free-floating cell.
    pub(crate) fn floating(payload: R::Payload) -> Arc<Self> {
        Arc::new(Self {
            id: AtomicU64::new(ObjectId::UNTRACKED.to_bits()),
            refs: AtomicU32::new(0),
            state: Mutex::new(RecordState::new(payload)),
        })
    }

    /// Creates a cell already owned by a collection.
    pub(crate) fn tracked(payload: R::Payload, id: ObjectId) -> Arc<Self> {
        Self::tracked_with_state(RecordState::new(payload), id)
    }

    /// Creates an owned cell with fully populated state (the read path).
    pub(crate) fn tracked_with_state(state: RecordState<R>, id: ObjectId) -> Arc<Self> {
        Arc::new(Self {
            id: AtomicU64::new(id.to_bits()),
            refs: AtomicU32::new(0),
            state: Mutex::new(state),
        })
    }

    pub(crate) fn object_id(&self) -> ObjectId {
        ObjectId::from_bits(self.id.load(Ordering::Acquire))
    }

    /// Restamps the identity; used when a collection's id is assigned.
    pub(crate) fn store_id(&self, id: ObjectId) {
        self.id.store(id.to_bits(), Ordering::Release);
    }

    /// The one-way UNTRACKED -> tracked transition.
    ///
    /// Fails with [`Error::AlreadyOwned`] if the record is already tracked,
    /// carrying the owning id.
    pub(crate) fn try_track(&self, id: ObjectId) -> Result<()> {
        self.id
            .compare_exchange(
                ObjectId::UNTRACKED.to_bits(),
                id.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|held| Error::already_owned(ObjectId::from_bits(held)))
    }

    /// Counts a new handle while untracked; no-op once tracked.
    pub(crate) fn acquire(&self) {
        if self.object_id().is_untracked() {
            self.refs.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Drops a handle's count and returns the result.
    ///
    /// The trackedness check happens strictly before any decrement: tracked
    /// records are never counted down, so the counter cannot wrap when the
    /// owning collection outlives the handles.
    pub(crate) fn release(&self) -> u32 {
        if !self.object_id().is_untracked() {
            return self.refs.load(Ordering::Acquire);
        }
        match self
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(previous) => previous - 1,
            Err(_) => 0,
        }
    }

    pub(crate) fn ref_count(&self) -> u32 {
        self.refs.load(Ordering::Acquire)
    }
}

/// Object-safe view of a record cell, independent of its record type.
pub(crate) trait ErasedRecord: Send + Sync {
    fn object_id(&self) -> ObjectId;
    fn acquire(&self);
    fn release(&self) -> u32;
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<R: RecordType> ErasedRecord for RecordCell<R> {
    fn object_id(&self) -> ObjectId {
        Self::object_id(self)
    }

    fn acquire(&self) {
        Self::acquire(self);
    }

    fn release(&self) -> u32 {
        Self::release(self)
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Type-erased live handle to a record.
///
/// Resolved relation slots hold these; relations may target any record type,
/// so the target's concrete type is recovered by [`AnyRecord::downcast`].
/// Follows the same ownership protocol as typed handles.
pub struct AnyRecord {
    cell: Arc<dyn ErasedRecord>,
}

impl AnyRecord {
    pub(crate) fn adopt(cell: Arc<dyn ErasedRecord>) -> Self {
        cell.acquire();
        Self { cell }
    }

    /// The referenced record's identity.
    #[must_use]
    pub fn object_id(&self) -> ObjectId {
        self.cell.object_id()
    }

    /// Recovers a typed read-only handle, or `None` for the wrong type.
    #[must_use]
    pub fn downcast<R: RecordType>(&self) -> Option<Record<R>> {
        let any = Arc::clone(&self.cell).as_any();
        any.downcast::<RecordCell<R>>().ok().map(Handle::adopt)
    }
}

impl Clone for AnyRecord {
    fn clone(&self) -> Self {
        Self::adopt(Arc::clone(&self.cell))
    }
}

impl Drop for AnyRecord {
    fn drop(&mut self) {
        self.cell.release();
    }
}

impl PartialEq for AnyRecord {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl fmt::Debug for AnyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnyRecord({:?})", self.object_id())
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Access capability of a handle: read-only or read-write.
pub trait AccessMode: sealed::Sealed + 'static {}

/// Marker for read-only handles.
pub enum ReadOnly {}

/// Marker for read-write handles.
pub enum ReadWrite {}

impl sealed::Sealed for ReadOnly {}
impl AccessMode for ReadOnly {}
impl sealed::Sealed for ReadWrite {}
impl AccessMode for ReadWrite {}

/// Read-only handle to a record.
pub type Record<R> = Handle<R, ReadOnly>;

/// Read-write handle to a record.
pub type RecordMut<R> = Handle<R, ReadWrite>;

/// A live reference to a record, gated by an access-mode marker.
///
/// Mutation methods exist only on [`RecordMut`]; a [`RecordMut`] downgrades
/// to a [`Record`] with [`Handle::freeze`], never the other way.
pub struct Handle<R: RecordType, A: AccessMode> {
    cell: Arc<RecordCell<R>>,
    _access: PhantomData<A>,
}

impl<R: RecordType, A: AccessMode> Handle<R, A> {
    pub(crate) fn adopt(cell: Arc<RecordCell<R>>) -> Self {
        cell.acquire();
        Self {
            cell,
            _access: PhantomData,
        }
    }

    pub(crate) fn cell(&self) -> &Arc<RecordCell<R>> {
        &self.cell
    }

    /// The record's identity.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.cell.object_id()
    }

    /// Returns true once the record is owned by a collection.
    #[must_use]
    pub fn is_tracked(&self) -> bool {
        self.id().is_tracked()
    }

    /// Number of live handles while free-floating; inert once tracked.
    #[must_use]
    pub fn ref_count(&self) -> u32 {
        self.cell.ref_count()
    }

    /// Copies the POD payload out.
    #[must_use]
    pub fn payload(&self) -> R::Payload {
        self.cell.state.lock().payload
    }

    /// Resolved target of a single relation, if set and resolved.
    #[must_use]
    pub fn relation(&self, name: &str) -> Option<AnyRecord> {
        let slot = R::descriptor().single_index(name)?;
        match &self.cell.state.lock().single[slot] {
            RelationSlot::Resolved(handle) => Some(handle.clone()),
            RelationSlot::Unset | RelationSlot::Stored(_) => None,
        }
    }

    /// The id a single relation would persist; `None` for an unknown member.
    ///
    /// An unset relation reads as [`ObjectId::INVALID`], an unresolved one
    /// as its stored id, so partial failures stay observable.
    #[must_use]
    pub fn relation_id(&self, name: &str) -> Option<ObjectId> {
        let slot = R::descriptor().single_index(name)?;
        Some(self.cell.state.lock().single[slot].persisted_id())
    }

    /// Returns true if the named single relation points at something.
    #[must_use]
    pub fn has_relation(&self, name: &str) -> bool {
        self.relation_id(name).is_some_and(|id| !id.is_invalid())
    }

    /// Resolved targets of a one-to-many relation, in insertion order.
    ///
    /// Unresolved elements are skipped; compare against
    /// [`Handle::relation_ids`] to detect them.
    #[must_use]
    pub fn relations(&self, name: &str) -> Vec<AnyRecord> {
        let Some(slot) = R::descriptor().multi_index(name) else {
            return Vec::new();
        };
        self.cell.state.lock().multi[slot]
            .iter()
            .filter_map(|s| match s {
                RelationSlot::Resolved(handle) => Some(handle.clone()),
                RelationSlot::Unset | RelationSlot::Stored(_) => None,
            })
            .collect()
    }

    /// Persisted ids of a one-to-many relation, in insertion order.
    #[must_use]
    pub fn relation_ids(&self, name: &str) -> Vec<ObjectId> {
        let Some(slot) = R::descriptor().multi_index(name) else {
            return Vec::new();
        };
        self.cell.state.lock().multi[slot]
            .iter()
            .map(RelationSlot::persisted_id)
            .collect()
    }

    /// Values of a vector member, in insertion order.
    #[must_use]
    pub fn vector_values(&self, name: &str) -> Vec<R::Scalar> {
        let Some(slot) = R::descriptor().vector_index(name) else {
            return Vec::new();
        };
        self.cell.state.lock().vectors[slot].clone()
    }

    /// Type-erases this handle.
    #[must_use]
    pub fn erase(&self) -> AnyRecord {
        AnyRecord::adopt(Arc::clone(&self.cell) as Arc<dyn ErasedRecord>)
    }
}

impl<R: RecordType> Handle<R, ReadWrite> {
    /// Creates a free-floating record with the default payload.
    #[must_use]
    pub fn new() -> Self {
        Self::with_payload(R::Payload::default())
    }

    /// Creates a free-floating record with the given payload.
    #[must_use]
    pub fn with_payload(payload: R::Payload) -> Self {
        Self::adopt(RecordCell::floating(payload))
    }

    /// Replaces the payload.
    pub fn set_payload(&self, payload: R::Payload) {
        self.cell.state.lock().payload = payload;
    }

    /// Mutates the payload in place.
    pub fn update(&self, f: impl FnOnce(&mut R::Payload)) {
        f(&mut self.cell.state.lock().payload);
    }

    /// Points the named single relation at a record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMember`] if the record type declares no such
    /// relation.
    pub fn set_relation<T: RecordType, B: AccessMode>(
        &self,
        name: &str,
        target: &Handle<T, B>,
    ) -> Result<()> {
        self.set_relation_any(name, target.erase())
    }

    /// Points the named single relation at a type-erased record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMember`] for an undeclared relation name.
    pub fn set_relation_any(&self, name: &str, target: AnyRecord) -> Result<()> {
        let slot = R::descriptor()
            .single_index(name)
            .ok_or_else(|| Error::unknown_member(name))?;
        self.cell.state.lock().single[slot] = RelationSlot::Resolved(target);
        Ok(())
    }

    /// Unsets the named single relation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMember`] for an undeclared relation name.
    pub fn clear_relation(&self, name: &str) -> Result<()> {
        let slot = R::descriptor()
            .single_index(name)
            .ok_or_else(|| Error::unknown_member(name))?;
        self.cell.state.lock().single[slot] = RelationSlot::Unset;
        Ok(())
    }

    /// Appends a record to the named one-to-many relation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMember`] for an undeclared relation name.
    pub fn add_relation<T: RecordType, B: AccessMode>(
        &self,
        name: &str,
        target: &Handle<T, B>,
    ) -> Result<()> {
        let slot = R::descriptor()
            .multi_index(name)
            .ok_or_else(|| Error::unknown_member(name))?;
        self.cell.state.lock().multi[slot].push(RelationSlot::Resolved(target.erase()));
        Ok(())
    }

    /// Appends a value to the named vector member.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMember`] for an undeclared member name.
    pub fn push_vector(&self, name: &str, value: R::Scalar) -> Result<()> {
        let slot = R::descriptor()
            .vector_index(name)
            .ok_or_else(|| Error::unknown_member(name))?;
        self.cell.state.lock().vectors[slot].push(value);
        Ok(())
    }

    /// Downgrades to a read-only handle.
    #[must_use]
    pub fn freeze(self) -> Record<R> {
        Handle::adopt(Arc::clone(&self.cell))
    }
}

impl<R: RecordType> Default for Handle<R, ReadWrite> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RecordType, A: AccessMode> Clone for Handle<R, A> {
    fn clone(&self) -> Self {
        Self::adopt(Arc::clone(&self.cell))
    }
}

impl<R: RecordType, A: AccessMode> Drop for Handle<R, A> {
    fn drop(&mut self) {
        self.cell.release();
    }
}

impl<R: RecordType, A: AccessMode> PartialEq for Handle<R, A> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<R: RecordType, A: AccessMode> fmt::Debug for Handle<R, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:?})", self.id())
    }
}
