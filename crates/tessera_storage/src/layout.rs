//! Record type descriptions and the persistable buffer layout.
//!
//! A record type is described once, statically: its POD payload, the scalar
//! type of its vector members, and the names of its relation and vector
//! members. Collections use the description to shape their buffers; backends
//! use it to name what they persist.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use tessera_foundation::{IdRange, ObjectId};

/// Fixed-size plain data suitable for a buffer column.
///
/// Blanket-implemented for every type meeting the bounds; record payloads
/// and vector-member scalars must satisfy it.
pub trait Payload:
    Copy + Default + PartialEq + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

impl<T> Payload for T where
    T: Copy + Default + PartialEq + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

/// A user-defined record type.
///
/// This is the seam a schema-driven code generator targets; hand-written
/// implementations are a payload struct, an uninhabited marker type, and a
/// static [`RecordDescriptor`].
pub trait RecordType: 'static {
    /// Fixed-size payload persisted one-per-record in the data column.
    type Payload: Payload;
    /// Element type shared by this record type's vector members.
    type Scalar: Payload;

    /// Static description of the type's members.
    fn descriptor() -> &'static RecordDescriptor;
}

/// Names of a record type's members, in declaration order.
///
/// Member positions define buffer column order, so the descriptor is part of
/// the persisted contract for its type.
#[derive(Debug)]
pub struct RecordDescriptor {
    /// Unique name of the record type, used by backends to pick a decoder.
    pub type_name: &'static str,
    /// Single/optional relation member names.
    pub single_relations: &'static [&'static str],
    /// One-to-many relation member names.
    pub multi_relations: &'static [&'static str],
    /// Variable-length scalar member names.
    pub vector_members: &'static [&'static str],
}

impl RecordDescriptor {
    /// Position of a single relation member, by name.
    #[must_use]
    pub fn single_index(&self, name: &str) -> Option<usize> {
        self.single_relations.iter().position(|n| *n == name)
    }

    /// Position of a one-to-many relation member, by name.
    #[must_use]
    pub fn multi_index(&self, name: &str) -> Option<usize> {
        self.multi_relations.iter().position(|n| *n == name)
    }

    /// Position of a vector member, by name.
    #[must_use]
    pub fn vector_index(&self, name: &str) -> Option<usize> {
        self.vector_members.iter().position(|n| *n == name)
    }
}

/// Structure-of-arrays persistence image of one collection.
///
/// This is the logical layout every backend must honor:
/// - one fixed-stride POD column (`data`),
/// - per single relation member, an [`ObjectId`] column aligned 1:1 with
///   `data` ([`ObjectId::INVALID`] = unset),
/// - per one-to-many member, a shared overflow column of target ids plus one
///   [`IdRange`] per record,
/// - per vector member, a shared value column plus one [`IdRange`] per
///   record.
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct CollectionBuffers<R: RecordType> {
    /// POD payloads, one per record.
    pub data: Vec<R::Payload>,
    /// Per single-relation member: target ids aligned 1:1 with `data`.
    pub single_refs: Vec<Vec<ObjectId>>,
    /// Per one-to-many member: shared overflow column of target ids.
    pub multi_refs: Vec<Vec<ObjectId>>,
    /// Per one-to-many member: per-record ranges into the overflow column.
    pub multi_ranges: Vec<Vec<IdRange>>,
    /// Per vector member: shared column of values.
    pub vector_data: Vec<Vec<R::Scalar>>,
    /// Per vector member: per-record ranges into the value column.
    pub vector_ranges: Vec<Vec<IdRange>>,
}

impl<R: RecordType> CollectionBuffers<R> {
    /// Creates empty buffers shaped for the record type's descriptor.
    #[must_use]
    pub fn empty() -> Self {
        let desc = R::descriptor();
        Self {
            data: Vec::new(),
            single_refs: vec![Vec::new(); desc.single_relations.len()],
            multi_refs: vec![Vec::new(); desc.multi_relations.len()],
            multi_ranges: vec![Vec::new(); desc.multi_relations.len()],
            vector_data: vec![Vec::new(); desc.vector_members.len()],
            vector_ranges: vec![Vec::new(); desc.vector_members.len()],
        }
    }

    /// Drops all contents, keeping the member shape.
    pub fn clear(&mut self) {
        self.data.clear();
        for column in &mut self.single_refs {
            column.clear();
        }
        for column in &mut self.multi_refs {
            column.clear();
        }
        for column in &mut self.multi_ranges {
            column.clear();
        }
        for column in &mut self.vector_data {
            column.clear();
        }
        for column in &mut self.vector_ranges {
            column.clear();
        }
    }

    /// Number of records in the image.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the image holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<R: RecordType> Default for CollectionBuffers<R> {
    fn default() -> Self {
        Self::empty()
    }
}

// Manual impls: deriving would demand the bounds of the marker type `R`
// itself rather than of its payload and scalar types.
impl<R: RecordType> Clone for CollectionBuffers<R> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            single_refs: self.single_refs.clone(),
            multi_refs: self.multi_refs.clone(),
            multi_ranges: self.multi_ranges.clone(),
            vector_data: self.vector_data.clone(),
            vector_ranges: self.vector_ranges.clone(),
        }
    }
}

impl<R: RecordType> PartialEq for CollectionBuffers<R> {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
            && self.single_refs == other.single_refs
            && self.multi_refs == other.multi_refs
            && self.multi_ranges == other.multi_ranges
            && self.vector_data == other.vector_data
            && self.vector_ranges == other.vector_ranges
    }
}

impl<R: RecordType> fmt::Debug for CollectionBuffers<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionBuffers")
            .field("data", &self.data)
            .field("single_refs", &self.single_refs)
            .field("multi_refs", &self.multi_refs)
            .field("multi_ranges", &self.multi_ranges)
            .field("vector_data", &self.vector_data)
            .field("vector_ranges", &self.vector_ranges)
            .finish()
    }
}
