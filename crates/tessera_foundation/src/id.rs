//! Record identities and buffer index ranges.

// Allow i32/u32 <-> u64 casts - the bit packing below is exact by construction
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a record: its slot index in the owning collection plus the
/// collection's registered id.
///
/// This is both the in-memory handle discriminator and the on-disk encoding
/// of every reference. Two sentinels exist: [`ObjectId::UNTRACKED`] marks a
/// record that has not been inserted into any collection, and
/// [`ObjectId::INVALID`] marks a relation slot that points at nothing.
/// Collection ids are allocated from 1 by the
/// [`CollectionIdTable`](crate::CollectionIdTable); 0 is reserved for "no id",
/// which is what both sentinels carry.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ObjectId {
    /// Slot index in the owning collection's entry list.
    pub index: i32,
    /// Registered id of the owning collection.
    pub collection_id: u32,
}

impl ObjectId {
    /// Sentinel for a record not yet inserted into any collection.
    pub const UNTRACKED: Self = Self {
        index: -1,
        collection_id: 0,
    };

    /// Sentinel for a relation slot that points at nothing.
    pub const INVALID: Self = Self {
        index: -2,
        collection_id: 0,
    };

    /// Creates an id naming a slot in a collection.
    #[must_use]
    pub const fn new(index: i32, collection_id: u32) -> Self {
        Self {
            index,
            collection_id,
        }
    }

    /// Returns true if this id names a slot in a collection.
    #[must_use]
    pub const fn is_tracked(self) -> bool {
        self.index >= 0
    }

    /// Returns true if this is the untracked sentinel.
    #[must_use]
    pub const fn is_untracked(self) -> bool {
        self.index == Self::UNTRACKED.index
    }

    /// Returns true if this is the invalid sentinel.
    #[must_use]
    pub const fn is_invalid(self) -> bool {
        self.index == Self::INVALID.index
    }

    /// Packs the id into a single `u64`, collection id in the high half.
    ///
    /// Used by record cells to hold their identity in one atomic word.
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        ((self.collection_id as u64) << 32) | (self.index as u32 as u64)
    }

    /// Reverses [`Self::to_bits`].
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32 as i32,
            collection_id: (bits >> 32) as u32,
        }
    }
}

impl PartialOrd for ObjectId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjectId {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.collection_id, self.index).cmp(&(other.collection_id, other.index))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_untracked() {
            write!(f, "ObjectId(untracked)")
        } else if self.is_invalid() {
            write!(f, "ObjectId(invalid)")
        } else {
            write!(f, "ObjectId({}@{})", self.index, self.collection_id)
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_tracked() {
            write!(f, "{}@{}", self.index, self.collection_id)
        } else if self.is_invalid() {
            write!(f, "invalid")
        } else {
            write!(f, "untracked")
        }
    }
}

/// Half-open `[begin, end)` range into a shared buffer column.
///
/// One-to-many relation columns and vector-member columns store one range per
/// record, pointing into the column shared by every record of the collection.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
pub struct IdRange {
    /// First covered index.
    pub begin: u32,
    /// One past the last covered index.
    pub end: u32,
}

impl IdRange {
    /// Creates a range; `end` must not precede `begin`.
    #[must_use]
    pub const fn new(begin: u32, end: u32) -> Self {
        Self { begin, end }
    }

    /// Number of covered indices.
    #[must_use]
    pub const fn len(self) -> usize {
        self.end.saturating_sub(self.begin) as usize
    }

    /// Returns true if the range covers nothing.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.end <= self.begin
    }

    /// The range as `usize` bounds, for slicing a buffer column.
    #[must_use]
    pub const fn as_range(self) -> std::ops::Range<usize> {
        self.begin as usize..self.end as usize
    }
}

impl fmt::Debug for IdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdRange({}..{})", self.begin, self.end)
    }
}
