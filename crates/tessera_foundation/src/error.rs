//! Error types for the Tessera runtime.
//!
//! Uses `thiserror` for ergonomic error definition. Logic errors
//! ([`Error::AlreadyOwned`], [`Error::OutOfRange`]) propagate as `Err`
//! immediately; expected existence misses are reported as `Option`/`bool`
//! values by the APIs that produce them and only escalate to these kinds
//! when a caller decides absence is fatal.

use thiserror::Error;

use crate::id::ObjectId;

/// Convenience alias for results carrying a Tessera [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for Tessera operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A record was inserted into a collection while already owned by one.
    #[error("record already owned: {0:?}")]
    AlreadyOwned(ObjectId),

    /// A named collection is not registered and not readable.
    #[error("collection not found: {0}")]
    NotFound(String),

    /// Bounds-checked indexed access failed.
    #[error("index out of bounds: {index} (length {len})")]
    OutOfRange {
        /// The index that was accessed.
        index: usize,
        /// The actual number of entries.
        len: usize,
    },

    /// A stored reference could not be resolved to a live record.
    #[error("unresolvable reference: {0:?}")]
    UnresolvableReference(ObjectId),

    /// Input from a backend is structurally unusable.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Buffer encoding failed in a backend.
    #[error("encode error: {0}")]
    Encode(String),

    /// Buffer decoding failed in a backend.
    #[error("decode error: {0}")]
    Decode(String),

    /// A record type declares no member with the given name.
    #[error("unknown member: {0}")]
    UnknownMember(String),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates an already-owned error for a record id.
    #[must_use]
    pub fn already_owned(id: ObjectId) -> Self {
        Self::AlreadyOwned(id)
    }

    /// Creates a not-found error for a collection name.
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Creates an out-of-range error.
    #[must_use]
    pub fn out_of_range(index: usize, len: usize) -> Self {
        Self::OutOfRange { index, len }
    }

    /// Creates an unresolvable-reference error.
    #[must_use]
    pub fn unresolvable(id: ObjectId) -> Self {
        Self::UnresolvableReference(id)
    }

    /// Creates a malformed-input error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput(message.into())
    }

    /// Creates an encode error from any displayable source.
    #[must_use]
    pub fn encode(source: impl std::fmt::Display) -> Self {
        Self::Encode(source.to_string())
    }

    /// Creates a decode error from any displayable source.
    #[must_use]
    pub fn decode(source: impl std::fmt::Display) -> Self {
        Self::Decode(source.to_string())
    }

    /// Creates an unknown-member error.
    #[must_use]
    pub fn unknown_member(name: impl Into<String>) -> Self {
        Self::UnknownMember(name.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
