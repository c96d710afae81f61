//! Tree error taxonomy.

use std::num::TryFromIntError;

use imt_core::hash::HashError;
use thiserror::Error;

/// Errors raised by tree construction and mutation.
///
/// Every mutator is atomic: on error the tree is left exactly as it was.
/// Proof verification never raises; verifiers report malformed proofs by
/// returning `false`.
#[derive(Error, Debug)]
pub enum TreeError {
    /// The requested depth is outside the supported range.
    #[error("tree depth {0} is outside the supported range 1..=254")]
    BadDepth(u8),

    /// Zero keys are reserved for the sentinel record.
    #[error("key is zero; zero is reserved for the sentinel record")]
    InvalidKey,

    /// The key is already present in the tree (or repeated within a batch).
    #[error("key is already present")]
    DuplicateKey,

    /// The tree holds `2^depth` records and cannot grow further.
    #[error("tree is at capacity (2^{0} leaves)")]
    Full(u8),

    /// No record holds the requested key.
    #[error("key is not present")]
    NotFound,

    /// The key is present, so exclusion cannot be proven.
    #[error("key is present; exclusion is unprovable")]
    KeyExists,

    /// An empty batch has no transition to prove.
    #[error("insertion batch is empty")]
    EmptyBatch,

    /// A supplied predecessor index does not name a record.
    #[error("predecessor index {index} is out of bounds for {leaf_count} records")]
    PrevOutOfBounds {
        /// The offending index.
        index: u32,
        /// Number of records at the time of the call.
        leaf_count: u64,
    },

    /// The supplied predecessor's key is not strictly below the inserted key.
    #[error("predecessor key is not strictly below the inserted key")]
    PrevKeyNotBelow,

    /// The supplied predecessor already has a successor at or below the
    /// inserted key, so it is not the low record for that key.
    #[error("predecessor's successor does not bound the inserted key from above")]
    PrevSuccessorNotAbove,

    /// Predecessor hints naming pre-existing records must be supplied in
    /// non-decreasing order.
    #[error("predecessor hints for existing records are not in non-decreasing order")]
    UnsortedPrevHints,

    /// A batch must supply exactly one predecessor hint per item.
    #[error("expected {expected} predecessor hints, got {got}")]
    PrevHintCountMismatch {
        /// Number of items in the batch.
        expected: usize,
        /// Number of hints supplied.
        got: usize,
    },

    /// A record index does not fit the 32-bit index space of the proofs.
    #[error("record index does not fit into u32")]
    IndexOverflow(#[from] TryFromIntError),

    /// The injected hasher failed.
    #[error(transparent)]
    Hash(#[from] HashError),

    /// Internal consistency failure.
    #[error("unexpected error: {0}")]
    Unexpected(&'static str),
}
