//! Indexed Merkle tree.
//!
//! An append-only, sparse Merkle commitment to a set of `(key, value)`
//! records whose leaves additionally form a singly-linked list sorted by
//! key. The list layer makes the predecessor of any key provable, which
//! yields succinct membership, exclusion (non-membership), and
//! insertion-transition proofs of the kind consumed by zero-knowledge
//! circuits.
//!
//! The hash function is injected as a [`FieldHasher`] capability; Poseidon
//! over BN254 is the reference instantiation.
//!
//! [`FieldHasher`]: imt_core::FieldHasher

mod error;
mod merkle;
mod node;
mod proof;
mod tree;

pub use error::TreeError;
pub use node::Node;
pub use proof::{BatchInsertionProof, InsertionProof, MembershipProof};
pub use tree::{IndexedMerkleTree, MAX_DEPTH, MIN_DEPTH};
