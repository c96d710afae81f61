//! Base primitives for the indexed Merkle tree: the BN254 scalar field and
//! the pluggable arity-2/arity-4 field hashers.

/// Scalar field helpers and serde adapters.
pub mod field;
/// Field-hashing capability trait and the Poseidon reference hasher.
pub mod hash;

pub use field::{
    FieldError, FieldHex, Fr, field_from_be_bytes, field_from_be_bytes_reduced,
    field_from_decimal, field_to_be_bytes,
};
pub use hash::{FieldHasher, HashError, PoseidonHasher, poseidon_zero_leaf};
