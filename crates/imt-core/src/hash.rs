//! Pluggable field hashing.
//!
//! The tree consumes hashing through a two-method capability: an arity-2
//! compression for interior Merkle nodes and an arity-4 hash for leaf
//! records. The reference implementation is Poseidon over BN254 with circom
//! parameters, which pins the canonical empty-slot digest used for padding.

use std::sync::LazyLock;

use ark_ff::Zero as _;
use light_poseidon::{Poseidon, PoseidonError, PoseidonHasher as _};
use thiserror::Error;

use crate::field::Fr;

/// Errors surfaced by a [`FieldHasher`] implementation.
#[derive(Error, Debug)]
pub enum HashError {
    /// The Poseidon permutation rejected its input.
    #[error("poseidon hash failed: {0}")]
    Poseidon(#[from] PoseidonError),
}

/// Capability object providing the two fixed-arity hashes the tree needs.
///
/// Implementations must be deterministic and collision-resistant over field
/// elements; the tree imposes no other requirements.
pub trait FieldHasher {
    /// 2-to-1 compression used for interior Merkle nodes.
    ///
    /// # Errors
    /// Propagates the underlying hash failure.
    fn hash2(&self, inputs: [Fr; 2]) -> Result<Fr, HashError>;

    /// 4-to-1 hash used for leaf records.
    ///
    /// # Errors
    /// Propagates the underlying hash failure.
    fn hash4(&self, inputs: [Fr; 4]) -> Result<Fr, HashError>;
}

/// Poseidon over BN254 with circom-compatible parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseidonHasher;

impl FieldHasher for PoseidonHasher {
    fn hash2(&self, inputs: [Fr; 2]) -> Result<Fr, HashError> {
        let mut poseidon = Poseidon::<Fr>::new_circom(2)?;
        Ok(poseidon.hash(&inputs)?)
    }

    fn hash4(&self, inputs: [Fr; 4]) -> Result<Fr, HashError> {
        let mut poseidon = Poseidon::<Fr>::new_circom(4)?;
        Ok(poseidon.hash(&inputs)?)
    }
}

/// The canonical empty-slot digest for the Poseidon instantiation:
/// the arity-4 hash of four zero scalars.
static POSEIDON_ZERO_LEAF: LazyLock<Fr> = LazyLock::new(|| {
    PoseidonHasher
        .hash4([Fr::zero(); 4])
        .expect("circom parameters exist for arity 4")
});

/// Returns the empty-slot digest `hash4(0, 0, 0, 0)` of [`PoseidonHasher`].
#[must_use]
pub fn poseidon_zero_leaf() -> Fr {
    *POSEIDON_ZERO_LEAF
}
