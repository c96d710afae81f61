//! Linked-list record type.

use ark_ff::Zero as _;
use imt_core::field::{FieldHex, Fr};
use imt_core::hash::{FieldHasher, HashError};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

/// One record in the tree's sorted linked list.
///
/// Records live in an append-only array; `next_idx`/`next_key` thread them
/// into a list of strictly increasing keys anchored by the sentinel at
/// index 0. An index of `0` means "no successor", so the record holding the
/// largest key is terminal.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Record key; strictly positive for user records, zero only for the
    /// sentinel.
    #[serde_as(as = "FieldHex")]
    pub key: Fr,
    /// Payload committed alongside the key.
    #[serde_as(as = "FieldHex")]
    pub value: Fr,
    /// Array index of the record holding the next-larger key; `0` when
    /// terminal.
    pub next_idx: u32,
    /// Key stored at `next_idx`; `0` when terminal.
    #[serde_as(as = "FieldHex")]
    pub next_key: Fr,
}

impl Node {
    /// The all-zero record installed at index 0, anchoring the list.
    #[must_use]
    pub fn sentinel() -> Self {
        Self {
            key: Fr::zero(),
            value: Fr::zero(),
            next_idx: 0,
            next_key: Fr::zero(),
        }
    }

    /// Whether this record has no successor.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.next_idx == 0 && self.next_key.is_zero()
    }

    /// Leaf digest of this record: `hash4(key, next_idx, next_key, value)`.
    ///
    /// The index is widened losslessly into the field before hashing.
    ///
    /// # Errors
    /// Propagates the underlying hash failure.
    pub fn leaf_hash<H: FieldHasher>(&self, hasher: &H) -> Result<Fr, HashError> {
        hasher.hash4([
            self.key,
            Fr::from(u64::from(self.next_idx)),
            self.next_key,
            self.value,
        ])
    }
}
