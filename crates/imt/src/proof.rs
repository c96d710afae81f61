//! Proof records and their verifiers.
//!
//! Verification is a decision procedure: every verifier is side-effect-free
//! and returns `bool`, mapping malformed input and hash failures to `false`
//! rather than raising.

use std::collections::BTreeMap;

use ark_ff::Zero as _;
use imt_core::field::{FieldHex, Fr};
use imt_core::hash::FieldHasher;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::merkle::{empty_roots, fold_path};
use crate::node::Node;

/// A Merkle opening of one record under a stated root.
///
/// Doubles as an exclusion proof: opening the predecessor record whose
/// `(key, next_key)` range strictly contains an absent key attests that the
/// key is not in the tree.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipProof {
    /// Position of the record in the leaf array.
    pub leaf_idx: u32,
    /// The full record at that position.
    pub leaf: Node,
    /// Root the opening is stated against.
    #[serde_as(as = "FieldHex")]
    pub root: Fr,
    /// Sibling digests, leaf level first.
    #[serde_as(as = "Vec<FieldHex>")]
    pub siblings: Vec<Fr>,
}

impl MembershipProof {
    /// Check the opening against its carried root.
    #[must_use]
    pub fn verify<H: FieldHasher>(&self, hasher: &H) -> bool {
        let Ok(leaf_hash) = self.leaf.leaf_hash(hasher) else {
            return false;
        };
        matches!(
            fold_path(hasher, leaf_hash, self.leaf_idx, &self.siblings),
            Ok(root) if root == self.root
        )
    }
}

/// Transition proof for a single insertion.
///
/// Pins the predecessor before the insertion, the inserted record after it,
/// and the predecessor's post-insertion path, which together fix the tree
/// shape of the transition without reconstructing the tree.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertionProof {
    /// Predecessor record as it stood before the insertion, opened under
    /// the pre-insertion root.
    pub prev_before: MembershipProof,
    /// The inserted record, opened under the post-insertion root.
    pub inserted: MembershipProof,
    /// The predecessor's sibling path under the post-insertion root.
    #[serde_as(as = "Vec<FieldHex>")]
    pub prev_siblings_after: Vec<Fr>,
}

impl InsertionProof {
    /// Root of the tree before the insertion.
    #[must_use]
    pub fn root_before(&self) -> Fr {
        self.prev_before.root
    }

    /// Root of the tree after the insertion.
    #[must_use]
    pub fn root_after(&self) -> Fr {
        self.inserted.root
    }

    /// Check the transition.
    ///
    /// Beyond the two openings this enforces that the inserted record
    /// inherited the predecessor's old successor, that the re-linked
    /// predecessor opens to the post-insertion root, and that the first
    /// divergence of the predecessor's path is exactly the inserted
    /// record's subtree.
    #[must_use]
    pub fn verify<H: FieldHasher>(&self, hasher: &H) -> bool {
        let prev = &self.prev_before;
        let new = &self.inserted;

        // The inserted record takes over the predecessor's old successor.
        if new.leaf.next_idx != prev.leaf.next_idx || new.leaf.next_key != prev.leaf.next_key {
            return false;
        }
        if !prev.verify(hasher) || !new.verify(hasher) {
            return false;
        }

        // The re-linked predecessor must open to the post-insertion root.
        let prev_after = Node {
            key: prev.leaf.key,
            value: prev.leaf.value,
            next_idx: new.leaf_idx,
            next_key: new.leaf.key,
        };
        let Ok(prev_after_hash) = prev_after.leaf_hash(hasher) else {
            return false;
        };
        let folded = fold_path(
            hasher,
            prev_after_hash,
            prev.leaf_idx,
            &self.prev_siblings_after,
        );
        if !matches!(folded, Ok(root) if root == new.root) {
            return false;
        }

        // Sibling counts agree after the insertion; the pre-insertion count
        // may be one short when the insertion crossed a power-of-two
        // boundary and grew the tree.
        let after_len = new.siblings.len();
        if self.prev_siblings_after.len() != after_len {
            return false;
        }
        let before_len = prev.siblings.len();
        if before_len != after_len && before_len.checked_add(1) != Some(after_len) {
            return false;
        }

        // The predecessor's path first diverges at the level where the
        // inserted record's subtree joined it; everything below is shared.
        let divergence = prev
            .siblings
            .iter()
            .zip(&self.prev_siblings_after)
            .position(|(before, after)| before != after)
            .unwrap_or(before_len);
        let Some(expected_subtree) = self.prev_siblings_after.get(divergence) else {
            return false;
        };
        let Some(prefix) = new.siblings.get(..divergence) else {
            return false;
        };
        let Ok(new_leaf_hash) = new.leaf.leaf_hash(hasher) else {
            return false;
        };
        matches!(
            fold_path(hasher, new_leaf_hash, new.leaf_idx, prefix),
            Ok(subtree) if subtree == *expected_subtree
        )
    }
}

/// Transition proof for an atomic batch insertion.
///
/// `prev_updates[i]` and `inserted[i]` are openings taken immediately after
/// the `i`-th insertion, under that step's root; `prev_originals` open every
/// distinct pre-existing predecessor under the pre-batch root. The
/// empty-subtree opening binds the insertion frontier to `root_before`.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchInsertionProof {
    /// Root of the tree before the batch.
    #[serde_as(as = "FieldHex")]
    pub root_before: Fr,
    /// Root of the tree after the batch.
    #[serde_as(as = "FieldHex")]
    pub root_after: Fr,
    /// Record count at batch start; new records occupy consecutive indices
    /// from here.
    pub insertion_idx: u32,
    /// Root of the maximal aligned empty subtree at the insertion frontier
    /// of the pre-batch tree.
    #[serde_as(as = "FieldHex")]
    pub empty_subtree_root: Fr,
    /// Path from that subtree to `root_before`; empty when the pre-batch
    /// tree was an exactly-full power of two and the frontier lies outside
    /// it.
    #[serde_as(as = "Vec<FieldHex>")]
    pub empty_subtree_siblings: Vec<Fr>,
    /// Pre-batch openings of every distinct predecessor that already
    /// existed before the batch.
    pub prev_originals: Vec<MembershipProof>,
    /// Opening of each step's predecessor immediately after that step.
    pub prev_updates: Vec<MembershipProof>,
    /// Opening of each inserted record immediately after its step.
    pub inserted: Vec<MembershipProof>,
}

impl BatchInsertionProof {
    /// Check the batch transition.
    #[must_use]
    pub fn verify<H: FieldHasher>(&self, hasher: &H) -> bool {
        if self.inserted.len() != self.prev_updates.len() || self.inserted.is_empty() {
            return false;
        }

        // Pre-existing predecessors open under the pre-batch root, strictly
        // below the insertion frontier, one opening per index. The first
        // step's predecessor always pre-exists, so an empty set is invalid.
        let mut originals: BTreeMap<u32, &Node> = BTreeMap::new();
        for original in &self.prev_originals {
            if original.root != self.root_before
                || original.leaf_idx >= self.insertion_idx
                || !original.verify(hasher)
            {
                return false;
            }
            if originals.insert(original.leaf_idx, &original.leaf).is_some() {
                return false;
            }
        }
        if originals.is_empty() {
            return false;
        }

        for (step, (new, prev)) in self.inserted.iter().zip(&self.prev_updates).enumerate() {
            if !new.verify(hasher) || !prev.verify(hasher) {
                return false;
            }
            // Both openings snapshot the same intermediate tree.
            if new.root != prev.root {
                return false;
            }
            // New records fill consecutive slots from the frontier.
            let expected_idx = u32::try_from(step)
                .ok()
                .and_then(|offset| self.insertion_idx.checked_add(offset));
            if expected_idx != Some(new.leaf_idx) {
                return false;
            }
            // The predecessor points at the record it admitted.
            if new.leaf.key != prev.leaf.next_key || new.leaf_idx != prev.leaf.next_idx {
                return false;
            }
            // Predecessors that pre-existed must match their pre-batch
            // opening, with the successor strictly tightened (or previously
            // terminal).
            if prev.leaf_idx < self.insertion_idx {
                let Some(original) = originals.get(&prev.leaf_idx) else {
                    return false;
                };
                if original.key != prev.leaf.key || original.value != prev.leaf.value {
                    return false;
                }
                if !original.next_key.is_zero() && prev.leaf.next_key >= original.next_key {
                    return false;
                }
            }
        }

        // The last step lands on the declared post-batch root.
        if !self
            .inserted
            .last()
            .is_some_and(|proof| proof.root == self.root_after)
        {
            return false;
        }

        self.verify_insertion_frontier(hasher)
    }

    /// Check that the slots the batch filled were empty under `root_before`.
    ///
    /// The opening names an aligned subtree of empty slots starting at the
    /// frontier. The degenerate no-sibling form asserts the pre-batch tree
    /// was an exactly-full power of two, in which case the frontier lies
    /// outside it and emptiness is structural.
    fn verify_insertion_frontier<H: FieldHasher>(&self, hasher: &H) -> bool {
        // Pre-batch tree height, read off any pre-batch opening.
        let Some(first_original) = self.prev_originals.first() else {
            return false;
        };
        let height_before = first_original.siblings.len();
        let Some(level) = height_before.checked_sub(self.empty_subtree_siblings.len()) else {
            return false;
        };

        // The claimed subtree root must be the canonical all-empty digest
        // at its level.
        let Ok(zero_leaf) = hasher.hash4([Fr::zero(); 4]) else {
            return false;
        };
        let Ok(expected_roots) = empty_roots(hasher, zero_leaf, level) else {
            return false;
        };
        if expected_roots.last() != Some(&self.empty_subtree_root) {
            return false;
        }

        let Some(span) = 1_u64.checked_shl(u32::try_from(level).unwrap_or(u32::MAX)) else {
            return false;
        };
        if self.empty_subtree_siblings.is_empty() {
            // Exactly-full pre-batch tree: the frontier is its total width.
            return u64::from(self.insertion_idx) == span;
        }

        // The frontier must be aligned to the claimed subtree, which must
        // fold up to the pre-batch root.
        if !u64::from(self.insertion_idx).is_multiple_of(span) {
            return false;
        }
        let Ok(subtree_idx) = u32::try_from(u64::from(self.insertion_idx) >> level) else {
            return false;
        };
        matches!(
            fold_path(
                hasher,
                self.empty_subtree_root,
                subtree_idx,
                &self.empty_subtree_siblings,
            ),
            Ok(root) if root == self.root_before
        )
    }
}
