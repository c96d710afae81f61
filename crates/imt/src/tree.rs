//! The indexed Merkle tree.
//!
//! Records live in an append-only array threaded into a key-sorted linked
//! list by the sentinel at index 0. Every mutation re-links the list,
//! refreshes the touched leaf digests, and recomputes the cached root over
//! the population-padded leaf layer.

use std::collections::{BTreeMap, BTreeSet};

use ark_ff::{One as _, Zero as _};
use imt_core::field::Fr;
use imt_core::hash::{FieldHasher, PoseidonHasher};

use crate::error::TreeError;
use crate::merkle::{build_levels, empty_roots, padded_width, root_of, sibling_path};
use crate::node::Node;
use crate::proof::{BatchInsertionProof, InsertionProof, MembershipProof};

/// Smallest supported tree depth.
pub const MIN_DEPTH: u8 = 1;
/// Largest supported tree depth (indices must stay below the field modulus).
pub const MAX_DEPTH: u8 = 254;

/// An append-only indexed Merkle tree over a prime field.
///
/// Generic over the injected [`FieldHasher`]; Poseidon over BN254 is the
/// default. The tree is single-threaded and exposes no interior mutability;
/// wrap it in an exclusive lock if shared.
#[derive(Debug, Clone)]
pub struct IndexedMerkleTree<H = PoseidonHasher> {
    depth: u8,
    hasher: H,
    zero_leaf: Fr,
    nodes: Vec<Node>,
    leaves: Vec<Fr>,
    root: Fr,
}

impl IndexedMerkleTree<PoseidonHasher> {
    /// Create an empty tree of the given depth with the Poseidon hasher.
    ///
    /// # Errors
    /// Returns [`TreeError::BadDepth`] if `depth` is outside
    /// `MIN_DEPTH..=MAX_DEPTH`.
    pub fn new(depth: u8) -> Result<Self, TreeError> {
        Self::with_hasher(depth, PoseidonHasher)
    }
}

impl<H: FieldHasher + Clone> IndexedMerkleTree<H> {
    /// Create an empty tree of the given depth with an injected hasher.
    ///
    /// The fresh tree holds only the sentinel record, so its root is the
    /// hasher's empty-slot digest `hash4(0, 0, 0, 0)`.
    ///
    /// # Errors
    /// Returns [`TreeError::BadDepth`] if `depth` is outside
    /// `MIN_DEPTH..=MAX_DEPTH`, or propagates a hash failure.
    pub fn with_hasher(depth: u8, hasher: H) -> Result<Self, TreeError> {
        if !(MIN_DEPTH..=MAX_DEPTH).contains(&depth) {
            return Err(TreeError::BadDepth(depth));
        }
        let zero_leaf = hasher.hash4([Fr::zero(); 4])?;
        Ok(Self {
            depth,
            hasher,
            zero_leaf,
            nodes: vec![Node::sentinel()],
            leaves: vec![zero_leaf],
            root: zero_leaf,
        })
    }

    /// The cached Merkle root.
    #[must_use]
    pub fn root(&self) -> Fr {
        self.root
    }

    /// The fixed depth the tree was created with.
    #[must_use]
    pub const fn depth(&self) -> u8 {
        self.depth
    }

    /// Number of records, sentinel included.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.nodes.len()
    }

    /// The empty-slot digest used for padding.
    #[must_use]
    pub fn zero_leaf(&self) -> Fr {
        self.zero_leaf
    }

    /// The record array, sentinel first.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The leaf digests, kept in lockstep with the records.
    #[must_use]
    pub fn leaves(&self) -> &[Fr] {
        &self.leaves
    }

    /// Whether a user record holds this key.
    #[must_use]
    pub fn contains(&self, key: Fr) -> bool {
        !key.is_zero() && self.position_of(key).is_some()
    }

    /// Insert a record, locating the predecessor by scan.
    ///
    /// # Errors
    /// [`TreeError::InvalidKey`] for a zero key, [`TreeError::DuplicateKey`]
    /// if the key is present, [`TreeError::Full`] at capacity. On error the
    /// tree is unchanged.
    pub fn insert(&mut self, key: Fr, value: Fr) -> Result<InsertionProof, TreeError> {
        self.ensure_insertable(key)?;
        let (prev_idx, _) = self.predecessor(key);
        self.insert_after(prev_idx, key, value)
    }

    /// Insert a record below a caller-supplied predecessor.
    ///
    /// The predecessor is checked, not trusted: it must exist, its key must
    /// lie strictly below `key`, and its successor must bound `key` from
    /// above (or be terminal).
    ///
    /// # Errors
    /// As [`Self::insert`], plus [`TreeError::PrevOutOfBounds`],
    /// [`TreeError::PrevKeyNotBelow`], and
    /// [`TreeError::PrevSuccessorNotAbove`].
    pub fn insert_at(
        &mut self,
        prev_idx: u32,
        key: Fr,
        value: Fr,
    ) -> Result<InsertionProof, TreeError> {
        self.ensure_insertable(key)?;
        self.check_predecessor(prev_idx, key)?;
        self.insert_after(prev_idx, key, value)
    }

    /// Insert a batch of records atomically.
    ///
    /// Predecessors are searched against the in-progress state, so items may
    /// arrive in any order and may chain onto records appended earlier in
    /// the same batch. Either every item lands or the tree is unchanged.
    ///
    /// # Errors
    /// [`TreeError::EmptyBatch`] for an empty slice; otherwise as
    /// [`Self::insert`], with duplicates checked across the batch as well.
    pub fn insert_batch(&mut self, items: &[(Fr, Fr)]) -> Result<BatchInsertionProof, TreeError> {
        self.insert_batch_with_progress(items, |_, _| {})
    }

    /// [`Self::insert_batch`] with a progress callback.
    ///
    /// The callback receives `(done, total)` after each landed item; useful
    /// when replaying large snapshots.
    ///
    /// # Errors
    /// As [`Self::insert_batch`].
    pub fn insert_batch_with_progress(
        &mut self,
        items: &[(Fr, Fr)],
        progress: impl FnMut(usize, usize),
    ) -> Result<BatchInsertionProof, TreeError> {
        self.batch_inner(items, None, progress)
    }

    /// Insert a batch using caller-supplied predecessor hints.
    ///
    /// Hints are checked witnesses, not trusted shortcuts: each is validated
    /// against the in-progress state, and hints naming records that existed
    /// before the batch must arrive in non-decreasing order. A hint at or
    /// above the batch's starting record count names a record appended
    /// earlier in the same batch.
    ///
    /// # Errors
    /// As [`Self::insert_batch`], plus [`TreeError::PrevHintCountMismatch`],
    /// [`TreeError::UnsortedPrevHints`], and the predecessor-check kinds of
    /// [`Self::insert_at`].
    pub fn insert_batch_with_hints(
        &mut self,
        items: &[(Fr, Fr)],
        prev_hints: &[u32],
    ) -> Result<BatchInsertionProof, TreeError> {
        if items.len() != prev_hints.len() {
            return Err(TreeError::PrevHintCountMismatch {
                expected: items.len(),
                got: prev_hints.len(),
            });
        }
        self.batch_inner(items, Some(prev_hints), |_, _| {})
    }

    /// Open the record holding `key`.
    ///
    /// # Errors
    /// [`TreeError::NotFound`] if no record holds the key.
    pub fn prove(&self, key: Fr) -> Result<MembershipProof, TreeError> {
        let idx = self.position_of(key).ok_or(TreeError::NotFound)?;
        self.open(idx)
    }

    /// Prove that `key` is absent by opening its predecessor.
    ///
    /// The returned opening shows a record whose `(key, next_key)` range
    /// strictly contains `key` (or whose successor is terminal), so `key`
    /// cannot be in the sorted list.
    ///
    /// # Errors
    /// [`TreeError::InvalidKey`] for a zero key and [`TreeError::KeyExists`]
    /// if the key is present.
    pub fn prove_exclusion(&self, key: Fr) -> Result<MembershipProof, TreeError> {
        if key.is_zero() {
            return Err(TreeError::InvalidKey);
        }
        if self.position_of(key).is_some() {
            return Err(TreeError::KeyExists);
        }
        let (prev_idx, _) = self.predecessor(key);
        self.open(prev_idx)
    }

    /// Open the record at a known index under the current root.
    fn open(&self, idx: u32) -> Result<MembershipProof, TreeError> {
        let position = idx as usize;
        let leaf = *self
            .nodes
            .get(position)
            .ok_or(TreeError::Unexpected("record index out of bounds"))?;
        let levels = build_levels(&self.hasher, &self.leaves, self.zero_leaf)?;
        Ok(MembershipProof {
            leaf_idx: idx,
            leaf,
            root: self.root,
            siblings: sibling_path(&levels, position),
        })
    }

    /// Greatest existing key strictly below `key`, as `(index, key)`.
    ///
    /// Defaults to the sentinel `(0, 0)`. Exits early on an adjacent key,
    /// since no closer predecessor can exist.
    #[allow(
        clippy::arithmetic_side_effects,
        reason = "Key increment is field addition, which wraps by definition"
    )]
    fn predecessor(&self, key: Fr) -> (u32, Fr) {
        let mut prev_idx = 0_u32;
        let mut prev_key = Fr::zero();
        for (idx, node) in (1_u32..).zip(self.nodes.iter().skip(1)) {
            if node.key < key && node.key > prev_key {
                prev_idx = idx;
                prev_key = node.key;
                if node.key + Fr::one() == key {
                    break;
                }
            }
        }
        (prev_idx, prev_key)
    }

    /// Index of the record holding `key`, if any.
    fn position_of(&self, key: Fr) -> Option<u32> {
        self.nodes
            .iter()
            .position(|node| node.key == key)
            .and_then(|idx| u32::try_from(idx).ok())
    }

    /// Whether the record array has reached `2^depth` entries.
    fn is_full(&self) -> bool {
        1_usize
            .checked_shl(u32::from(self.depth))
            .is_some_and(|capacity| self.nodes.len() >= capacity)
    }

    /// Common single-key preconditions shared by all insert entry points.
    fn ensure_insertable(&self, key: Fr) -> Result<(), TreeError> {
        if key.is_zero() {
            return Err(TreeError::InvalidKey);
        }
        if self.is_full() {
            return Err(TreeError::Full(self.depth));
        }
        if self.position_of(key).is_some() {
            return Err(TreeError::DuplicateKey);
        }
        Ok(())
    }

    /// Validate a caller-supplied predecessor for `key`.
    fn check_predecessor(&self, prev_idx: u32, key: Fr) -> Result<(), TreeError> {
        let prev = self
            .nodes
            .get(prev_idx as usize)
            .ok_or(TreeError::PrevOutOfBounds {
                index: prev_idx,
                leaf_count: u64::try_from(self.nodes.len()).unwrap_or(u64::MAX),
            })?;
        if prev.key >= key {
            return Err(TreeError::PrevKeyNotBelow);
        }
        if !prev.next_key.is_zero() && prev.next_key <= key {
            return Err(TreeError::PrevSuccessorNotAbove);
        }
        Ok(())
    }

    /// Perform a validated single insertion and assemble its transition
    /// proof. Stages the mutation on a clone and commits only on success.
    fn insert_after(
        &mut self,
        prev_idx: u32,
        key: Fr,
        value: Fr,
    ) -> Result<InsertionProof, TreeError> {
        let prev_position = prev_idx as usize;
        let prev_node = *self
            .nodes
            .get(prev_position)
            .ok_or(TreeError::PrevOutOfBounds {
                index: prev_idx,
                leaf_count: u64::try_from(self.nodes.len()).unwrap_or(u64::MAX),
            })?;
        let levels_before = build_levels(&self.hasher, &self.leaves, self.zero_leaf)?;
        let prev_before = MembershipProof {
            leaf_idx: prev_idx,
            leaf: prev_node,
            root: self.root,
            siblings: sibling_path(&levels_before, prev_position),
        };

        let mut staged = self.clone();
        let (new_idx, levels_after) = staged.splice(prev_idx, key, value)?;
        let new_position = new_idx as usize;
        let new_node = *staged
            .nodes
            .get(new_position)
            .ok_or(TreeError::Unexpected("spliced record must exist"))?;
        let inserted = MembershipProof {
            leaf_idx: new_idx,
            leaf: new_node,
            root: staged.root,
            siblings: sibling_path(&levels_after, new_position),
        };
        let prev_siblings_after = sibling_path(&levels_after, prev_position);

        *self = staged;
        Ok(InsertionProof {
            prev_before,
            inserted,
            prev_siblings_after,
        })
    }

    /// Append a record after `prev_idx`, re-thread the list, refresh the two
    /// touched leaves, and recompute the root. Validation is the caller's
    /// responsibility; on success the rebuilt level stack is returned.
    fn splice(
        &mut self,
        prev_idx: u32,
        key: Fr,
        value: Fr,
    ) -> Result<(u32, Vec<Vec<Fr>>), TreeError> {
        let new_idx = u32::try_from(self.nodes.len())?;
        let prev_position = prev_idx as usize;
        let prev = *self
            .nodes
            .get(prev_position)
            .ok_or(TreeError::PrevOutOfBounds {
                index: prev_idx,
                leaf_count: u64::try_from(self.nodes.len()).unwrap_or(u64::MAX),
            })?;

        self.nodes.push(Node {
            key,
            value,
            next_idx: prev.next_idx,
            next_key: prev.next_key,
        });
        if let Some(slot) = self.nodes.get_mut(prev_position) {
            slot.next_idx = new_idx;
            slot.next_key = key;
        }

        let prev_leaf = self
            .nodes
            .get(prev_position)
            .ok_or(TreeError::Unexpected("predecessor must exist"))?
            .leaf_hash(&self.hasher)?;
        let new_leaf = self
            .nodes
            .last()
            .ok_or(TreeError::Unexpected("appended record must exist"))?
            .leaf_hash(&self.hasher)?;
        if let Some(slot) = self.leaves.get_mut(prev_position) {
            *slot = prev_leaf;
        }
        self.leaves.push(new_leaf);

        let levels = build_levels(&self.hasher, &self.leaves, self.zero_leaf)?;
        self.root = root_of(&levels).ok_or(TreeError::Unexpected("level stack has a root"))?;
        Ok((new_idx, levels))
    }

    /// Batch preconditions: non-empty, valid unique keys, enough capacity.
    fn ensure_batch(&self, items: &[(Fr, Fr)]) -> Result<(), TreeError> {
        if items.is_empty() {
            return Err(TreeError::EmptyBatch);
        }
        let mut batch_keys = BTreeSet::new();
        for (key, _) in items {
            if key.is_zero() {
                return Err(TreeError::InvalidKey);
            }
            if self.position_of(*key).is_some() || !batch_keys.insert(*key) {
                return Err(TreeError::DuplicateKey);
            }
        }
        let capacity = 1_usize.checked_shl(u32::from(self.depth));
        let wanted = self.nodes.len().checked_add(items.len());
        if let (Some(capacity), Some(wanted)) = (capacity, wanted)
            && wanted > capacity
        {
            return Err(TreeError::Full(self.depth));
        }
        Ok(())
    }

    /// Shared batch driver for searched and hinted predecessors.
    fn batch_inner(
        &mut self,
        items: &[(Fr, Fr)],
        prev_hints: Option<&[u32]>,
        mut progress: impl FnMut(usize, usize),
    ) -> Result<BatchInsertionProof, TreeError> {
        self.ensure_batch(items)?;
        let insertion_idx = u32::try_from(self.nodes.len())?;
        if let Some(hints) = prev_hints {
            ensure_monotonic_hints(hints, insertion_idx)?;
        }

        let root_before = self.root;
        let (empty_subtree_root, empty_subtree_siblings) = self.insertion_frontier()?;

        let mut staged = self.clone();
        let mut prev_originals: BTreeMap<u32, MembershipProof> = BTreeMap::new();
        let mut prev_updates = Vec::with_capacity(items.len());
        let mut inserted = Vec::with_capacity(items.len());

        for (step, (key, value)) in items.iter().enumerate() {
            let prev_idx = match prev_hints.and_then(|hints| hints.get(step)) {
                Some(&hint) => {
                    staged.check_predecessor(hint, *key)?;
                    hint
                }
                None => staged.predecessor(*key).0,
            };
            if prev_idx < insertion_idx && !prev_originals.contains_key(&prev_idx) {
                // Pre-batch opening, taken from the untouched tree.
                prev_originals.insert(prev_idx, self.open(prev_idx)?);
            }
            let (new_idx, levels) = staged.splice(prev_idx, *key, *value)?;
            prev_updates.push(MembershipProof {
                leaf_idx: prev_idx,
                leaf: *staged
                    .nodes
                    .get(prev_idx as usize)
                    .ok_or(TreeError::Unexpected("predecessor must exist"))?,
                root: staged.root,
                siblings: sibling_path(&levels, prev_idx as usize),
            });
            inserted.push(MembershipProof {
                leaf_idx: new_idx,
                leaf: *staged
                    .nodes
                    .get(new_idx as usize)
                    .ok_or(TreeError::Unexpected("spliced record must exist"))?,
                root: staged.root,
                siblings: sibling_path(&levels, new_idx as usize),
            });
            progress(step.saturating_add(1), items.len());
        }

        let root_after = staged.root;
        *self = staged;
        Ok(BatchInsertionProof {
            root_before,
            root_after,
            insertion_idx,
            empty_subtree_root,
            empty_subtree_siblings,
            prev_originals: prev_originals.into_values().collect(),
            prev_updates,
            inserted,
        })
    }

    /// Opening of the maximal aligned empty subtree at the insertion
    /// frontier of the current tree.
    ///
    /// When the tree is an exactly-full power of two the frontier lies
    /// outside it; the degenerate form (no siblings, canonical empty root at
    /// full height) asserts exactly that.
    fn insertion_frontier(&self) -> Result<(Fr, Vec<Fr>), TreeError> {
        let count = self.leaves.len();
        let width = padded_width(count);
        let height = width.trailing_zeros() as usize;

        if count == width {
            let roots = empty_roots(&self.hasher, self.zero_leaf, height)?;
            let root = *roots
                .last()
                .ok_or(TreeError::Unexpected("empty-root chain is non-empty"))?;
            return Ok((root, Vec::new()));
        }

        // `count` is aligned to `2^level`, so the subtree starting at the
        // frontier with that span lies inside the padded width and is all
        // padding.
        let level = count.trailing_zeros() as usize;
        let roots = empty_roots(&self.hasher, self.zero_leaf, level)?;
        let subtree_root = *roots
            .last()
            .ok_or(TreeError::Unexpected("empty-root chain is non-empty"))?;

        let levels = build_levels(&self.hasher, &self.leaves, self.zero_leaf)?;
        let mut index = count >> level;
        let mut siblings = Vec::with_capacity(height.saturating_sub(level));
        for stack_level in level..height {
            let sibling = levels
                .get(stack_level)
                .and_then(|nodes| nodes.get(index ^ 1))
                .ok_or(TreeError::Unexpected("sibling exists below the root"))?;
            siblings.push(*sibling);
            index /= 2;
        }
        Ok((subtree_root, siblings))
    }
}

/// Hints naming pre-existing records must be non-decreasing. Equal hints are
/// legal: an unsorted batch can re-splice twice under one low record.
fn ensure_monotonic_hints(hints: &[u32], insertion_idx: u32) -> Result<(), TreeError> {
    let mut last_existing: Option<u32> = None;
    for &hint in hints.iter().filter(|&&hint| hint < insertion_idx) {
        if last_existing.is_some_and(|previous| hint < previous) {
            return Err(TreeError::UnsortedPrevHints);
        }
        last_existing = Some(hint);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use ark_ff::Zero as _;
    use test_utils::fr;

    use super::*;

    mod construction {
        use super::*;

        #[test]
        fn rejects_out_of_range_depths() {
            assert!(matches!(
                IndexedMerkleTree::new(0),
                Err(TreeError::BadDepth(0))
            ));
            assert!(matches!(
                IndexedMerkleTree::new(255),
                Err(TreeError::BadDepth(255))
            ));
        }

        #[test]
        fn fresh_tree_holds_only_the_sentinel() {
            let tree = IndexedMerkleTree::new(32).expect("depth 32 is valid");
            assert_eq!(tree.leaf_count(), 1);
            assert_eq!(tree.root(), tree.zero_leaf());
            assert!(tree.nodes().first().is_some_and(Node::is_terminal));
        }
    }

    mod predecessor_search {
        use super::*;

        #[test]
        fn empty_tree_yields_the_sentinel() {
            let tree = IndexedMerkleTree::new(8).expect("depth 8 is valid");
            assert_eq!(tree.predecessor(fr!(42)), (0, Fr::zero()));
        }

        #[test]
        fn finds_the_greatest_smaller_key() {
            let mut tree = IndexedMerkleTree::new(8).expect("depth 8 is valid");
            for key in [10_u64, 30, 20] {
                tree.insert(fr!(key), Fr::zero())
                    .expect("insertion should succeed");
            }
            // Records land at indices 1 (key 10), 2 (key 30), 3 (key 20).
            assert_eq!(tree.predecessor(fr!(25)), (3, fr!(20)));
            assert_eq!(tree.predecessor(fr!(15)), (1, fr!(10)));
            assert_eq!(tree.predecessor(fr!(5)), (0, Fr::zero()));
            assert_eq!(tree.predecessor(fr!(99)), (2, fr!(30)));
        }

        #[test]
        fn adjacent_key_exits_early() {
            let mut tree = IndexedMerkleTree::new(8).expect("depth 8 is valid");
            for key in [7_u64, 3, 9] {
                tree.insert(fr!(key), Fr::zero())
                    .expect("insertion should succeed");
            }
            // Key 8 is adjacent to 7; the scan must settle on it.
            assert_eq!(tree.predecessor(fr!(8)), (1, fr!(7)));
        }
    }

    mod single_insert {
        use super::*;

        #[test]
        fn threads_the_linked_list() {
            let mut tree = IndexedMerkleTree::new(8).expect("depth 8 is valid");
            tree.insert(fr!(20), fr!(200))
                .expect("insertion should succeed");
            tree.insert(fr!(10), fr!(100))
                .expect("insertion should succeed");
            tree.insert(fr!(30), fr!(300))
                .expect("insertion should succeed");

            let nodes = tree.nodes();
            // Sentinel -> 10 -> 20 -> 30.
            assert_eq!(nodes.first().map(|n| (n.next_idx, n.next_key)), Some((2, fr!(10))));
            assert_eq!(nodes.get(2).map(|n| (n.next_idx, n.next_key)), Some((1, fr!(20))));
            assert_eq!(nodes.get(1).map(|n| (n.next_idx, n.next_key)), Some((3, fr!(30))));
            assert!(nodes.get(3).is_some_and(Node::is_terminal));
        }

        #[test]
        fn rejects_invalid_inputs() {
            let mut tree = IndexedMerkleTree::new(8).expect("depth 8 is valid");
            assert!(matches!(
                tree.insert(Fr::zero(), fr!(1)),
                Err(TreeError::InvalidKey)
            ));
            tree.insert(fr!(5), fr!(1)).expect("insertion should succeed");
            assert!(matches!(
                tree.insert(fr!(5), fr!(2)),
                Err(TreeError::DuplicateKey)
            ));
        }

        #[test]
        fn failing_insert_leaves_the_tree_unchanged() {
            let mut tree = IndexedMerkleTree::new(8).expect("depth 8 is valid");
            tree.insert(fr!(5), fr!(1)).expect("insertion should succeed");
            let root = tree.root();
            let count = tree.leaf_count();

            assert!(tree.insert(fr!(5), fr!(2)).is_err());
            assert!(tree.insert(Fr::zero(), fr!(2)).is_err());
            assert_eq!(tree.root(), root);
            assert_eq!(tree.leaf_count(), count);
        }

        #[test]
        fn depth_one_fills_after_two_records() {
            let mut tree = IndexedMerkleTree::new(1).expect("depth 1 is valid");
            tree.insert(fr!(1), fr!(1)).expect("first record fits");
            assert!(matches!(
                tree.insert(fr!(2), fr!(2)),
                Err(TreeError::Full(1))
            ));
        }
    }

    mod insert_at {
        use super::*;

        fn seeded() -> IndexedMerkleTree {
            let mut tree = IndexedMerkleTree::new(8).expect("depth 8 is valid");
            tree.insert(fr!(10), Fr::zero())
                .expect("insertion should succeed");
            tree.insert(fr!(30), Fr::zero())
                .expect("insertion should succeed");
            tree
        }

        #[test]
        fn accepts_the_true_predecessor() {
            let mut tree = seeded();
            let proof = tree
                .insert_at(1, fr!(20), fr!(1))
                .expect("record 10 precedes key 20");
            assert!(proof.verify(&PoseidonHasher));
        }

        #[test]
        fn rejects_bad_predecessors() {
            let mut tree = seeded();
            assert!(matches!(
                tree.insert_at(9, fr!(20), fr!(1)),
                Err(TreeError::PrevOutOfBounds { index: 9, .. })
            ));
            // Record 2 holds key 30, above the inserted key.
            assert!(matches!(
                tree.insert_at(2, fr!(20), fr!(1)),
                Err(TreeError::PrevKeyNotBelow)
            ));
            // The sentinel's successor (key 10) is below the inserted key.
            assert!(matches!(
                tree.insert_at(0, fr!(20), fr!(1)),
                Err(TreeError::PrevSuccessorNotAbove)
            ));
        }
    }

    mod batch_insert {
        use super::*;

        #[test]
        fn rejects_an_empty_batch() {
            let mut tree = IndexedMerkleTree::new(8).expect("depth 8 is valid");
            assert!(matches!(
                tree.insert_batch(&[]),
                Err(TreeError::EmptyBatch)
            ));
        }

        #[test]
        fn matches_sequential_inserts() {
            let items = [
                (fr!(4), fr!(40)),
                (fr!(1), fr!(10)),
                (fr!(3), fr!(30)),
                (fr!(2), fr!(20)),
            ];

            let mut batched = IndexedMerkleTree::new(8).expect("depth 8 is valid");
            let proof = batched.insert_batch(&items).expect("batch should succeed");

            let mut sequential = IndexedMerkleTree::new(8).expect("depth 8 is valid");
            for (key, value) in items {
                sequential
                    .insert(key, value)
                    .expect("insertion should succeed");
            }

            assert_eq!(proof.root_after, sequential.root());
            assert_eq!(batched.root(), sequential.root());
        }

        #[test]
        fn chains_onto_records_appended_in_the_same_batch() {
            let mut tree = IndexedMerkleTree::new(8).expect("depth 8 is valid");
            tree.insert(fr!(100), Fr::zero())
                .expect("insertion should succeed");

            // 50's predecessor is the sentinel; 60's predecessor is 50,
            // which only exists inside this batch.
            let proof = tree
                .insert_batch(&[(fr!(50), fr!(1)), (fr!(60), fr!(2))])
                .expect("batch should succeed");
            assert!(proof.verify(&PoseidonHasher));
            assert_eq!(
                tree.nodes().get(2).map(|n| (n.next_idx, n.next_key)),
                Some((3, fr!(60)))
            );
        }

        #[test]
        fn rejects_duplicates_within_the_batch() {
            let mut tree = IndexedMerkleTree::new(8).expect("depth 8 is valid");
            let root = tree.root();
            assert!(matches!(
                tree.insert_batch(&[(fr!(5), fr!(1)), (fr!(5), fr!(2))]),
                Err(TreeError::DuplicateKey)
            ));
            assert_eq!(tree.root(), root);
            assert_eq!(tree.leaf_count(), 1);
        }

        #[test]
        fn rejects_batches_beyond_capacity() {
            let mut tree = IndexedMerkleTree::new(2).expect("depth 2 is valid");
            tree.insert(fr!(1), Fr::zero())
                .expect("insertion should succeed");
            // Capacity is 4; two records live, three more cannot fit.
            assert!(matches!(
                tree.insert_batch(&[
                    (fr!(2), Fr::zero()),
                    (fr!(3), Fr::zero()),
                    (fr!(4), Fr::zero())
                ]),
                Err(TreeError::Full(2))
            ));
        }

        #[test]
        fn reports_progress_per_item() {
            let mut tree = IndexedMerkleTree::new(8).expect("depth 8 is valid");
            let mut seen = Vec::new();
            tree.insert_batch_with_progress(
                &[(fr!(1), Fr::zero()), (fr!(2), Fr::zero())],
                |done, total| seen.push((done, total)),
            )
            .expect("batch should succeed");
            assert_eq!(seen, vec![(1, 2), (2, 2)]);
        }
    }

    mod batch_hints {
        use super::*;

        #[test]
        fn accepts_valid_hints_including_pending_records() {
            let mut tree = IndexedMerkleTree::new(8).expect("depth 8 is valid");
            tree.insert(fr!(100), Fr::zero())
                .expect("insertion should succeed");

            // Record 50 lands at index 2, and 60 chains onto it.
            let proof = tree
                .insert_batch_with_hints(&[(fr!(50), fr!(1)), (fr!(60), fr!(2))], &[0, 2])
                .expect("batch should succeed");
            assert!(proof.verify(&PoseidonHasher));
        }

        #[test]
        fn allows_repeated_existing_hints() {
            let mut tree = IndexedMerkleTree::new(8).expect("depth 8 is valid");
            tree.insert(fr!(100), Fr::zero())
                .expect("insertion should succeed");

            // Both keys splice under the sentinel: 50 first, then 20 below it.
            let proof = tree
                .insert_batch_with_hints(&[(fr!(50), fr!(1)), (fr!(20), fr!(2))], &[0, 0])
                .expect("batch should succeed");
            assert!(proof.verify(&PoseidonHasher));
        }

        #[test]
        fn rejects_decreasing_existing_hints() {
            let mut tree = IndexedMerkleTree::new(8).expect("depth 8 is valid");
            tree.insert(fr!(10), Fr::zero())
                .expect("insertion should succeed");
            tree.insert(fr!(100), Fr::zero())
                .expect("insertion should succeed");

            assert!(matches!(
                tree.insert_batch_with_hints(
                    &[(fr!(200), fr!(1)), (fr!(20), fr!(2))],
                    &[2, 1]
                ),
                Err(TreeError::UnsortedPrevHints)
            ));
        }

        #[test]
        fn rejects_wrong_hint_counts_and_bad_hints() {
            let mut tree = IndexedMerkleTree::new(8).expect("depth 8 is valid");
            tree.insert(fr!(10), Fr::zero())
                .expect("insertion should succeed");
            let root = tree.root();

            assert!(matches!(
                tree.insert_batch_with_hints(&[(fr!(20), fr!(1))], &[]),
                Err(TreeError::PrevHintCountMismatch {
                    expected: 1,
                    got: 0
                })
            ));
            // Record 1 holds key 10, but the sentinel is not 20's low record
            // once 15 lands between them.
            assert!(matches!(
                tree.insert_batch_with_hints(
                    &[(fr!(15), fr!(1)), (fr!(20), fr!(2))],
                    &[1, 1]
                ),
                Err(TreeError::PrevSuccessorNotAbove)
            ));
            assert_eq!(tree.root(), root);
        }
    }

    mod proofs {
        use super::*;

        #[test]
        fn membership_for_present_keys() {
            let mut tree = IndexedMerkleTree::new(8).expect("depth 8 is valid");
            for key in [8_u64, 2, 5] {
                tree.insert(fr!(key), fr!(key))
                    .expect("insertion should succeed");
            }
            for key in [8_u64, 2, 5] {
                let proof = tree.prove(fr!(key)).expect("key is present");
                assert!(proof.verify(&PoseidonHasher));
                assert_eq!(proof.root, tree.root());
            }
            assert!(matches!(tree.prove(fr!(3)), Err(TreeError::NotFound)));
        }

        #[test]
        fn exclusion_for_absent_keys() {
            let mut tree = IndexedMerkleTree::new(8).expect("depth 8 is valid");
            for key in [10_u64, 20] {
                tree.insert(fr!(key), Fr::zero())
                    .expect("insertion should succeed");
            }

            // Between two records, below the smallest, above the largest.
            for (absent, prev_key) in [(15_u64, 10_u64), (5, 0), (99, 20)] {
                let proof = tree
                    .prove_exclusion(fr!(absent))
                    .expect("key is absent");
                assert!(proof.verify(&PoseidonHasher));
                assert_eq!(proof.leaf.key, fr!(prev_key));
            }

            assert!(matches!(
                tree.prove_exclusion(fr!(10)),
                Err(TreeError::KeyExists)
            ));
            assert!(matches!(
                tree.prove_exclusion(Fr::zero()),
                Err(TreeError::InvalidKey)
            ));
        }
    }
}
