//! Merkle level construction over the record leaves.
//!
//! The root commits to the live population: leaves are padded with the
//! empty-slot digest up to the next power of two above the current record
//! count, never to the full `2^depth` width. Sibling counts therefore track
//! `ceil(log2(count))` and may grow by one when an insertion crosses a
//! power-of-two boundary.

use imt_core::field::Fr;
use imt_core::hash::{FieldHasher, HashError};

/// Width of the padded leaf layer: the next power of two at or above
/// `leaf_count`, with a minimum of one slot.
pub(crate) fn padded_width(leaf_count: usize) -> usize {
    leaf_count.max(1).next_power_of_two()
}

/// Build every level of the tree, leaves first, root last.
///
/// The returned vector always ends in a single-element level holding the
/// root; for a one-leaf tree that is the (padded) leaf layer itself.
pub(crate) fn build_levels<H: FieldHasher>(
    hasher: &H,
    leaves: &[Fr],
    empty_leaf: Fr,
) -> Result<Vec<Vec<Fr>>, HashError> {
    let width = padded_width(leaves.len());
    let mut base = Vec::with_capacity(width);
    base.extend_from_slice(leaves);
    base.resize(width, empty_leaf);

    let mut levels = vec![base];
    loop {
        let next = match levels.last() {
            Some(level) if level.len() > 1 => {
                let mut next = Vec::with_capacity(level.len() / 2);
                for pair in level.chunks_exact(2) {
                    if let [left, right] = pair {
                        next.push(hasher.hash2([*left, *right])?);
                    }
                }
                next
            }
            _ => break,
        };
        levels.push(next);
    }
    Ok(levels)
}

/// The root held by a level stack produced by [`build_levels`].
pub(crate) fn root_of(levels: &[Vec<Fr>]) -> Option<Fr> {
    levels.last().and_then(|level| level.first()).copied()
}

/// Sibling digests of `leaf_idx`, leaf level first.
///
/// Every level below the root has even width, so each position has a
/// sibling at `index ^ 1`.
pub(crate) fn sibling_path(levels: &[Vec<Fr>], leaf_idx: usize) -> Vec<Fr> {
    let mut index = leaf_idx;
    let mut path = Vec::new();
    for level in levels {
        if level.len() == 1 {
            break;
        }
        if let Some(sibling) = level.get(index ^ 1) {
            path.push(*sibling);
        }
        index /= 2;
    }
    path
}

/// Fold a leaf digest up through its sibling path.
///
/// At each level the low bit of the running index selects whether the
/// accumulator is the left or the right input of the compression.
pub(crate) fn fold_path<H: FieldHasher>(
    hasher: &H,
    leaf_hash: Fr,
    leaf_idx: u32,
    siblings: &[Fr],
) -> Result<Fr, HashError> {
    let mut acc = leaf_hash;
    let mut index = u64::from(leaf_idx);
    for sibling in siblings {
        acc = if index.is_multiple_of(2) {
            hasher.hash2([acc, *sibling])?
        } else {
            hasher.hash2([*sibling, acc])?
        };
        index /= 2;
    }
    Ok(acc)
}

/// Digests of all-empty subtrees: entry `i` is the root of a fully padded
/// subtree of height `i`, starting from the empty-slot digest.
pub(crate) fn empty_roots<H: FieldHasher>(
    hasher: &H,
    empty_leaf: Fr,
    height: usize,
) -> Result<Vec<Fr>, HashError> {
    let mut roots = Vec::with_capacity(height.saturating_add(1));
    let mut current = empty_leaf;
    roots.push(current);
    for _ in 0..height {
        current = hasher.hash2([current, current])?;
        roots.push(current);
    }
    Ok(roots)
}
