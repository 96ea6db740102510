//! Merkle tree over transaction ids, with inclusion proofs.
//!
//! Each level is built by hashing adjacent pairs with [`hash_concat`]. A level
//! of odd length pairs its last node with itself. The root of an empty list is
//! [`ZERO_HASH`]; the root of a single leaf is that leaf.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MerkleError;
use crate::hash::{hash_concat, to_display_hex, Hash256, ZERO_HASH};

/// One step of an inclusion proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerklePathItem {
    /// Sibling node at this level.
    #[serde(with = "hex::serde")]
    pub hash: Hash256,
    /// True if the sibling goes on the left of the running hash.
    pub is_left: bool,
}

impl MerklePathItem {
    /// Fold this step into the running hash.
    #[inline]
    pub fn apply(&self, current: &Hash256) -> Hash256 {
        if self.is_left {
            hash_concat(&self.hash, current)
        } else {
            hash_concat(current, &self.hash)
        }
    }
}

impl fmt::Display for MerklePathItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MerklePathItem(hash={}, is_left={})", hex::encode(self.hash), self.is_left)
    }
}

/// A Merkle tree with every level retained, leaves first.
///
/// Built from a snapshot of ids and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    levels: Vec<Vec<Hash256>>,
}

impl MerkleTree {
    /// Build the tree over `leaves` in order.
    pub fn new(leaves: &[Hash256]) -> Self {
        let mut levels = vec![leaves.to_vec()];

        while let Some(level) = levels.last().filter(|level| level.len() > 1) {
            let next: Vec<Hash256> = level
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_concat(left, right),
                    [last] => hash_concat(last, last),
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            levels.push(next);
        }

        MerkleTree { levels }
    }

    pub fn leaves(&self) -> &[Hash256] {
        &self.levels[0]
    }

    pub fn len(&self) -> usize {
        self.levels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels[0].is_empty()
    }

    /// Number of hashing levels above the leaves.
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    /// The root, or [`ZERO_HASH`] for an empty tree.
    pub fn root(&self) -> Hash256 {
        match self.levels.last() {
            Some(top) if top.len() == 1 => top[0],
            _ => ZERO_HASH,
        }
    }

    /// Sibling hashes from the leaf at `index` up to the root.
    ///
    /// Empty for a single-leaf tree.
    pub fn path(&self, index: usize) -> Result<Vec<MerklePathItem>, MerkleError> {
        if index >= self.len() {
            return Err(MerkleError::IndexOutOfRange { index, len: self.len() });
        }

        let mut path = Vec::with_capacity(self.depth());
        let mut index = index;

        for level in &self.levels[..self.depth()] {
            let item = if index % 2 == 0 {
                // odd-length levels pair the last node with itself
                let sibling = level.get(index + 1).unwrap_or(&level[index]);
                MerklePathItem { hash: *sibling, is_left: false }
            } else {
                MerklePathItem { hash: level[index - 1], is_left: true }
            };
            path.push(item);
            index /= 2;
        }

        Ok(path)
    }

    /// Bundle the path for `index` with its leaf and this tree's root.
    pub fn proof(&self, index: usize) -> Result<MerkleProof, MerkleError> {
        let path = self.path(index)?;
        Ok(MerkleProof {
            leaf: self.levels[0][index],
            index,
            path,
            root: self.root(),
        })
    }
}

/// Compute the Merkle root of an ordered list of ids.
pub fn compute_merkle_root(leaves: &[Hash256]) -> Hash256 {
    match leaves {
        [] => ZERO_HASH,
        [single] => *single,
        _ => MerkleTree::new(leaves).root(),
    }
}

/// Inclusion path for the leaf at `index`.
pub fn merkle_path(leaves: &[Hash256], index: usize) -> Result<Vec<MerklePathItem>, MerkleError> {
    MerkleTree::new(leaves).path(index)
}

/// Recompute the root from `leaf` along `path` and compare with `expected_root`.
///
/// An empty path verifies iff the leaf is the root.
pub fn verify_merkle_path(leaf: &Hash256, path: &[MerklePathItem], expected_root: &Hash256) -> bool {
    let computed = path.iter().fold(*leaf, |current, item| item.apply(&current));
    computed == *expected_root
}

/// A self-contained inclusion proof for one leaf.
///
/// Enough for a light client to check membership without the full id list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    #[serde(with = "hex::serde")]
    pub leaf: Hash256,
    /// Position of the leaf in the original list.
    pub index: usize,
    pub path: Vec<MerklePathItem>,
    #[serde(with = "hex::serde")]
    pub root: Hash256,
}

impl MerkleProof {
    /// Check the proof against its own root.
    pub fn verify(&self) -> bool {
        verify_merkle_path(&self.leaf, &self.path, &self.root)
    }

    /// Check the proof against a root obtained independently, e.g. from a header.
    pub fn verify_against(&self, root: &Hash256) -> bool {
        verify_merkle_path(&self.leaf, &self.path, root)
    }
}

impl fmt::Display for MerkleProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MerkleProof(leaf={}, index={}, steps={}, root={})",
            to_display_hex(&self.leaf),
            self.index,
            self.path.len(),
            to_display_hex(&self.root)
        )
    }
}
