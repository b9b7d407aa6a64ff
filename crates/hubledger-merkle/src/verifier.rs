//! Sorted-pair Merkle proof verification.
//!
//! Pairs are ordered by numeric value before hashing, so proofs carry no
//! left/right flags: a proof is just the list of sibling hashes from the
//! leaf up to the root.

use hubledger_types::Hash256;
use sha2::{Digest, Sha256};

use crate::encoding::MerkleLeaf;

/// Hash two nodes, smaller first.
#[must_use]
pub fn hash_pair(a: &Hash256, b: &Hash256) -> Hash256 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = Sha256::new();
    hasher.update(lo.as_bytes());
    hasher.update(hi.as_bytes());
    Hash256(hasher.finalize().into())
}

/// Fold a proof over a leaf hash, returning the implied root.
#[must_use]
pub fn process_proof(leaf_hash: Hash256, proof: &[Hash256]) -> Hash256 {
    proof
        .iter()
        .fold(leaf_hash, |computed, sibling| hash_pair(&computed, sibling))
}

/// Whether `proof` links `leaf_hash` to `root`.
#[must_use]
pub fn verify_hash(root: &Hash256, leaf_hash: Hash256, proof: &[Hash256]) -> bool {
    process_proof(leaf_hash, proof) == *root
}

/// Whether `proof` links `leaf` to `root` under the leaf's canonical encoding.
#[must_use]
pub fn verify<L: MerkleLeaf>(root: &Hash256, leaf: &L, proof: &[Hash256]) -> bool {
    verify_hash(root, leaf.leaf_hash(), proof)
}
