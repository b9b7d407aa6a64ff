//! Merkle tree builder for bundle producers and tests.
//!
//! Leaf hashes are sorted and deduplicated before layering. Adjacent nodes
//! are combined with [`hash_pair`]; an unpaired node at the end of a layer is
//! carried up unchanged. Proofs produced here verify with
//! [`verify_hash`](crate::verify_hash).

use hubledger_types::Hash256;

use crate::{encoding::MerkleLeaf, verifier::hash_pair};

#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// `layers[0]` holds the sorted leaf hashes; the last layer holds the root.
    layers: Vec<Vec<Hash256>>,
}

impl MerkleTree {
    #[must_use]
    pub fn from_hashes(mut hashes: Vec<Hash256>) -> Self {
        hashes.sort_unstable();
        hashes.dedup();

        let mut layers = vec![hashes];
        while layers.last().is_some_and(|layer| layer.len() > 1) {
            let next: Vec<Hash256> = layers[layers.len() - 1]
                .chunks(2)
                .map(|pair| pair.get(1).map_or(pair[0], |b| hash_pair(&pair[0], b)))
                .collect();
            layers.push(next);
        }
        Self { layers }
    }

    #[must_use]
    pub fn from_leaves<L: MerkleLeaf>(leaves: &[L]) -> Self {
        Self::from_hashes(leaves.iter().map(MerkleLeaf::leaf_hash).collect())
    }

    /// Root hash; [`Hash256::ZERO`] for an empty tree.
    #[must_use]
    pub fn root(&self) -> Hash256 {
        self.layers
            .last()
            .and_then(|layer| layer.first())
            .copied()
            .unwrap_or(Hash256::ZERO)
    }

    /// Number of distinct leaves.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.first().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sibling path for `leaf_hash`, or `None` if it is not in the tree.
    #[must_use]
    pub fn proof_for_hash(&self, leaf_hash: &Hash256) -> Option<Vec<Hash256>> {
        let mut index = self.layers.first()?.binary_search(leaf_hash).ok()?;
        let mut proof = Vec::new();
        for layer in &self.layers[..self.layers.len() - 1] {
            if let Some(sibling) = layer.get(index ^ 1) {
                proof.push(*sibling);
            }
            index /= 2;
        }
        Some(proof)
    }

    #[must_use]
    pub fn proof<L: MerkleLeaf>(&self, leaf: &L) -> Option<Vec<Hash256>> {
        self.proof_for_hash(&leaf.leaf_hash())
    }
}
