use primitive_types::H256;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

/// Hash a share (or any leaf payload) into a tree leaf.
pub fn leaf_hash(data: &[u8]) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(data);
    H256::from_slice(&hasher.finalize())
}

fn node_hash(left: &H256, right: &H256) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    H256::from_slice(&hasher.finalize())
}

/// Root of a binary Merkle tree over a power-of-two number of leaves.
pub fn merkle_root(leaves: &[H256]) -> H256 {
    debug_assert!(leaves.len().is_power_of_two());
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| node_hash(&pair[0], &pair[1]))
            .collect();
    }
    level[0]
}

/// Inclusion proof of one leaf against a Merkle root, siblings bottom-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub index: usize,
    pub siblings: Vec<H256>,
}

impl MerkleProof {
    /// Build the proof for `index` over the given leaves.
    pub fn build(leaves: &[H256], index: usize) -> Self {
        debug_assert!(leaves.len().is_power_of_two());
        debug_assert!(index < leaves.len());

        let mut siblings = Vec::new();
        let mut level = leaves.to_vec();
        let mut pos = index;
        while level.len() > 1 {
            siblings.push(level[pos ^ 1]);
            level = level
                .chunks(2)
                .map(|pair| node_hash(&pair[0], &pair[1]))
                .collect();
            pos /= 2;
        }
        Self { index, siblings }
    }

    /// Verify the proof for a leaf hash against the expected root.
    pub fn verify(&self, root: &H256, leaf: &H256) -> bool {
        let mut acc = *leaf;
        let mut pos = self.index;
        for sibling in &self.siblings {
            acc = if pos % 2 == 0 {
                node_hash(&acc, sibling)
            } else {
                node_hash(sibling, &acc)
            };
            pos /= 2;
        }
        acc == *root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: usize) -> Vec<H256> {
        (0..n).map(|i| leaf_hash(&[i as u8])).collect()
    }

    #[test]
    fn test_proof_roundtrip() {
        let leaves = leaves(8);
        let root = merkle_root(&leaves);
        for (i, leaf) in leaves.iter().enumerate() {
            let proof = MerkleProof::build(&leaves, i);
            assert!(proof.verify(&root, leaf));
        }
    }

    #[test]
    fn test_proof_rejects_wrong_leaf() {
        let leaves = leaves(4);
        let root = merkle_root(&leaves);
        let proof = MerkleProof::build(&leaves, 1);
        assert!(!proof.verify(&root, &leaves[2]));
        assert!(!proof.verify(&root, &leaf_hash(b"forged")));
    }

    #[test]
    fn test_proof_rejects_wrong_index() {
        let leaves = leaves(4);
        let root = merkle_root(&leaves);
        let mut proof = MerkleProof::build(&leaves, 1);
        proof.index = 2;
        assert!(!proof.verify(&root, &leaves[1]));
    }

    #[test]
    fn test_two_leaf_tree() {
        let leaves = leaves(2);
        let root = merkle_root(&leaves);
        let proof = MerkleProof::build(&leaves, 0);
        assert_eq!(proof.siblings.len(), 1);
        assert!(proof.verify(&root, &leaves[0]));
    }
}
