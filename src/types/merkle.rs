// Merkle - Roots over transactions, receipts and account state
use super::primitives::Hash;
use rs_merkle::{Hasher, MerkleTree};

/// Blake3-based hasher for Merkle trees (consistent with rest of KratOs)
#[derive(Clone)]
pub struct Blake3Hasher;

impl Hasher for Blake3Hasher {
    type Hash = [u8; 32];

    fn hash(data: &[u8]) -> Self::Hash {
        blake3::hash(data).into()
    }
}

/// Merkle root of an ordered list of leaves. Empty list gives `Hash::ZERO`.
pub fn merkle_root<I, T>(leaves: I) -> Hash
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let hashed: Vec<[u8; 32]> = leaves
        .into_iter()
        .map(|leaf| Blake3Hasher::hash(leaf.as_ref()))
        .collect();

    if hashed.is_empty() {
        return Hash::ZERO;
    }

    let tree = MerkleTree::<Blake3Hasher>::from_leaves(&hashed);
    tree.root().map(Hash::from_bytes).unwrap_or(Hash::ZERO)
}
