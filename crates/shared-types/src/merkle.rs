//! Binary Merkle tree used for block roots and storage proofs.
//!
//! Leaves are hashed as `H(0x00 || data)` and interior nodes as
//! `H(0x01 || left || right)`. An unpaired node at the end of a level is
//! promoted to the next level unchanged.

use sha2::{Digest, Sha256};

use crate::entities::Hash;

/// Size in bytes of one file segment covered by a storage proof.
pub const SEGMENT_SIZE: u64 = 64;

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

pub fn leaf_hash(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(data);
    hasher.finalize().into()
}

pub fn node_hash(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Root over already-hashed leaves. The empty tree has the zero root.
pub fn root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return [0u8; 32];
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

fn next_level(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => node_hash(left, right),
            [single] => *single,
            _ => unreachable!("chunks(2) yields one or two items"),
        })
        .collect()
}

/// Number of segments covering `file_size` bytes (at least one).
pub fn segment_count(file_size: u64) -> u64 {
    file_size.div_ceil(SEGMENT_SIZE).max(1)
}

/// Split file data into segments of `SEGMENT_SIZE` bytes.
pub fn segments(data: &[u8]) -> Vec<&[u8]> {
    if data.is_empty() {
        return vec![data];
    }
    data.chunks(SEGMENT_SIZE as usize).collect()
}

/// Merkle root of a file's segments.
pub fn file_root(data: &[u8]) -> Hash {
    let leaves: Vec<Hash> = segments(data).into_iter().map(leaf_hash).collect();
    root(&leaves)
}

/// Sibling hashes proving segment `index` of `data`, or `None` if out of range.
pub fn build_proof(data: &[u8], index: u64) -> Option<(Vec<u8>, Vec<Hash>)> {
    let segs = segments(data);
    let mut position = usize::try_from(index).ok()?;
    let segment = segs.get(position)?.to_vec();

    let mut level: Vec<Hash> = segs.into_iter().map(leaf_hash).collect();
    let mut proof = Vec::new();
    while level.len() > 1 {
        let sibling = position ^ 1;
        if sibling < level.len() {
            proof.push(level[sibling]);
        }
        level = next_level(&level);
        position /= 2;
    }
    Some((segment, proof))
}

/// Verify that `segment` is leaf `index` of a tree of `leaf_count` leaves
/// with the given root. The proof must be consumed exactly.
pub fn verify_proof(
    root_hash: &Hash,
    segment: &[u8],
    proof: &[Hash],
    index: u64,
    leaf_count: u64,
) -> bool {
    if index >= leaf_count {
        return false;
    }
    let mut hash = leaf_hash(segment);
    let mut position = index;
    let mut width = leaf_count;
    let mut remaining = proof.iter();

    while width > 1 {
        let sibling = position ^ 1;
        if sibling < width {
            let Some(sibling_hash) = remaining.next() else {
                return false;
            };
            hash = if position % 2 == 0 {
                node_hash(&hash, sibling_hash)
            } else {
                node_hash(sibling_hash, &hash)
            };
        }
        position /= 2;
        width = width.div_ceil(2);
    }

    remaining.next().is_none() && &hash == root_hash
}
