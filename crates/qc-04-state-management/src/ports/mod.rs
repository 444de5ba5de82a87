//! # Ports
//!
//! Read access to the canonical chain needed while computing diffs.

use shared_types::{BlockHeight, BlockId};

/// Canonical chain as seen by the block being processed.
///
/// Only heights strictly below the block's own height are meaningful.
pub trait ChainView {
    fn canonical_id_at(&self, height: BlockHeight) -> Option<BlockId>;
}

impl ChainView for [BlockId] {
    fn canonical_id_at(&self, height: BlockHeight) -> Option<BlockId> {
        usize::try_from(height).ok().and_then(|h| self.get(h)).copied()
    }
}

impl ChainView for Vec<BlockId> {
    fn canonical_id_at(&self, height: BlockHeight) -> Option<BlockId> {
        self.as_slice().canonical_id_at(height)
    }
}
