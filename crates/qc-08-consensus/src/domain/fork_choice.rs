//! # Heaviest-Chain Fork Choice
//!
//! The canonical chain is the branch with the greatest cumulative weight.
//! Equal weight never displaces the current head: the first branch seen
//! keeps its place until a strictly heavier one appears.
//!
//! A reorg is planned by walking parent links from the old head and the new
//! tip down to equal height, then together until they meet. The walk is an
//! explicit loop over the block arena, so depth is bounded only by height.

use primitive_types::U256;
use qc_02_block_storage::{BlockStore, StorageError};
use shared_types::{BlockHeight, BlockId};

/// True if a branch ending at `candidate` weight should replace the head.
pub fn is_heavier(candidate: &U256, head: &U256) -> bool {
    candidate > head
}

/// The canonical-path change that makes `tip` the head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorgPlan {
    /// Height of the common ancestor.
    pub fork_height: BlockHeight,
    /// Canonical blocks above the ancestor, highest first.
    pub revert: Vec<BlockId>,
    /// Branch blocks above the ancestor, lowest first.
    pub apply: Vec<BlockId>,
}

impl ReorgPlan {
    pub fn depth(&self) -> usize {
        self.revert.len()
    }
}

/// Find the common ancestor of the current head and `tip`.
pub fn plan_reorg(store: &BlockStore, tip: &BlockId) -> Result<ReorgPlan, StorageError> {
    let lookup = |id: &BlockId| store.get(id).ok_or(StorageError::BlockNotFound { id: *id });

    let mut old = lookup(&store.head_id())?;
    let mut new = lookup(tip)?;
    let mut revert = Vec::new();
    let mut apply = Vec::new();

    while old.height > new.height {
        revert.push(old.id);
        old = lookup(&old.parent_id())?;
    }
    while new.height > old.height {
        apply.push(new.id);
        new = lookup(&new.parent_id())?;
    }
    while old.id != new.id {
        if old.height == 0 {
            return Err(StorageError::DataCorruption {
                message: format!("{} shares no ancestor with the canonical chain", tip),
            });
        }
        revert.push(old.id);
        apply.push(new.id);
        old = lookup(&old.parent_id())?;
        new = lookup(&new.parent_id())?;
    }

    apply.reverse();
    Ok(ReorgPlan {
        fork_height: old.height,
        revert,
        apply,
    })
}
