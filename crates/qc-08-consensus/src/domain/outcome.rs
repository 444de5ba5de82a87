//! Results of accepting a block.

use serde::{Deserialize, Serialize};
use shared_types::{BlockHeight, BlockId, Hash};

/// How an accepted block changed the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcceptOutcome {
    /// The block extended the canonical head.
    Extended,
    /// The block was stored on a branch that is not heavier than the head.
    SideBranch,
    /// The canonical path switched to the block's branch.
    Reorganized {
        /// Blocks removed from the canonical path, highest first.
        reverted: Vec<BlockId>,
        /// Blocks added to the canonical path, lowest first.
        applied: Vec<BlockId>,
    },
}

impl AcceptOutcome {
    /// Number of canonical blocks that were reverted.
    pub fn depth(&self) -> usize {
        match self {
            AcceptOutcome::Reorganized { reverted, .. } => reverted.len(),
            _ => 0,
        }
    }

    pub fn is_canonical(&self) -> bool {
        !matches!(self, AcceptOutcome::SideBranch)
    }
}

/// A committed change of the canonical path, delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusChange {
    pub reverted: Vec<BlockId>,
    pub applied: Vec<BlockId>,
    pub head: BlockId,
    pub height: BlockHeight,
    pub checksum: Hash,
}
