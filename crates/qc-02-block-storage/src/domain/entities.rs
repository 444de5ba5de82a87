//! # Domain Entities
//!
//! `ProcessedBlock`: the store's wrapper around an accepted block.

use serde::{Deserialize, Serialize};
use shared_types::{Block, BlockHeight, BlockId, Hash, StateDiff, U256};

/// A block that passed state-independent validation, with the chain data
/// derived from its ancestry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedBlock {
    pub block: Block,
    pub id: BlockId,
    pub height: BlockHeight,
    /// Sum of the weights of this block and all its ancestors.
    pub cumulative_weight: U256,
    /// Target a child of this block must meet.
    pub child_target: U256,
    /// Deltas recorded the first time this block was applied.
    pub diffs: Vec<StateDiff>,
    pub diffs_generated: bool,
    /// Checksum of the full state right after this block was applied.
    pub consensus_checksum: Option<Hash>,
}

impl ProcessedBlock {
    pub fn new(
        block: Block,
        height: BlockHeight,
        cumulative_weight: U256,
        child_target: U256,
    ) -> Self {
        let id = block.id();
        Self {
            block,
            id,
            height,
            cumulative_weight,
            child_target,
            diffs: Vec::new(),
            diffs_generated: false,
            consensus_checksum: None,
        }
    }

    pub fn parent_id(&self) -> BlockId {
        self.block.parent_id
    }

    pub fn timestamp(&self) -> u64 {
        self.block.timestamp
    }

    /// Record the diffs and resulting checksum of the first application.
    pub fn record_application(&mut self, diffs: Vec<StateDiff>, checksum: Hash) {
        self.diffs = diffs;
        self.diffs_generated = true;
        self.consensus_checksum = Some(checksum);
    }

    /// Forget an application that was rolled back before it was persisted.
    pub fn clear_application(&mut self) {
        self.diffs.clear();
        self.diffs_generated = false;
        self.consensus_checksum = None;
    }
}
