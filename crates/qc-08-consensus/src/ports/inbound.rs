//! Driving ports (Inbound API)

use crate::domain::{AcceptOutcome, ConsensusError};
use qc_02_block_storage::ProcessedBlock;
use shared_types::{Block, BlockHeight, BlockId, Hash, NodeState};

/// Primary consensus-set API
///
/// `accept_block` is the only mutation. Calls are serialized internally;
/// queries never observe a reorg half applied.
pub trait ConsensusApi: Send + Sync {
    /// Validate a block and, if its branch is heaviest, make it canonical.
    fn accept_block(&self, block: Block) -> Result<AcceptOutcome, ConsensusError>;

    /// Height of the canonical head
    fn current_height(&self) -> BlockHeight;

    /// Canonical block ID at `height`
    fn block_at_height(&self, height: BlockHeight) -> Option<BlockId>;

    /// Any stored block, canonical or not
    fn processed_block(&self, id: &BlockId) -> Option<ProcessedBlock>;

    /// Checksum of the current state and head
    fn consensus_checksum(&self) -> Hash;

    fn node_state(&self) -> NodeState;
}
