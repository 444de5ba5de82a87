//! Error types for the consensus set
//!
//! `BlockRejection` says why a block is permanently bad; `ConsensusError`
//! classifies every failed `accept_block` so callers can tell "send the
//! ancestors" from "drop this block" from "stop the node".

use qc_02_block_storage::StorageError;
use qc_04_state_management::StateError;
use shared_types::{BlockHeight, BlockId, Currency, Timestamp};

/// Why a block can never become part of the chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockRejection {
    #[error("Block was rejected earlier")]
    KnownInvalid,

    #[error("Block descends from an invalid block")]
    InvalidAncestor,

    #[error("Encoded block is {size} bytes, limit {limit}")]
    Oversized { size: u64, limit: u64 },

    #[error("Block ID does not meet the target")]
    InsufficientWork,

    #[error("Timestamp {timestamp} is below the median {median} of recent ancestors")]
    EarlyTimestamp { timestamp: Timestamp, median: Timestamp },

    #[error("Miner payouts total {actual}, expected {expected}")]
    BadMinerPayouts { expected: Currency, actual: Currency },

    #[error("Zero-value output")]
    ZeroValueOutput,

    #[error("Input {0} spent twice in one block")]
    DuplicateInput(String),

    #[error("Contract {0} proven twice in one block")]
    DuplicateStorageProof(String),

    #[error("Malformed contract: {0}")]
    MalformedContract(String),

    #[error("Contract formation at height {height}, allowed from {activation}")]
    ContractBeforeHardfork {
        height: BlockHeight,
        activation: BlockHeight,
    },

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Input {input} has {valid} of {required} required signatures")]
    MissingSignatures {
        input: String,
        valid: u64,
        required: u64,
    },

    #[error("Input {input} is timelocked until height {timelock}")]
    PrematureTimelock { input: String, timelock: BlockHeight },

    #[error("Currency overflow in {0}")]
    Overflow(&'static str),

    #[error("Malformed block: {0}")]
    Malformed(String),

    #[error(transparent)]
    State(#[from] StateError),
}

impl BlockRejection {
    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            BlockRejection::KnownInvalid => "known_invalid",
            BlockRejection::InvalidAncestor => "invalid_ancestor",
            BlockRejection::Oversized { .. } => "oversized",
            BlockRejection::InsufficientWork => "insufficient_work",
            BlockRejection::EarlyTimestamp { .. } => "early_timestamp",
            BlockRejection::BadMinerPayouts { .. } => "bad_miner_payouts",
            BlockRejection::ZeroValueOutput => "zero_value_output",
            BlockRejection::DuplicateInput(_) => "duplicate_input",
            BlockRejection::DuplicateStorageProof(_) => "duplicate_storage_proof",
            BlockRejection::MalformedContract(_) => "malformed_contract",
            BlockRejection::ContractBeforeHardfork { .. } => "contract_before_hardfork",
            BlockRejection::InvalidSignature(_) => "invalid_signature",
            BlockRejection::MissingSignatures { .. } => "missing_signatures",
            BlockRejection::PrematureTimelock { .. } => "premature_timelock",
            BlockRejection::Overflow(_) => "overflow",
            BlockRejection::Malformed(_) => "malformed",
            BlockRejection::State(_) => "state",
        }
    }
}

/// Consensus error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsensusError {
    #[error("Orphan block: parent {parent:?} unknown")]
    OrphanBlock { parent: BlockId },

    #[error("Block already known: {0:?}")]
    BlockKnown(BlockId),

    #[error("Invalid block {id:?}: {reason}")]
    InvalidBlock { id: BlockId, reason: BlockRejection },

    #[error("Timestamp too far in future: {timestamp}, limit is {limit}")]
    FutureTimestamp { timestamp: Timestamp, limit: Timestamp },

    #[error("Reorg aborted at block {block:?}: {reason}")]
    ReorgAborted {
        block: BlockId,
        reason: BlockRejection,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Fatal consensus failure: {0}")]
    Fatal(String),

    #[error("Node halted awaiting intervention")]
    Halted,
}

impl ConsensusError {
    /// The block (or the branch it completes) will never be accepted.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ConsensusError::InvalidBlock { .. } | ConsensusError::ReorgAborted { .. }
        )
    }

    /// The caller should supply the missing ancestors and retry.
    pub fn is_orphan(&self) -> bool {
        matches!(self, ConsensusError::OrphanBlock { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConsensusError::OrphanBlock { .. } => "orphan",
            ConsensusError::BlockKnown(_) => "known",
            ConsensusError::InvalidBlock { reason, .. } => reason.label(),
            ConsensusError::FutureTimestamp { .. } => "future_timestamp",
            ConsensusError::ReorgAborted { .. } => "reorg_aborted",
            ConsensusError::Storage(_) => "storage",
            ConsensusError::Fatal(_) => "fatal",
            ConsensusError::Halted => "halted",
        }
    }
}

/// Result type for consensus operations
pub type ConsensusResult<T> = Result<T, ConsensusError>;
