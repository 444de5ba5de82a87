use shared_types::{BlockHeight, ContractId, Currency, FundOutputId, OutputId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("Output not found: {id:?}")]
    OutputNotFound { id: OutputId },

    #[error("Fund output not found: {id:?}")]
    FundOutputNotFound { id: FundOutputId },

    #[error("Contract not found: {id:?}")]
    ContractNotFound { id: ContractId },

    #[error("Unlock conditions do not match the output owner (input {input})")]
    UnlockHashMismatch { input: String },

    #[error("Coin imbalance: inputs {inputs}, outputs {outputs}")]
    CoinImbalance { inputs: Currency, outputs: Currency },

    #[error("Fund imbalance: inputs {inputs}, outputs {outputs}")]
    FundImbalance { inputs: u64, outputs: u64 },

    #[error("Currency overflow while summing {what}")]
    Overflow { what: &'static str },

    #[error("Contract {id:?} already proven")]
    ContractAlreadyProven { id: ContractId },

    #[error("Storage proof for {id:?} at height {height} outside window [{window_start}, {window_end})")]
    ProofOutsideWindow {
        id: ContractId,
        height: BlockHeight,
        window_start: BlockHeight,
        window_end: BlockHeight,
    },

    #[error("No canonical block at trigger height {height}")]
    TriggerBlockUnknown { height: BlockHeight },

    #[error("Invalid storage proof for contract {id:?}")]
    InvalidStorageProof { id: ContractId },

    #[error("Diff conflict on {diff}: {reason}")]
    DiffConflict { diff: &'static str, reason: String },
}

impl StateError {
    /// True if the error reflects a bug or corrupted state rather than an
    /// invalid block.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StateError::DiffConflict { .. })
    }
}
