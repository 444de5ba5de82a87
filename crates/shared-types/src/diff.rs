//! State deltas caused by applying one block.
//!
//! Create and remove variants carry the full entry so a diff can be
//! inverted without consulting any other state.

use serde::{Deserialize, Serialize};

use crate::entities::{
    BlockHeight, CoinOutput, Contract, ContractId, FundOutput, FundOutputId, OutputId,
};

/// One atomic change to the consensus state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateDiff {
    CreateOutput { id: OutputId, output: CoinOutput },
    RemoveOutput { id: OutputId, output: CoinOutput },
    CreateFundOutput { id: FundOutputId, output: FundOutput },
    RemoveFundOutput { id: FundOutputId, output: FundOutput },
    CreateContract { id: ContractId, contract: Contract },
    DeleteContract { id: ContractId, contract: Contract },
    /// Marks an unproven contract as proven at `height`.
    ApplyContractProof { id: ContractId, height: BlockHeight },
}

impl StateDiff {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StateDiff::CreateOutput { .. } => "create_output",
            StateDiff::RemoveOutput { .. } => "remove_output",
            StateDiff::CreateFundOutput { .. } => "create_fund_output",
            StateDiff::RemoveFundOutput { .. } => "remove_fund_output",
            StateDiff::CreateContract { .. } => "create_contract",
            StateDiff::DeleteContract { .. } => "delete_contract",
            StateDiff::ApplyContractProof { .. } => "apply_contract_proof",
        }
    }
}
