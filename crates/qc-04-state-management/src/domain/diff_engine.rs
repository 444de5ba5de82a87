//! # Diff Engine
//!
//! Computes the ordered state deltas one block causes against the state
//! left by its parent. Transactions are processed in order against an
//! overlay, so a transaction may spend an output created earlier in the
//! same block.
//!
//! Diff order for a block:
//! 1. miner payouts
//! 2. each transaction (spends, creations, contract formations, proofs)
//! 3. maintenance: contracts whose window closes at this height resolve

use std::collections::{HashMap, HashSet};

use shared_types::{
    coin_output_id, contract_id, contract_payout_id, fund_output_id, genesis_fund_output_id,
    merkle, miner_payout_id, storage_proof_segment, Block, BlockHeight, BlockId, CoinOutput,
    Contract, ContractId, Currency, FundOutput, FundOutputId, OutputId, StateDiff, StorageProof,
    Transaction,
};

use super::{ConsensusState, StateError};
use crate::ports::ChainView;

/// Diffs for the genesis block: its payouts and the initial fund allocation.
pub fn genesis_diffs(genesis: &Block, fund_allocations: &[FundOutput]) -> Vec<StateDiff> {
    let genesis_id = genesis.id();
    let payouts = genesis
        .miner_payouts
        .iter()
        .enumerate()
        .map(|(i, output)| StateDiff::CreateOutput {
            id: miner_payout_id(&genesis_id, i),
            output: *output,
        });
    let funds = fund_allocations
        .iter()
        .enumerate()
        .map(|(i, output)| StateDiff::CreateFundOutput {
            id: genesis_fund_output_id(&genesis_id, i),
            output: *output,
        });
    payouts.chain(funds).collect()
}

/// Compute the diffs `block` causes at `height` against `state`.
///
/// Performs the state-dependent checks: inputs exist and are owned by the
/// revealed unlock conditions, coins and funds balance, and storage proofs
/// are valid for the segment the trigger block selects. `state` is not
/// modified.
pub fn compute_diffs<C: ChainView + ?Sized>(
    block: &Block,
    height: BlockHeight,
    state: &ConsensusState,
    chain: &C,
) -> Result<Vec<StateDiff>, StateError> {
    let block_id = block.id();
    let mut overlay = Overlay::new(state);

    for (i, output) in block.miner_payouts.iter().enumerate() {
        overlay.create_output(miner_payout_id(&block_id, i), *output)?;
    }

    for tx in &block.transactions {
        apply_transaction(&mut overlay, tx, height, chain)?;
    }

    resolve_expiring_contracts(&mut overlay, height)?;

    Ok(overlay.into_diffs())
}

fn apply_transaction<C: ChainView + ?Sized>(
    overlay: &mut Overlay<'_>,
    tx: &Transaction,
    height: BlockHeight,
    chain: &C,
) -> Result<(), StateError> {
    let tx_id = tx.id();

    let mut coin_in: Currency = 0;
    for input in &tx.coin_inputs {
        let output = overlay
            .output(&input.parent_id)
            .ok_or(StateError::OutputNotFound {
                id: input.parent_id,
            })?;
        if input.unlock_conditions.unlock_hash() != output.unlock_hash {
            return Err(StateError::UnlockHashMismatch {
                input: input.parent_id.to_string(),
            });
        }
        coin_in = coin_in
            .checked_add(output.value)
            .ok_or(StateError::Overflow { what: "coin inputs" })?;
        overlay.spend_output(input.parent_id, output);
    }

    let mut fund_in: u64 = 0;
    for input in &tx.fund_inputs {
        let output = overlay
            .fund_output(&input.parent_id)
            .ok_or(StateError::FundOutputNotFound {
                id: input.parent_id,
            })?;
        if input.unlock_conditions.unlock_hash() != output.unlock_hash {
            return Err(StateError::UnlockHashMismatch {
                input: input.parent_id.to_string(),
            });
        }
        fund_in = fund_in
            .checked_add(output.value)
            .ok_or(StateError::Overflow { what: "fund inputs" })?;
        overlay.spend_fund_output(input.parent_id, output);
    }

    let coin_out = spend_side_total(tx)?;
    let fund_out = tx
        .fund_outputs
        .iter()
        .try_fold(0u64, |acc, o| acc.checked_add(o.value))
        .ok_or(StateError::Overflow {
            what: "fund outputs",
        })?;

    if coin_in != coin_out {
        return Err(StateError::CoinImbalance {
            inputs: coin_in,
            outputs: coin_out,
        });
    }
    if fund_in != fund_out {
        return Err(StateError::FundImbalance {
            inputs: fund_in,
            outputs: fund_out,
        });
    }

    for (i, output) in tx.coin_outputs.iter().enumerate() {
        overlay.create_output(coin_output_id(&tx_id, i), *output)?;
    }
    for (i, output) in tx.fund_outputs.iter().enumerate() {
        overlay.create_fund_output(fund_output_id(&tx_id, i), *output)?;
    }
    for (i, terms) in tx.contracts.iter().enumerate() {
        overlay.create_contract(contract_id(&tx_id, i), Contract::new(terms.clone()))?;
    }
    for proof in &tx.storage_proofs {
        check_storage_proof(overlay, proof, height, chain)?;
        overlay.prove_contract(proof.contract_id, height);
    }

    Ok(())
}

/// Coin outputs + contract payouts + fees.
fn spend_side_total(tx: &Transaction) -> Result<Currency, StateError> {
    let outputs = tx
        .coin_outputs
        .iter()
        .try_fold(0u128, |acc, o| acc.checked_add(o.value));
    let payouts = tx
        .contracts
        .iter()
        .try_fold(0u128, |acc, c| acc.checked_add(c.payout));
    outputs
        .zip(payouts)
        .and_then(|(o, p)| o.checked_add(p))
        .and_then(|sum| sum.checked_add(tx.total_fees()?))
        .ok_or(StateError::Overflow {
            what: "coin outputs",
        })
}

fn check_storage_proof<C: ChainView + ?Sized>(
    overlay: &Overlay<'_>,
    proof: &StorageProof,
    height: BlockHeight,
    chain: &C,
) -> Result<(), StateError> {
    let id = proof.contract_id;
    let contract = overlay
        .contract(&id)
        .ok_or(StateError::ContractNotFound { id })?;
    if contract.proven_at.is_some() {
        return Err(StateError::ContractAlreadyProven { id });
    }

    let terms = &contract.terms;
    if height < terms.window_start || height >= terms.window_end {
        return Err(StateError::ProofOutsideWindow {
            id,
            height,
            window_start: terms.window_start,
            window_end: terms.window_end,
        });
    }

    // window_start > formation height, so this never saturates.
    let trigger_height = terms.window_start.saturating_sub(1);
    let trigger = chain
        .canonical_id_at(trigger_height)
        .ok_or(StateError::TriggerBlockUnknown {
            height: trigger_height,
        })?;

    let segments = terms.segment_count();
    let index = storage_proof_segment(&id, &trigger, segments);
    if !merkle::verify_proof(
        &terms.file_merkle_root,
        &proof.segment,
        &proof.hash_set,
        index,
        segments,
    ) {
        return Err(StateError::InvalidStorageProof { id });
    }
    Ok(())
}

fn resolve_expiring_contracts(
    overlay: &mut Overlay<'_>,
    height: BlockHeight,
) -> Result<(), StateError> {
    let expiring: Vec<ContractId> = overlay.base.expiring_at(height).copied().collect();
    for id in expiring {
        let Some(contract) = overlay.contract(&id) else {
            continue;
        };
        let proven = contract.proven_at.is_some();
        overlay.delete_contract(id, contract.clone());
        for (i, output) in contract.resolution_outputs().iter().enumerate() {
            overlay.create_output(contract_payout_id(&id, proven, i), *output)?;
        }
    }
    Ok(())
}

// =============================================================================
// OVERLAY
// =============================================================================

/// Pending view of `base` with the block's diffs so far layered on top.
struct Overlay<'a> {
    base: &'a ConsensusState,
    created_outputs: HashMap<OutputId, CoinOutput>,
    spent_outputs: HashSet<OutputId>,
    created_funds: HashMap<FundOutputId, FundOutput>,
    spent_funds: HashSet<FundOutputId>,
    created_contracts: HashMap<ContractId, Contract>,
    proven: HashMap<ContractId, BlockHeight>,
    deleted_contracts: HashSet<ContractId>,
    diffs: Vec<StateDiff>,
}

impl<'a> Overlay<'a> {
    fn new(base: &'a ConsensusState) -> Self {
        Self {
            base,
            created_outputs: HashMap::new(),
            spent_outputs: HashSet::new(),
            created_funds: HashMap::new(),
            spent_funds: HashSet::new(),
            created_contracts: HashMap::new(),
            proven: HashMap::new(),
            deleted_contracts: HashSet::new(),
            diffs: Vec::new(),
        }
    }

    fn into_diffs(self) -> Vec<StateDiff> {
        self.diffs
    }

    fn output(&self, id: &OutputId) -> Option<CoinOutput> {
        if self.spent_outputs.contains(id) {
            return None;
        }
        self.created_outputs
            .get(id)
            .or_else(|| self.base.output(id))
            .copied()
    }

    fn fund_output(&self, id: &FundOutputId) -> Option<FundOutput> {
        if self.spent_funds.contains(id) {
            return None;
        }
        self.created_funds
            .get(id)
            .or_else(|| self.base.fund_output(id))
            .copied()
    }

    fn contract(&self, id: &ContractId) -> Option<Contract> {
        if self.deleted_contracts.contains(id) {
            return None;
        }
        let mut contract = self
            .created_contracts
            .get(id)
            .or_else(|| self.base.contract(id))
            .cloned()?;
        if let Some(height) = self.proven.get(id) {
            contract.proven_at = Some(*height);
        }
        Some(contract)
    }

    fn spend_output(&mut self, id: OutputId, output: CoinOutput) {
        self.spent_outputs.insert(id);
        self.diffs.push(StateDiff::RemoveOutput { id, output });
    }

    fn spend_fund_output(&mut self, id: FundOutputId, output: FundOutput) {
        self.spent_funds.insert(id);
        self.diffs.push(StateDiff::RemoveFundOutput { id, output });
    }

    fn create_output(&mut self, id: OutputId, output: CoinOutput) -> Result<(), StateError> {
        if self.spent_outputs.contains(&id)
            || self.created_outputs.contains_key(&id)
            || self.base.output(&id).is_some()
        {
            return Err(duplicate("create_output", format!("output {id:?}")));
        }
        self.created_outputs.insert(id, output);
        self.diffs.push(StateDiff::CreateOutput { id, output });
        Ok(())
    }

    fn create_fund_output(
        &mut self,
        id: FundOutputId,
        output: FundOutput,
    ) -> Result<(), StateError> {
        if self.spent_funds.contains(&id)
            || self.created_funds.contains_key(&id)
            || self.base.fund_output(&id).is_some()
        {
            return Err(duplicate("create_fund_output", format!("fund output {id:?}")));
        }
        self.created_funds.insert(id, output);
        self.diffs.push(StateDiff::CreateFundOutput { id, output });
        Ok(())
    }

    fn create_contract(&mut self, id: ContractId, contract: Contract) -> Result<(), StateError> {
        if self.created_contracts.contains_key(&id) || self.base.contract(&id).is_some() {
            return Err(duplicate("create_contract", format!("contract {id:?}")));
        }
        self.created_contracts.insert(id, contract.clone());
        self.diffs.push(StateDiff::CreateContract { id, contract });
        Ok(())
    }

    fn prove_contract(&mut self, id: ContractId, height: BlockHeight) {
        self.proven.insert(id, height);
        self.diffs.push(StateDiff::ApplyContractProof { id, height });
    }

    fn delete_contract(&mut self, id: ContractId, contract: Contract) {
        self.deleted_contracts.insert(id);
        self.diffs.push(StateDiff::DeleteContract { id, contract });
    }
}

fn duplicate(diff: &'static str, what: String) -> StateError {
    StateError::DiffConflict {
        diff,
        reason: format!("{what} created twice"),
    }
}
