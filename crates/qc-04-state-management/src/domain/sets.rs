//! # Consensus State Sets
//!
//! The mutable state the canonical chain produces: unspent coin outputs,
//! unspent fund outputs, and open contracts.
//!
//! ## Invariants
//!
//! - An entry is present iff an applied block created it and no later
//!   applied block removed it.
//! - `revert(d)` after `apply(d)` restores a bit-identical state.
//! - The expiration index is derived from the contract set and is never
//!   persisted on its own.

use std::collections::{BTreeMap, BTreeSet};

use shared_types::{
    BlockHeight, CoinOutput, Contract, ContractId, Currency, FundOutput, FundOutputId, OutputId,
    StateDiff,
};
use tracing::debug;

use super::StateError;

/// Owned handle over the three consensus sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsensusState {
    outputs: BTreeMap<OutputId, CoinOutput>,
    fund_outputs: BTreeMap<FundOutputId, FundOutput>,
    contracts: BTreeMap<ContractId, Contract>,
    /// window_end -> contracts resolving at that height
    expirations: BTreeMap<BlockHeight, BTreeSet<ContractId>>,
}

impl ConsensusState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted entries. The expiration index is derived.
    pub fn from_parts(
        outputs: impl IntoIterator<Item = (OutputId, CoinOutput)>,
        fund_outputs: impl IntoIterator<Item = (FundOutputId, FundOutput)>,
        contracts: impl IntoIterator<Item = (ContractId, Contract)>,
    ) -> Self {
        let mut state = Self {
            outputs: outputs.into_iter().collect(),
            fund_outputs: fund_outputs.into_iter().collect(),
            ..Self::default()
        };
        for (id, contract) in contracts {
            state.insert_contract(id, contract);
        }
        state
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn output(&self, id: &OutputId) -> Option<&CoinOutput> {
        self.outputs.get(id)
    }

    pub fn fund_output(&self, id: &FundOutputId) -> Option<&FundOutput> {
        self.fund_outputs.get(id)
    }

    pub fn contract(&self, id: &ContractId) -> Option<&Contract> {
        self.contracts.get(id)
    }

    pub fn outputs(&self) -> impl Iterator<Item = (&OutputId, &CoinOutput)> {
        self.outputs.iter()
    }

    pub fn fund_outputs(&self) -> impl Iterator<Item = (&FundOutputId, &FundOutput)> {
        self.fund_outputs.iter()
    }

    pub fn contracts(&self) -> impl Iterator<Item = (&ContractId, &Contract)> {
        self.contracts.iter()
    }

    /// Contracts whose window closes at `height`, in ID order.
    pub fn expiring_at(&self, height: BlockHeight) -> impl Iterator<Item = &ContractId> {
        self.expirations.get(&height).into_iter().flatten()
    }

    /// Coins held in outputs plus coins locked in open contracts.
    pub fn coin_supply(&self) -> Option<Currency> {
        let in_outputs = self
            .outputs
            .values()
            .try_fold(0u128, |acc, o| acc.checked_add(o.value))?;
        self.contracts
            .values()
            .try_fold(in_outputs, |acc, c| acc.checked_add(c.terms.payout))
    }

    pub fn fund_supply(&self) -> Option<u64> {
        self.fund_outputs
            .values()
            .try_fold(0u64, |acc, o| acc.checked_add(o.value))
    }

    pub fn len(&self) -> usize {
        self.outputs.len() + self.fund_outputs.len() + self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =========================================================================
    // APPLY / REVERT
    // =========================================================================

    /// Apply a diff set in order. On conflict the diffs already applied are
    /// reverted, leaving the state unchanged.
    pub fn apply(&mut self, diffs: &[StateDiff]) -> Result<(), StateError> {
        for (i, diff) in diffs.iter().enumerate() {
            if let Err(e) = self.apply_diff(diff) {
                self.rollback_applied(&diffs[..i]);
                return Err(e);
            }
        }
        debug!(diffs = diffs.len(), "Applied diff set");
        Ok(())
    }

    /// Revert a diff set in reverse order. On conflict the diffs already
    /// reverted are re-applied, leaving the state unchanged.
    pub fn revert(&mut self, diffs: &[StateDiff]) -> Result<(), StateError> {
        for (i, diff) in diffs.iter().enumerate().rev() {
            if let Err(e) = self.revert_diff(diff) {
                self.rollback_reverted(&diffs[i + 1..]);
                return Err(e);
            }
        }
        debug!(diffs = diffs.len(), "Reverted diff set");
        Ok(())
    }

    fn rollback_applied(&mut self, applied: &[StateDiff]) {
        for diff in applied.iter().rev() {
            // Cannot fail: each diff was just applied successfully.
            let _ = self.revert_diff(diff);
        }
    }

    fn rollback_reverted(&mut self, reverted: &[StateDiff]) {
        for diff in reverted {
            let _ = self.apply_diff(diff);
        }
    }

    fn apply_diff(&mut self, diff: &StateDiff) -> Result<(), StateError> {
        match diff {
            StateDiff::CreateOutput { id, output } => {
                if self.outputs.contains_key(id) {
                    return Err(conflict(diff, format!("output {id:?} already exists")));
                }
                self.outputs.insert(*id, *output);
            }
            StateDiff::RemoveOutput { id, output } => {
                self.take_output(diff, id, output)?;
            }
            StateDiff::CreateFundOutput { id, output } => {
                if self.fund_outputs.contains_key(id) {
                    return Err(conflict(diff, format!("fund output {id:?} already exists")));
                }
                self.fund_outputs.insert(*id, *output);
            }
            StateDiff::RemoveFundOutput { id, output } => {
                self.take_fund_output(diff, id, output)?;
            }
            StateDiff::CreateContract { id, contract } => {
                if self.contracts.contains_key(id) {
                    return Err(conflict(diff, format!("contract {id:?} already exists")));
                }
                self.insert_contract(*id, contract.clone());
            }
            StateDiff::DeleteContract { id, contract } => {
                self.take_contract(diff, id, contract)?;
            }
            StateDiff::ApplyContractProof { id, height } => {
                let stored = self
                    .contracts
                    .get_mut(id)
                    .ok_or_else(|| conflict(diff, format!("contract {id:?} missing")))?;
                if stored.proven_at.is_some() {
                    return Err(conflict(diff, format!("contract {id:?} already proven")));
                }
                stored.proven_at = Some(*height);
            }
        }
        Ok(())
    }

    fn revert_diff(&mut self, diff: &StateDiff) -> Result<(), StateError> {
        match diff {
            StateDiff::CreateOutput { id, output } => {
                self.take_output(diff, id, output)?;
            }
            StateDiff::RemoveOutput { id, output } => {
                if self.outputs.contains_key(id) {
                    return Err(conflict(diff, format!("output {id:?} already exists")));
                }
                self.outputs.insert(*id, *output);
            }
            StateDiff::CreateFundOutput { id, output } => {
                self.take_fund_output(diff, id, output)?;
            }
            StateDiff::RemoveFundOutput { id, output } => {
                if self.fund_outputs.contains_key(id) {
                    return Err(conflict(diff, format!("fund output {id:?} already exists")));
                }
                self.fund_outputs.insert(*id, *output);
            }
            StateDiff::CreateContract { id, contract } => {
                self.take_contract(diff, id, contract)?;
            }
            StateDiff::DeleteContract { id, contract } => {
                if self.contracts.contains_key(id) {
                    return Err(conflict(diff, format!("contract {id:?} already exists")));
                }
                self.insert_contract(*id, contract.clone());
            }
            StateDiff::ApplyContractProof { id, height } => {
                let stored = self
                    .contracts
                    .get_mut(id)
                    .ok_or_else(|| conflict(diff, format!("contract {id:?} missing")))?;
                if stored.proven_at != Some(*height) {
                    return Err(conflict(
                        diff,
                        format!("contract {id:?} not proven at height {height}"),
                    ));
                }
                stored.proven_at = None;
            }
        }
        Ok(())
    }

    fn take_output(
        &mut self,
        diff: &StateDiff,
        id: &OutputId,
        expected: &CoinOutput,
    ) -> Result<(), StateError> {
        match self.outputs.get(id) {
            Some(stored) if stored == expected => {
                self.outputs.remove(id);
                Ok(())
            }
            Some(_) => Err(conflict(diff, format!("output {id:?} differs"))),
            None => Err(conflict(diff, format!("output {id:?} missing"))),
        }
    }

    fn take_fund_output(
        &mut self,
        diff: &StateDiff,
        id: &FundOutputId,
        expected: &FundOutput,
    ) -> Result<(), StateError> {
        match self.fund_outputs.get(id) {
            Some(stored) if stored == expected => {
                self.fund_outputs.remove(id);
                Ok(())
            }
            Some(_) => Err(conflict(diff, format!("fund output {id:?} differs"))),
            None => Err(conflict(diff, format!("fund output {id:?} missing"))),
        }
    }

    fn take_contract(
        &mut self,
        diff: &StateDiff,
        id: &ContractId,
        expected: &Contract,
    ) -> Result<(), StateError> {
        match self.contracts.get(id) {
            Some(stored) if stored == expected => {
                self.remove_contract(id);
                Ok(())
            }
            Some(_) => Err(conflict(diff, format!("contract {id:?} differs"))),
            None => Err(conflict(diff, format!("contract {id:?} missing"))),
        }
    }

    fn insert_contract(&mut self, id: ContractId, contract: Contract) {
        self.expirations
            .entry(contract.terms.window_end)
            .or_default()
            .insert(id);
        self.contracts.insert(id, contract);
    }

    fn remove_contract(&mut self, id: &ContractId) {
        if let Some(contract) = self.contracts.remove(id) {
            let window_end = contract.terms.window_end;
            if let Some(ids) = self.expirations.get_mut(&window_end) {
                ids.remove(id);
                if ids.is_empty() {
                    self.expirations.remove(&window_end);
                }
            }
        }
    }
}

fn conflict(diff: &StateDiff, reason: String) -> StateError {
    StateError::DiffConflict {
        diff: diff.kind(),
        reason,
    }
}
