//! Write sets for the consensus tables.
//!
//! State entries are synced from the final in-memory state: every key a
//! reverted or applied diff touched is written as it now stands, or deleted
//! if it no longer exists.

use std::collections::BTreeSet;

use qc_02_block_storage::{BlockStore, KeyValueStore, ProcessedBlock, StorageError, WriteSet};
use qc_04_state_management::{consensus_checksum, genesis_diffs, ConsensusState};
use shared_types::StateDiff;

use super::chain::{ChainState, Journal};
use crate::domain::{block_weight, ConsensusConfig, ConsensusError};

pub(super) fn sync_state<'a>(
    writes: &mut WriteSet,
    state: &ConsensusState,
    diffs: impl IntoIterator<Item = &'a StateDiff>,
) -> Result<(), StorageError> {
    let mut outputs = BTreeSet::new();
    let mut fund_outputs = BTreeSet::new();
    let mut contracts = BTreeSet::new();
    for diff in diffs {
        match diff {
            StateDiff::CreateOutput { id, .. } | StateDiff::RemoveOutput { id, .. } => {
                outputs.insert(*id);
            }
            StateDiff::CreateFundOutput { id, .. } | StateDiff::RemoveFundOutput { id, .. } => {
                fund_outputs.insert(*id);
            }
            StateDiff::CreateContract { id, .. }
            | StateDiff::DeleteContract { id, .. }
            | StateDiff::ApplyContractProof { id, .. } => {
                contracts.insert(*id);
            }
        }
    }

    for id in &outputs {
        match state.output(id) {
            Some(output) => writes.put_output(id, output)?,
            None => writes.delete_output(id),
        }
    }
    for id in &fund_outputs {
        match state.fund_output(id) {
            Some(output) => writes.put_fund_output(id, output)?,
            None => writes.delete_fund_output(id),
        }
    }
    for id in &contracts {
        match state.contract(id) {
            Some(contract) => writes.put_contract(id, contract)?,
            None => writes.delete_contract(id),
        }
    }
    Ok(())
}

/// Writes that persist a completed transition.
pub(super) fn transition_writes<KV: KeyValueStore>(
    chain: &ChainState<KV>,
    journal: &Journal,
) -> Result<WriteSet, StorageError> {
    let mut writes = WriteSet::new();
    let store = &chain.store;

    let top = journal.old_height.max(store.height());
    for height in journal.fork_height + 1..=top {
        match store.path_at(height) {
            Some(id) => writes.put_path(height, &id)?,
            None => writes.delete_path(height),
        }
    }

    for id in &journal.fresh {
        let pb = store.get(id).ok_or(StorageError::BlockNotFound { id: *id })?;
        writes.put_block(pb)?;
    }

    let touched = journal
        .reverted
        .iter()
        .chain(&journal.applied)
        .filter_map(|id| store.get(id))
        .flat_map(|pb| pb.diffs.iter());
    sync_state(&mut writes, &chain.state, touched)?;
    Ok(writes)
}

/// A fresh chain holding only the configured genesis block.
pub(super) fn bootstrap(
    config: &ConsensusConfig,
) -> Result<(BlockStore, ConsensusState, WriteSet), ConsensusError> {
    let root = config.root_target;
    let mut genesis = ProcessedBlock::new(config.genesis.block(), 0, block_weight(&root), root);

    let diffs = genesis_diffs(&genesis.block, &config.genesis.fund_allocations);
    let mut state = ConsensusState::new();
    state
        .apply(&diffs)
        .map_err(|e| ConsensusError::Fatal(format!("genesis diffs conflict: {}", e)))?;
    let checksum = consensus_checksum(&state, &genesis.id, 0);
    genesis.record_application(diffs, checksum);

    let mut writes = WriteSet::new();
    writes.put_genesis(&genesis.id)?;
    writes.put_block(&genesis)?;
    writes.put_path(0, &genesis.id)?;
    sync_state(&mut writes, &state, &genesis.diffs)?;

    let store = BlockStore::new(genesis)?;
    Ok((store, state, writes))
}
