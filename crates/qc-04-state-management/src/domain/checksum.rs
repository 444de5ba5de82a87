//! # Consistency Checksum
//!
//! Keccak-256 digest over the full consensus state plus the head. Entries
//! are fed in key order, so the digest depends only on set contents, never
//! on the order in which blocks were applied.

use sha3::{Digest, Keccak256};
use shared_types::{BlockHeight, BlockId, CoinOutput, Contract, FundOutput, Hash};

use super::ConsensusState;

const OUTPUTS_TAG: &[u8] = b"outputs";
const FUND_OUTPUTS_TAG: &[u8] = b"fund-outputs";
const CONTRACTS_TAG: &[u8] = b"contracts";
const HEAD_TAG: &[u8] = b"head";

/// Checksum of `state` with the given head.
pub fn consensus_checksum(
    state: &ConsensusState,
    head_id: &BlockId,
    head_height: BlockHeight,
) -> Hash {
    let mut hasher = Keccak256::new();

    section(&mut hasher, OUTPUTS_TAG, state.outputs().count());
    for (id, output) in state.outputs() {
        hasher.update(id.as_bytes());
        coin_output(&mut hasher, output);
    }

    section(&mut hasher, FUND_OUTPUTS_TAG, state.fund_outputs().count());
    for (id, output) in state.fund_outputs() {
        hasher.update(id.as_bytes());
        fund_output(&mut hasher, output);
    }

    section(&mut hasher, CONTRACTS_TAG, state.contracts().count());
    for (id, contract) in state.contracts() {
        hasher.update(id.as_bytes());
        contract_entry(&mut hasher, contract);
    }

    hasher.update(HEAD_TAG);
    hasher.update(head_id.as_bytes());
    hasher.update(head_height.to_le_bytes());

    hasher.finalize().into()
}

fn section(hasher: &mut Keccak256, tag: &[u8], len: usize) {
    hasher.update(tag);
    hasher.update((len as u64).to_le_bytes());
}

fn coin_output(hasher: &mut Keccak256, output: &CoinOutput) {
    hasher.update(output.value.to_le_bytes());
    hasher.update(output.unlock_hash.as_bytes());
}

fn fund_output(hasher: &mut Keccak256, output: &FundOutput) {
    hasher.update(output.value.to_le_bytes());
    hasher.update(output.unlock_hash.as_bytes());
}

fn contract_entry(hasher: &mut Keccak256, contract: &Contract) {
    let terms = &contract.terms;
    hasher.update(terms.file_size.to_le_bytes());
    hasher.update(terms.file_merkle_root);
    hasher.update(terms.window_start.to_le_bytes());
    hasher.update(terms.window_end.to_le_bytes());
    hasher.update(terms.payout.to_le_bytes());
    hasher.update((terms.valid_proof_outputs.len() as u64).to_le_bytes());
    for output in &terms.valid_proof_outputs {
        coin_output(hasher, output);
    }
    hasher.update((terms.missed_proof_outputs.len() as u64).to_le_bytes());
    for output in &terms.missed_proof_outputs {
        coin_output(hasher, output);
    }
    hasher.update(terms.unlock_hash.as_bytes());
    match contract.proven_at {
        Some(height) => {
            hasher.update([1u8]);
            hasher.update(height.to_le_bytes());
        }
        None => hasher.update([0u8]),
    }
}
