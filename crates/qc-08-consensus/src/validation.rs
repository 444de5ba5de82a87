//! Stateless block validation
//!
//! Everything that can be decided from the block, its height, and its
//! ancestry, without looking at the output or contract sets. These checks
//! never mutate anything and are run on every candidate, canonical or not.
//! State-dependent checks happen while computing diffs.

use std::collections::{HashMap, HashSet};

use primitive_types::U256;
use shared_types::{
    Block, BlockHeight, Currency, Hash, Timestamp, Transaction, UnlockConditions,
};

use crate::domain::{meets_target, BlockRejection, ConsensusConfig, ConsensusError};
use crate::ports::SignatureVerifier;

/// What a block is checked against.
#[derive(Debug, Clone)]
pub struct ValidationContext<'a> {
    /// Height the block would occupy.
    pub height: BlockHeight,
    /// The parent's child target.
    pub target: U256,
    /// Timestamps of the parent and its recent ancestors, newest first.
    pub ancestor_timestamps: &'a [Timestamp],
    /// Local time.
    pub now: Timestamp,
}

/// Stateless validation logic for blocks.
pub struct BlockValidator;

impl BlockValidator {
    /// Run every state-independent check.
    ///
    /// A future timestamp is reported as `FutureTimestamp` since the block may
    /// become valid later; every other failure is a permanent `InvalidBlock`.
    pub fn validate(
        block: &Block,
        ctx: &ValidationContext<'_>,
        config: &ConsensusConfig,
        verifier: &dyn SignatureVerifier,
    ) -> Result<(), ConsensusError> {
        let invalid = |reason| ConsensusError::InvalidBlock {
            id: block.id(),
            reason,
        };

        Self::validate_size(block, config).map_err(invalid)?;
        Self::validate_work(block, &ctx.target).map_err(invalid)?;
        Self::validate_median_timestamp(block, ctx.ancestor_timestamps).map_err(invalid)?;
        Self::validate_future_timestamp(block, ctx.now, config)?;
        Self::validate_payouts(block, ctx.height, config).map_err(invalid)?;
        Self::validate_transactions(block, ctx.height, config, verifier).map_err(invalid)?;
        Ok(())
    }

    pub fn validate_size(block: &Block, config: &ConsensusConfig) -> Result<(), BlockRejection> {
        let size = bincode::serialized_size(block)
            .map_err(|e| BlockRejection::Malformed(e.to_string()))?;
        if size > config.max_block_size {
            return Err(BlockRejection::Oversized {
                size,
                limit: config.max_block_size,
            });
        }
        Ok(())
    }

    pub fn validate_work(block: &Block, target: &U256) -> Result<(), BlockRejection> {
        if !meets_target(&block.id(), target) {
            return Err(BlockRejection::InsufficientWork);
        }
        Ok(())
    }

    pub fn validate_median_timestamp(
        block: &Block,
        ancestor_timestamps: &[Timestamp],
    ) -> Result<(), BlockRejection> {
        let Some(median) = median(ancestor_timestamps) else {
            return Ok(());
        };
        if block.timestamp < median {
            return Err(BlockRejection::EarlyTimestamp {
                timestamp: block.timestamp,
                median,
            });
        }
        Ok(())
    }

    pub fn validate_future_timestamp(
        block: &Block,
        now: Timestamp,
        config: &ConsensusConfig,
    ) -> Result<(), ConsensusError> {
        let limit = now.saturating_add(config.future_threshold_secs);
        if block.timestamp > limit {
            return Err(ConsensusError::FutureTimestamp {
                timestamp: block.timestamp,
                limit,
            });
        }
        Ok(())
    }

    /// Payouts must be non-zero and sum to the subsidy plus all fees.
    pub fn validate_payouts(
        block: &Block,
        height: BlockHeight,
        config: &ConsensusConfig,
    ) -> Result<(), BlockRejection> {
        if block.miner_payouts.iter().any(|p| p.value == 0) {
            return Err(BlockRejection::ZeroValueOutput);
        }
        let actual = block
            .miner_payouts
            .iter()
            .try_fold(0 as Currency, |acc, p| acc.checked_add(p.value))
            .ok_or(BlockRejection::Overflow("miner payouts"))?;
        let expected = block
            .total_fees()
            .and_then(|fees| fees.checked_add(config.subsidy(height)))
            .ok_or(BlockRejection::Overflow("miner fees"))?;
        if actual != expected {
            return Err(BlockRejection::BadMinerPayouts { expected, actual });
        }
        Ok(())
    }

    /// Per-transaction rules plus in-block uniqueness of inputs and proofs.
    pub fn validate_transactions(
        block: &Block,
        height: BlockHeight,
        config: &ConsensusConfig,
        verifier: &dyn SignatureVerifier,
    ) -> Result<(), BlockRejection> {
        let mut coin_inputs = HashSet::new();
        let mut fund_inputs = HashSet::new();
        let mut proven = HashSet::new();

        for tx in &block.transactions {
            for input in &tx.coin_inputs {
                if !coin_inputs.insert(input.parent_id) {
                    return Err(BlockRejection::DuplicateInput(input.parent_id.to_string()));
                }
            }
            for input in &tx.fund_inputs {
                if !fund_inputs.insert(input.parent_id) {
                    return Err(BlockRejection::DuplicateInput(input.parent_id.to_string()));
                }
            }
            for proof in &tx.storage_proofs {
                if !proven.insert(proof.contract_id) {
                    return Err(BlockRejection::DuplicateStorageProof(
                        proof.contract_id.to_string(),
                    ));
                }
            }
            Self::validate_transaction(tx, height, config, verifier)?;
        }
        Ok(())
    }

    pub fn validate_transaction(
        tx: &Transaction,
        height: BlockHeight,
        config: &ConsensusConfig,
        verifier: &dyn SignatureVerifier,
    ) -> Result<(), BlockRejection> {
        let zero_coin = tx.coin_outputs.iter().any(|o| o.value == 0);
        let zero_fund = tx.fund_outputs.iter().any(|o| o.value == 0);
        let zero_fee = tx.miner_fees.iter().any(|fee| *fee == 0);
        if zero_coin || zero_fund || zero_fee {
            return Err(BlockRejection::ZeroValueOutput);
        }

        if !tx.contracts.is_empty() && height < config.contract_hardfork_height {
            return Err(BlockRejection::ContractBeforeHardfork {
                height,
                activation: config.contract_hardfork_height,
            });
        }
        for terms in &tx.contracts {
            if terms.window_start <= height {
                return Err(BlockRejection::MalformedContract(format!(
                    "window starts at {} but the contract forms at {}",
                    terms.window_start, height
                )));
            }
            if terms.window_end <= terms.window_start {
                return Err(BlockRejection::MalformedContract(format!(
                    "window [{}, {}) is empty",
                    terms.window_start, terms.window_end
                )));
            }
            if terms.payout == 0 {
                return Err(BlockRejection::ZeroValueOutput);
            }
            for outputs in [&terms.valid_proof_outputs, &terms.missed_proof_outputs] {
                if outputs.iter().any(|o| o.value == 0) {
                    return Err(BlockRejection::ZeroValueOutput);
                }
                let total = outputs
                    .iter()
                    .try_fold(0 as Currency, |acc, o| acc.checked_add(o.value))
                    .ok_or(BlockRejection::Overflow("contract outputs"))?;
                if total != terms.payout {
                    return Err(BlockRejection::MalformedContract(format!(
                        "resolution outputs total {} but the payout is {}",
                        total, terms.payout
                    )));
                }
            }
        }

        let conditions = tx
            .coin_inputs
            .iter()
            .map(|i| (i.parent_id.0, &i.unlock_conditions))
            .chain(
                tx.fund_inputs
                    .iter()
                    .map(|i| (i.parent_id.0, &i.unlock_conditions)),
            );
        for (parent, uc) in conditions.clone() {
            if uc.timelock > height {
                return Err(BlockRejection::PrematureTimelock {
                    input: hex_id(&parent),
                    timelock: uc.timelock,
                });
            }
        }

        Self::validate_signatures(tx, conditions.collect(), verifier)
    }

    /// Every input needs `signatures_required` valid signatures from distinct
    /// keys; a signature that covers no input is invalid.
    fn validate_signatures(
        tx: &Transaction,
        inputs: Vec<(Hash, &UnlockConditions)>,
        verifier: &dyn SignatureVerifier,
    ) -> Result<(), BlockRejection> {
        let message = tx.id();
        let mut by_parent: HashMap<Hash, (&UnlockConditions, HashSet<u64>)> = inputs
            .into_iter()
            .map(|(parent, uc)| (parent, (uc, HashSet::new())))
            .collect();

        for sig in &tx.signatures {
            let (uc, used) = by_parent.get_mut(&sig.parent_id).ok_or_else(|| {
                BlockRejection::InvalidSignature(format!(
                    "signature for unknown input {}",
                    hex_id(&sig.parent_id)
                ))
            })?;
            let key = usize::try_from(sig.public_key_index)
                .ok()
                .and_then(|i| uc.public_keys.get(i))
                .ok_or_else(|| {
                    BlockRejection::InvalidSignature(format!(
                        "key index {} out of range",
                        sig.public_key_index
                    ))
                })?;
            if !used.insert(sig.public_key_index) {
                return Err(BlockRejection::InvalidSignature(format!(
                    "key {} used twice for one input",
                    sig.public_key_index
                )));
            }
            if !verifier.verify(key, message.as_bytes(), &sig.signature) {
                return Err(BlockRejection::InvalidSignature(format!(
                    "signature does not verify for input {}",
                    hex_id(&sig.parent_id)
                )));
            }
        }

        for (parent, (uc, used)) in &by_parent {
            let valid = used.len() as u64;
            if valid < uc.signatures_required {
                return Err(BlockRejection::MissingSignatures {
                    input: hex_id(parent),
                    valid,
                    required: uc.signatures_required,
                });
            }
        }
        Ok(())
    }
}

/// Median of `timestamps`; the lower middle element for an even count.
pub fn median(timestamps: &[Timestamp]) -> Option<Timestamp> {
    if timestamps.is_empty() {
        return None;
    }
    let mut sorted = timestamps.to_vec();
    sorted.sort_unstable();
    Some(sorted[(sorted.len() - 1) / 2])
}

fn hex_id(hash: &Hash) -> String {
    shared_types::BlockId(*hash).to_string()
}
