//! Consensus Service - the consensus set
//!
//! # Architecture
//! - Single writer: `accept_block` holds the write lock for its whole run
//! - Subscribers see changes in commit order, even with concurrent callers
//! - Heaviest cumulative weight wins; ties keep the current head
//! - Every accepted block commits exactly one atomic write set
//! - Aborted reorgs roll back in memory and mark the offending branch invalid
//! - An unrecoverable inconsistency halts the service

mod chain;
mod persist;


use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use primitive_types::U256;
use qc_02_block_storage::{
    BlockStore, ConsensusDb, InMemoryKVStore, KeyValueStore, ProcessedBlock, WriteSet,
};
use qc_04_state_management::{consensus_checksum, ConsensusState};
use shared_types::{
    Block, BlockHeight, BlockId, CoinOutput, Contract, ContractId, Currency, FundOutput,
    FundOutputId, Hash, NodeState, OutputId, Transaction, UnlockHash,
};
use tracing::{error, info, warn};

use self::chain::{ChainState, Journal, TransitionError};
use crate::adapters::Ed25519Verifier;
use crate::domain::{
    adjust_target, block_weight, is_heavier, AcceptOutcome, BlockRejection, ConsensusChange,
    ConsensusConfig, ConsensusError, ConsensusResult,
};
use crate::metrics;
use crate::ports::{ChangeSubscriber, ConsensusApi, SignatureVerifier, SystemTimeSource, TimeSource};
use crate::validation::{BlockValidator, ValidationContext};

/// Dependencies for ConsensusSet
pub struct ConsensusDependencies {
    pub config: ConsensusConfig,
    pub sig_verifier: Arc<dyn SignatureVerifier>,
}

impl ConsensusDependencies {
    /// Ed25519 signatures.
    pub fn new(config: ConsensusConfig) -> Self {
        Self {
            config,
            sig_verifier: Arc::new(Ed25519Verifier),
        }
    }
}

/// An unsolved child block and the target it has to meet.
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub block: Block,
    pub height: BlockHeight,
    pub target: U256,
}

/// The consensus set: block store, state sets, and their persistence.
pub struct ConsensusSet<KV: KeyValueStore> {
    chain: RwLock<ChainState<KV>>,
    config: ConsensusConfig,
    sig_verifier: Arc<dyn SignatureVerifier>,
    time_source: Box<dyn TimeSource>,
    subscribers: RwLock<Vec<Arc<dyn ChangeSubscriber>>>,
    /// Held from before the chain lock until subscribers are notified.
    commit_order: Mutex<()>,
}

impl ConsensusSet<InMemoryKVStore> {
    /// A fresh, non-persistent consensus set.
    pub fn in_memory(config: ConsensusConfig) -> ConsensusResult<Self> {
        Self::open(InMemoryKVStore::new(), ConsensusDependencies::new(config))
    }
}

impl<KV: KeyValueStore> ConsensusSet<KV> {
    /// Open the consensus set over `kv_store`.
    ///
    /// An empty store is initialised with the configured genesis. Otherwise
    /// every table is reloaded and the head checksum is verified against the
    /// one recorded when the head was applied.
    pub fn open(kv_store: KV, deps: ConsensusDependencies) -> ConsensusResult<Self> {
        let mut db = ConsensusDb::new(kv_store);
        let config = deps.config;

        let (store, state) = if db.is_initialized()? {
            Self::recover(&db, &config)?
        } else {
            let (store, state, writes) = persist::bootstrap(&config)?;
            db.commit(writes)?;
            info!("[qc-08] Initialized chain at genesis {}", store.genesis_id());
            (store, state)
        };
        metrics::set_chain_height(store.height());

        Ok(Self {
            chain: RwLock::new(ChainState {
                store,
                state,
                db,
                node_state: NodeState::Running,
            }),
            config,
            sig_verifier: deps.sig_verifier,
            time_source: Box::new(SystemTimeSource),
            subscribers: RwLock::new(Vec::new()),
            commit_order: Mutex::new(()),
        })
    }

    fn recover(
        db: &ConsensusDb<KV>,
        config: &ConsensusConfig,
    ) -> ConsensusResult<(BlockStore, ConsensusState)> {
        let persisted = db.load()?;
        let expected = config.genesis.block().id();
        if persisted.genesis_id != expected {
            return Err(ConsensusError::Fatal(format!(
                "stored genesis {} differs from configured genesis {}",
                persisted.genesis_id, expected
            )));
        }

        let store = BlockStore::from_parts(persisted.blocks, persisted.path, persisted.invalid)?;
        let state = ConsensusState::from_parts(
            persisted.outputs,
            persisted.fund_outputs,
            persisted.contracts,
        );

        let head = store.head();
        let checksum = consensus_checksum(&state, &head.id, head.height);
        if head.consensus_checksum != Some(checksum) {
            return Err(ConsensusError::Fatal(format!(
                "recovered state does not match the checksum recorded for head {}",
                head.id
            )));
        }
        info!(
            "[qc-08] Recovered chain: head {} at height {}, {} blocks stored",
            head.id,
            head.height,
            store.len()
        );
        Ok((store, state))
    }

    /// Set custom time source (for testing)
    pub fn with_time_source(mut self, time_source: Box<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    pub fn subscribe(&self, subscriber: Arc<dyn ChangeSubscriber>) {
        self.subscribers.write().push(subscriber);
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// Give back the underlying store.
    pub fn into_kv_store(self) -> KV {
        self.chain.into_inner().db.into_kv_store()
    }

    // =========================================================================
    // ACCEPT BLOCK
    // =========================================================================

    /// Validate `block` and fold it into the chain.
    pub fn accept_block(&self, block: Block) -> ConsensusResult<AcceptOutcome> {
        let _ordered = self.commit_order.lock();
        let result = {
            let mut chain = self.chain.write();
            self.accept_locked(&mut chain, block)
        };

        match result {
            Ok((outcome, change)) => {
                let label = match &outcome {
                    AcceptOutcome::Extended => "extended",
                    AcceptOutcome::SideBranch => "side_branch",
                    AcceptOutcome::Reorganized { .. } => "reorganized",
                };
                metrics::record_block_accepted(label);
                if let Some(change) = change {
                    metrics::set_chain_height(change.height);
                    for subscriber in self.subscribers.read().iter() {
                        subscriber.on_consensus_change(&change);
                    }
                }
                Ok(outcome)
            }
            Err(e) => {
                metrics::record_block_rejected(e.label());
                Err(e)
            }
        }
    }

    fn accept_locked(
        &self,
        chain: &mut ChainState<KV>,
        block: Block,
    ) -> ConsensusResult<(AcceptOutcome, Option<ConsensusChange>)> {
        if chain.node_state.is_halted() {
            return Err(ConsensusError::Halted);
        }

        let id = block.id();
        if chain.store.is_invalid(&id) {
            return Err(ConsensusError::InvalidBlock {
                id,
                reason: BlockRejection::KnownInvalid,
            });
        }
        if chain.store.contains(&id) {
            return Err(ConsensusError::BlockKnown(id));
        }

        let parent_id = block.parent_id;
        let (parent_height, parent_target, parent_weight) = match chain.store.get(&parent_id) {
            Some(parent) => (parent.height, parent.child_target, parent.cumulative_weight),
            None => return Err(ConsensusError::OrphanBlock { parent: parent_id }),
        };
        if chain.store.is_invalid(&parent_id) {
            return Err(self.reject(chain, id, BlockRejection::InvalidAncestor));
        }

        let height = parent_height + 1;
        let timestamps = chain
            .store
            .recent_timestamps(&parent_id, self.config.median_timestamp_window);
        let ctx = ValidationContext {
            height,
            target: parent_target,
            ancestor_timestamps: &timestamps,
            now: self.time_source.now(),
        };
        if let Err(e) =
            BlockValidator::validate(&block, &ctx, &self.config, self.sig_verifier.as_ref())
        {
            return Err(match e {
                ConsensusError::InvalidBlock { reason, .. } => self.reject(chain, id, reason),
                other => {
                    warn!("[qc-08] Deferred block {}: {}", id, other);
                    other
                }
            });
        }

        let child_target = self.child_target_of(&chain.store, &block, height, &parent_target)?;
        let weight = parent_weight.saturating_add(block_weight(&parent_target));
        let processed = ProcessedBlock::new(block, height, weight, child_target);

        if !is_heavier(&weight, &chain.store.head().cumulative_weight) {
            return self.store_side_block(chain, processed);
        }

        let extends_head = parent_id == chain.store.head_id();
        chain.store.insert(processed)?;
        match chain.transition(&id) {
            Ok(journal) => self.commit_transition(chain, journal, id),
            Err(TransitionError::Invalid { block, reason }) => {
                Err(self.abort(chain, id, block, reason, extends_head))
            }
            Err(TransitionError::Fatal(message)) => Err(self.halt(chain, message)),
        }
    }

    /// Target the children of `block` must meet.
    fn child_target_of(
        &self,
        store: &BlockStore,
        block: &Block,
        height: BlockHeight,
        target: &U256,
    ) -> ConsensusResult<U256> {
        let window_start = height.saturating_sub(self.config.target_window.max(1));
        let start_timestamp = store
            .ancestor_at(&block.parent_id, window_start)
            .map(|pb| pb.timestamp())
            .ok_or(qc_02_block_storage::StorageError::HeightNotFound {
                height: window_start,
            })?;
        Ok(adjust_target(
            target,
            block.timestamp.saturating_sub(start_timestamp),
            height - window_start,
            self.config.block_frequency_secs,
            &self.config.root_target,
        ))
    }

    fn store_side_block(
        &self,
        chain: &mut ChainState<KV>,
        processed: ProcessedBlock,
    ) -> ConsensusResult<(AcceptOutcome, Option<ConsensusChange>)> {
        let id = processed.id;
        let height = processed.height;
        let mut writes = WriteSet::new();
        writes.put_block(&processed)?;
        chain.store.insert(processed)?;
        if let Err(e) = chain.db.commit(writes) {
            let _ = chain.store.remove_leaf(&id);
            return Err(e.into());
        }
        info!(
            "[qc-08] Stored side-branch block {} at height {} (head stays at {})",
            id,
            height,
            chain.store.height()
        );
        Ok((AcceptOutcome::SideBranch, None))
    }

    fn commit_transition(
        &self,
        chain: &mut ChainState<KV>,
        journal: Journal,
        tip: BlockId,
    ) -> ConsensusResult<(AcceptOutcome, Option<ConsensusChange>)> {
        let committed =
            persist::transition_writes(chain, &journal).and_then(|writes| chain.db.commit(writes));
        if let Err(e) = committed {
            if let Err(undo) = chain.undo(&journal) {
                return Err(self.halt(
                    chain,
                    format!("commit failed ({}) and rollback failed: {}", e, undo),
                ));
            }
            let _ = chain.store.remove_leaf(&tip);
            warn!("[qc-08] Rolled back block {} after failed commit: {}", tip, e);
            return Err(e.into());
        }

        let change = ConsensusChange {
            reverted: journal.reverted,
            applied: journal.applied,
            head: chain.store.head_id(),
            height: chain.store.height(),
            checksum: chain.checksum(),
        };

        let outcome = if change.reverted.is_empty() && change.applied.len() == 1 {
            info!(
                "[qc-08] Extended chain to height {} with {}",
                change.height, change.head
            );
            AcceptOutcome::Extended
        } else {
            info!(
                "[qc-08] Reorganized: reverted {} blocks, applied {}, head {} at height {}",
                change.reverted.len(),
                change.applied.len(),
                change.head,
                change.height
            );
            metrics::record_reorg(change.reverted.len());
            AcceptOutcome::Reorganized {
                reverted: change.reverted.clone(),
                applied: change.applied.clone(),
            }
        };
        Ok((outcome, Some(change)))
    }

    /// Bookkeeping for a branch that failed while being applied.
    ///
    /// The transition has already been rolled back. The tip stays stored so
    /// its children are recognised; `failed` and everything stored above it
    /// become permanently invalid.
    fn abort(
        &self,
        chain: &mut ChainState<KV>,
        tip: BlockId,
        failed: BlockId,
        reason: BlockRejection,
        extends_head: bool,
    ) -> ConsensusError {
        let mut doomed = vec![failed];
        doomed.extend(chain.store.descendants(&failed));

        let mut writes = WriteSet::new();
        if let Some(pb) = chain.store.get(&tip) {
            if let Err(e) = writes.put_block(pb) {
                warn!("[qc-08] Failed to encode block {}: {}", tip, e);
            }
        }
        for id in &doomed {
            chain.store.mark_invalid(*id);
            writes.mark_invalid(id);
        }
        if let Err(e) = chain.db.commit(writes) {
            warn!("[qc-08] Failed to persist invalid marks: {}", e);
        }

        if extends_head {
            warn!("[qc-08] Rejected block {}: {}", tip, reason);
            ConsensusError::InvalidBlock { id: tip, reason }
        } else {
            warn!(
                "[qc-08] Reorg to {} aborted at {}: {} ({} blocks marked invalid)",
                tip,
                failed,
                reason,
                doomed.len()
            );
            ConsensusError::ReorgAborted {
                block: failed,
                reason,
            }
        }
    }

    /// Permanently reject a block that never entered the store.
    fn reject(
        &self,
        chain: &mut ChainState<KV>,
        id: BlockId,
        reason: BlockRejection,
    ) -> ConsensusError {
        chain.store.mark_invalid(id);
        let mut writes = WriteSet::new();
        writes.mark_invalid(&id);
        if let Err(e) = chain.db.commit(writes) {
            warn!("[qc-08] Failed to persist invalid mark for {}: {}", id, e);
        }
        warn!("[qc-08] Rejected block {}: {}", id, reason);
        ConsensusError::InvalidBlock { id, reason }
    }

    fn halt(&self, chain: &mut ChainState<KV>, message: String) -> ConsensusError {
        chain.node_state = NodeState::HaltedAwaitingIntervention;
        error!("[qc-08] FATAL: {}; halting until intervention", message);
        ConsensusError::Fatal(message)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn current_height(&self) -> BlockHeight {
        self.chain.read().store.height()
    }

    pub fn current_block(&self) -> ProcessedBlock {
        self.chain.read().store.head().clone()
    }

    pub fn head_id(&self) -> BlockId {
        self.chain.read().store.head_id()
    }

    pub fn genesis_id(&self) -> BlockId {
        self.chain.read().store.genesis_id()
    }

    pub fn block_at_height(&self, height: BlockHeight) -> Option<BlockId> {
        self.chain.read().store.path_at(height)
    }

    pub fn processed_block(&self, id: &BlockId) -> Option<ProcessedBlock> {
        self.chain.read().store.get(id).cloned()
    }

    pub fn in_current_path(&self, id: &BlockId) -> bool {
        self.chain.read().store.is_canonical(id)
    }

    pub fn is_invalid(&self, id: &BlockId) -> bool {
        self.chain.read().store.is_invalid(id)
    }

    pub fn consensus_checksum(&self) -> Hash {
        self.chain.read().checksum()
    }

    /// Target a child of the current head must meet.
    pub fn child_target(&self) -> U256 {
        self.chain.read().store.head().child_target
    }

    pub fn node_state(&self) -> NodeState {
        self.chain.read().node_state
    }

    pub fn output(&self, id: &OutputId) -> Option<CoinOutput> {
        self.chain.read().state.output(id).cloned()
    }

    pub fn fund_output(&self, id: &FundOutputId) -> Option<FundOutput> {
        self.chain.read().state.fund_output(id).cloned()
    }

    pub fn contract(&self, id: &ContractId) -> Option<Contract> {
        self.chain.read().state.contract(id).cloned()
    }

    /// Snapshot of the three state sets.
    pub fn state_snapshot(&self) -> ConsensusState {
        self.chain.read().state.clone()
    }

    /// Unsolved child of `parent` paying the subsidy and all fees to `payout`.
    pub fn block_template(
        &self,
        parent: &BlockId,
        payout: UnlockHash,
        transactions: Vec<Transaction>,
    ) -> ConsensusResult<BlockTemplate> {
        let chain = self.chain.read();
        let parent_block = chain
            .store
            .get(parent)
            .ok_or(ConsensusError::OrphanBlock { parent: *parent })?;
        let height = parent_block.height + 1;

        let mut block = Block {
            parent_id: *parent,
            nonce: 0,
            timestamp: parent_block.timestamp() + self.config.block_frequency_secs,
            miner_payouts: Vec::new(),
            transactions,
        };
        let value = block
            .total_fees()
            .and_then(|fees| fees.checked_add(self.config.subsidy(height)))
            .ok_or_else(|| ConsensusError::InvalidBlock {
                id: block.id(),
                reason: BlockRejection::Overflow("miner fees"),
            })?;
        block.miner_payouts.push(CoinOutput {
            value,
            unlock_hash: payout,
        });

        Ok(BlockTemplate {
            block,
            height,
            target: parent_block.child_target,
        })
    }

    /// Verify the head checksum and the coin and fund supply.
    ///
    /// Coins in outputs and open contracts must equal the genesis allocation
    /// plus every subsidy paid along the canonical path; funds never change.
    pub fn check_consistency(&self) -> ConsensusResult<()> {
        let chain = self.chain.read();
        let head = chain.store.head();

        let checksum = consensus_checksum(&chain.state, &head.id, head.height);
        if head.consensus_checksum != Some(checksum) {
            return Err(ConsensusError::Fatal(format!(
                "state checksum diverged from the one recorded for {}",
                head.id
            )));
        }

        let genesis_coins = self
            .config
            .genesis
            .coin_allocations
            .iter()
            .try_fold(0 as Currency, |acc, o| acc.checked_add(o.value));
        let mut expected_coins = genesis_coins;
        for height in 1..=head.height {
            expected_coins =
                expected_coins.and_then(|total| total.checked_add(self.config.subsidy(height)));
        }
        if chain.state.coin_supply() != expected_coins {
            return Err(ConsensusError::Fatal(format!(
                "coin supply {:?}, expected {:?}",
                chain.state.coin_supply(),
                expected_coins
            )));
        }

        let expected_funds = self
            .config
            .genesis
            .fund_allocations
            .iter()
            .try_fold(0u64, |acc, o| acc.checked_add(o.value));
        if chain.state.fund_supply() != expected_funds {
            return Err(ConsensusError::Fatal(format!(
                "fund supply {:?}, expected {:?}",
                chain.state.fund_supply(),
                expected_funds
            )));
        }
        Ok(())
    }
}

impl<KV: KeyValueStore> ConsensusApi for ConsensusSet<KV> {
    fn accept_block(&self, block: Block) -> Result<AcceptOutcome, ConsensusError> {
        ConsensusSet::accept_block(self, block)
    }

    fn current_height(&self) -> BlockHeight {
        ConsensusSet::current_height(self)
    }

    fn block_at_height(&self, height: BlockHeight) -> Option<BlockId> {
        ConsensusSet::block_at_height(self, height)
    }

    fn processed_block(&self, id: &BlockId) -> Option<ProcessedBlock> {
        ConsensusSet::processed_block(self, id)
    }

    fn consensus_checksum(&self) -> Hash {
        ConsensusSet::consensus_checksum(self)
    }

    fn node_state(&self) -> NodeState {
        ConsensusSet::node_state(self)
    }
}
