//! Chain state behind the consensus lock and the in-memory half of a
//! canonical-path change.
//!
//! A transition reverts the canonical blocks above the fork point (highest
//! first) and applies the new branch (lowest first), recording every step in
//! a `Journal`. If any step fails, or the caller cannot persist the result,
//! `undo` replays the journal backwards and the path, state, and cached
//! diffs are exactly as before.

use qc_02_block_storage::{BlockStore, ConsensusDb, KeyValueStore};
use qc_04_state_management::{compute_diffs, consensus_checksum, ConsensusState};
use shared_types::{BlockHeight, BlockId, Hash, NodeState};
use tracing::debug;

use crate::domain::{plan_reorg, BlockRejection};

/// Everything the single writer owns.
pub(super) struct ChainState<KV: KeyValueStore> {
    pub store: BlockStore,
    pub state: ConsensusState,
    pub db: ConsensusDb<KV>,
    pub node_state: NodeState,
}

/// The steps of one transition, in execution order.
#[derive(Debug, Default)]
pub(super) struct Journal {
    pub fork_height: BlockHeight,
    pub old_height: BlockHeight,
    /// Highest first.
    pub reverted: Vec<BlockId>,
    /// Lowest first.
    pub applied: Vec<BlockId>,
    /// Applied blocks whose diffs were computed during this transition.
    pub fresh: Vec<BlockId>,
}

#[derive(Debug, thiserror::Error)]
pub(super) enum TransitionError {
    #[error("block {block} is invalid: {reason}")]
    Invalid {
        block: BlockId,
        reason: BlockRejection,
    },

    #[error("{0}")]
    Fatal(String),
}

fn fatal(message: impl Into<String>) -> TransitionError {
    TransitionError::Fatal(message.into())
}

impl<KV: KeyValueStore> ChainState<KV> {
    /// Checksum of the current head.
    pub fn checksum(&self) -> Hash {
        let head = self.store.head();
        head.consensus_checksum
            .unwrap_or_else(|| consensus_checksum(&self.state, &head.id, head.height))
    }

    /// Make `tip` the head. `tip` must already be in the store.
    pub fn transition(&mut self, tip: &BlockId) -> Result<Journal, TransitionError> {
        let plan = plan_reorg(&self.store, tip).map_err(|e| fatal(e.to_string()))?;
        let mut journal = Journal {
            fork_height: plan.fork_height,
            old_height: self.store.height(),
            ..Default::default()
        };

        for id in &plan.revert {
            if let Err(e) = self.revert_head(id) {
                return Err(self.abandon(&journal, e));
            }
            journal.reverted.push(*id);
        }

        for id in &plan.apply {
            match self.apply_block(id) {
                Ok(fresh) => {
                    journal.applied.push(*id);
                    if fresh {
                        journal.fresh.push(*id);
                    }
                }
                Err(e) => return Err(self.abandon(&journal, e)),
            }
        }
        Ok(journal)
    }

    /// Roll back after a failed step, escalating if the rollback fails too.
    fn abandon(&mut self, journal: &Journal, cause: TransitionError) -> TransitionError {
        match self.undo(journal) {
            Ok(()) => cause,
            Err(undo) => fatal(format!("{}; rollback failed: {}", cause, undo)),
        }
    }

    fn revert_head(&mut self, id: &BlockId) -> Result<(), TransitionError> {
        let popped = self.store.pop_path().map_err(|e| fatal(e.to_string()))?;
        let reverted = self
            .store
            .get(&popped)
            .filter(|_| popped == *id)
            .map(|pb| self.state.revert(&pb.diffs));
        match reverted {
            Some(Ok(())) => {
                debug!("[qc-08] Reverted block {}", id);
                Ok(())
            }
            Some(Err(e)) => {
                let _ = self.store.push_path(popped);
                Err(fatal(format!("reverting {}: {}", id, e)))
            }
            None => {
                let _ = self.store.push_path(popped);
                Err(fatal(format!("head {} is not the planned block {}", popped, id)))
            }
        }
    }

    /// Apply one block on top of the head. Returns true if its diffs were
    /// computed now rather than replayed from the cache.
    fn apply_block(&mut self, id: &BlockId) -> Result<bool, TransitionError> {
        let pb = self
            .store
            .get(id)
            .ok_or_else(|| fatal(format!("block {} missing from the store", id)))?;
        let height = pb.height;

        if pb.diffs_generated {
            self.state
                .apply(&pb.diffs)
                .map_err(|e| fatal(format!("cached diffs of {} conflict: {}", id, e)))?;
            let checksum = consensus_checksum(&self.state, id, height);
            if pb.consensus_checksum != Some(checksum) {
                let _ = self.state.revert(&pb.diffs);
                return Err(fatal(format!(
                    "checksum mismatch re-applying {} at height {}",
                    id, height
                )));
            }
            if let Err(e) = self.store.push_path(*id) {
                if let Some(pb) = self.store.get(id) {
                    let _ = self.state.revert(&pb.diffs);
                }
                return Err(fatal(e.to_string()));
            }
            debug!("[qc-08] Replayed cached diffs of {} at height {}", id, height);
            return Ok(false);
        }

        let diffs = compute_diffs(&pb.block, height, &self.state, self.store.path()).map_err(
            |e| TransitionError::Invalid {
                block: *id,
                reason: e.into(),
            },
        )?;
        self.state
            .apply(&diffs)
            .map_err(|e| fatal(format!("fresh diffs of {} conflict: {}", id, e)))?;
        let checksum = consensus_checksum(&self.state, id, height);
        if let Err(e) = self.store.push_path(*id) {
            let _ = self.state.revert(&diffs);
            return Err(fatal(e.to_string()));
        }
        debug!(
            "[qc-08] Applied {} diffs of {} at height {}",
            diffs.len(),
            id,
            height
        );
        if let Some(pb) = self.store.get_mut(id) {
            pb.record_application(diffs, checksum);
        }
        Ok(true)
    }

    /// Replay `journal` backwards.
    pub fn undo(&mut self, journal: &Journal) -> Result<(), String> {
        for id in journal.applied.iter().rev() {
            let popped = self.store.pop_path().map_err(|e| e.to_string())?;
            if popped != *id {
                return Err(format!("head {} is not the applied block {}", popped, id));
            }
            let pb = self
                .store
                .get(id)
                .ok_or_else(|| format!("block {} missing from the store", id))?;
            self.state
                .revert(&pb.diffs)
                .map_err(|e| format!("reverting {}: {}", id, e))?;
        }

        for id in &journal.fresh {
            if let Some(pb) = self.store.get_mut(id) {
                pb.clear_application();
            }
        }

        for id in journal.reverted.iter().rev() {
            let pb = self
                .store
                .get(id)
                .ok_or_else(|| format!("block {} missing from the store", id))?;
            self.state
                .apply(&pb.diffs)
                .map_err(|e| format!("re-applying {}: {}", id, e))?;
            self.store.push_path(*id).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}
