//! Recording subscriber
//!
//! Keeps every notified change in memory. Used by tests and tooling that
//! want to inspect the sequence of head changes.

use crate::domain::ConsensusChange;
use crate::ports::ChangeSubscriber;

pub struct RecordingSubscriber {
    changes: parking_lot::RwLock<Vec<ConsensusChange>>,
}

impl RecordingSubscriber {
    pub fn new() -> Self {
        Self {
            changes: parking_lot::RwLock::new(Vec::new()),
        }
    }

    pub fn changes(&self) -> Vec<ConsensusChange> {
        self.changes.read().clone()
    }

    pub fn change_count(&self) -> usize {
        self.changes.read().len()
    }

    pub fn last(&self) -> Option<ConsensusChange> {
        self.changes.read().last().cloned()
    }
}

impl Default for RecordingSubscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeSubscriber for RecordingSubscriber {
    fn on_consensus_change(&self, change: &ConsensusChange) {
        self.changes.write().push(change.clone());
    }
}
