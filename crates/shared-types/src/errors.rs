//! # Node State
//!
//! Operational state shared across subsystems.

/// Node operational states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeState {
    /// Normal operation.
    #[default]
    Running,
    /// Halted after a failure that could leave state inconsistent
    /// (awaiting intervention).
    HaltedAwaitingIntervention,
}

impl NodeState {
    pub fn is_halted(&self) -> bool {
        matches!(self, NodeState::HaltedAwaitingIntervention)
    }
}
