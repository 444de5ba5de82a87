//! # qc-04-state-management
//!
//! State Management subsystem: the consensus state sets and the diffs that
//! move them between blocks.
//!
//! ## Role in System
//!
//! - **Unspent Output Set / Fund Output Set / Contract Set**: `ConsensusState`
//! - **Diff Engine**: `compute_diffs`, `ConsensusState::apply`, `ConsensusState::revert`
//! - **Consistency Checksum**: `consensus_checksum`
//!
//! ## Flow
//!
//! ```text
//! [Consensus (8)] ──block, height──→ compute_diffs(state, chain view)
//!        │                                   │
//!        │                               Vec<StateDiff>
//!        ↓                                   ↓
//!  ConsensusState::apply / revert ──→ consensus_checksum(state, head)
//! ```
//!
//! Nothing in this crate performs I/O; persistence of the sets is owned by
//! Block Storage (2) and driven by Consensus (8).

pub mod domain;
pub mod ports;

pub use domain::*;
pub use ports::*;
