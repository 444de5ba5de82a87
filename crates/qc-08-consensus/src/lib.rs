//! # qc-08-consensus
//!
//! Consensus subsystem for Quantum-Chain: the proof-of-work consensus set.
//!
//! ## Architecture
//!
//! Consensus is the single writer of chain state. `accept_block` validates
//! a block, stores it, and decides whether it changes the canonical path:
//!
//! ```text
//!             accept_block(block)
//!                     │
//!   orphan? known? invalid ancestor? ──→ OrphanBlock / BlockKnown / InvalidBlock
//!                     │
//!      BlockValidator (size, work, time, payouts, signatures, hardfork)
//!                     │
//!        heavier than the head? ──no──→ SideBranch (stored, not applied)
//!                     │ yes
//!     revert old branch ─→ apply new branch (diffs computed once, cached)
//!                     │
//!      one atomic write set ─→ Extended / Reorganized ─→ subscribers
//! ```
//!
//! A branch that fails while being applied is rolled back in memory and
//! marked invalid (`ReorgAborted`). A failure that cannot be rolled back
//! halts the service.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use qc_08_consensus::{ConsensusConfig, ConsensusSet};
//!
//! let set = ConsensusSet::in_memory(ConsensusConfig::testing())?;
//! let outcome = set.accept_block(block)?;
//! println!("height {} checksum {:?}", set.current_height(), set.consensus_checksum());
//! ```

pub mod adapters;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod service;
pub mod validation;

// Re-export main types
pub use adapters::{Ed25519Verifier, ManualTimeSource, RecordingSubscriber};
pub use domain::{
    AcceptOutcome, BlockRejection, ConsensusChange, ConsensusConfig, ConsensusError,
    ConsensusResult, GenesisConfig,
};
pub use ports::{ChangeSubscriber, ConsensusApi, SignatureVerifier, SystemTimeSource, TimeSource};
pub use service::{BlockTemplate, ConsensusDependencies, ConsensusSet};
pub use validation::{BlockValidator, ValidationContext};
