//! # Shared Types Crate
//!
//! Consensus entities shared by every subsystem: identifiers, blocks,
//! transactions, outputs, contracts, and the reversible state diffs that
//! blocks cause.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **Deterministic Identity**: Every identifier is a domain-tagged SHA-256
//!   over an explicit field encoding, never over an in-memory layout.

pub mod diff;
pub mod entities;
pub mod errors;
pub mod merkle;

pub use diff::StateDiff;
pub use entities::*;
pub use errors::*;
