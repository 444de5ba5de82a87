//! # Quantum-Chain Test Suite
//!
//! Cross-crate consensus scenarios driven through `ConsensusSet::accept_block`.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Criterion benchmarks
//! └── src/
//!     ├── fixtures.rs   # Test chain and signing wallets
//!     └── integration/  # End-to-end scenarios
//!         ├── abort.rs
//!         ├── contracts.rs
//!         ├── persistence.rs
//!         ├── reorg.rs
//!         └── transactions.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p qc-tests
//!
//! # By scenario
//! cargo test -p qc-tests integration::reorg::
//! cargo test -p qc-tests integration::contracts::
//!
//! # Benchmarks
//! cargo bench -p qc-tests
//! ```

pub mod fixtures;
pub mod integration;
