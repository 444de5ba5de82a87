//! # Consensus Metrics
//!
//! Prometheus metrics for monitoring the consensus set.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! qc-08-consensus = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `consensus_blocks_accepted_total` - Accepted blocks (by outcome)
//! - `consensus_blocks_rejected_total` - Rejected blocks (by reason)
//! - `consensus_reorgs_total` - Completed reorganizations
//! - `consensus_reorg_depth` - Histogram of reverted blocks per reorg
//! - `consensus_chain_height` - Height of the canonical head

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Accepted blocks, labeled by outcome
    pub static ref BLOCKS_ACCEPTED: IntCounterVec = register_int_counter_vec!(
        "consensus_blocks_accepted_total",
        "Total number of blocks accepted",
        &["outcome"]
    )
    .expect("Failed to create BLOCKS_ACCEPTED metric");

    /// Rejected blocks, labeled by rejection reason
    pub static ref BLOCKS_REJECTED: IntCounterVec = register_int_counter_vec!(
        "consensus_blocks_rejected_total",
        "Total number of blocks rejected",
        &["reason"]
    )
    .expect("Failed to create BLOCKS_REJECTED metric");

    pub static ref REORGS: IntCounter = register_int_counter!(
        "consensus_reorgs_total",
        "Total number of completed reorganizations"
    )
    .expect("Failed to create REORGS metric");

    pub static ref REORG_DEPTH: Histogram = register_histogram!(
        "consensus_reorg_depth",
        "Blocks reverted per reorganization",
        vec![1.0, 2.0, 3.0, 5.0, 10.0, 25.0, 50.0, 100.0]
    )
    .expect("Failed to create REORG_DEPTH metric");

    pub static ref CHAIN_HEIGHT: IntGauge = register_int_gauge!(
        "consensus_chain_height",
        "Height of the canonical head"
    )
    .expect("Failed to create CHAIN_HEIGHT metric");
}

/// Record an accepted block with its outcome
#[cfg(feature = "metrics")]
pub fn record_block_accepted(outcome: &str) {
    BLOCKS_ACCEPTED.with_label_values(&[outcome]).inc();
}

/// Record a rejected block with reason
#[cfg(feature = "metrics")]
pub fn record_block_rejected(reason: &str) {
    BLOCKS_REJECTED.with_label_values(&[reason]).inc();
}

/// Record a completed reorg
#[cfg(feature = "metrics")]
pub fn record_reorg(depth: usize) {
    REORGS.inc();
    REORG_DEPTH.observe(depth as f64);
}

#[cfg(feature = "metrics")]
pub fn set_chain_height(height: u64) {
    CHAIN_HEIGHT.set(i64::try_from(height).unwrap_or(i64::MAX));
}

// No-op implementations when metrics feature is disabled
#[cfg(not(feature = "metrics"))]
pub fn record_block_accepted(_outcome: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_block_rejected(_reason: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_reorg(_depth: usize) {}

#[cfg(not(feature = "metrics"))]
pub fn set_chain_height(_height: u64) {}
