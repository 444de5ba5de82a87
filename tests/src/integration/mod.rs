//! # Integration Scenarios
//!
//! Each module drives one or more consensus sets through `accept_block`
//! only, the way blocks arrive from the network.

pub mod abort;
pub mod contracts;
pub mod persistence;
pub mod reorg;
pub mod transactions;
