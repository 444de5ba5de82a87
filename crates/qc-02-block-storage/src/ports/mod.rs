//! # Ports
//!
//! - `outbound` - Driven ports (the transactional key-value store)

pub mod outbound;
