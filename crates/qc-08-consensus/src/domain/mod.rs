//! Domain layer for the consensus set
//!
//! - config: consensus parameters and genesis
//! - error: rejection reasons and the accept-block error taxonomy
//! - target: proof-of-work targets, weights, and adjustment
//! - fork_choice: branch weight comparison and reorg planning
//! - outcome: accept results and change notifications

mod config;
mod error;
mod fork_choice;
mod outcome;
mod target;

pub use config::*;
pub use error::*;
pub use fork_choice::*;
pub use outcome::*;
pub use target::*;
