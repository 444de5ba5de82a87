//! Driven ports (Outbound dependencies)

use crate::domain::ConsensusChange;
use shared_types::{PublicKey, Signature};

/// Signature verification for transaction inputs
///
/// The message is always a transaction ID.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool;
}

/// Time source for timestamp validation
pub trait TimeSource: Send + Sync {
    /// Get current unix timestamp in seconds
    fn now(&self) -> u64;
}

/// Default time source using system time
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Receives every committed change of the canonical path.
///
/// Called after the change is durable, outside the state lock, in
/// registration order.
pub trait ChangeSubscriber: Send + Sync {
    fn on_consensus_change(&self, change: &ConsensusChange);
}
