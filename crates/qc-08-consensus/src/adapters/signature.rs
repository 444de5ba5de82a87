//! Ed25519 adapter for the `SignatureVerifier` port.

use ed25519_dalek::{Signature as Ed25519Signature, Verifier, VerifyingKey};
use shared_types::{PublicKey, Signature};

use crate::ports::SignatureVerifier;

#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(public_key) else {
            return false;
        };
        key.verify(message, &Ed25519Signature::from_bytes(signature))
            .is_ok()
    }
}
