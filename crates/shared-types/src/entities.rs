//! # Core Domain Entities
//!
//! Defines the consensus entities that every subsystem agrees on.
//!
//! ## Clusters
//!
//! - **Identifiers**: `BlockId`, `OutputId`, `FundOutputId`, `ContractId`, `UnlockHash`
//! - **Value**: `CoinOutput`, `FundOutput`, `UnlockConditions`
//! - **Contracts**: `ContractTerms`, `Contract`, `StorageProof`
//! - **Chain**: `Transaction`, `Block`, `BlockHeader`
//!
//! All identifiers are derived with SHA-256 over an explicit field-by-field
//! encoding prefixed by a domain tag, so two nodes always derive the same IDs.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::merkle;

// Re-export U256 from primitive-types for targets and chain weight
pub use primitive_types::U256;

/// A 32-byte hash.
pub type Hash = [u8; 32];

/// A 32-byte Ed25519 public key.
pub type PublicKey = [u8; 32];

/// A 64-byte signature.
pub type Signature = [u8; 64];

/// Amount of the primary coin, in base units.
pub type Currency = u128;

/// Block height (distance from genesis).
pub type BlockHeight = u64;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Hash);

        impl $name {
            /// Raw bytes of the identifier.
            pub const fn as_bytes(&self) -> &Hash {
                &self.0
            }
        }

        impl From<Hash> for $name {
            fn from(hash: Hash) -> Self {
                Self(hash)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), hex::encode(&self.0[..6]))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }
    };
}

define_id!(
    /// Content hash of a block header.
    BlockId
);
define_id!(
    /// Identifier of a primary coin output.
    OutputId
);
define_id!(
    /// Identifier of a fund output.
    FundOutputId
);
define_id!(
    /// Identifier of a storage contract.
    ContractId
);
define_id!(
    /// Hash of the unlock conditions that own an output.
    UnlockHash
);
define_id!(
    /// Identifier of a transaction (also the signed message).
    TransactionId
);

// =============================================================================
// HASHING
// =============================================================================

/// Domain tags keep derived identifiers of different kinds disjoint.
pub mod tags {
    pub const BLOCK_HEADER: &[u8] = b"qc/block-header";
    pub const TRANSACTION: &[u8] = b"qc/transaction";
    pub const UNLOCK_CONDITIONS: &[u8] = b"qc/unlock-conditions";
    pub const COIN_OUTPUT: &[u8] = b"qc/coin-output";
    pub const FUND_OUTPUT: &[u8] = b"qc/fund-output";
    pub const CONTRACT: &[u8] = b"qc/contract";
    pub const MINER_PAYOUT: &[u8] = b"qc/miner-payout";
    pub const CONTRACT_PAYOUT: &[u8] = b"qc/contract-payout";
    pub const STORAGE_PROOF_INDEX: &[u8] = b"qc/storage-proof-index";
    pub const GENESIS_FUND_OUTPUT: &[u8] = b"qc/genesis-fund-output";
}

/// Feeds a value into a running SHA-256 in a fixed field order.
pub trait Digestible {
    fn digest_into(&self, hasher: &mut Sha256);
}

fn update_len(hasher: &mut Sha256, len: usize) {
    hasher.update((len as u64).to_le_bytes());
}

fn update_bytes(hasher: &mut Sha256, bytes: &[u8]) {
    update_len(hasher, bytes.len());
    hasher.update(bytes);
}

impl<T: Digestible> Digestible for [T] {
    fn digest_into(&self, hasher: &mut Sha256) {
        update_len(hasher, self.len());
        for item in self {
            item.digest_into(hasher);
        }
    }
}

/// Hash a tag followed by already-encoded parts.
pub fn tagged_hash(tag: &[u8], parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    update_bytes(&mut hasher, tag);
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

// =============================================================================
// CLUSTER A: VALUE
// =============================================================================

/// Conditions that must be met to spend an output.
///
/// An output only stores the hash of its conditions; the spender reveals
/// the full conditions in the input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockConditions {
    /// Earliest height at which the output may be spent.
    pub timelock: BlockHeight,
    /// Keys allowed to sign for the output.
    pub public_keys: Vec<PublicKey>,
    /// Number of distinct keys that must sign.
    pub signatures_required: u64,
}

impl UnlockConditions {
    /// Conditions that anyone can satisfy (no signatures, no timelock).
    pub fn anyone_can_spend() -> Self {
        Self::default()
    }

    /// Single-key conditions.
    pub fn single_key(public_key: PublicKey) -> Self {
        Self {
            timelock: 0,
            public_keys: vec![public_key],
            signatures_required: 1,
        }
    }

    pub fn unlock_hash(&self) -> UnlockHash {
        let mut hasher = Sha256::new();
        update_bytes(&mut hasher, tags::UNLOCK_CONDITIONS);
        self.digest_into(&mut hasher);
        UnlockHash(hasher.finalize().into())
    }
}

impl Digestible for UnlockConditions {
    fn digest_into(&self, hasher: &mut Sha256) {
        hasher.update(self.timelock.to_le_bytes());
        update_len(hasher, self.public_keys.len());
        for key in &self.public_keys {
            hasher.update(key);
        }
        hasher.update(self.signatures_required.to_le_bytes());
    }
}

/// An output of the primary coin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinOutput {
    pub value: Currency,
    pub unlock_hash: UnlockHash,
}

impl Digestible for CoinOutput {
    fn digest_into(&self, hasher: &mut Sha256) {
        hasher.update(self.value.to_le_bytes());
        hasher.update(self.unlock_hash.0);
    }
}

/// An output of the secondary fund class.
///
/// Funds are a fixed supply created at genesis; transactions move them but
/// never create or destroy them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundOutput {
    pub value: u64,
    pub unlock_hash: UnlockHash,
}

impl Digestible for FundOutput {
    fn digest_into(&self, hasher: &mut Sha256) {
        hasher.update(self.value.to_le_bytes());
        hasher.update(self.unlock_hash.0);
    }
}

/// Spends a coin output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinInput {
    pub parent_id: OutputId,
    pub unlock_conditions: UnlockConditions,
}

impl Digestible for CoinInput {
    fn digest_into(&self, hasher: &mut Sha256) {
        hasher.update(self.parent_id.0);
        self.unlock_conditions.digest_into(hasher);
    }
}

/// Spends a fund output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundInput {
    pub parent_id: FundOutputId,
    pub unlock_conditions: UnlockConditions,
}

impl Digestible for FundInput {
    fn digest_into(&self, hasher: &mut Sha256) {
        hasher.update(self.parent_id.0);
        self.unlock_conditions.digest_into(hasher);
    }
}

// =============================================================================
// CLUSTER B: CONTRACTS
// =============================================================================

/// Terms of a storage contract as written in a formation transaction.
///
/// The payout is locked at formation. At `window_end` the contract resolves:
/// `valid_proof_outputs` are created if a storage proof was accepted inside
/// `[window_start, window_end)`, otherwise `missed_proof_outputs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractTerms {
    pub file_size: u64,
    pub file_merkle_root: Hash,
    pub window_start: BlockHeight,
    pub window_end: BlockHeight,
    pub payout: Currency,
    pub valid_proof_outputs: Vec<CoinOutput>,
    pub missed_proof_outputs: Vec<CoinOutput>,
    pub unlock_hash: UnlockHash,
}

impl ContractTerms {
    /// Number of Merkle segments covering the file.
    pub fn segment_count(&self) -> u64 {
        merkle::segment_count(self.file_size)
    }
}

impl Digestible for ContractTerms {
    fn digest_into(&self, hasher: &mut Sha256) {
        hasher.update(self.file_size.to_le_bytes());
        hasher.update(self.file_merkle_root);
        hasher.update(self.window_start.to_le_bytes());
        hasher.update(self.window_end.to_le_bytes());
        hasher.update(self.payout.to_le_bytes());
        self.valid_proof_outputs.digest_into(hasher);
        self.missed_proof_outputs.digest_into(hasher);
        hasher.update(self.unlock_hash.0);
    }
}

/// A contract as tracked in the contract set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub terms: ContractTerms,
    /// Height of the block whose storage proof resolved this contract.
    pub proven_at: Option<BlockHeight>,
}

impl Contract {
    pub fn new(terms: ContractTerms) -> Self {
        Self {
            terms,
            proven_at: None,
        }
    }

    /// Outputs created when the contract resolves at `window_end`.
    pub fn resolution_outputs(&self) -> &[CoinOutput] {
        if self.proven_at.is_some() {
            &self.terms.valid_proof_outputs
        } else {
            &self.terms.missed_proof_outputs
        }
    }
}

/// Identifier of coin output `index` of a transaction.
pub fn coin_output_id(tx: &TransactionId, index: usize) -> OutputId {
    OutputId(tagged_hash(
        tags::COIN_OUTPUT,
        &[&tx.0, &(index as u64).to_le_bytes()],
    ))
}

/// Identifier of fund output `index` of a transaction.
pub fn fund_output_id(tx: &TransactionId, index: usize) -> FundOutputId {
    FundOutputId(tagged_hash(
        tags::FUND_OUTPUT,
        &[&tx.0, &(index as u64).to_le_bytes()],
    ))
}

/// Identifier of contract `index` formed by a transaction.
pub fn contract_id(tx: &TransactionId, index: usize) -> ContractId {
    ContractId(tagged_hash(
        tags::CONTRACT,
        &[&tx.0, &(index as u64).to_le_bytes()],
    ))
}

/// Identifier of miner payout `index` of a block.
pub fn miner_payout_id(block: &BlockId, index: usize) -> OutputId {
    OutputId(tagged_hash(
        tags::MINER_PAYOUT,
        &[&block.0, &(index as u64).to_le_bytes()],
    ))
}

/// Identifier of fund output `index` allocated by the genesis block.
pub fn genesis_fund_output_id(genesis: &BlockId, index: usize) -> FundOutputId {
    FundOutputId(tagged_hash(
        tags::GENESIS_FUND_OUTPUT,
        &[&genesis.0, &(index as u64).to_le_bytes()],
    ))
}

/// Identifier of the `index`th resolution output of a contract.
pub fn contract_payout_id(contract: &ContractId, proven: bool, index: usize) -> OutputId {
    OutputId(tagged_hash(
        tags::CONTRACT_PAYOUT,
        &[&contract.0, &[proven as u8], &(index as u64).to_le_bytes()],
    ))
}

/// Proof that the host still stores the segment of the file selected by
/// the trigger block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageProof {
    pub contract_id: ContractId,
    pub segment: Vec<u8>,
    /// Sibling hashes from the leaf level upward.
    pub hash_set: Vec<Hash>,
}

impl Digestible for StorageProof {
    fn digest_into(&self, hasher: &mut Sha256) {
        hasher.update(self.contract_id.0);
        update_bytes(hasher, &self.segment);
        update_len(hasher, self.hash_set.len());
        for hash in &self.hash_set {
            hasher.update(hash);
        }
    }
}

/// Segment a storage proof for `contract` must cover, given the canonical
/// block at `window_start - 1`.
pub fn storage_proof_segment(contract: &ContractId, trigger: &BlockId, segments: u64) -> u64 {
    let seed = tagged_hash(tags::STORAGE_PROOF_INDEX, &[&contract.0, &trigger.0]);
    let mut word = [0u8; 8];
    word.copy_from_slice(&seed[..8]);
    u64::from_le_bytes(word) % segments.max(1)
}

// =============================================================================
// CLUSTER C: THE CHAIN
// =============================================================================

/// A signature over a transaction ID covering one input.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    /// The coin output, fund output, or contract this signature authorises.
    pub parent_id: Hash,
    /// Index into the input's `public_keys`.
    pub public_key_index: u64,
    #[serde_as(as = "Bytes")]
    pub signature: Signature,
}

/// A transaction moving coins and funds, forming contracts, or proving storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub coin_inputs: Vec<CoinInput>,
    pub coin_outputs: Vec<CoinOutput>,
    pub contracts: Vec<ContractTerms>,
    pub storage_proofs: Vec<StorageProof>,
    pub fund_inputs: Vec<FundInput>,
    pub fund_outputs: Vec<FundOutput>,
    pub miner_fees: Vec<Currency>,
    pub arbitrary_data: Vec<Vec<u8>>,
    pub signatures: Vec<TransactionSignature>,
}

impl Transaction {
    /// ID over every field except the signatures.
    pub fn id(&self) -> TransactionId {
        let mut hasher = Sha256::new();
        update_bytes(&mut hasher, tags::TRANSACTION);
        self.coin_inputs.digest_into(&mut hasher);
        self.coin_outputs.digest_into(&mut hasher);
        self.contracts.digest_into(&mut hasher);
        self.storage_proofs.digest_into(&mut hasher);
        self.fund_inputs.digest_into(&mut hasher);
        self.fund_outputs.digest_into(&mut hasher);
        update_len(&mut hasher, self.miner_fees.len());
        for fee in &self.miner_fees {
            hasher.update(fee.to_le_bytes());
        }
        update_len(&mut hasher, self.arbitrary_data.len());
        for data in &self.arbitrary_data {
            update_bytes(&mut hasher, data);
        }
        TransactionId(hasher.finalize().into())
    }

    pub fn coin_output_id(&self, index: usize) -> OutputId {
        coin_output_id(&self.id(), index)
    }

    pub fn fund_output_id(&self, index: usize) -> FundOutputId {
        fund_output_id(&self.id(), index)
    }

    pub fn contract_id(&self, index: usize) -> ContractId {
        contract_id(&self.id(), index)
    }

    /// Sum of miner fees, `None` on overflow.
    pub fn total_fees(&self) -> Option<Currency> {
        self.miner_fees
            .iter()
            .try_fold(0u128, |acc, fee| acc.checked_add(*fee))
    }
}

impl Digestible for Transaction {
    fn digest_into(&self, hasher: &mut Sha256) {
        hasher.update(self.id().0);
    }
}

/// The header committed to by the block ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub parent_id: BlockId,
    pub nonce: u64,
    pub timestamp: Timestamp,
    pub merkle_root: Hash,
}

impl BlockHeader {
    pub fn id(&self) -> BlockId {
        BlockId(tagged_hash(
            tags::BLOCK_HEADER,
            &[
                &self.parent_id.0,
                &self.nonce.to_le_bytes(),
                &self.timestamp.to_le_bytes(),
                &self.merkle_root,
            ],
        ))
    }
}

/// An immutable block produced by a miner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub parent_id: BlockId,
    pub nonce: u64,
    pub timestamp: Timestamp,
    pub miner_payouts: Vec<CoinOutput>,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Merkle root over the miner payouts followed by the transaction IDs.
    pub fn merkle_root(&self) -> Hash {
        let leaves: Vec<Hash> = self
            .miner_payouts
            .iter()
            .map(|payout| {
                let mut hasher = Sha256::new();
                payout.digest_into(&mut hasher);
                merkle::leaf_hash(&hasher.finalize())
            })
            .chain(
                self.transactions
                    .iter()
                    .map(|tx| merkle::leaf_hash(&tx.id().0)),
            )
            .collect();
        merkle::root(&leaves)
    }

    pub fn header(&self) -> BlockHeader {
        BlockHeader {
            parent_id: self.parent_id,
            nonce: self.nonce,
            timestamp: self.timestamp,
            merkle_root: self.merkle_root(),
        }
    }

    pub fn id(&self) -> BlockId {
        self.header().id()
    }

    pub fn miner_payout_id(&self, index: usize) -> OutputId {
        miner_payout_id(&self.id(), index)
    }

    /// Sum of all transaction fees, `None` on overflow.
    pub fn total_fees(&self) -> Option<Currency> {
        self.transactions
            .iter()
            .try_fold(0u128, |acc, tx| acc.checked_add(tx.total_fees()?))
    }
}
