//! # Test Fixtures
//!
//! A consensus set wrapped with mining helpers, and ed25519 wallets that
//! build and sign transactions.

use ed25519_dalek::{Signer, SigningKey};
use qc_02_block_storage::{InMemoryKVStore, KeyValueStore};
use qc_08_consensus::domain::solve_block;
use qc_08_consensus::{
    AcceptOutcome, ConsensusConfig, ConsensusDependencies, ConsensusResult, ConsensusSet,
};
use shared_types::{
    Block, BlockId, CoinInput, CoinOutput, Currency, FundInput, FundOutput, FundOutputId, Hash,
    OutputId, Transaction, TransactionSignature, UnlockConditions, UnlockHash,
};

/// Payout address that nobody can spend from; `tag` keeps branches apart.
pub fn miner(tag: u8) -> UnlockHash {
    UnlockHash([tag; 32])
}

/// A single-key wallet.
pub struct Wallet {
    key: SigningKey,
}

impl Wallet {
    pub fn from_seed(seed: u8) -> Self {
        Self {
            key: SigningKey::from_bytes(&[seed; 32]),
        }
    }

    pub fn conditions(&self) -> UnlockConditions {
        UnlockConditions::single_key(self.key.verifying_key().to_bytes())
    }

    pub fn address(&self) -> UnlockHash {
        self.conditions().unlock_hash()
    }

    /// This wallet's signature over `tx` for the input spending `parent_id`.
    pub fn signature_for(&self, tx: &Transaction, parent_id: Hash) -> TransactionSignature {
        TransactionSignature {
            parent_id,
            public_key_index: 0,
            signature: self.key.sign(tx.id().as_bytes()).to_bytes(),
        }
    }

    /// Add a signature for every input this wallet controls.
    pub fn sign(&self, tx: &mut Transaction) {
        let conditions = self.conditions();
        let coin_parents = tx
            .coin_inputs
            .iter()
            .filter(|i| i.unlock_conditions == conditions)
            .map(|i| i.parent_id.0);
        let fund_parents = tx
            .fund_inputs
            .iter()
            .filter(|i| i.unlock_conditions == conditions)
            .map(|i| i.parent_id.0);
        let signatures: Vec<TransactionSignature> = coin_parents
            .chain(fund_parents)
            .map(|parent_id| self.signature_for(tx, parent_id))
            .collect();
        tx.signatures.extend(signatures);
    }

    /// Spend `inputs` (all owned by this wallet) into `outputs`, paying `fee`.
    pub fn pay(
        &self,
        inputs: &[OutputId],
        outputs: Vec<CoinOutput>,
        fee: Option<Currency>,
    ) -> Transaction {
        let mut tx = Transaction {
            coin_inputs: inputs
                .iter()
                .map(|id| CoinInput {
                    parent_id: *id,
                    unlock_conditions: self.conditions(),
                })
                .collect(),
            coin_outputs: outputs,
            miner_fees: fee.into_iter().collect(),
            ..Default::default()
        };
        self.sign(&mut tx);
        tx
    }

    /// Move fund output `input` (owned by this wallet) into `outputs`.
    pub fn move_funds(&self, input: FundOutputId, outputs: Vec<FundOutput>) -> Transaction {
        let mut tx = Transaction {
            fund_inputs: vec![FundInput {
                parent_id: input,
                unlock_conditions: self.conditions(),
            }],
            fund_outputs: outputs,
            ..Default::default()
        };
        self.sign(&mut tx);
        tx
    }
}

/// A consensus set with helpers for mining on any known block.
pub struct TestChain<KV: KeyValueStore = InMemoryKVStore> {
    pub set: ConsensusSet<KV>,
}

impl TestChain<InMemoryKVStore> {
    pub fn new() -> Self {
        Self::with_config(ConsensusConfig::testing())
    }

    pub fn with_config(config: ConsensusConfig) -> Self {
        Self::open(InMemoryKVStore::new(), config)
    }
}

impl Default for TestChain<InMemoryKVStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<KV: KeyValueStore> TestChain<KV> {
    pub fn open(kv: KV, config: ConsensusConfig) -> Self {
        let set = ConsensusSet::open(kv, ConsensusDependencies::new(config))
            .expect("consensus set opens");
        Self { set }
    }

    pub fn genesis(&self) -> BlockId {
        self.set.genesis_id()
    }

    pub fn head(&self) -> BlockId {
        self.set.head_id()
    }

    /// A solved block on `parent` paying `payout`.
    pub fn mine(&self, parent: &BlockId, payout: UnlockHash, txs: Vec<Transaction>) -> Block {
        let template = self
            .set
            .block_template(parent, payout, txs)
            .expect("parent is known");
        let mut block = template.block;
        assert!(
            solve_block(&mut block, &template.target, 1_000_000),
            "test target is trivially easy"
        );
        block
    }

    pub fn accept(&self, block: Block) -> ConsensusResult<AcceptOutcome> {
        self.set.accept_block(block)
    }

    /// Mine and accept one block, returning its ID.
    pub fn add(&self, parent: &BlockId, payout: UnlockHash, txs: Vec<Transaction>) -> BlockId {
        let block = self.mine(parent, payout, txs);
        let id = block.id();
        self.accept(block).expect("block is valid");
        id
    }

    /// Mine and accept `count` empty blocks on `parent`.
    pub fn extend(&self, parent: &BlockId, count: usize, tag: u8) -> Vec<BlockId> {
        let mut ids = Vec::with_capacity(count);
        let mut parent = *parent;
        for _ in 0..count {
            parent = self.add(&parent, miner(tag), vec![]);
            ids.push(parent);
        }
        ids
    }

    /// Copy the given stored blocks, in order, into `other`.
    pub fn replay_into<Other: KeyValueStore>(&self, other: &TestChain<Other>, ids: &[BlockId]) {
        for id in ids {
            let block = self
                .set
                .processed_block(id)
                .expect("block is stored")
                .block;
            other.accept(block).expect("replayed block is valid");
        }
    }
}
