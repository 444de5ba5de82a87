//! # Consensus Database Service
//!
//! Persists the block store, the canonical path, and the consensus state
//! sets as logical tables over a `KeyValueStore`.
//!
//! ## Architecture
//!
//! This service:
//! 1. Encodes every table entry with bincode under its `KeyPrefix`
//! 2. Accumulates all writes of one state change in a `WriteSet`
//! 3. Commits a `WriteSet` as a single atomic batch
//! 4. Reloads and structurally checks the full chain on start-up


use crate::domain::errors::StorageError;
use crate::domain::keys::{self, KeyPrefix};
use crate::domain::ProcessedBlock;
use crate::ports::outbound::{BatchOperation, KeyValueStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{
    BlockHeight, BlockId, CoinOutput, Contract, ContractId, FundOutput, FundOutputId, OutputId,
};
use tracing::{debug, info};

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    Ok(bincode::serialize(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    bincode::deserialize(bytes).map_err(|e| StorageError::DataCorruption {
        message: e.to_string(),
    })
}

/// Writes of one logical transaction, committed atomically.
///
/// Operations keep their insertion order; a later write to a key wins.
#[derive(Debug, Default, Clone)]
pub struct WriteSet {
    operations: Vec<BatchOperation>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_block(&mut self, block: &ProcessedBlock) -> Result<(), StorageError> {
        self.operations
            .push(BatchOperation::put(keys::block_key(&block.id), encode(block)?));
        Ok(())
    }

    pub fn put_path(&mut self, height: BlockHeight, id: &BlockId) -> Result<(), StorageError> {
        self.operations
            .push(BatchOperation::put(keys::height_key(height), encode(id)?));
        Ok(())
    }

    pub fn delete_path(&mut self, height: BlockHeight) {
        self.operations
            .push(BatchOperation::delete(keys::height_key(height)));
    }

    pub fn put_output(&mut self, id: &OutputId, output: &CoinOutput) -> Result<(), StorageError> {
        self.operations
            .push(BatchOperation::put(keys::output_key(id), encode(output)?));
        Ok(())
    }

    pub fn delete_output(&mut self, id: &OutputId) {
        self.operations
            .push(BatchOperation::delete(keys::output_key(id)));
    }

    pub fn put_fund_output(
        &mut self,
        id: &FundOutputId,
        output: &FundOutput,
    ) -> Result<(), StorageError> {
        self.operations
            .push(BatchOperation::put(keys::fund_output_key(id), encode(output)?));
        Ok(())
    }

    pub fn delete_fund_output(&mut self, id: &FundOutputId) {
        self.operations
            .push(BatchOperation::delete(keys::fund_output_key(id)));
    }

    pub fn put_contract(&mut self, id: &ContractId, contract: &Contract) -> Result<(), StorageError> {
        self.operations
            .push(BatchOperation::put(keys::contract_key(id), encode(contract)?));
        Ok(())
    }

    pub fn delete_contract(&mut self, id: &ContractId) {
        self.operations
            .push(BatchOperation::delete(keys::contract_key(id)));
    }

    pub fn mark_invalid(&mut self, id: &BlockId) {
        self.operations
            .push(BatchOperation::put(keys::invalid_key(id), Vec::new()));
    }

    /// Record the genesis ID and the schema version.
    pub fn put_genesis(&mut self, id: &BlockId) -> Result<(), StorageError> {
        self.operations.push(BatchOperation::put(
            keys::metadata_key(keys::METADATA_GENESIS),
            encode(id)?,
        ));
        self.operations.push(BatchOperation::put(
            keys::metadata_key(keys::METADATA_SCHEMA_VERSION),
            encode(&keys::SCHEMA_VERSION)?,
        ));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn into_operations(self) -> Vec<BatchOperation> {
        self.operations
    }
}

/// Everything read back from the tables on start-up.
#[derive(Debug, Clone, Default)]
pub struct PersistedChain {
    pub genesis_id: BlockId,
    pub blocks: Vec<ProcessedBlock>,
    pub path: Vec<BlockId>,
    pub invalid: Vec<BlockId>,
    pub outputs: Vec<(OutputId, CoinOutput)>,
    pub fund_outputs: Vec<(FundOutputId, FundOutput)>,
    pub contracts: Vec<(ContractId, Contract)>,
}

/// The consensus tables over a key-value store.
pub struct ConsensusDb<KV: KeyValueStore> {
    kv_store: KV,
}

impl<KV: KeyValueStore> ConsensusDb<KV> {
    pub fn new(kv_store: KV) -> Self {
        Self { kv_store }
    }

    pub fn kv_store(&self) -> &KV {
        &self.kv_store
    }

    pub fn into_kv_store(self) -> KV {
        self.kv_store
    }

    /// True once a genesis block has been committed.
    pub fn is_initialized(&self) -> Result<bool, StorageError> {
        Ok(self
            .kv_store
            .exists(&keys::metadata_key(keys::METADATA_GENESIS))?)
    }

    /// Commit a write set as one atomic batch.
    pub fn commit(&mut self, writes: WriteSet) -> Result<(), StorageError> {
        let count = writes.len();
        self.kv_store.atomic_batch_write(writes.into_operations())?;
        debug!("[qc-02] Committed {} operations", count);
        Ok(())
    }

    /// Read every table.
    pub fn load(&self) -> Result<PersistedChain, StorageError> {
        let genesis_bytes = self
            .kv_store
            .get(&keys::metadata_key(keys::METADATA_GENESIS))?
            .ok_or_else(|| StorageError::DataCorruption {
                message: "missing genesis metadata".into(),
            })?;
        let genesis_id: BlockId = decode(&genesis_bytes)?;

        let version: u32 = self
            .kv_store
            .get(&keys::metadata_key(keys::METADATA_SCHEMA_VERSION))?
            .map(|bytes| decode(&bytes))
            .transpose()?
            .unwrap_or(0);
        if version != keys::SCHEMA_VERSION {
            return Err(StorageError::DataCorruption {
                message: format!(
                    "schema version {} (expected {})",
                    version,
                    keys::SCHEMA_VERSION
                ),
            });
        }

        let blocks = self
            .scan(KeyPrefix::Block)?
            .into_iter()
            .map(|(_, value)| decode::<ProcessedBlock>(&value))
            .collect::<Result<Vec<_>, _>>()?;

        let path = self.load_path()?;
        if path.first() != Some(&genesis_id) {
            return Err(StorageError::DataCorruption {
                message: "canonical path does not start at genesis".into(),
            });
        }

        let invalid = self
            .scan(KeyPrefix::InvalidBlock)?
            .into_iter()
            .map(|(suffix, _)| parse_id(&suffix).map(BlockId))
            .collect::<Result<Vec<_>, _>>()?;

        let outputs = self.load_table(KeyPrefix::Output, OutputId)?;
        let fund_outputs = self.load_table(KeyPrefix::FundOutput, FundOutputId)?;
        let contracts = self.load_table(KeyPrefix::Contract, ContractId)?;

        info!(
            "[qc-02] Loaded {} blocks, height {}, {} outputs, {} fund outputs, {} contracts",
            blocks.len(),
            path.len().saturating_sub(1),
            outputs.len(),
            fund_outputs.len(),
            contracts.len()
        );

        Ok(PersistedChain {
            genesis_id,
            blocks,
            path,
            invalid,
            outputs,
            fund_outputs,
            contracts,
        })
    }

    fn load_path(&self) -> Result<Vec<BlockId>, StorageError> {
        let mut path = Vec::new();
        for (suffix, value) in self.scan(KeyPrefix::BlockByHeight)? {
            let height = keys::parse_height(&suffix).ok_or_else(|| StorageError::DataCorruption {
                message: "malformed height key".into(),
            })?;
            if height != path.len() as BlockHeight {
                return Err(StorageError::DataCorruption {
                    message: format!("canonical path gap at height {}", path.len()),
                });
            }
            path.push(decode::<BlockId>(&value)?);
        }
        Ok(path)
    }

    fn load_table<I, V>(
        &self,
        prefix: KeyPrefix,
        make_id: impl Fn([u8; 32]) -> I,
    ) -> Result<Vec<(I, V)>, StorageError>
    where
        V: DeserializeOwned,
    {
        self.scan(prefix)?
            .into_iter()
            .map(|(suffix, value)| Ok((make_id(parse_id(&suffix)?), decode(&value)?)))
            .collect()
    }

    /// Prefix scan returning `(suffix, value)` pairs in key order.
    fn scan(&self, prefix: KeyPrefix) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let mut entries = self.kv_store.prefix_scan(prefix.as_bytes())?;
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries
            .into_iter()
            .filter_map(|(key, value)| prefix.suffix(&key).map(|s| (s.to_vec(), value)))
            .collect())
    }
}

fn parse_id(suffix: &[u8]) -> Result<[u8; 32], StorageError> {
    keys::parse_hash(suffix).ok_or_else(|| StorageError::DataCorruption {
        message: format!("malformed identifier key of {} bytes", suffix.len()),
    })
}
