//! # Storage Adapters
//!
//! Selects the `KeyValueStore` behind the consensus database.
//!
//! Enable the `rocksdb` feature for the RocksDB backend:
//!
//! ```toml
//! node-runtime = { path = "...", features = ["rocksdb"] }
//! ```

#[cfg(feature = "rocksdb")]
pub mod rocksdb_adapter;

#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::{RocksDbConfig, RocksDbStore};

use qc_02_block_storage::{FileBackedKVStore, InMemoryKVStore, KVStoreError, KeyValueStore};
use thiserror::Error;
use tracing::info;

use crate::config::{NodeConfig, StorageBackend};

/// Any configured backend.
pub type DynStore = Box<dyn KeyValueStore>;

#[derive(Debug, Error)]
pub enum StoreOpenError {
    #[error("cannot create data directory {path}: {source}")]
    DataDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] KVStoreError),

    #[error("the {0:?} backend is not compiled in (enable the `rocksdb` feature)")]
    Unavailable(StorageBackend),
}

/// Open the backend named by `config.storage_backend`.
pub fn open_store(config: &NodeConfig) -> Result<DynStore, StoreOpenError> {
    if config.storage_backend != StorageBackend::Memory {
        std::fs::create_dir_all(&config.data_dir).map_err(|source| StoreOpenError::DataDir {
            path: config.data_dir.display().to_string(),
            source,
        })?;
    }

    match config.storage_backend {
        StorageBackend::Memory => {
            info!("[node] Using in-memory storage; nothing survives a restart");
            Ok(Box::new(InMemoryKVStore::new()))
        }
        StorageBackend::File => {
            let path = config.consensus_db_file();
            info!("[node] Using file-backed storage at {}", path.display());
            Ok(Box::new(FileBackedKVStore::open(path)?))
        }
        StorageBackend::RocksDb => open_rocksdb(config),
    }
}

#[cfg(feature = "rocksdb")]
fn open_rocksdb(config: &NodeConfig) -> Result<DynStore, StoreOpenError> {
    let rocks = RocksDbConfig {
        path: config.rocksdb_dir(),
        ..Default::default()
    };
    Ok(Box::new(RocksDbStore::open(rocks)?))
}

#[cfg(not(feature = "rocksdb"))]
fn open_rocksdb(_config: &NodeConfig) -> Result<DynStore, StoreOpenError> {
    Err(StoreOpenError::Unavailable(StorageBackend::RocksDb))
}
