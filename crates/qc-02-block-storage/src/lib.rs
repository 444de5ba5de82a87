//! # Block Storage Engine (qc-02)
//!
//! The Block Storage subsystem holds every accepted block and the canonical
//! path, and persists the consensus tables.
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Description |
//! |----|-----------|-------------|
//! | 1 | Linked Blocks | Parent block must exist for height > 0 |
//! | 2 | Height Index | `path[h]` has height `h` and parent `path[h-1]` |
//! | 3 | Atomic Writes | One state change is one batch: all or nothing |
//! | 4 | Genesis Immutability | Genesis never leaves the canonical path |
//!
//! The store enforces only these structural invariants. Fork choice lives in
//! Consensus (8), which is the sole writer.
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - `ProcessedBlock`, `BlockStore`, key layout, errors
//! - `ports/` - `KeyValueStore` driven port
//! - `adapters/` - In-memory and file-backed stores
//! - `service/` - `ConsensusDb` and `WriteSet`
//!
//! ## Usage
//!
//! ```ignore
//! use qc_02_block_storage::{ConsensusDb, InMemoryKVStore, WriteSet};
//!
//! let mut db = ConsensusDb::new(InMemoryKVStore::new());
//! let mut writes = WriteSet::new();
//! writes.put_block(&processed)?;
//! writes.put_path(processed.height, &processed.id)?;
//! db.commit(writes)?;
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{FileBackedKVStore, InMemoryKVStore};
pub use domain::{BlockStore, KVStoreError, KeyPrefix, ProcessedBlock, StorageError};
pub use ports::outbound::{BatchOperation, KeyValueStore, ScanResult};
pub use service::{ConsensusDb, PersistedChain, WriteSet};
