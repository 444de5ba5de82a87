//! # Node Runtime Library
//!
//! The pieces of the node binary, exposed for testing.
//!
//! - `config` - `NodeConfig` from the environment
//! - `adapters` - storage backend selection (memory, file, RocksDB)
//! - `ingest` - the single-writer block ingest actor

pub mod adapters;
pub mod config;
pub mod ingest;

pub use adapters::{open_store, DynStore, StoreOpenError};
pub use config::{ConfigError, NodeConfig, StorageBackend};
pub use ingest::{spawn_ingest, IngestError, IngestHandle, IngestStats};
