//! # Adapters Module
//!
//! - `storage`: `KeyValueStore` implementations (in-memory, file-backed)

pub mod storage;

pub use storage::{FileBackedKVStore, InMemoryKVStore};
