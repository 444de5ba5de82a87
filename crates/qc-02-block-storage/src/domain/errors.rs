//! # Domain Errors
//!
//! Error types for the Block Storage subsystem.
//!
//! ## Design Principles
//!
//! - Each error maps to a specific structural invariant violation
//! - Errors are descriptive and actionable
//! - No panics in domain logic (use Result instead)

use shared_types::{BlockHeight, BlockId};
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Block not found: {id:?}")]
    BlockNotFound { id: BlockId },

    #[error("No canonical block at height {height}")]
    HeightNotFound { height: BlockHeight },

    #[error("Block already exists: {id:?}")]
    BlockExists { id: BlockId },

    #[error("Parent block not found: {parent:?}")]
    ParentNotFound { parent: BlockId },

    #[error("Height mismatch for {id:?}: expected {expected}, got {actual}")]
    HeightMismatch {
        id: BlockId,
        expected: BlockHeight,
        actual: BlockHeight,
    },

    #[error("Block {id:?} does not extend the canonical head")]
    NotExtendingHead { id: BlockId },

    #[error("Genesis block cannot be removed from the canonical path")]
    GenesisImmutable,

    #[error("Data corruption: {message}")]
    DataCorruption { message: String },

    #[error("Database error: {message}")]
    DatabaseError { message: String },

    #[error("Serialization error: {message}")]
    SerializationError { message: String },
}

/// Key-value store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KVStoreError {
    #[error("KV store I/O error: {message}")]
    IOError { message: String },

    #[error("KV store corruption: {message}")]
    CorruptionError { message: String },

    #[error("Key not found in KV store")]
    NotFound,
}

impl From<KVStoreError> for StorageError {
    fn from(err: KVStoreError) -> Self {
        StorageError::DatabaseError {
            message: err.to_string(),
        }
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::SerializationError {
            message: err.to_string(),
        }
    }
}
