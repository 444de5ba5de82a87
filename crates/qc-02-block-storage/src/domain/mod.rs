//! # Domain Layer
//!
//! Pure domain logic for the Block Storage subsystem.
//!
//! ## Modules
//!
//! - `entities` - `ProcessedBlock`
//! - `block_store` - Arena of processed blocks plus the canonical path
//! - `keys` - Key layout of the persisted consensus tables
//! - `errors` - Domain error types

pub mod block_store;
pub mod entities;
pub mod errors;
pub mod keys;

pub use block_store::BlockStore;
pub use entities::ProcessedBlock;
pub use errors::{KVStoreError, StorageError};
pub use keys::KeyPrefix;
