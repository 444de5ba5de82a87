//! Key layout of the consensus tables.

use shared_types::{BlockHeight, ContractId, FundOutputId, OutputId, BlockId};

/// Key prefixes for the key-value store.
///
/// All keys are prefixed to namespace the logical tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPrefix {
    /// Processed blocks: `b:{id}` -> ProcessedBlock
    Block,
    /// Canonical path: `h:{height_be}` -> BlockId
    BlockByHeight,
    /// Unspent coin outputs: `o:{id}` -> CoinOutput
    Output,
    /// Unspent fund outputs: `f:{id}` -> FundOutput
    FundOutput,
    /// Open contracts: `c:{id}` -> Contract
    Contract,
    /// Permanently invalid blocks: `x:{id}` -> ()
    InvalidBlock,
    /// Chain metadata: `m:{name}`
    Metadata,
}

impl KeyPrefix {
    /// Get the byte prefix for this key type.
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            KeyPrefix::Block => b"b:",
            KeyPrefix::BlockByHeight => b"h:",
            KeyPrefix::Output => b"o:",
            KeyPrefix::FundOutput => b"f:",
            KeyPrefix::Contract => b"c:",
            KeyPrefix::InvalidBlock => b"x:",
            KeyPrefix::Metadata => b"m:",
        }
    }

    /// Build a full key with the given suffix.
    pub fn key(&self, suffix: &[u8]) -> Vec<u8> {
        let mut key = self.as_bytes().to_vec();
        key.extend_from_slice(suffix);
        key
    }

    /// Strip this prefix from a scanned key.
    pub fn suffix<'a>(&self, key: &'a [u8]) -> Option<&'a [u8]> {
        key.strip_prefix(self.as_bytes())
    }
}

pub const METADATA_GENESIS: &[u8] = b"genesis";
pub const METADATA_SCHEMA_VERSION: &[u8] = b"schema_version";

/// Current layout version written to `m:schema_version`.
pub const SCHEMA_VERSION: u32 = 1;

pub fn block_key(id: &BlockId) -> Vec<u8> {
    KeyPrefix::Block.key(id.as_bytes())
}

/// Heights are big-endian so a prefix scan returns them in order.
pub fn height_key(height: BlockHeight) -> Vec<u8> {
    KeyPrefix::BlockByHeight.key(&height.to_be_bytes())
}

pub fn output_key(id: &OutputId) -> Vec<u8> {
    KeyPrefix::Output.key(id.as_bytes())
}

pub fn fund_output_key(id: &FundOutputId) -> Vec<u8> {
    KeyPrefix::FundOutput.key(id.as_bytes())
}

pub fn contract_key(id: &ContractId) -> Vec<u8> {
    KeyPrefix::Contract.key(id.as_bytes())
}

pub fn invalid_key(id: &BlockId) -> Vec<u8> {
    KeyPrefix::InvalidBlock.key(id.as_bytes())
}

pub fn metadata_key(name: &[u8]) -> Vec<u8> {
    KeyPrefix::Metadata.key(name)
}

/// Parse a 32-byte identifier suffix.
pub fn parse_hash(suffix: &[u8]) -> Option<[u8; 32]> {
    suffix.try_into().ok()
}

/// Parse a big-endian height suffix.
pub fn parse_height(suffix: &[u8]) -> Option<BlockHeight> {
    suffix.try_into().ok().map(BlockHeight::from_be_bytes)
}
