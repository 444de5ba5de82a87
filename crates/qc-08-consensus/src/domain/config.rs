//! Consensus parameters.

use std::env;

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use shared_types::{Block, BlockHeight, CoinOutput, Currency, FundOutput, Timestamp, UnlockHash};

/// The genesis block and the initial fund allocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisConfig {
    pub timestamp: Timestamp,
    /// Coin outputs created by the genesis block's payouts.
    pub coin_allocations: Vec<CoinOutput>,
    /// Fund outputs created at genesis; the fund supply never changes.
    pub fund_allocations: Vec<FundOutput>,
}

impl GenesisConfig {
    pub fn block(&self) -> Block {
        Block {
            timestamp: self.timestamp,
            miner_payouts: self.coin_allocations.clone(),
            ..Default::default()
        }
    }
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            timestamp: 1_433_600_000,
            coin_allocations: Vec::new(),
            fund_allocations: vec![FundOutput {
                value: 10_000,
                unlock_hash: UnlockHash::default(),
            }],
        }
    }
}

/// Consensus configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// First height at which contract formation is valid.
    pub contract_hardfork_height: BlockHeight,
    /// Target seconds between blocks
    pub block_frequency_secs: u64,
    /// Number of ancestors the target adjustment looks back over.
    pub target_window: u64,
    /// Easiest allowed target; also the genesis child target.
    pub root_target: U256,
    /// Maximum encoded block size in bytes
    pub max_block_size: u64,
    /// Ancestors whose median bounds a block's timestamp from below.
    pub median_timestamp_window: usize,
    /// Maximum seconds a timestamp may lie ahead of local time.
    pub future_threshold_secs: u64,
    pub initial_subsidy: Currency,
    pub subsidy_decrement: Currency,
    pub minimum_subsidy: Currency,
    pub genesis: GenesisConfig,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            contract_hardfork_height: 10,
            block_frequency_secs: 600,
            target_window: 1_000,
            root_target: U256::MAX >> 32,
            max_block_size: 2_000_000,
            median_timestamp_window: 11,
            future_threshold_secs: 3 * 60 * 60,
            initial_subsidy: 300_000,
            subsidy_decrement: 1,
            minimum_subsidy: 30_000,
            genesis: GenesisConfig::default(),
        }
    }
}

impl ConsensusConfig {
    /// Parameters for tests: trivially easy targets and a short window.
    pub fn testing() -> Self {
        Self {
            block_frequency_secs: 10,
            target_window: 10,
            root_target: U256::MAX >> 2,
            max_block_size: 100_000,
            genesis: GenesisConfig {
                timestamp: 1_000_000,
                coin_allocations: Vec::new(),
                fund_allocations: vec![FundOutput {
                    value: 10_000,
                    unlock_hash: UnlockHash::default(),
                }],
            },
            ..Self::default()
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `QC_CONTRACT_HARDFORK_HEIGHT`: contract activation height (default: 10)
    /// - `QC_BLOCK_FREQUENCY_SECS`: target block interval (default: 600)
    /// - `QC_TARGET_WINDOW`: difficulty adjustment window (default: 1000)
    /// - `QC_MAX_BLOCK_SIZE`: encoded block size limit (default: 2000000)
    /// - `QC_FUTURE_THRESHOLD_SECS`: allowed clock drift (default: 10800)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            contract_hardfork_height: env_or(
                "QC_CONTRACT_HARDFORK_HEIGHT",
                defaults.contract_hardfork_height,
            ),
            block_frequency_secs: env_or("QC_BLOCK_FREQUENCY_SECS", defaults.block_frequency_secs),
            target_window: env_or("QC_TARGET_WINDOW", defaults.target_window),
            max_block_size: env_or("QC_MAX_BLOCK_SIZE", defaults.max_block_size),
            future_threshold_secs: env_or(
                "QC_FUTURE_THRESHOLD_SECS",
                defaults.future_threshold_secs,
            ),
            ..defaults
        }
    }

    /// Block reward at `height`, excluding fees.
    pub fn subsidy(&self, height: BlockHeight) -> Currency {
        self.initial_subsidy
            .saturating_sub(Currency::from(height).saturating_mul(self.subsidy_decrement))
            .max(self.minimum_subsidy)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
