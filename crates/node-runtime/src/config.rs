//! # Node Configuration
//!
//! Runtime parameters for the node binary, read from the environment.
//! Consensus rules come from `ConsensusConfig::from_env`, logging from
//! `TelemetryConfig::from_env`.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use qc_08_consensus::ConsensusConfig;
use quantum_telemetry::TelemetryConfig;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown storage backend '{0}' (expected memory, file or rocksdb)")]
    UnknownBackend(String),

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Where the consensus tables live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Nothing survives a restart.
    Memory,
    /// One file rewritten atomically on every commit.
    File,
    /// RocksDB (requires the `rocksdb` feature).
    RocksDb,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "rocksdb" | "rocks" => Ok(Self::RocksDb),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Data directory for the consensus database.
    pub data_dir: PathBuf,
    pub storage_backend: StorageBackend,
    /// Blocks that may wait for the consensus writer before senders block.
    pub ingest_queue_capacity: usize,
    pub consensus: ConsensusConfig,
    pub telemetry: TelemetryConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            storage_backend: StorageBackend::File,
            ingest_queue_capacity: 256,
            consensus: ConsensusConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from environment variables.
    ///
    /// - `QC_DATA_DIR`: data directory (default: ./data)
    /// - `QC_STORAGE_BACKEND`: memory, file or rocksdb (default: file)
    /// - `QC_INGEST_QUEUE`: ingest queue capacity (default: 256)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let data_dir = env::var("QC_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let storage_backend = match env::var("QC_STORAGE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.storage_backend,
        };

        let ingest_queue_capacity = match env::var("QC_INGEST_QUEUE") {
            Ok(value) => parse_capacity(&value)?,
            Err(_) => defaults.ingest_queue_capacity,
        };

        Ok(Self {
            data_dir,
            storage_backend,
            ingest_queue_capacity,
            consensus: ConsensusConfig::from_env(),
            telemetry: TelemetryConfig::for_subsystem("08", "consensus"),
        })
    }

    /// Path of the file-backed store.
    pub fn consensus_db_file(&self) -> PathBuf {
        self.data_dir.join("consensus.db")
    }

    /// Directory of the RocksDB store.
    pub fn rocksdb_dir(&self) -> PathBuf {
        self.data_dir.join("rocksdb")
    }
}

fn parse_capacity(value: &str) -> Result<usize, ConfigError> {
    value
        .parse::<usize>()
        .ok()
        .filter(|capacity| *capacity > 0)
        .ok_or_else(|| ConfigError::InvalidValue {
            key: "QC_INGEST_QUEUE",
            value: value.to_string(),
        })
}
