//! # Quantum-Chain Node Runtime
//!
//! Entry point for a consensus node.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from the environment
//! 2. Initialize logging and metrics
//! 3. Open the configured storage backend
//! 4. Recover the consensus set (or write genesis on an empty store)
//! 5. Verify the recovered state against its checksum and supplies
//! 6. Start the ingest actor and wait for Ctrl+C

use std::sync::Arc;

use anyhow::{Context, Result};
use node_runtime::{open_store, spawn_ingest, NodeConfig};
use qc_08_consensus::{ConsensusDependencies, ConsensusSet};
use quantum_telemetry::{encode_metrics, init_telemetry};
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::from_env().context("Invalid node configuration")?;
    let _telemetry =
        init_telemetry(config.telemetry.clone()).context("Failed to initialize telemetry")?;

    info!("===========================================");
    info!("  Quantum-Chain Consensus Node v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");
    info!("Data Dir: {}", config.data_dir.display());
    info!("Storage: {:?}", config.storage_backend);

    let store = open_store(&config).context("Failed to open storage")?;
    let deps = ConsensusDependencies::new(config.consensus.clone());
    let consensus = Arc::new(ConsensusSet::open(store, deps).context("Failed to open consensus set")?);
    consensus
        .check_consistency()
        .context("Recovered state failed the consistency check")?;

    info!(
        "Consensus set ready: height={} head={} checksum={}",
        consensus.current_height(),
        consensus.head_id(),
        hex::encode(&consensus.consensus_checksum()[..8])
    );

    let (ingest, actor) = spawn_ingest(Arc::clone(&consensus), config.ingest_queue_capacity);

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    // Closing the last handle lets the actor drain its queue and stop.
    drop(ingest);
    let stats = actor.await.context("Ingest actor panicked")?;
    info!(
        "Shutdown complete at height {} ({} blocks accepted this run)",
        consensus.current_height(),
        stats.accepted
    );
    match encode_metrics() {
        Ok(text) => debug!("Final metrics:\n{}", text),
        Err(e) => warn!("Failed to encode metrics: {}", e),
    }
    Ok(())
}

