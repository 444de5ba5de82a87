//! # Block Ingest Actor
//!
//! The consensus set has exactly one writer. Every producer of blocks
//! (network, miner, RPC) holds a cloneable `IngestHandle`; the actor task
//! drains the channel in arrival order and runs `accept_block` for one block
//! at a time on the blocking pool, replying through a oneshot channel.
//!
//! ```text
//!  producer ─┐
//!  producer ─┼─→ mpsc (bounded) ─→ ingest actor ─→ ConsensusSet::accept_block
//!  producer ─┘                          │
//!                                       └─→ oneshot reply per block
//! ```

use std::sync::Arc;

use qc_02_block_storage::KeyValueStore;
use qc_08_consensus::{AcceptOutcome, ConsensusError, ConsensusSet};
use quantum_telemetry::{
    log_block_event, metric_inc, time_histogram, BLOCKS_RECEIVED, BLOCK_PROCESSING_DURATION,
    INGEST_QUEUE_DEPTH, SUBSYSTEM_ERRORS,
};
use shared_types::Block;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("block rejected: {0}")]
    Rejected(#[from] ConsensusError),

    #[error("ingest actor has stopped")]
    Closed,
}

struct IngestRequest {
    block: Block,
    reply: oneshot::Sender<Result<AcceptOutcome, ConsensusError>>,
}

/// Sending side of the ingest queue.
#[derive(Clone)]
pub struct IngestHandle {
    tx: mpsc::Sender<IngestRequest>,
}

impl IngestHandle {
    /// Queue `block` and wait for the consensus set's verdict.
    pub async fn submit(&self, block: Block) -> Result<AcceptOutcome, IngestError> {
        let (reply, response) = oneshot::channel();
        INGEST_QUEUE_DEPTH.inc();
        if self.tx.send(IngestRequest { block, reply }).await.is_err() {
            INGEST_QUEUE_DEPTH.dec();
            return Err(IngestError::Closed);
        }
        Ok(response.await.map_err(|_| IngestError::Closed)??)
    }
}

/// What the actor did before its queue closed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestStats {
    pub accepted: u64,
    pub rejected: u64,
    pub orphans: u64,
    /// Timestamped too far ahead; may be resubmitted later.
    pub deferred: u64,
}

/// Start the actor. It stops once every `IngestHandle` is dropped.
pub fn spawn_ingest<KV>(
    consensus: Arc<ConsensusSet<KV>>,
    capacity: usize,
) -> (IngestHandle, JoinHandle<IngestStats>)
where
    KV: KeyValueStore + 'static,
{
    let (tx, rx) = mpsc::channel(capacity);
    let task = tokio::spawn(run_ingest(consensus, rx));
    (IngestHandle { tx }, task)
}

async fn run_ingest<KV>(
    consensus: Arc<ConsensusSet<KV>>,
    mut rx: mpsc::Receiver<IngestRequest>,
) -> IngestStats
where
    KV: KeyValueStore + 'static,
{
    info!("[node] Ingest actor started");
    let mut stats = IngestStats::default();

    while let Some(IngestRequest { block, reply }) = rx.recv().await {
        INGEST_QUEUE_DEPTH.dec();
        let id = block.id();

        let result = {
            let _timer = time_histogram!(BLOCK_PROCESSING_DURATION);
            let set = Arc::clone(&consensus);
            match tokio::task::spawn_blocking(move || set.accept_block(block)).await {
                Ok(result) => result,
                Err(e) => Err(ConsensusError::Fatal(format!("accept_block panicked: {}", e))),
            }
        };

        match &result {
            Ok(outcome) => {
                stats.accepted += 1;
                metric_inc!(BLOCKS_RECEIVED, &["accepted"]);
                if outcome.is_canonical() {
                    log_block_event!(
                        info,
                        "consensus",
                        "Head advanced",
                        consensus.current_height(),
                        id,
                        reorg_depth = outcome.depth()
                    );
                } else {
                    debug!("[node] Stored side block {}", id);
                }
            }
            Err(e) if e.is_orphan() => {
                stats.orphans += 1;
                metric_inc!(BLOCKS_RECEIVED, &["orphan"]);
                debug!("[node] Orphan block {}: {}", id, e);
            }
            Err(e @ ConsensusError::FutureTimestamp { .. }) => {
                stats.deferred += 1;
                metric_inc!(BLOCKS_RECEIVED, &["deferred"]);
                debug!("[node] Deferred block {}: {}", id, e);
            }
            Err(e) => {
                stats.rejected += 1;
                metric_inc!(BLOCKS_RECEIVED, &["rejected"]);
                if matches!(e, ConsensusError::Fatal(_) | ConsensusError::Halted) {
                    metric_inc!(SUBSYSTEM_ERRORS, &["consensus", e.label()]);
                    error!("[node] Consensus halted while ingesting {}: {}", id, e);
                } else {
                    debug!("[node] Rejected block {}: {}", id, e);
                }
            }
        }

        // The submitter may have given up waiting.
        let _ = reply.send(result);
    }

    info!(
        "[node] Ingest actor stopped ({} accepted, {} rejected, {} orphans, {} deferred)",
        stats.accepted, stats.rejected, stats.orphans, stats.deferred
    );
    stats
}
