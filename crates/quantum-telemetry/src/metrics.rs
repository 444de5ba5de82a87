//! Prometheus metrics for the node process.
//!
//! All metrics follow the naming convention: `qc_<subsystem>_<metric>_<unit>`.
//! Subsystem crates that register their own collectors on the default
//! Prometheus registry (Consensus does, behind its `metrics` feature) are
//! included by `encode_metrics` alongside the node registry below.

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Node-level metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Blocks handed to the ingest actor, by result
    pub static ref BLOCKS_RECEIVED: IntCounterVec = IntCounterVec::new(
        Opts::new("qc_node_blocks_received_total", "Blocks submitted for ingestion"),
        &["result"]  // result: accepted/rejected/orphan/deferred
    ).expect("metric creation failed");

    /// Blocks waiting in the ingest queue
    pub static ref INGEST_QUEUE_DEPTH: IntGauge = IntGauge::new(
        "qc_node_ingest_queue_depth",
        "Blocks waiting for the consensus writer"
    ).expect("metric creation failed");

    /// Time spent inside accept_block
    pub static ref BLOCK_PROCESSING_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "qc_node_block_processing_duration_seconds",
            "Time spent accepting one block"
        ).buckets(exponential_buckets(0.0001, 2.0, 16).expect("valid buckets"))
    ).expect("metric creation failed");

    /// Subsystem errors by type
    pub static ref SUBSYSTEM_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("qc_subsystem_errors_total", "Errors by subsystem and type"),
        &["subsystem", "error_type"]
    ).expect("metric creation failed");
}

/// Handle returned once the node metrics are registered.
#[derive(Debug)]
pub struct MetricsHandle {
    registered: usize,
}

impl MetricsHandle {
    pub fn registered(&self) -> usize {
        self.registered
    }
}

/// Register the node metrics with `REGISTRY`.
///
/// Registering twice is not an error; collectors already present are kept.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(BLOCKS_RECEIVED.clone()),
        Box::new(INGEST_QUEUE_DEPTH.clone()),
        Box::new(BLOCK_PROCESSING_DURATION.clone()),
        Box::new(SUBSYSTEM_ERRORS.clone()),
    ];

    let registered = metrics.len();
    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle { registered })
}

/// Encode the node registry and the default registry as Prometheus text.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let mut metric_families = REGISTRY.gather();
    metric_families.extend(prometheus::gather());

    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::HistogramTimer::new(&$histogram)
    };
}
