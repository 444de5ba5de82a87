//! Structured logging.
//!
//! Every crate logs through `tracing`. This module installs the global
//! subscriber: an `EnvFilter` built from `QC_LOG_LEVEL` / `RUST_LOG` and a
//! formatting layer that writes either human-readable or JSON lines.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::{LogFormat, TelemetryConfig, TelemetryError};

/// Parse a log filter directive.
pub fn build_filter(directives: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(directives)
        .map_err(|e| TelemetryError::Config(format!("invalid log filter '{}': {}", directives, e)))
}

/// Install the global tracing subscriber.
///
/// Fails if a global subscriber is already set.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = build_filter(&config.log_filter)?;

    let fmt_layer: Option<Box<dyn Layer<Registry> + Send + Sync>> = match config.log_format {
        LogFormat::Off => None,
        LogFormat::Json => Some(
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .boxed(),
        ),
        LogFormat::Pretty => Some(fmt::layer().with_target(true).with_ansi(true).boxed()),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    tracing::info!(
        service = %config.full_service_name(),
        network = %config.network,
        format = ?config.log_format,
        "Logging initialized"
    );
    Ok(())
}

/// Log a block-related event with standard fields.
#[macro_export]
macro_rules! log_block_event {
    ($level:ident, $subsystem:expr, $msg:expr, $block_height:expr, $block_hash:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = $subsystem,
            block_height = $block_height,
            block_hash = %$block_hash,
            $($($field)*,)?
            $msg
        )
    };
}
