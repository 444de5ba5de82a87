//! Telemetry configuration from environment variables.

use std::env;
use std::str::FromStr;

use crate::TelemetryError;

/// How log lines are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, coloured.
    Pretty,
    /// One JSON object per line, for log shippers.
    Json,
    /// Nothing is written; metrics still work.
    Off,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "off" | "none" => Ok(Self::Off),
            other => Err(TelemetryError::Config(format!(
                "unknown log format '{}' (expected pretty, json, or off)",
                other
            ))),
        }
    }
}

/// Logging and metrics settings for one process.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Prefix of the name attached to every log line
    pub service_name: String,

    /// Subsystem this process runs ("00" for none)
    pub subsystem_id: String,

    /// `EnvFilter` directives, e.g. `info,qc_08_consensus=debug`
    pub log_filter: String,

    pub log_format: LogFormat,

    /// Chain the node follows, logged once at start-up
    pub network: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "quantum-chain".to_string(),
            subsystem_id: "00".to_string(),
            log_filter: "info".to_string(),
            log_format: LogFormat::Pretty,
            network: "testnet".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Read settings from the environment.
    ///
    /// # Environment Variables
    ///
    /// - `QC_SERVICE_NAME`: service name prefix (default: quantum-chain)
    /// - `QC_SUBSYSTEM_ID`: subsystem ID (default: 00)
    /// - `QC_LOG_LEVEL` or `RUST_LOG`: filter directives (default: info)
    /// - `QC_LOG_FORMAT`: pretty, json, or off (default: json inside a
    ///   container, pretty otherwise)
    /// - `QC_NETWORK`: network name (default: testnet)
    ///
    /// An unparseable `QC_LOG_FORMAT` falls back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let in_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();
        let default_format = if in_container {
            LogFormat::Json
        } else {
            defaults.log_format
        };

        Self {
            service_name: env::var("QC_SERVICE_NAME").unwrap_or(defaults.service_name),
            subsystem_id: env::var("QC_SUBSYSTEM_ID").unwrap_or(defaults.subsystem_id),
            log_filter: env::var("QC_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.log_filter),
            log_format: env::var("QC_LOG_FORMAT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_format),
            network: env::var("QC_NETWORK").unwrap_or(defaults.network),
        }
    }

    /// Environment settings, named after `subsystem_id`/`subsystem_name`.
    pub fn for_subsystem(subsystem_id: &str, subsystem_name: &str) -> Self {
        Self {
            subsystem_id: subsystem_id.to_string(),
            service_name: format!("qc-{}-{}", subsystem_id, subsystem_name),
            ..Self::from_env()
        }
    }

    /// Name used in log lines: the service name, suffixed with the subsystem
    /// ID unless it is already part of it.
    pub fn full_service_name(&self) -> String {
        let tagged = format!("qc-{}-", self.subsystem_id);
        if self.subsystem_id == "00" || self.service_name.starts_with(&tagged) {
            self.service_name.clone()
        } else {
            format!("{}-{}", self.service_name, self.subsystem_id)
        }
    }
}
