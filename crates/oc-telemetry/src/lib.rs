//! # OC Telemetry
//!
//! Logging and metrics bootstrap for omnichain messaging processes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use oc_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let telemetry = init_telemetry(TelemetryConfig::from_env())?;
//!     telemetry.metrics().packets_sent.inc();
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OC_SERVICE_NAME` | `oc-endpoint` | Service name in logs |
//! | `OC_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `OC_JSON_LOGS` | `false` | JSON log output |

#![warn(missing_docs)]

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging};
pub use metrics::EndpointMetrics;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Global subscriber could not be installed
    #[error("Failed to initialize logger: {0}")]
    LoggerInit(String),

    /// Metric creation or registration failed
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    /// Configuration rejected
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Install logging and create the metrics set.
///
/// The returned guard owns the metrics; dropping it logs shutdown.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = EndpointMetrics::new()?;
    init_logging(&config)?;

    Ok(TelemetryGuard {
        service_name: config.service_name,
        metrics,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
    metrics: EndpointMetrics,
}

impl TelemetryGuard {
    /// Metrics for this process.
    pub fn metrics(&self) -> &EndpointMetrics {
        &self.metrics
    }

    /// Service name logs are tagged with.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry...");
    }
}
