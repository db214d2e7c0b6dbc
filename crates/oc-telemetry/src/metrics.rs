//! Prometheus metrics for messaging endpoints.
//!
//! All metrics follow the naming convention: `oc_<area>_<metric>_<unit>`

use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};

use crate::TelemetryError;

/// Counters and gauges for one endpoint, on a private registry.
#[derive(Clone)]
pub struct EndpointMetrics {
    registry: Registry,

    /// Packets handed to the transport
    pub packets_sent: Counter,

    /// Attestations accepted
    pub attestations: Counter,

    /// Packets that reached quorum
    pub packets_committed: Counter,

    /// Successful application callbacks
    pub packets_delivered: Counter,

    /// Failed application callbacks
    pub delivery_failures: Counter,

    /// Administrative nonce skips
    pub nonces_skipped: Counter,

    /// Committed entries awaiting execution
    pub pending_entries: Gauge,

    /// Rejected operations by error kind
    pub errors: CounterVec,
}

fn metric_err(e: prometheus::Error) -> TelemetryError {
    TelemetryError::MetricsInit(e.to_string())
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<Counter, TelemetryError> {
    let counter = Counter::new(name, help).map_err(metric_err)?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(metric_err)?;
    Ok(counter)
}

impl EndpointMetrics {
    /// Create and register all metrics.
    pub fn new() -> Result<Self, TelemetryError> {
        let registry = Registry::new();

        let pending_entries = Gauge::new(
            "oc_channel_pending_entries",
            "Committed packets awaiting execution",
        )
        .map_err(metric_err)?;
        registry
            .register(Box::new(pending_entries.clone()))
            .map_err(metric_err)?;

        let errors = CounterVec::new(
            Opts::new("oc_endpoint_errors_total", "Rejected operations by error kind"),
            &["kind"],
        )
        .map_err(metric_err)?;
        registry
            .register(Box::new(errors.clone()))
            .map_err(metric_err)?;

        Ok(Self {
            packets_sent: counter(&registry, "oc_packets_sent_total", "Packets sent")?,
            attestations: counter(
                &registry,
                "oc_verification_attestations_total",
                "Attestations accepted",
            )?,
            packets_committed: counter(
                &registry,
                "oc_verification_committed_total",
                "Packets committed after quorum",
            )?,
            packets_delivered: counter(
                &registry,
                "oc_channel_delivered_total",
                "Packets delivered to applications",
            )?,
            delivery_failures: counter(
                &registry,
                "oc_channel_delivery_failures_total",
                "Application callbacks that failed",
            )?,
            nonces_skipped: counter(&registry, "oc_channel_skipped_total", "Nonces skipped")?,
            pending_entries,
            errors,
            registry,
        })
    }

    /// Count one rejected operation.
    pub fn record_error(&self, kind: &str) {
        self.errors.with_label_values(&[kind]).inc();
    }

    /// Encode all metrics as Prometheus text format.
    pub fn encode(&self) -> Result<String, TelemetryError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(metric_err)?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
    }
}
