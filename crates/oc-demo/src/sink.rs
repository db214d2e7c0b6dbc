//! Event sink that feeds metrics and the in-process transport.

use oc_messaging::{EndpointEvent, EventSink, TracingEventSink};
use oc_telemetry::EndpointMetrics;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Counts events, logs them, and queues sent packets for the relay.
pub struct MeteredEventSink {
    inner: TracingEventSink,
    metrics: EndpointMetrics,
    outbox: Mutex<VecDeque<Vec<u8>>>,
}

impl MeteredEventSink {
    pub fn new(metrics: EndpointMetrics) -> Self {
        Self {
            inner: TracingEventSink,
            metrics,
            outbox: Mutex::new(VecDeque::new()),
        }
    }

    /// Encoded packets sent since the last call, oldest first.
    pub fn drain_outbox(&self) -> Vec<Vec<u8>> {
        self.outbox.lock().drain(..).collect()
    }
}

impl EventSink for MeteredEventSink {
    fn publish(&self, event: EndpointEvent) {
        match &event {
            EndpointEvent::PacketSent { packet, .. } => {
                self.metrics.packets_sent.inc();
                self.outbox.lock().push_back(packet.clone());
            }
            EndpointEvent::AttestationSubmitted { .. } => self.metrics.attestations.inc(),
            EndpointEvent::PacketCommitted { .. } => {
                self.metrics.packets_committed.inc();
                self.metrics.pending_entries.inc();
            }
            EndpointEvent::PacketDelivered { .. } => {
                self.metrics.packets_delivered.inc();
                self.metrics.pending_entries.dec();
            }
            EndpointEvent::DeliveryFailed { .. } => {
                self.metrics.delivery_failures.inc();
                self.metrics.pending_entries.dec();
            }
            EndpointEvent::NonceSkipped { .. } => self.metrics.nonces_skipped.inc(),
            EndpointEvent::PathwayConfigured { .. }
            | EndpointEvent::LibraryMigrationScheduled { .. } => {}
        }
        self.inner.publish(event);
    }
}
