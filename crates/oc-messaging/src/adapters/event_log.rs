//! Event sink adapters.

use crate::domain::{short_hex, EndpointEvent};
use crate::ports::EventSink;
use parking_lot::RwLock;
use tracing::info;

/// Keeps every published event in memory.
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    events: RwLock<Vec<EndpointEvent>>,
}

impl InMemoryEventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// All events in publication order.
    pub fn events(&self) -> Vec<EndpointEvent> {
        self.events.read().clone()
    }

    /// Events whose name matches.
    pub fn named(&self, name: &str) -> Vec<EndpointEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.name() == name)
            .cloned()
            .collect()
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Whether nothing was published.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all events.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

impl EventSink for InMemoryEventLog {
    fn publish(&self, event: EndpointEvent) {
        self.events.write().push(event);
    }
}

/// Writes each event as a `tracing` record.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: EndpointEvent) {
        match &event {
            EndpointEvent::PacketSent {
                guid,
                nonce,
                dst_chain,
                ..
            } => info!(
                nonce = *nonce,
                dst_chain = *dst_chain,
                "[oc-messaging] event {} guid={}",
                event.name(),
                short_hex(guid)
            ),
            EndpointEvent::PacketCommitted { key, guid, .. }
            | EndpointEvent::PacketDelivered { key, guid } => info!(
                nonce = key.nonce,
                src_chain = key.src_chain,
                "[oc-messaging] event {} guid={}",
                event.name(),
                short_hex(guid)
            ),
            other => info!("[oc-messaging] event {}", other.name()),
        }
    }
}
