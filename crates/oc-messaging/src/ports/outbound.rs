//! # Outbound Ports
//!
//! What the endpoint needs from its environment.

use crate::domain::{EndpointEvent, Hash, Origin, ReceiveError};

/// Application callback invoked once per executed packet.
///
/// Runs with no endpoint lock held; calling back into the endpoint is allowed.
pub trait MessageReceiver: Send + Sync {
    /// Handle an inbound message. An error consumes the nonce.
    fn on_message(&self, origin: Origin, guid: &Hash, message: &[u8]) -> Result<(), ReceiveError>;
}

/// Clock used for library migration windows.
pub trait TimeSource: Send + Sync {
    /// Current time in seconds.
    fn now(&self) -> u64;
}

/// Destination for endpoint events.
pub trait EventSink: Send + Sync {
    /// Publish one event.
    fn publish(&self, event: EndpointEvent);
}
