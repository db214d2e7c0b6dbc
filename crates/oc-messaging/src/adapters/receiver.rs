//! Receiver adapters for the `MessageReceiver` port.

use crate::domain::{Hash, Origin, ReceiveError};
use crate::ports::MessageReceiver;
use parking_lot::Mutex;

/// Closure-backed receiver.
pub struct FnReceiver<F> {
    handler: F,
}

impl<F> FnReceiver<F>
where
    F: Fn(Origin, &Hash, &[u8]) -> Result<(), ReceiveError> + Send + Sync,
{
    /// Wrap a handler.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> MessageReceiver for FnReceiver<F>
where
    F: Fn(Origin, &Hash, &[u8]) -> Result<(), ReceiveError> + Send + Sync,
{
    fn on_message(&self, origin: Origin, guid: &Hash, message: &[u8]) -> Result<(), ReceiveError> {
        (self.handler)(origin, guid, message)
    }
}

/// One delivered message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    /// Where it came from.
    pub origin: Origin,
    /// Packet guid.
    pub guid: Hash,
    /// Message body.
    pub message: Vec<u8>,
}

/// Records deliveries; can be told to reject the next calls.
#[derive(Debug, Default)]
pub struct RecordingReceiver {
    deliveries: Mutex<Vec<Delivery>>,
    reject_next: Mutex<u32>,
}

impl RecordingReceiver {
    /// Create a receiver that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` deliveries.
    pub fn reject_next(&self, count: u32) {
        *self.reject_next.lock() = count;
    }

    /// Accepted deliveries in order.
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    /// Accepted nonces in order.
    pub fn nonces(&self) -> Vec<u64> {
        self.deliveries.lock().iter().map(|d| d.origin.nonce).collect()
    }
}

impl MessageReceiver for RecordingReceiver {
    fn on_message(&self, origin: Origin, guid: &Hash, message: &[u8]) -> Result<(), ReceiveError> {
        {
            let mut reject = self.reject_next.lock();
            if *reject > 0 {
                *reject -= 1;
                return Err(ReceiveError::new("rejected by receiver"));
            }
        }
        self.deliveries.lock().push(Delivery {
            origin,
            guid: *guid,
            message: message.to_vec(),
        });
        Ok(())
    }
}
