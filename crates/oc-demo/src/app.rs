//! PING/PONG application.
//!
//! Each side answers a `Ping` with a `Pong` carrying the same sequence
//! number. Replies are queued here and sent by the driver, since the
//! callback must not block on its own endpoint.

use oc_messaging::{Hash, MessageReceiver, Origin, ReceiveError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Application message types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PingPong {
    /// Request a reply.
    Ping {
        /// Round number.
        seq: u32,
    },
    /// Reply to a ping.
    Pong {
        /// Round number of the ping answered.
        seq: u32,
    },
}

impl PingPong {
    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ReceiveError> {
        bincode::deserialize(bytes).map_err(|e| ReceiveError::new(format!("bad message: {}", e)))
    }
}

/// Receiver side of the application on one chain.
pub struct PingPongApp {
    name: &'static str,
    replies: Mutex<Vec<PingPong>>,
    pongs: Mutex<Vec<u32>>,
}

impl PingPongApp {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            replies: Mutex::new(Vec::new()),
            pongs: Mutex::new(Vec::new()),
        }
    }

    /// Replies waiting to be sent.
    pub fn take_replies(&self) -> Vec<PingPong> {
        std::mem::take(&mut *self.replies.lock())
    }

    /// Sequence numbers of every pong received.
    pub fn pongs(&self) -> Vec<u32> {
        self.pongs.lock().clone()
    }
}

impl MessageReceiver for PingPongApp {
    fn on_message(&self, origin: Origin, _guid: &Hash, message: &[u8]) -> Result<(), ReceiveError> {
        match PingPong::decode(message)? {
            PingPong::Ping { seq } => {
                info!(
                    seq,
                    nonce = origin.nonce,
                    src_chain = origin.src_chain,
                    "[{}] PING received",
                    self.name
                );
                self.replies.lock().push(PingPong::Pong { seq });
            }
            PingPong::Pong { seq } => {
                info!(
                    seq,
                    nonce = origin.nonce,
                    src_chain = origin.src_chain,
                    "[{}] PONG received",
                    self.name
                );
                self.pongs.lock().push(seq);
            }
        }
        Ok(())
    }
}
