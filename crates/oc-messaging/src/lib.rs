//! # OC Messaging
//!
//! Omnichain message verification-and-delivery core.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Take a message an application sends on one chain and make it executable
//! exactly once, in nonce order, on the destination chain, once an off-chain
//! verifier quorum has attested to it.
//!
//! ## Message Lifecycle
//!
//! ```text
//! send ──→ packet + guid ──→ (transport) ──→ attestations ──→ try_commit
//!                                                                │ quorum
//!                                                                ▼
//!          callback ◀── entry cleared ◀── checkpoint + 1 ◀── execute
//! ```
//!
//! ## Security Properties
//!
//! | Defense | Description |
//! |---------|-------------|
//! | Peer binding | Packets accepted only from the sender registered for the pathway |
//! | Quorum | All required verifiers plus an optional threshold, at min confirmations |
//! | Payload integrity | Execution recomputes keccak256(guid ‖ message) |
//! | Exactly once | Entry deleted before the callback runs |
//! | Ordering | Only `checkpoint + 1` may execute |
//!
//! ## Module Structure
//!
//! ```text
//! oc-messaging/
//! ├── domain/      # Codec, registries, nonce manager, channel, errors
//! ├── ports/       # MessagingApi, VerifierApi, DelivererApi, AdminApi, SPI
//! ├── adapters/    # Clocks, event sinks, receivers
//! ├── config.rs    # EndpointConfig
//! └── service.rs   # MessagingEndpoint
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::{
    Delivery, FnReceiver, InMemoryEventLog, ManualClock, RecordingReceiver, SystemClock,
    TracingEventSink,
};
pub use config::{parse_address, EndpointConfig, DEFAULT_MAX_VERIFIERS_PER_SET};
pub use domain::{
    derive_guid, keccak256, payload_hash, Address, Attestation, AttestationKey, ChainId,
    ChannelKey, EndpointEvent, EndpointSnapshot, Hash, InboundKey, LibraryMigration,
    LibraryVersion, MessagingError, MessagingResult, Origin, OutboundKey, Packet, PacketHeader,
    PathKey, Pathway, PathwayConfig, QuorumShortfall, ReceiveError, VerifierId, HEADER_LEN,
    MESSAGE_OFFSET, PACKET_VERSION,
};
pub use ports::{
    AdminApi, CommitOutcome, DelivererApi, EventSink, ExecuteRequest, MessageReceiver,
    MessagingApi, SendReceipt, TimeSource, VerifierApi,
};
pub use service::MessagingEndpoint;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
