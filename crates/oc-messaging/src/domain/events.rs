//! # Endpoint Events
//!
//! State changes published through the `EventSink` port.

use super::errors::{Address, ChainId, Hash};
use super::value_objects::{ChannelKey, LibraryVersion, PathKey, VerifierId};
use serde::{Deserialize, Serialize};

/// Every observable state change of a messaging endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndpointEvent {
    // =========================================================================
    // OUTBOUND
    // =========================================================================
    /// An application sent a message.
    PacketSent {
        /// Packet guid.
        guid: Hash,
        /// Outbound nonce.
        nonce: u64,
        /// Sending application.
        sender: Address,
        /// Destination chain.
        dst_chain: ChainId,
        /// Receiving application.
        receiver: Address,
        /// Encoded packet bytes for the transport.
        packet: Vec<u8>,
    },

    // =========================================================================
    // VERIFICATION
    // =========================================================================
    /// A verifier attested to a header/payload pair.
    AttestationSubmitted {
        /// Header hash attested.
        header_hash: Hash,
        /// Payload hash attested.
        payload_hash: Hash,
        /// Attesting verifier.
        verifier: VerifierId,
        /// Confirmations reported.
        confirmations: u64,
    },

    /// Quorum reached; the packet is ready for execution.
    PacketCommitted {
        /// Channel key of the new entry.
        key: ChannelKey,
        /// Packet guid.
        guid: Hash,
        /// Committed payload hash.
        payload_hash: Hash,
    },

    // =========================================================================
    // EXECUTION
    // =========================================================================
    /// The application callback completed.
    PacketDelivered {
        /// Executed key.
        key: ChannelKey,
        /// Packet guid.
        guid: Hash,
    },

    /// The application callback failed; the nonce is consumed.
    DeliveryFailed {
        /// Executed key.
        key: ChannelKey,
        /// Packet guid.
        guid: Hash,
        /// Application-supplied reason.
        reason: String,
    },

    /// An administrator skipped an uncommitted nonce.
    NonceSkipped {
        /// Skipped key.
        key: ChannelKey,
    },

    // =========================================================================
    // CONFIGURATION
    // =========================================================================
    /// A pathway was created or updated.
    PathwayConfigured {
        /// Pathway key.
        key: PathKey,
        /// Revision after the change.
        revision: u32,
        /// Active library version.
        library: LibraryVersion,
    },

    /// A library migration was scheduled on a pathway.
    LibraryMigrationScheduled {
        /// Pathway key.
        key: PathKey,
        /// Version before cutover.
        old_version: LibraryVersion,
        /// Version from cutover.
        new_version: LibraryVersion,
        /// Cutover instant.
        cutover: u64,
        /// Expiry of the old version.
        expiry: u64,
    },
}

impl EndpointEvent {
    /// Short event name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PacketSent { .. } => "PacketSent",
            Self::AttestationSubmitted { .. } => "AttestationSubmitted",
            Self::PacketCommitted { .. } => "PacketCommitted",
            Self::PacketDelivered { .. } => "PacketDelivered",
            Self::DeliveryFailed { .. } => "DeliveryFailed",
            Self::NonceSkipped { .. } => "NonceSkipped",
            Self::PathwayConfigured { .. } => "PathwayConfigured",
            Self::LibraryMigrationScheduled { .. } => "LibraryMigrationScheduled",
        }
    }
}
