//! # Domain Value Objects
//!
//! Keys and identifiers shared by every component of the core.
//!
//! Naming follows the direction of travel: outbound keys are seen from the
//! sending application, inbound keys from the receiving application.

use super::errors::{short_hex, Address, ChainId, Hash};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Off-chain verifier identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VerifierId(pub Address);

impl fmt::Display for VerifierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "verifier:{}", short_hex(&self.0))
    }
}

/// Pathway key: a local application and one counterpart chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathKey {
    /// Local application.
    pub app: Address,
    /// Counterpart chain.
    pub remote_chain: ChainId,
}

impl PathKey {
    /// Create a pathway key.
    pub fn new(app: Address, remote_chain: ChainId) -> Self {
        Self { app, remote_chain }
    }
}

/// Outbound counter key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutboundKey {
    /// Sending application.
    pub sender: Address,
    /// Destination chain.
    pub dst_chain: ChainId,
    /// Receiving application on the destination chain.
    pub receiver: Address,
}

/// Inbound checkpoint key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InboundKey {
    /// Receiving (local) application.
    pub receiver: Address,
    /// Source chain.
    pub src_chain: ChainId,
    /// Sending application on the source chain.
    pub sender: Address,
}

impl InboundKey {
    /// Channel key for `nonce` on this inbound path.
    pub fn at(&self, nonce: u64) -> ChannelKey {
        ChannelKey {
            receiver: self.receiver,
            src_chain: self.src_chain,
            sender: self.sender,
            nonce,
        }
    }

    /// Pathway the receiver configured for the source chain.
    pub fn path(&self) -> PathKey {
        PathKey::new(self.receiver, self.src_chain)
    }
}

/// Message Channel key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelKey {
    /// Receiving (local) application.
    pub receiver: Address,
    /// Source chain.
    pub src_chain: ChainId,
    /// Sending application on the source chain.
    pub sender: Address,
    /// Packet nonce.
    pub nonce: u64,
}

impl ChannelKey {
    /// Inbound path this key belongs to.
    pub fn inbound(&self) -> InboundKey {
        InboundKey {
            receiver: self.receiver,
            src_chain: self.src_chain,
            sender: self.sender,
        }
    }

    /// Pathway the receiver configured for the source chain.
    pub fn path(&self) -> PathKey {
        PathKey::new(self.receiver, self.src_chain)
    }

    /// Origin handed to the application callback.
    pub fn origin(&self) -> Origin {
        Origin {
            src_chain: self.src_chain,
            sender: self.sender,
            nonce: self.nonce,
        }
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}->{}#{}",
            short_hex(&self.sender),
            self.src_chain,
            short_hex(&self.receiver),
            self.nonce
        )
    }
}

/// Where an inbound message came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin {
    /// Source chain.
    pub src_chain: ChainId,
    /// Sending application.
    pub sender: Address,
    /// Packet nonce.
    pub nonce: u64,
}

/// Attestation target: exact header hash and payload hash pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttestationKey {
    /// keccak256 of the 81-byte packet header.
    pub header_hash: Hash,
    /// keccak256 of guid ‖ message.
    pub payload_hash: Hash,
}

/// Message library (codec/verification ruleset) version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LibraryVersion {
    /// Major version.
    pub major: u64,
    /// Minor version.
    pub minor: u8,
    /// Endpoint protocol version the library targets.
    pub endpoint_version: u8,
}

impl LibraryVersion {
    /// Create a library version.
    pub const fn new(major: u64, minor: u8, endpoint_version: u8) -> Self {
        Self {
            major,
            minor,
            endpoint_version,
        }
    }
}

impl fmt::Display for LibraryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.endpoint_version)
    }
}
