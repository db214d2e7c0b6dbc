//! # Endpoint Snapshot
//!
//! Durable image of an endpoint's state: pathways, attestations, counters and
//! checkpoints, channel entries, plus roles, peers, failed deliveries and
//! library migrations. Application receivers are process-local and are not
//! captured; re-register them after a restore.
//!
//! Format: \[MAGIC\]\[bincode(EndpointSnapshot)\]

use super::errors::{Address, ChainId, Hash, MessagingError, MessagingResult};
use super::library::LibraryMigration;
use super::pathway::Pathway;
use super::value_objects::{
    AttestationKey, ChannelKey, InboundKey, LibraryVersion, OutboundKey, PathKey,
};
use super::verification::Attestation;
use serde::{Deserialize, Serialize};

/// Magic bytes plus format version.
const SNAPSHOT_MAGIC: &[u8; 8] = b"OCSNAP\x00\x01";

/// Full endpoint state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSnapshot {
    /// Chain this endpoint serves.
    pub local_chain_id: ChainId,
    /// Pathways.
    pub pathways: Vec<Pathway>,
    /// Uncommitted attestations.
    pub attestations: Vec<Attestation>,
    /// Commit markers not yet released by execution.
    pub committed: Vec<AttestationKey>,
    /// Outbound nonce counters.
    pub outbound_nonces: Vec<(OutboundKey, u64)>,
    /// Inbound checkpoints.
    pub inbound_checkpoints: Vec<(InboundKey, u64)>,
    /// Verified, not yet executed entries.
    pub channel_entries: Vec<(ChannelKey, Hash)>,
    /// Failed deliveries awaiting retry.
    pub failed_deliveries: Vec<(ChannelKey, Hash)>,
    /// Authorized deliverers.
    pub deliverers: Vec<Address>,
    /// (application, admin) pairs.
    pub applications: Vec<(Address, Address)>,
    /// Registered peers.
    pub peers: Vec<(PathKey, Address)>,
    /// Registered library versions.
    pub libraries: Vec<LibraryVersion>,
    /// Default library per remote chain.
    pub default_libraries: Vec<(ChainId, LibraryVersion)>,
    /// Scheduled migrations.
    pub migrations: Vec<LibraryMigration>,
}

impl EndpointSnapshot {
    /// Encode with magic header.
    pub fn to_bytes(&self) -> MessagingResult<Vec<u8>> {
        let body = bincode::serialize(self).map_err(|e| MessagingError::Snapshot(e.to_string()))?;
        let mut buf = Vec::with_capacity(SNAPSHOT_MAGIC.len() + body.len());
        buf.extend_from_slice(SNAPSHOT_MAGIC);
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    /// Decode bytes produced by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> MessagingResult<Self> {
        let body = bytes
            .strip_prefix(SNAPSHOT_MAGIC.as_slice())
            .ok_or_else(|| MessagingError::Snapshot("invalid magic".to_string()))?;
        bincode::deserialize(body).map_err(|e| MessagingError::Snapshot(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_roundtrip() {
        let snapshot = EndpointSnapshot {
            local_chain_id: 30101,
            outbound_nonces: vec![(
                OutboundKey {
                    sender: [1; 32],
                    dst_chain: 2,
                    receiver: [3; 32],
                },
                7,
            )],
            libraries: vec![LibraryVersion::new(1, 0, 2)],
            ..Default::default()
        };
        let bytes = snapshot.to_bytes().unwrap();
        assert!(bytes.starts_with(SNAPSHOT_MAGIC));
        assert_eq!(EndpointSnapshot::from_bytes(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn test_bad_magic() {
        assert!(matches!(
            EndpointSnapshot::from_bytes(b"BADMAGIC"),
            Err(MessagingError::Snapshot(_))
        ));
    }

    #[test]
    fn test_truncated_body() {
        let bytes = EndpointSnapshot::default().to_bytes().unwrap();
        assert!(EndpointSnapshot::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }
}
