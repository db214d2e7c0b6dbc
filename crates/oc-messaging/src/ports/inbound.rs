//! # Inbound Ports
//!
//! What a messaging endpoint can do, split by caller role.

use crate::domain::{
    Address, Attestation, ChainId, ChannelKey, EndpointSnapshot, Hash, InboundKey,
    LibraryMigration, LibraryVersion, MessagingResult, Packet, PathKey, Pathway, PathwayConfig,
    QuorumShortfall, VerifierId,
};
use crate::ports::outbound::MessageReceiver;
use std::sync::Arc;

/// Result of a successful send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendReceipt {
    /// Packet guid.
    pub guid: Hash,
    /// Outbound nonce assigned.
    pub nonce: u64,
    /// Encoded packet for the transport.
    pub packet: Vec<u8>,
}

/// Result of a commit attempt that did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Entry materialized; ready for execution.
    Committed {
        /// Channel key of the new entry.
        key: ChannelKey,
        /// Packet guid.
        guid: Hash,
    },
    /// Quorum not reached yet.
    Pending(QuorumShortfall),
}

impl CommitOutcome {
    /// Whether the packet committed.
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

/// Everything needed to execute one channel entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecuteRequest {
    /// Channel key.
    pub key: ChannelKey,
    /// Packet guid.
    pub guid: Hash,
    /// Message body.
    pub message: Vec<u8>,
}

impl ExecuteRequest {
    /// Build a request from a decoded packet.
    pub fn from_packet(packet: &Packet) -> Self {
        Self {
            key: packet.header.channel_key(),
            guid: packet.guid,
            message: packet.message.clone(),
        }
    }
}

/// Application-facing API.
pub trait MessagingApi: Send + Sync {
    /// Send `message` to `receiver` on `dst_chain`.
    fn send(
        &self,
        sender: Address,
        dst_chain: ChainId,
        receiver: Address,
        message: &[u8],
    ) -> MessagingResult<SendReceipt>;

    /// Last nonce issued on an outbound path.
    fn outbound_nonce(&self, sender: Address, dst_chain: ChainId, receiver: Address) -> u64;

    /// Highest executed nonce on an inbound path.
    fn inbound_checkpoint(&self, path: &InboundKey) -> u64;
}

/// Verifier-facing API.
pub trait VerifierApi: Send + Sync {
    /// Record an attestation for a header/payload pair.
    fn submit_attestation(
        &self,
        verifier: VerifierId,
        header_hash: Hash,
        payload_hash: Hash,
        confirmations: u64,
    ) -> MessagingResult<()>;

    /// Quorum check without committing. `None` means verifiable.
    fn verifiable(&self, header: &[u8], payload_hash: Hash)
        -> MessagingResult<Option<QuorumShortfall>>;

    /// Attestations currently held for a pair.
    fn attestations_for(&self, header_hash: Hash, payload_hash: Hash) -> Vec<Attestation>;
}

/// Deliverer-facing API. Every call requires the deliverer role.
pub trait DelivererApi: Send + Sync {
    /// Commit a packet whose quorum is met.
    fn try_commit(
        &self,
        caller: &Address,
        header: &[u8],
        payload_hash: Hash,
        library: LibraryVersion,
    ) -> MessagingResult<CommitOutcome>;

    /// Execute a committed entry exactly once.
    fn execute(&self, caller: &Address, request: ExecuteRequest) -> MessagingResult<()>;

    /// Re-run a failed delivery.
    fn retry_failed(&self, caller: &Address, request: ExecuteRequest) -> MessagingResult<()>;

    /// Committed, unexecuted nonces on an inbound path.
    fn pending_nonces(&self, path: &InboundKey) -> Vec<u64>;
}

/// Owner and application-admin API.
pub trait AdminApi: Send + Sync {
    /// Register an application (caller must be the application).
    fn register_application(
        &self,
        caller: &Address,
        app: Address,
        admin: Address,
        receiver: Arc<dyn MessageReceiver>,
    ) -> MessagingResult<()>;

    /// Create a pathway. `None` picks the chain's default library.
    fn create_pathway(
        &self,
        caller: &Address,
        key: PathKey,
        config: PathwayConfig,
        library: Option<LibraryVersion>,
    ) -> MessagingResult<Pathway>;

    /// Replace a pathway's verification policy.
    fn update_pathway(
        &self,
        caller: &Address,
        key: PathKey,
        config: PathwayConfig,
    ) -> MessagingResult<Pathway>;

    /// Register the counterpart application for a pathway.
    fn set_peer(&self, caller: &Address, key: PathKey, peer: Address) -> MessagingResult<()>;

    /// Skip the next expected nonce on an inbound path.
    fn skip(&self, caller: &Address, path: InboundKey, nonce: u64) -> MessagingResult<()>;

    /// Register a library version (owner).
    fn register_library(&self, caller: &Address, version: LibraryVersion) -> MessagingResult<()>;

    /// Default library for new pathways towards a chain (owner).
    fn set_default_library(
        &self,
        caller: &Address,
        remote_chain: ChainId,
        version: LibraryVersion,
    ) -> MessagingResult<()>;

    /// Schedule a library migration on a pathway (app admin).
    fn schedule_migration(
        &self,
        caller: &Address,
        key: PathKey,
        new_version: LibraryVersion,
        cutover: u64,
        expiry: u64,
    ) -> MessagingResult<LibraryMigration>;

    /// Grant the deliverer role (owner).
    fn add_deliverer(&self, caller: &Address, deliverer: Address) -> MessagingResult<bool>;

    /// Revoke the deliverer role (owner).
    fn remove_deliverer(&self, caller: &Address, deliverer: &Address) -> MessagingResult<bool>;

    /// Capture endpoint state.
    ///
    /// Channel entries, failed deliveries and nonces are captured at one
    /// moment. Attestations and commit markers are read separately, so a
    /// commit racing the snapshot may appear only in one of the two; take
    /// snapshots with deliverers quiescent for an exact copy.
    fn snapshot(&self) -> EndpointSnapshot;

    /// Replace endpoint state (owner).
    fn restore(&self, caller: &Address, snapshot: EndpointSnapshot) -> MessagingResult<()>;
}
