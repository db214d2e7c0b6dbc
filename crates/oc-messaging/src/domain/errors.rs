//! # Domain Errors
//!
//! Error types for the messaging core.
//!
//! Verification-side conditions (`Pending`, malformed attestations) are
//! reported to the calling verifier or deliverer and never reach the
//! application. Execution-side failures are terminal for the nonce.

use thiserror::Error;

/// Hash type (32-byte keccak256).
pub type Hash = [u8; 32];

/// Application identity (32-byte, chain-agnostic).
pub type Address = [u8; 32];

/// Chain identifier (endpoint id).
pub type ChainId = u32;

/// Short hex rendering used in error and log messages.
pub fn short_hex(bytes: &[u8]) -> String {
    let take = bytes.len().min(4);
    format!("{}..", hex::encode(&bytes[..take]))
}

fn peer_label(peer: &Option<Address>) -> String {
    match peer {
        Some(p) => short_hex(p),
        None => "<none>".to_string(),
    }
}

/// Messaging core error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagingError {
    /// Packet bytes violate length or field-width rules.
    #[error("Malformed packet: {reason}")]
    MalformedPacket {
        /// What was wrong
        reason: String,
    },

    /// Attestation rejected before storage.
    #[error("Malformed attestation: {reason}")]
    MalformedAttestation {
        /// What was wrong
        reason: String,
    },

    /// No pathway for (app, remote chain).
    #[error("Pathway not configured: app {} remote chain {remote_chain}", short_hex(.app))]
    PathNotConfigured {
        /// Local application
        app: Address,
        /// Counterpart chain
        remote_chain: ChainId,
    },

    /// Pathway already exists (use update).
    #[error("Pathway already exists: app {} remote chain {remote_chain}", short_hex(.app))]
    PathwayExists {
        /// Local application
        app: Address,
        /// Counterpart chain
        remote_chain: ChainId,
    },

    /// Pathway configuration fails validation.
    #[error("Invalid pathway config: {reason}")]
    InvalidPathwayConfig {
        /// Validation failure
        reason: String,
    },

    /// Claimed counterpart is not the registered peer.
    #[error("Untrusted peer on chain {remote_chain}: expected {}, got {}", peer_label(.expected), short_hex(.claimed))]
    UntrustedPeer {
        /// Counterpart chain
        remote_chain: ChainId,
        /// Registered peer, if any
        expected: Option<Address>,
        /// Sender claimed by the packet or caller
        claimed: Address,
    },

    /// Quorum already committed for this header/payload pair.
    #[error("Already committed: header {}", short_hex(.header_hash))]
    AlreadyCommitted {
        /// Header hash of the committed packet
        header_hash: Hash,
    },

    /// A channel entry already exists for this key.
    #[error("Duplicate commit for nonce {nonce} (same payload: {same_payload})")]
    DuplicateCommit {
        /// Nonce of the channel key
        nonce: u64,
        /// Whether the stored hash equals the new one
        same_payload: bool,
    },

    /// Nonce at or below the inbound checkpoint.
    #[error("Nonce {nonce} already executed (checkpoint {checkpoint})")]
    AlreadyExecuted {
        /// Requested nonce
        nonce: u64,
        /// Current checkpoint
        checkpoint: u64,
    },

    /// Lower nonce must be executed first.
    #[error("Nonce gap: next expected {next_expected}, requested {requested}")]
    NonceGap {
        /// checkpoint + 1
        next_expected: u64,
        /// Nonce the caller asked for
        requested: u64,
    },

    /// Supplied payload does not hash to the stored payload hash.
    #[error("Payload mismatch: expected {}, got {}", short_hex(.expected), short_hex(.actual))]
    PayloadMismatch {
        /// Stored hash
        expected: Hash,
        /// Hash of the supplied payload
        actual: Hash,
    },

    /// Outbound counter would exceed u64.
    #[error("Outbound nonce counter overflow")]
    CounterOverflow,

    /// Skip refused: the nonce already has a channel entry.
    #[error("Nonce {nonce} is committed and must be executed, not skipped")]
    NonceCommitted {
        /// Requested nonce
        nonce: u64,
    },

    /// Nothing to execute for this key.
    #[error("No pending entry for nonce {nonce}")]
    NotFound {
        /// Requested nonce
        nonce: u64,
    },

    /// The application callback returned an error. Terminal for the nonce.
    #[error("Application callback failed for nonce {nonce}: {reason}")]
    CallbackFailed {
        /// Executed nonce
        nonce: u64,
        /// Reason reported by the application
        reason: String,
    },

    /// Caller does not hold the deliverer role.
    #[error("Unauthorized deliverer: {}", short_hex(.caller))]
    UnauthorizedDeliverer {
        /// Rejected caller
        caller: Address,
    },

    /// Caller is not allowed to perform an administrative action.
    #[error("Unauthorized: {} may not {action}", short_hex(.caller))]
    Unauthorized {
        /// Rejected caller
        caller: Address,
        /// Attempted action
        action: &'static str,
    },

    /// Application has not registered with the endpoint.
    #[error("Application not registered: {}", short_hex(.app))]
    ApplicationNotRegistered {
        /// Application identity
        app: Address,
    },

    /// Message exceeds the pathway size limit.
    #[error("Message too large: {size} bytes, max {max}")]
    MessageTooLarge {
        /// Message length
        size: usize,
        /// Pathway limit
        max: u32,
    },

    /// Packet is addressed to another chain.
    #[error("Invalid destination: packet for chain {got}, local chain {expected}")]
    InvalidDestination {
        /// Local chain id
        expected: ChainId,
        /// Packet destination
        got: ChainId,
    },

    /// Library version not registered.
    #[error("Unknown library: {version}")]
    UnknownLibrary {
        /// Requested version
        version: String,
    },

    /// Library version registered twice.
    #[error("Library already registered: {version}")]
    LibraryAlreadyRegistered {
        /// Duplicate version
        version: String,
    },

    /// Library not valid for the pathway at this time.
    #[error("Library {version} not valid for pathway at {at}")]
    InvalidLibrary {
        /// Offered version
        version: String,
        /// Evaluation time
        at: u64,
    },

    /// Migration parameters rejected.
    #[error("Invalid migration window: {reason}")]
    InvalidMigrationWindow {
        /// Validation failure
        reason: String,
    },

    /// Snapshot encode/decode failure.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Endpoint configuration rejected.
    #[error("Invalid config: {0}")]
    Config(String),
}

impl MessagingError {
    /// Conditions the caller is expected to retry after resolving ordering.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::NonceGap { .. })
    }

    /// Conditions that must never be retried automatically.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::PayloadMismatch { .. } | Self::CounterOverflow | Self::UntrustedPeer { .. }
        )
    }
}

/// Error returned by an application callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ReceiveError {
    /// Application-supplied reason
    pub reason: String,
}

impl ReceiveError {
    /// Create a receive error.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Result type for messaging operations.
pub type MessagingResult<T> = Result<T, MessagingError>;
