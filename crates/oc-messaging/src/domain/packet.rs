//! # Packet Codec
//!
//! Wire format (big-endian integers):
//!
//! ```text
//! offset  width  field
//!      0      1  version
//!      1      8  nonce
//!      9      4  src_chain
//!     13     32  sender
//!     45      4  dst_chain
//!     49     32  receiver
//!     81     32  guid
//!    113      n  message
//! ```
//!
//! Bytes `[0, 81)` are the header, bytes `[81, ..)` the payload. Verifiers
//! attest to `keccak256(header)` and `keccak256(guid ‖ message)`.

use super::errors::{Address, ChainId, Hash, MessagingError, MessagingResult};
use super::value_objects::{ChannelKey, InboundKey, OutboundKey, PathKey};
use sha3::{Digest, Keccak256};

/// Current packet version.
pub const PACKET_VERSION: u8 = 1;

/// Header length in bytes.
pub const HEADER_LEN: usize = 81;

/// Offset of the guid in an encoded packet.
pub const GUID_OFFSET: usize = HEADER_LEN;

/// Offset of the message in an encoded packet.
pub const MESSAGE_OFFSET: usize = GUID_OFFSET + 32;

/// keccak256 over the concatenation of `parts`.
pub fn keccak256(parts: &[&[u8]]) -> Hash {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Global message identifier. The message body is not part of the guid.
pub fn derive_guid(
    nonce: u64,
    src_chain: ChainId,
    sender: &Address,
    dst_chain: ChainId,
    receiver: &Address,
) -> Hash {
    keccak256(&[
        &nonce.to_be_bytes(),
        &src_chain.to_be_bytes(),
        sender,
        &dst_chain.to_be_bytes(),
        receiver,
    ])
}

/// Hash bound into a channel entry.
pub fn payload_hash(guid: &Hash, message: &[u8]) -> Hash {
    keccak256(&[guid, message])
}

/// Packet header: everything a verifier needs to route a packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PacketHeader {
    /// Outbound nonce assigned by the source endpoint.
    pub nonce: u64,
    /// Source chain.
    pub src_chain: ChainId,
    /// Sending application.
    pub sender: Address,
    /// Destination chain.
    pub dst_chain: ChainId,
    /// Receiving application.
    pub receiver: Address,
}

impl PacketHeader {
    /// Encode to the fixed 81-byte layout.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0] = PACKET_VERSION;
        out[1..9].copy_from_slice(&self.nonce.to_be_bytes());
        out[9..13].copy_from_slice(&self.src_chain.to_be_bytes());
        out[13..45].copy_from_slice(&self.sender);
        out[45..49].copy_from_slice(&self.dst_chain.to_be_bytes());
        out[49..81].copy_from_slice(&self.receiver);
        out
    }

    /// Decode exactly [`HEADER_LEN`] bytes.
    pub fn decode(bytes: &[u8]) -> MessagingResult<Self> {
        if bytes.len() != HEADER_LEN {
            return Err(malformed(format!(
                "header must be {} bytes, got {}",
                HEADER_LEN,
                bytes.len()
            )));
        }
        if bytes[0] != PACKET_VERSION {
            return Err(malformed(format!("unsupported packet version {}", bytes[0])));
        }
        Ok(Self {
            nonce: u64::from_be_bytes(read_array(&bytes[1..9])),
            src_chain: u32::from_be_bytes(read_array(&bytes[9..13])),
            sender: read_array(&bytes[13..45]),
            dst_chain: u32::from_be_bytes(read_array(&bytes[45..49])),
            receiver: read_array(&bytes[49..81]),
        })
    }

    /// keccak256 of the encoded header.
    pub fn hash(&self) -> Hash {
        keccak256(&[&self.encode()])
    }

    /// Guid derived from the header fields.
    pub fn guid(&self) -> Hash {
        derive_guid(
            self.nonce,
            self.src_chain,
            &self.sender,
            self.dst_chain,
            &self.receiver,
        )
    }

    /// Channel key on the destination chain.
    pub fn channel_key(&self) -> ChannelKey {
        ChannelKey {
            receiver: self.receiver,
            src_chain: self.src_chain,
            sender: self.sender,
            nonce: self.nonce,
        }
    }

    /// Inbound path on the destination chain.
    pub fn inbound_key(&self) -> InboundKey {
        self.channel_key().inbound()
    }

    /// Receiver's pathway for the source chain.
    pub fn receiver_path(&self) -> PathKey {
        PathKey::new(self.receiver, self.src_chain)
    }

    /// Outbound counter key on the source chain.
    pub fn outbound_key(&self) -> OutboundKey {
        OutboundKey {
            sender: self.sender,
            dst_chain: self.dst_chain,
            receiver: self.receiver,
        }
    }
}

/// Immutable wire packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    /// Routing header.
    pub header: PacketHeader,
    /// Global identifier, derived from the header.
    pub guid: Hash,
    /// Opaque application message.
    pub message: Vec<u8>,
}

impl Packet {
    /// Build a packet, deriving its guid.
    pub fn new(header: PacketHeader, message: Vec<u8>) -> Self {
        let guid = header.guid();
        Self {
            header,
            guid,
            message,
        }
    }

    /// Encode header ‖ guid ‖ message.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MESSAGE_OFFSET + self.message.len());
        out.extend_from_slice(&self.header.encode());
        out.extend_from_slice(&self.guid);
        out.extend_from_slice(&self.message);
        out
    }

    /// Decode and check the guid against the header.
    pub fn decode(bytes: &[u8]) -> MessagingResult<Self> {
        if bytes.len() < MESSAGE_OFFSET {
            return Err(malformed(format!(
                "packet must be at least {} bytes, got {}",
                MESSAGE_OFFSET,
                bytes.len()
            )));
        }
        let header = PacketHeader::decode(&bytes[..HEADER_LEN])?;
        let guid: Hash = read_array(&bytes[GUID_OFFSET..MESSAGE_OFFSET]);
        if guid != header.guid() {
            return Err(malformed("guid does not match header".to_string()));
        }
        Ok(Self {
            header,
            guid,
            message: bytes[MESSAGE_OFFSET..].to_vec(),
        })
    }

    /// keccak256 of the header.
    pub fn header_hash(&self) -> Hash {
        self.header.hash()
    }

    /// keccak256 of guid ‖ message.
    pub fn payload_hash(&self) -> Hash {
        payload_hash(&self.guid, &self.message)
    }

    /// Payload section of the wire packet (guid ‖ message).
    pub fn payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 + self.message.len());
        out.extend_from_slice(&self.guid);
        out.extend_from_slice(&self.message);
        out
    }
}

fn malformed(reason: String) -> MessagingError {
    MessagingError::MalformedPacket { reason }
}

// Callers pass slices whose length is fixed by the layout constants above.
fn read_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}
