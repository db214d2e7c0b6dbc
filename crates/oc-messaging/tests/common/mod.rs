//! Two-chain harness shared by the integration tests.
//!
//! Chain A hosts `APP_A`, chain B hosts `APP_B`; each is the other's peer.
//! Packets flow A → B unless a test builds its own.

#![allow(dead_code)]

use oc_messaging::{
    AdminApi, ChainId, CommitOutcome, DelivererApi, EndpointConfig, ExecuteRequest,
    InMemoryEventLog, InboundKey, LibraryVersion, ManualClock, MessagingApi, MessagingEndpoint,
    MessagingResult, Packet, PathKey, PathwayConfig, RecordingReceiver, VerifierApi, VerifierId,
};
use std::sync::Arc;

pub const CHAIN_A: ChainId = 30101;
pub const CHAIN_B: ChainId = 30184;

pub const OWNER: [u8; 32] = [0x01; 32];
pub const DELIVERER: [u8; 32] = [0xDE; 32];
pub const APP_A: [u8; 32] = [0xA0; 32];
pub const APP_B: [u8; 32] = [0xB0; 32];
pub const ADMIN_B: [u8; 32] = [0xAD; 32];
pub const MALLORY: [u8; 32] = [0x66; 32];

pub const VERIFIER_A: VerifierId = VerifierId([0x0A; 32]);
pub const VERIFIER_B: VerifierId = VerifierId([0x0B; 32]);

pub const LIB_V1: LibraryVersion = LibraryVersion::new(1, 0, 2);
pub const LIB_V2: LibraryVersion = LibraryVersion::new(2, 0, 2);

pub type Endpoint = MessagingEndpoint<ManualClock, InMemoryEventLog>;

pub struct Net {
    pub a: Arc<Endpoint>,
    pub b: Arc<Endpoint>,
    pub b_events: Arc<InMemoryEventLog>,
    pub b_clock: Arc<ManualClock>,
    pub inbox: Arc<RecordingReceiver>,
    /// Verifiers whose attestations `deliver` submits.
    pub verifiers: Vec<VerifierId>,
}

fn endpoint(chain: ChainId) -> (Arc<Endpoint>, Arc<InMemoryEventLog>, Arc<ManualClock>) {
    let events = Arc::new(InMemoryEventLog::new());
    let clock = Arc::new(ManualClock::default());
    let endpoint = MessagingEndpoint::new(
        EndpointConfig::new(chain, OWNER),
        clock.clone(),
        events.clone(),
    )
    .unwrap();
    endpoint.register_library(&OWNER, LIB_V1).unwrap();
    endpoint.register_library(&OWNER, LIB_V2).unwrap();
    endpoint.set_default_library(&OWNER, CHAIN_A, LIB_V1).unwrap();
    endpoint.set_default_library(&OWNER, CHAIN_B, LIB_V1).unwrap();
    endpoint.add_deliverer(&OWNER, DELIVERER).unwrap();
    (Arc::new(endpoint), events, clock)
}

/// Both verifiers required.
pub fn two_required() -> PathwayConfig {
    PathwayConfig::with_required([VERIFIER_A, VERIFIER_B])
}

pub fn setup(inbound_config: PathwayConfig) -> Net {
    let (a, _, _) = endpoint(CHAIN_A);
    let (b, b_events, b_clock) = endpoint(CHAIN_B);

    a.register_application(&APP_A, APP_A, APP_A, Arc::new(RecordingReceiver::new()))
        .unwrap();
    a.create_pathway(&APP_A, PathKey::new(APP_A, CHAIN_B), two_required(), None)
        .unwrap();
    a.set_peer(&APP_A, PathKey::new(APP_A, CHAIN_B), APP_B).unwrap();

    let verifiers = inbound_config
        .required_verifiers
        .iter()
        .chain(inbound_config.optional_verifiers.iter())
        .copied()
        .collect();

    let inbox = Arc::new(RecordingReceiver::new());
    b.register_application(&APP_B, APP_B, ADMIN_B, inbox.clone())
        .unwrap();
    b.create_pathway(&ADMIN_B, PathKey::new(APP_B, CHAIN_A), inbound_config, None)
        .unwrap();
    b.set_peer(&ADMIN_B, PathKey::new(APP_B, CHAIN_A), APP_A).unwrap();

    Net {
        a,
        b,
        b_events,
        b_clock,
        inbox,
        verifiers,
    }
}

impl Net {
    /// Send from `APP_A` to `APP_B` and decode what the transport would carry.
    pub fn send(&self, message: &[u8]) -> Packet {
        let receipt = self.a.send(APP_A, CHAIN_B, APP_B, message).unwrap();
        Packet::decode(&receipt.packet).unwrap()
    }

    pub fn attest(&self, packet: &Packet, verifier: VerifierId, confirmations: u64) {
        self.b
            .submit_attestation(
                verifier,
                packet.header_hash(),
                packet.payload_hash(),
                confirmations,
            )
            .unwrap();
    }

    pub fn attest_all(&self, packet: &Packet) {
        for verifier in self.verifiers.clone() {
            self.attest(packet, verifier, 1);
        }
    }

    pub fn commit(&self, packet: &Packet) -> MessagingResult<CommitOutcome> {
        self.b.try_commit(
            &DELIVERER,
            &packet.header.encode(),
            packet.payload_hash(),
            LIB_V1,
        )
    }

    pub fn execute(&self, packet: &Packet) -> MessagingResult<()> {
        self.b
            .execute(&DELIVERER, ExecuteRequest::from_packet(packet))
    }

    /// Attest with every verifier, commit and execute.
    pub fn deliver(&self, packet: &Packet) {
        self.attest_all(packet);
        assert!(self.commit(packet).unwrap().is_committed());
        self.execute(packet).unwrap();
    }

    /// Inbound path on B for packets from `APP_A`.
    pub fn inbound(&self) -> InboundKey {
        InboundKey {
            receiver: APP_B,
            src_chain: CHAIN_A,
            sender: APP_A,
        }
    }
}
