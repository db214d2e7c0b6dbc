//! # OC Demo
//!
//! Two endpoints (chain A and chain B) in one process, an application on
//! each side exchanging PING and PONG, two verifiers and one deliverer
//! carrying packets between them.
//!
//! ```text
//! PingApp(A) ──send──→ Endpoint A ──packet──→ Relay ──→ Endpoint B ──→ PongApp(B)
//!      ▲                                                                  │
//!      └──────────── Endpoint A ◀── Relay ◀── packet ◀── Endpoint B ◀────┘
//! ```
//!
//! Configure logging with `OC_LOG_LEVEL` / `OC_JSON_LOGS`; set `OC_ROUNDS`
//! to change the number of pings.

mod app;
mod relay;
mod sink;

use std::sync::Arc;

use anyhow::Result;
use oc_messaging::{
    AdminApi, Address, ChainId, EndpointConfig, LibraryVersion, MessagingApi, MessagingEndpoint,
    PathKey, PathwayConfig, SystemClock, VerifierId,
};
use oc_telemetry::{
    init_telemetry, log_endpoint_event, EndpointMetrics, TelemetryConfig, TelemetryGuard,
};
use tracing::{info, warn};

use crate::app::{PingPong, PingPongApp};
use crate::relay::{Relay, Verifier};
use crate::sink::MeteredEventSink;

const CHAIN_A: ChainId = 30101;
const CHAIN_B: ChainId = 30184;

const OWNER: Address = [0x01; 32];
const DELIVERER: Address = [0xDE; 32];
const PING_APP: Address = [0xA0; 32];
const PONG_APP: Address = [0xB0; 32];

const LIBRARY: LibraryVersion = LibraryVersion::new(1, 0, 2);
const DEFAULT_ROUNDS: u32 = 3;

type Endpoint = MessagingEndpoint<SystemClock, MeteredEventSink>;

/// One chain: its endpoint, its application and its event sink.
struct Chain {
    endpoint: Endpoint,
    sink: Arc<MeteredEventSink>,
    app: Arc<PingPongApp>,
    app_address: Address,
}

fn build_chain(
    chain: ChainId,
    remote: ChainId,
    app_address: Address,
    peer: Address,
    name: &'static str,
    quorum: &PathwayConfig,
    telemetry: &TelemetryGuard,
) -> Result<Chain> {
    let sink = Arc::new(MeteredEventSink::new(telemetry.metrics().clone()));
    let endpoint = MessagingEndpoint::new(
        EndpointConfig::new(chain, OWNER),
        Arc::new(SystemClock),
        sink.clone(),
    )?;

    endpoint.register_library(&OWNER, LIBRARY)?;
    endpoint.set_default_library(&OWNER, remote, LIBRARY)?;
    endpoint.add_deliverer(&OWNER, DELIVERER)?;

    let app = Arc::new(PingPongApp::new(name));
    endpoint.register_application(&app_address, app_address, app_address, app.clone())?;
    let path = PathKey::new(app_address, remote);
    endpoint.create_pathway(&app_address, path, quorum.clone(), None)?;
    endpoint.set_peer(&app_address, path, peer)?;

    log_endpoint_event!(info, chain, "Chain ready", remote_chain = remote);
    Ok(Chain {
        endpoint,
        sink,
        app,
        app_address,
    })
}

/// Send everything `from` queued and deliver it on `to`.
fn pump(relay: &Relay, from: &Chain, to: &Chain, metrics: &EndpointMetrics) -> Result<usize> {
    let packets = from.sink.drain_outbox();
    for bytes in &packets {
        if let Err(err) = relay.deliver(&to.endpoint, bytes) {
            metrics.record_error("relay");
            return Err(err.context(format!(
                "delivery to chain {}",
                to.endpoint.local_chain_id()
            )));
        }
    }
    Ok(packets.len())
}

fn send(from: &Chain, to: &Chain, message: PingPong) -> Result<()> {
    let receipt = from.endpoint.send(
        from.app_address,
        to.endpoint.local_chain_id(),
        to.app_address,
        &message.encode()?,
    )?;
    log_endpoint_event!(
        debug,
        from.endpoint.local_chain_id(),
        "Message sent",
        nonce = receipt.nonce
    );
    Ok(())
}

fn rounds_from_env() -> u32 {
    match std::env::var("OC_ROUNDS") {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            warn!("OC_ROUNDS={} is not a number, using {}", value, DEFAULT_ROUNDS);
            DEFAULT_ROUNDS
        }),
        Err(_) => DEFAULT_ROUNDS,
    }
}

fn main() -> Result<()> {
    let telemetry = init_telemetry(TelemetryConfig::for_endpoint("oc-demo"))?;
    let rounds = rounds_from_env();

    let verifiers = vec![
        Verifier {
            id: VerifierId([0x0A; 32]),
            confirmations: 15,
        },
        Verifier {
            id: VerifierId([0x0B; 32]),
            confirmations: 20,
        },
    ];
    let quorum = PathwayConfig::with_required(verifiers.iter().map(|v| v.id)).min_confirmations(15);
    let relay = Relay {
        deliverer: DELIVERER,
        verifiers,
    };

    let a = build_chain(CHAIN_A, CHAIN_B, PING_APP, PONG_APP, "ping", &quorum, &telemetry)?;
    let b = build_chain(CHAIN_B, CHAIN_A, PONG_APP, PING_APP, "pong", &quorum, &telemetry)?;

    for seq in 1..=rounds {
        send(&a, &b, PingPong::Ping { seq })?;
    }
    let delivered = pump(&relay, &a, &b, telemetry.metrics())?;
    info!(delivered, "Pings delivered");

    for reply in b.app.take_replies() {
        send(&b, &a, reply)?;
    }
    pump(&relay, &b, &a, telemetry.metrics())?;

    let pongs = a.app.pongs();
    info!(
        rounds,
        pongs = pongs.len(),
        checkpoint = a.endpoint.inbound_checkpoint(&oc_messaging::InboundKey {
            receiver: PING_APP,
            src_chain: CHAIN_B,
            sender: PONG_APP,
        }),
        "Demo finished"
    );
    anyhow::ensure!(
        pongs == (1..=rounds).collect::<Vec<_>>(),
        "expected pongs 1..={}, got {:?}",
        rounds,
        pongs
    );

    println!("{}", telemetry.metrics().encode()?);
    Ok(())
}
