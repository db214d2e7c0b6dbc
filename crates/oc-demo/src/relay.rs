//! In-process verifiers and deliverer.
//!
//! Stand-ins for the off-chain actors: every verifier attests to every
//! packet it sees, and the deliverer commits and executes as soon as the
//! quorum holds.

use anyhow::{bail, Context};
use oc_messaging::{
    Address, CommitOutcome, DelivererApi, EventSink, ExecuteRequest, MessagingEndpoint, Packet,
    TimeSource, VerifierApi, VerifierId,
};
use oc_telemetry::log_endpoint_event;

/// An off-chain verifier reporting a fixed confirmation depth.
#[derive(Clone, Copy, Debug)]
pub struct Verifier {
    pub id: VerifierId,
    pub confirmations: u64,
}

/// Carries packets to the destination endpoint.
pub struct Relay {
    pub deliverer: Address,
    pub verifiers: Vec<Verifier>,
}

impl Relay {
    /// Attest, commit and execute one encoded packet on `dst`.
    pub fn deliver<C, E>(
        &self,
        dst: &MessagingEndpoint<C, E>,
        bytes: &[u8],
    ) -> anyhow::Result<()>
    where
        C: TimeSource,
        E: EventSink,
    {
        let packet = Packet::decode(bytes).context("transport delivered a malformed packet")?;
        let header = packet.header.encode();

        for verifier in &self.verifiers {
            dst.submit_attestation(
                verifier.id,
                packet.header_hash(),
                packet.payload_hash(),
                verifier.confirmations,
            )?;
        }
        if let Some(shortfall) = dst.verifiable(&header, packet.payload_hash())? {
            bail!("quorum not reached for nonce {}: {:?}", packet.header.nonce, shortfall);
        }

        let library = dst.active_library(&packet.header.receiver_path())?;
        match dst.try_commit(&self.deliverer, &header, packet.payload_hash(), library)? {
            CommitOutcome::Committed { key, .. } => {
                log_endpoint_event!(
                    debug,
                    dst.local_chain_id(),
                    "Packet committed",
                    nonce = key.nonce
                );
            }
            CommitOutcome::Pending(shortfall) => {
                bail!("commit pending for nonce {}: {:?}", packet.header.nonce, shortfall)
            }
        }

        dst.execute(&self.deliverer, ExecuteRequest::from_packet(&packet))?;
        Ok(())
    }
}
