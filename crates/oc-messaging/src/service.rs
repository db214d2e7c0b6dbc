//! Messaging Endpoint - composition of the domain components.
//!
//! ## Lock order
//!
//! commit markers → channel entries → inbound checkpoints. Registries that
//! are only read on a path (pathways, peers, libraries) are released before
//! the next lock is taken. Application callbacks run with no lock held.

use crate::config::EndpointConfig;
use crate::domain::{
    invariant_message_size, payload_hash, short_hex, Address, Attestation, AttestationKey,
    ChainId, ChannelKey, EndpointEvent, EndpointSnapshot, Hash, InboundKey, LibraryMigration,
    LibraryRegistry, LibraryVersion, MessageChannel, MessagingError, MessagingResult,
    NonceManager, OutboundKey, Packet, PacketHeader, PathKey, PathRegistry, Pathway,
    PathwayConfig, QuorumShortfall, QuorumStatus, SecurityValidator, VerificationRegistry,
    VerifierId,
};
use crate::ports::inbound::{
    AdminApi, CommitOutcome, DelivererApi, ExecuteRequest, MessagingApi, SendReceipt, VerifierApi,
};
use crate::ports::outbound::{EventSink, MessageReceiver, TimeSource};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One chain's messaging endpoint.
pub struct MessagingEndpoint<C, E>
where
    C: TimeSource,
    E: EventSink,
{
    config: EndpointConfig,
    paths: PathRegistry,
    nonces: NonceManager,
    verification: VerificationRegistry,
    channel: MessageChannel,
    libraries: LibraryRegistry,
    security: SecurityValidator,
    receivers: RwLock<HashMap<Address, Arc<dyn MessageReceiver>>>,
    clock: Arc<C>,
    events: Arc<E>,
}

impl<C, E> MessagingEndpoint<C, E>
where
    C: TimeSource,
    E: EventSink,
{
    /// Create an endpoint with empty state.
    pub fn new(config: EndpointConfig, clock: Arc<C>, events: Arc<E>) -> MessagingResult<Self> {
        config.validate()?;
        info!(
            "[oc-messaging] Endpoint started on chain {}",
            config.local_chain_id
        );
        Ok(Self {
            paths: PathRegistry::new(config.max_verifiers_per_set),
            nonces: NonceManager::new(),
            verification: VerificationRegistry::new(),
            channel: MessageChannel::new(),
            libraries: LibraryRegistry::new(),
            security: SecurityValidator::new(config.owner),
            receivers: RwLock::new(HashMap::new()),
            config,
            clock,
            events,
        })
    }

    /// Chain this endpoint serves.
    pub fn local_chain_id(&self) -> ChainId {
        self.config.local_chain_id
    }

    /// Endpoint configuration.
    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Current pathway record.
    pub fn pathway(&self, key: &PathKey) -> MessagingResult<Pathway> {
        self.paths.get(key)
    }

    /// Library active on a pathway now.
    pub fn active_library(&self, key: &PathKey) -> MessagingResult<LibraryVersion> {
        self.libraries
            .resolve_active(&self.paths, key, self.clock.now())
    }

    /// Registered peer for a pathway.
    pub fn peer_of(&self, key: &PathKey) -> Option<Address> {
        self.security.peer_of(key)
    }

    /// Whether a failed delivery is parked for `key`.
    pub fn has_failed_delivery(&self, key: &ChannelKey) -> bool {
        self.channel.has_failed(key)
    }

    fn receiver_for(&self, app: &Address) -> MessagingResult<Arc<dyn MessageReceiver>> {
        self.receivers
            .read()
            .get(app)
            .cloned()
            .ok_or(MessagingError::ApplicationNotRegistered { app: *app })
    }

    fn with_default_limit(&self, mut config: PathwayConfig) -> PathwayConfig {
        if config.max_message_bytes == 0 {
            config.max_message_bytes = self.config.default_max_message_bytes;
        }
        config
    }

    /// Header the remote endpoint built for this channel key.
    fn inbound_header(&self, request: &ExecuteRequest) -> PacketHeader {
        PacketHeader {
            nonce: request.key.nonce,
            src_chain: request.key.src_chain,
            sender: request.key.sender,
            dst_chain: self.config.local_chain_id,
            receiver: request.key.receiver,
        }
    }

    fn check_guid(&self, header: &PacketHeader, request: &ExecuteRequest) -> MessagingResult<()> {
        if header.guid() != request.guid {
            return Err(MessagingError::MalformedPacket {
                reason: "guid does not match channel key".to_string(),
            });
        }
        Ok(())
    }

    fn report_delivery(
        &self,
        request: &ExecuteRequest,
        result: MessagingResult<()>,
    ) -> MessagingResult<()> {
        match &result {
            Ok(()) => {
                info!(
                    nonce = request.key.nonce,
                    src_chain = request.key.src_chain,
                    "[oc-messaging] Delivered {}",
                    request.key
                );
                self.events.publish(EndpointEvent::PacketDelivered {
                    key: request.key,
                    guid: request.guid,
                });
            }
            Err(MessagingError::CallbackFailed { reason, .. }) => {
                warn!(
                    nonce = request.key.nonce,
                    src_chain = request.key.src_chain,
                    "[oc-messaging] Delivery of {} failed: {}",
                    request.key,
                    reason
                );
                self.events.publish(EndpointEvent::DeliveryFailed {
                    key: request.key,
                    guid: request.guid,
                    reason: reason.clone(),
                });
            }
            Err(err) => {
                debug!("[oc-messaging] Execute of {} rejected: {}", request.key, err);
            }
        }
        result
    }
}

impl<C, E> MessagingApi for MessagingEndpoint<C, E>
where
    C: TimeSource,
    E: EventSink,
{
    fn send(
        &self,
        sender: Address,
        dst_chain: ChainId,
        receiver: Address,
        message: &[u8],
    ) -> MessagingResult<SendReceipt> {
        self.security.assert_registered(&sender)?;
        let path = PathKey::new(sender, dst_chain);
        let pathway = self.paths.get(&path)?;
        self.security.assert_trusted_counterpart(&path, &receiver)?;
        invariant_message_size(message.len(), pathway.config.max_message_bytes)?;

        let nonce = self.nonces.next_outbound(OutboundKey {
            sender,
            dst_chain,
            receiver,
        })?;
        let header = PacketHeader {
            nonce,
            src_chain: self.config.local_chain_id,
            sender,
            dst_chain,
            receiver,
        };
        let packet = Packet::new(header, message.to_vec());
        let bytes = packet.encode();

        debug!(
            nonce,
            dst_chain,
            "[oc-messaging] Sent {} bytes, guid {}",
            message.len(),
            hex::encode(packet.guid)
        );
        self.events.publish(EndpointEvent::PacketSent {
            guid: packet.guid,
            nonce,
            sender,
            dst_chain,
            receiver,
            packet: bytes.clone(),
        });

        Ok(SendReceipt {
            guid: packet.guid,
            nonce,
            packet: bytes,
        })
    }

    fn outbound_nonce(&self, sender: Address, dst_chain: ChainId, receiver: Address) -> u64 {
        self.nonces.outbound_nonce(&OutboundKey {
            sender,
            dst_chain,
            receiver,
        })
    }

    fn inbound_checkpoint(&self, path: &InboundKey) -> u64 {
        self.nonces.inbound_checkpoint(path)
    }
}

impl<C, E> VerifierApi for MessagingEndpoint<C, E>
where
    C: TimeSource,
    E: EventSink,
{
    fn submit_attestation(
        &self,
        verifier: VerifierId,
        header_hash: Hash,
        payload_hash: Hash,
        confirmations: u64,
    ) -> MessagingResult<()> {
        let replaced = self.verification.submit_attestation(Attestation {
            header_hash,
            payload_hash,
            verifier,
            confirmations,
        })?;
        debug!(
            confirmations,
            replaced,
            "[oc-messaging] Attestation from {}",
            verifier
        );
        self.events.publish(EndpointEvent::AttestationSubmitted {
            header_hash,
            payload_hash,
            verifier,
            confirmations,
        });
        Ok(())
    }

    fn verifiable(
        &self,
        header: &[u8],
        payload_hash: Hash,
    ) -> MessagingResult<Option<QuorumShortfall>> {
        let header = PacketHeader::decode(header)?;
        let pathway = self.paths.get(&header.receiver_path())?;
        let key = AttestationKey {
            header_hash: header.hash(),
            payload_hash,
        };
        if self.verification.is_committed(&key) {
            return Err(MessagingError::AlreadyCommitted {
                header_hash: key.header_hash,
            });
        }
        Ok(self.verification.evaluate(&key, &pathway.config).err())
    }

    fn attestations_for(&self, header_hash: Hash, payload_hash: Hash) -> Vec<Attestation> {
        self.verification.attestations_for(&AttestationKey {
            header_hash,
            payload_hash,
        })
    }
}

impl<C, E> DelivererApi for MessagingEndpoint<C, E>
where
    C: TimeSource,
    E: EventSink,
{
    fn try_commit(
        &self,
        caller: &Address,
        header: &[u8],
        payload_hash: Hash,
        library: LibraryVersion,
    ) -> MessagingResult<CommitOutcome> {
        self.security.assert_authorized_deliverer(caller)?;
        let header = PacketHeader::decode(header)?;
        let path = header.receiver_path();
        let pathway = self.paths.get(&path)?;
        if header.dst_chain != self.config.local_chain_id {
            return Err(MessagingError::InvalidDestination {
                expected: self.config.local_chain_id,
                got: header.dst_chain,
            });
        }
        self.security
            .assert_trusted_counterpart(&path, &header.sender)?;

        let now = self.clock.now();
        if !self.libraries.is_valid(&self.paths, &path, &library, now)? {
            return Err(MessagingError::InvalidLibrary {
                version: library.to_string(),
                at: now,
            });
        }

        let key = AttestationKey {
            header_hash: header.hash(),
            payload_hash,
        };
        let channel_key = header.channel_key();
        let status = self.verification.try_commit(
            key,
            &pathway.config,
            || self.nonces.record_inbound_ready(&channel_key),
            || self.channel.insert(&self.nonces, channel_key, payload_hash),
        )?;

        match status {
            QuorumStatus::Committed => {
                let guid = header.guid();
                info!(
                    nonce = header.nonce,
                    src_chain = header.src_chain,
                    "[oc-messaging] Committed {}",
                    channel_key
                );
                self.events.publish(EndpointEvent::PacketCommitted {
                    key: channel_key,
                    guid,
                    payload_hash,
                });
                Ok(CommitOutcome::Committed {
                    key: channel_key,
                    guid,
                })
            }
            QuorumStatus::Pending(shortfall) => {
                debug!(
                    nonce = header.nonce,
                    missing_required = shortfall.missing_required.len(),
                    optional = shortfall.optional_attested,
                    "[oc-messaging] Quorum pending for {}",
                    channel_key
                );
                Ok(CommitOutcome::Pending(shortfall))
            }
        }
    }

    fn execute(&self, caller: &Address, request: ExecuteRequest) -> MessagingResult<()> {
        self.security.assert_authorized_deliverer(caller)?;
        let header = self.inbound_header(&request);
        self.check_guid(&header, &request)?;
        self.security
            .assert_trusted_counterpart(&header.receiver_path(), &header.sender)?;
        let receiver = self.receiver_for(&request.key.receiver)?;

        let result = self.channel.execute(
            &self.nonces,
            request.key,
            &request.guid,
            &request.message,
            |origin, guid, message| receiver.on_message(origin, guid, message),
        );

        // The entry is gone whether or not the callback succeeded.
        if matches!(result, Ok(()) | Err(MessagingError::CallbackFailed { .. })) {
            self.verification.release(&AttestationKey {
                header_hash: header.hash(),
                payload_hash: payload_hash(&request.guid, &request.message),
            });
        }
        self.report_delivery(&request, result)
    }

    fn retry_failed(&self, caller: &Address, request: ExecuteRequest) -> MessagingResult<()> {
        self.security.assert_authorized_deliverer(caller)?;
        let header = self.inbound_header(&request);
        self.check_guid(&header, &request)?;
        self.security
            .assert_trusted_counterpart(&header.receiver_path(), &header.sender)?;
        let receiver = self.receiver_for(&request.key.receiver)?;

        info!("[oc-messaging] Retrying failed delivery {}", request.key);
        let result = self.channel.retry_failed(
            request.key,
            &request.guid,
            &request.message,
            |origin, guid, message| receiver.on_message(origin, guid, message),
        );
        self.report_delivery(&request, result)
    }

    fn pending_nonces(&self, path: &InboundKey) -> Vec<u64> {
        self.channel.pending_nonces(path)
    }
}

impl<C, E> AdminApi for MessagingEndpoint<C, E>
where
    C: TimeSource,
    E: EventSink,
{
    fn register_application(
        &self,
        caller: &Address,
        app: Address,
        admin: Address,
        receiver: Arc<dyn MessageReceiver>,
    ) -> MessagingResult<()> {
        self.security.register_application(caller, app, admin)?;
        self.receivers.write().insert(app, receiver);
        info!(
            "[oc-messaging] Application {} registered",
            short_hex(&app)
        );
        Ok(())
    }

    fn create_pathway(
        &self,
        caller: &Address,
        key: PathKey,
        config: PathwayConfig,
        library: Option<LibraryVersion>,
    ) -> MessagingResult<Pathway> {
        self.security.assert_app_admin(caller, &key.app)?;
        let library = match library {
            Some(version) => {
                if !self.libraries.is_registered(&version) {
                    return Err(MessagingError::UnknownLibrary {
                        version: version.to_string(),
                    });
                }
                version
            }
            None => self.libraries.default_for(key.remote_chain).ok_or_else(|| {
                MessagingError::UnknownLibrary {
                    version: format!("default for chain {}", key.remote_chain),
                }
            })?,
        };

        let pathway = self
            .paths
            .create(key, self.with_default_limit(config), library)?;
        info!(
            remote_chain = key.remote_chain,
            "[oc-messaging] Pathway created on library {}",
            library
        );
        self.events.publish(EndpointEvent::PathwayConfigured {
            key,
            revision: pathway.revision,
            library: pathway.library,
        });
        Ok(pathway)
    }

    fn update_pathway(
        &self,
        caller: &Address,
        key: PathKey,
        config: PathwayConfig,
    ) -> MessagingResult<Pathway> {
        self.security.assert_app_admin(caller, &key.app)?;
        let pathway = self.paths.update(key, self.with_default_limit(config))?;
        info!(
            remote_chain = key.remote_chain,
            revision = pathway.revision,
            "[oc-messaging] Pathway updated"
        );
        self.events.publish(EndpointEvent::PathwayConfigured {
            key,
            revision: pathway.revision,
            library: pathway.library,
        });
        Ok(pathway)
    }

    fn set_peer(&self, caller: &Address, key: PathKey, peer: Address) -> MessagingResult<()> {
        self.security.set_peer(caller, key, peer)?;
        info!(
            remote_chain = key.remote_chain,
            "[oc-messaging] Peer set to {}",
            short_hex(&peer)
        );
        Ok(())
    }

    fn skip(&self, caller: &Address, path: InboundKey, nonce: u64) -> MessagingResult<()> {
        self.security.assert_app_admin(caller, &path.receiver)?;
        self.channel.skip(&self.nonces, path, nonce)?;
        let header = PacketHeader {
            nonce,
            src_chain: path.src_chain,
            sender: path.sender,
            dst_chain: self.config.local_chain_id,
            receiver: path.receiver,
        };
        let pruned = self.verification.prune_header(&header.hash());
        warn!(
            nonce,
            src_chain = path.src_chain,
            pruned,
            "[oc-messaging] Nonce skipped"
        );
        self.events
            .publish(EndpointEvent::NonceSkipped { key: path.at(nonce) });
        Ok(())
    }

    fn register_library(&self, caller: &Address, version: LibraryVersion) -> MessagingResult<()> {
        self.security.assert_owner(caller, "register library")?;
        self.libraries.register(version)?;
        info!("[oc-messaging] Library {} registered", version);
        Ok(())
    }

    fn set_default_library(
        &self,
        caller: &Address,
        remote_chain: ChainId,
        version: LibraryVersion,
    ) -> MessagingResult<()> {
        self.security.assert_owner(caller, "set default library")?;
        self.libraries.set_default(remote_chain, version)
    }

    fn schedule_migration(
        &self,
        caller: &Address,
        key: PathKey,
        new_version: LibraryVersion,
        cutover: u64,
        expiry: u64,
    ) -> MessagingResult<LibraryMigration> {
        self.security.assert_app_admin(caller, &key.app)?;
        let migration = self.libraries.schedule_migration(
            &self.paths,
            key,
            new_version,
            cutover,
            expiry,
            self.clock.now(),
        )?;
        info!(
            remote_chain = key.remote_chain,
            cutover,
            expiry,
            "[oc-messaging] Library migration {} -> {} scheduled",
            migration.old_version,
            migration.new_version
        );
        self.events.publish(EndpointEvent::LibraryMigrationScheduled {
            key,
            old_version: migration.old_version,
            new_version: migration.new_version,
            cutover,
            expiry,
        });
        Ok(migration)
    }

    fn add_deliverer(&self, caller: &Address, deliverer: Address) -> MessagingResult<bool> {
        self.security.add_deliverer(caller, deliverer)
    }

    fn remove_deliverer(&self, caller: &Address, deliverer: &Address) -> MessagingResult<bool> {
        self.security.remove_deliverer(caller, deliverer)
    }

    fn snapshot(&self) -> EndpointSnapshot {
        let (attestations, committed) = self.verification.export();
        let (channel_entries, failed_deliveries, (outbound_nonces, inbound_checkpoints)) =
            self.channel.export_with(|| self.nonces.export());
        let (deliverers, applications, peers) = self.security.export();
        let (libraries, default_libraries, migrations) = self.libraries.export();
        EndpointSnapshot {
            local_chain_id: self.config.local_chain_id,
            pathways: self.paths.all(),
            attestations,
            committed,
            outbound_nonces,
            inbound_checkpoints,
            channel_entries,
            failed_deliveries,
            deliverers,
            applications,
            peers,
            libraries,
            default_libraries,
            migrations,
        }
    }

    fn restore(&self, caller: &Address, snapshot: EndpointSnapshot) -> MessagingResult<()> {
        self.security.assert_owner(caller, "restore snapshot")?;
        if snapshot.local_chain_id != self.config.local_chain_id {
            return Err(MessagingError::Snapshot(format!(
                "snapshot is for chain {}, endpoint serves {}",
                snapshot.local_chain_id, self.config.local_chain_id
            )));
        }

        self.paths.restore(snapshot.pathways);
        self.verification
            .restore(snapshot.attestations, snapshot.committed);
        self.nonces
            .restore(snapshot.outbound_nonces, snapshot.inbound_checkpoints);
        self.channel
            .restore(snapshot.channel_entries, snapshot.failed_deliveries);
        self.security
            .restore(snapshot.deliverers, snapshot.applications, snapshot.peers);
        self.libraries.restore(
            snapshot.libraries,
            snapshot.default_libraries,
            snapshot.migrations,
        );
        info!(
            "[oc-messaging] State restored on chain {}",
            self.config.local_chain_id
        );
        Ok(())
    }
}
