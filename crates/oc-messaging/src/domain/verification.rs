//! # Verification Registry
//!
//! Attestation storage is separate from commit evaluation. Attestations may
//! arrive in any order over any transport; `try_commit` is a read-then-decide
//! over whatever is stored at that moment, so a slow or crashed verifier
//! never corrupts earlier attestations.
//!
//! Matching is by exact (header hash, payload hash) equality. An attestation
//! for a different payload of the same header is a different key and is
//! never counted.
//!
//! ## Retention
//!
//! Attestations for a header live until its nonce is consumed: commit prunes
//! the committed pair, and execute or skip prune every payload of the
//! header. Attestations for headers that never reach this endpoint's
//! pathways stay until the next `restore`.

use super::errors::{Hash, MessagingError, MessagingResult};
use super::invariants::invariant_sufficient_confirmations;
use super::pathway::PathwayConfig;
use super::value_objects::{AttestationKey, VerifierId};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One verifier's opinion about one packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    /// keccak256 of the packet header.
    pub header_hash: Hash,
    /// keccak256 of guid ‖ message.
    pub payload_hash: Hash,
    /// Attesting verifier.
    pub verifier: VerifierId,
    /// Source-chain confirmations the verifier observed.
    pub confirmations: u64,
}

impl Attestation {
    /// Key this attestation counts towards.
    pub fn key(&self) -> AttestationKey {
        AttestationKey {
            header_hash: self.header_hash,
            payload_hash: self.payload_hash,
        }
    }
}

/// Why a quorum is not (yet) reached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumShortfall {
    /// Required verifiers without an attestation.
    pub missing_required: Vec<VerifierId>,
    /// Distinct optional verifiers that attested.
    pub optional_attested: usize,
    /// Optional attestations needed.
    pub optional_threshold: u8,
    /// Best confirmations among the counted attestors.
    pub best_confirmations: u64,
    /// Confirmations needed.
    pub min_confirmations: u64,
}

/// Result of a commit attempt that did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuorumStatus {
    /// Quorum reached and the channel entry was materialized.
    Committed,
    /// Not enough attestations yet; retry later.
    Pending(QuorumShortfall),
}

/// Evaluate a pathway's quorum rules against the attestors of one key.
///
/// (a) every required verifier attested, (b) at least `optional_threshold`
/// optional verifiers attested, (c) the best confirmations among required
/// attestors (optional attestors when nothing is required) reach
/// `min_confirmations`.
pub fn evaluate_quorum(
    config: &PathwayConfig,
    attestors: &HashMap<VerifierId, u64>,
) -> Result<(), QuorumShortfall> {
    let missing_required: Vec<VerifierId> = config
        .required_verifiers
        .iter()
        .filter(|v| !attestors.contains_key(*v))
        .copied()
        .collect();

    let optional_confirmations: Vec<u64> = config
        .optional_verifiers
        .iter()
        .filter_map(|v| attestors.get(v).copied())
        .collect();

    let best_confirmations = if config.required_verifiers.is_empty() {
        optional_confirmations.iter().copied().max().unwrap_or(0)
    } else {
        config
            .required_verifiers
            .iter()
            .filter_map(|v| attestors.get(v).copied())
            .max()
            .unwrap_or(0)
    };

    let satisfied = missing_required.is_empty()
        && optional_confirmations.len() >= usize::from(config.optional_threshold)
        && invariant_sufficient_confirmations(best_confirmations, config.min_confirmations);

    if satisfied {
        return Ok(());
    }
    Err(QuorumShortfall {
        missing_required,
        optional_attested: optional_confirmations.len(),
        optional_threshold: config.optional_threshold,
        best_confirmations,
        min_confirmations: config.min_confirmations,
    })
}

/// Attestation store plus commit markers.
#[derive(Default)]
pub struct VerificationRegistry {
    attestations: RwLock<HashMap<AttestationKey, HashMap<VerifierId, u64>>>,
    committed: Mutex<HashSet<AttestationKey>>,
}

impl VerificationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite a verifier's attestation. Returns `true` when an
    /// earlier attestation from the same verifier was replaced.
    pub fn submit_attestation(&self, attestation: Attestation) -> MessagingResult<bool> {
        if attestation.header_hash == [0u8; 32] || attestation.payload_hash == [0u8; 32] {
            return Err(MessagingError::MalformedAttestation {
                reason: "zero hash".to_string(),
            });
        }
        let mut attestations = self.attestations.write();
        let previous = attestations
            .entry(attestation.key())
            .or_default()
            .insert(attestation.verifier, attestation.confirmations);
        Ok(previous.is_some())
    }

    /// Attestations currently stored for a key.
    pub fn attestations_for(&self, key: &AttestationKey) -> Vec<Attestation> {
        let attestations = self.attestations.read();
        let mut out: Vec<Attestation> = attestations
            .get(key)
            .map(|by_verifier| {
                by_verifier
                    .iter()
                    .map(|(verifier, confirmations)| Attestation {
                        header_hash: key.header_hash,
                        payload_hash: key.payload_hash,
                        verifier: *verifier,
                        confirmations: *confirmations,
                    })
                    .collect()
            })
            .unwrap_or_default();
        out.sort_by(|a, b| a.verifier.cmp(&b.verifier));
        out
    }

    /// Read-only quorum check.
    pub fn evaluate(
        &self,
        key: &AttestationKey,
        config: &PathwayConfig,
    ) -> Result<(), QuorumShortfall> {
        let attestations = self.attestations.read();
        let empty = HashMap::new();
        let attestors = attestations.get(key).unwrap_or(&empty);
        evaluate_quorum(config, attestors)
    }

    /// Whether `key` has been committed and not yet released.
    pub fn is_committed(&self, key: &AttestationKey) -> bool {
        self.committed.lock().contains(key)
    }

    /// Commit `key` if quorum holds.
    ///
    /// The commit marker lock is held across `admit`, evaluation and
    /// `materialize`, so two concurrent attempts on one key cannot both
    /// succeed. `admit` rejects keys that can never commit (a consumed
    /// nonce) before quorum is looked at. If `materialize` fails nothing is
    /// marked. On success the key's attestations are pruned; the marker
    /// stays until [`Self::release`].
    pub fn try_commit<A, F>(
        &self,
        key: AttestationKey,
        config: &PathwayConfig,
        admit: A,
        materialize: F,
    ) -> MessagingResult<QuorumStatus>
    where
        A: FnOnce() -> MessagingResult<()>,
        F: FnOnce() -> MessagingResult<()>,
    {
        let mut committed = self.committed.lock();
        if committed.contains(&key) {
            return Err(MessagingError::AlreadyCommitted {
                header_hash: key.header_hash,
            });
        }
        admit()?;
        if let Err(shortfall) = self.evaluate(&key, config) {
            return Ok(QuorumStatus::Pending(shortfall));
        }
        materialize()?;
        committed.insert(key);
        self.attestations.write().remove(&key);
        Ok(QuorumStatus::Committed)
    }

    /// Drop the commit marker once the entry is cleared, together with
    /// every attestation for the header (late ones and conflicting
    /// payloads alike).
    pub fn release(&self, key: &AttestationKey) {
        self.committed.lock().remove(key);
        self.prune_header(&key.header_hash);
    }

    /// Drop every attestation for `header_hash`, whatever payload it names.
    /// Returns how many were removed.
    pub fn prune_header(&self, header_hash: &Hash) -> usize {
        let mut attestations = self.attestations.write();
        let mut removed = 0;
        attestations.retain(|key, by_verifier| {
            if key.header_hash == *header_hash {
                removed += by_verifier.len();
                false
            } else {
                true
            }
        });
        removed
    }

    /// Export attestations and commit markers.
    pub fn export(&self) -> (Vec<Attestation>, Vec<AttestationKey>) {
        let attestations = self.attestations.read();
        let mut all = Vec::new();
        for (key, by_verifier) in attestations.iter() {
            for (verifier, confirmations) in by_verifier {
                all.push(Attestation {
                    header_hash: key.header_hash,
                    payload_hash: key.payload_hash,
                    verifier: *verifier,
                    confirmations: *confirmations,
                });
            }
        }
        let committed = self.committed.lock().iter().copied().collect();
        (all, committed)
    }

    /// Replace attestations and commit markers.
    pub fn restore(&self, attestations: Vec<Attestation>, committed: Vec<AttestationKey>) {
        let mut map = self.attestations.write();
        map.clear();
        for attestation in attestations {
            map.entry(attestation.key())
                .or_default()
                .insert(attestation.verifier, attestation.confirmations);
        }
        let mut marks = self.committed.lock();
        marks.clear();
        marks.extend(committed);
    }
}
