//! # Message Channel
//!
//! The ready set: payload hashes that passed verification and await
//! execution, keyed by (receiver, src chain, sender, nonce).
//!
//! ## Execution discipline
//!
//! ```text
//! lookup ──→ hash check ──→ checkpoint advance ──→ remove ──→ callback
//! └──────────────── one lock ────────────────────────┘
//! ```
//!
//! The entry is gone before the callback runs, so a re-entrant or concurrent
//! execute for the same key sees `NotFound`. A failed callback does not put
//! the entry back; it is parked in the failed-delivery table for the
//! explicit retry path.
//!
//! Lock order: entries → inbound checkpoints.

use super::errors::{Hash, MessagingError, MessagingResult, ReceiveError};
use super::invariants::invariant_payload_matches;
use super::nonce::NonceManager;
use super::packet::payload_hash;
use super::value_objects::{ChannelKey, InboundKey, Origin};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Verified-but-not-executed entries plus failed deliveries.
#[derive(Default)]
pub struct MessageChannel {
    entries: Mutex<HashMap<ChannelKey, Hash>>,
    failed: Mutex<HashMap<ChannelKey, Hash>>,
}

impl MessageChannel {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Materialize an entry after quorum.
    ///
    /// Rejects an existing key outright and any nonce at or below the
    /// inbound checkpoint.
    pub fn insert(
        &self,
        nonces: &NonceManager,
        key: ChannelKey,
        payload_hash: Hash,
    ) -> MessagingResult<()> {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&key) {
            warn!(
                "[oc-messaging] Duplicate commit for {} (same payload: {})",
                key,
                *existing == payload_hash
            );
            return Err(MessagingError::DuplicateCommit {
                nonce: key.nonce,
                same_payload: *existing == payload_hash,
            });
        }
        nonces.record_inbound_ready(&key)?;
        entries.insert(key, payload_hash);
        Ok(())
    }

    /// Execute the entry for `key` exactly once.
    pub fn execute<F>(
        &self,
        nonces: &NonceManager,
        key: ChannelKey,
        guid: &Hash,
        message: &[u8],
        executor: F,
    ) -> MessagingResult<()>
    where
        F: FnOnce(Origin, &Hash, &[u8]) -> Result<(), ReceiveError>,
    {
        let supplied = payload_hash(guid, message);
        {
            let mut entries = self.entries.lock();
            let stored = entries
                .get(&key)
                .copied()
                .ok_or(MessagingError::NotFound { nonce: key.nonce })?;
            invariant_payload_matches(&stored, &supplied)?;

            let path = key.inbound();
            nonces.advance_checkpoint(path, key.nonce, |n| entries.contains_key(&path.at(n)))?;
            entries.remove(&key);
        }

        debug!("[oc-messaging] Cleared {} before callback", key);
        self.invoke(key, supplied, guid, message, executor)
    }

    /// Re-run the callback for a delivery that failed earlier.
    pub fn retry_failed<F>(
        &self,
        key: ChannelKey,
        guid: &Hash,
        message: &[u8],
        executor: F,
    ) -> MessagingResult<()>
    where
        F: FnOnce(Origin, &Hash, &[u8]) -> Result<(), ReceiveError>,
    {
        let supplied = payload_hash(guid, message);
        {
            let mut failed = self.failed.lock();
            let stored = failed
                .get(&key)
                .copied()
                .ok_or(MessagingError::NotFound { nonce: key.nonce })?;
            invariant_payload_matches(&stored, &supplied)?;
            failed.remove(&key);
        }
        self.invoke(key, supplied, guid, message, executor)
    }

    fn invoke<F>(
        &self,
        key: ChannelKey,
        supplied: Hash,
        guid: &Hash,
        message: &[u8],
        executor: F,
    ) -> MessagingResult<()>
    where
        F: FnOnce(Origin, &Hash, &[u8]) -> Result<(), ReceiveError>,
    {
        if let Err(err) = executor(key.origin(), guid, message) {
            self.failed.lock().insert(key, supplied);
            return Err(MessagingError::CallbackFailed {
                nonce: key.nonce,
                reason: err.reason,
            });
        }
        Ok(())
    }

    /// Advance past the next nonce without executing it. Refused when the
    /// nonce is already committed.
    pub fn skip(&self, nonces: &NonceManager, path: InboundKey, nonce: u64) -> MessagingResult<()> {
        let entries = self.entries.lock();
        if entries.contains_key(&path.at(nonce)) {
            return Err(MessagingError::NonceCommitted { nonce });
        }
        nonces.skip(path, nonce)
    }

    /// Whether an entry is pending for `key`.
    pub fn contains(&self, key: &ChannelKey) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Stored payload hash for `key`.
    pub fn payload_hash_of(&self, key: &ChannelKey) -> Option<Hash> {
        self.entries.lock().get(key).copied()
    }

    /// Pending nonces on one inbound path, ascending.
    pub fn pending_nonces(&self, path: &InboundKey) -> Vec<u64> {
        let entries = self.entries.lock();
        let mut nonces: Vec<u64> = entries
            .keys()
            .filter(|k| k.inbound() == *path)
            .map(|k| k.nonce)
            .collect();
        nonces.sort_unstable();
        nonces
    }

    /// Whether a failed delivery is parked for `key`.
    pub fn has_failed(&self, key: &ChannelKey) -> bool {
        self.failed.lock().contains_key(key)
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no entries are pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Export pending entries and failed deliveries, running `with` under
    /// the entries lock.
    ///
    /// Executes advance checkpoints under the same lock, so exporting the
    /// checkpoints from `with` yields entries and checkpoints from one
    /// moment.
    pub fn export_with<T, F>(
        &self,
        with: F,
    ) -> (Vec<(ChannelKey, Hash)>, Vec<(ChannelKey, Hash)>, T)
    where
        F: FnOnce() -> T,
    {
        let entries = self.entries.lock();
        let failed = self.failed.lock();
        let extra = with();
        (
            entries.iter().map(|(k, h)| (*k, *h)).collect(),
            failed.iter().map(|(k, h)| (*k, *h)).collect(),
            extra,
        )
    }

    /// Replace pending entries and failed deliveries.
    pub fn restore(&self, entries: Vec<(ChannelKey, Hash)>, failed: Vec<(ChannelKey, Hash)>) {
        let mut map = self.entries.lock();
        map.clear();
        map.extend(entries);
        let mut parked = self.failed.lock();
        parked.clear();
        parked.extend(failed);
    }
}
