//! # Nonce Manager
//!
//! Two monotonic structures:
//!
//! - outbound counters per (sender, dst chain, receiver), handed out on send;
//! - inbound checkpoints per (receiver, src chain, sender), the highest nonce
//!   whose execution completed.
//!
//! Verification may complete out of order; the checkpoint only ever moves by
//! one, and only when the next nonce is ready.

use super::errors::{MessagingError, MessagingResult};
use super::invariants::invariant_sequential_nonce;
use super::value_objects::{ChannelKey, InboundKey, OutboundKey};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;

/// Nonce bookkeeping for one endpoint.
#[derive(Default)]
pub struct NonceManager {
    outbound: Mutex<HashMap<OutboundKey, u64>>,
    inbound: RwLock<HashMap<InboundKey, u64>>,
}

impl NonceManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next outbound nonce. The first nonce on a path is 1.
    pub fn next_outbound(&self, key: OutboundKey) -> MessagingResult<u64> {
        let mut outbound = self.outbound.lock();
        let counter = outbound.entry(key).or_insert(0);
        let next = counter
            .checked_add(1)
            .ok_or(MessagingError::CounterOverflow)?;
        *counter = next;
        Ok(next)
    }

    /// Last nonce issued on an outbound path (0 if none).
    pub fn outbound_nonce(&self, key: &OutboundKey) -> u64 {
        self.outbound.lock().get(key).copied().unwrap_or(0)
    }

    /// Highest executed nonce on an inbound path (0 if none).
    pub fn inbound_checkpoint(&self, key: &InboundKey) -> u64 {
        self.inbound.read().get(key).copied().unwrap_or(0)
    }

    /// Accept a quorum notification only for nonces above the checkpoint.
    pub fn record_inbound_ready(&self, key: &ChannelKey) -> MessagingResult<()> {
        let checkpoint = self.inbound_checkpoint(&key.inbound());
        if key.nonce <= checkpoint {
            return Err(MessagingError::AlreadyExecuted {
                nonce: key.nonce,
                checkpoint,
            });
        }
        Ok(())
    }

    /// Move the checkpoint to `to_nonce`.
    ///
    /// Every nonce in `(checkpoint, to_nonce]` must be ready and none below
    /// `to_nonce` may be left pending, so only `checkpoint + 1` advances.
    /// Nothing changes on failure.
    pub fn advance_checkpoint<F>(
        &self,
        path: InboundKey,
        to_nonce: u64,
        is_ready: F,
    ) -> MessagingResult<u64>
    where
        F: Fn(u64) -> bool,
    {
        let mut inbound = self.inbound.write();
        let checkpoint = inbound.get(&path).copied().unwrap_or(0);

        if to_nonce > checkpoint {
            let next_expected = checkpoint + 1;
            if !is_ready(next_expected) {
                return Err(MessagingError::NonceGap {
                    next_expected,
                    requested: to_nonce,
                });
            }
        }
        invariant_sequential_nonce(checkpoint, to_nonce)?;

        inbound.insert(path, to_nonce);
        Ok(to_nonce)
    }

    /// Advance past `nonce` without executing it (administrative skip).
    pub fn skip(&self, path: InboundKey, nonce: u64) -> MessagingResult<()> {
        let mut inbound = self.inbound.write();
        let checkpoint = inbound.get(&path).copied().unwrap_or(0);
        invariant_sequential_nonce(checkpoint, nonce)?;
        inbound.insert(path, nonce);
        Ok(())
    }

    /// Export all counters and checkpoints.
    pub fn export(&self) -> (Vec<(OutboundKey, u64)>, Vec<(InboundKey, u64)>) {
        let outbound = self
            .outbound
            .lock()
            .iter()
            .map(|(k, v)| (*k, *v))
            .collect();
        let inbound = self.inbound.read().iter().map(|(k, v)| (*k, *v)).collect();
        (outbound, inbound)
    }

    /// Replace all counters and checkpoints.
    pub fn restore(&self, outbound: Vec<(OutboundKey, u64)>, inbound: Vec<(InboundKey, u64)>) {
        let mut out = self.outbound.lock();
        out.clear();
        out.extend(outbound);
        let mut inb = self.inbound.write();
        inb.clear();
        inb.extend(inbound);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn outbound_key() -> OutboundKey {
        OutboundKey {
            sender: [1u8; 32],
            dst_chain: 2,
            receiver: [3u8; 32],
        }
    }

    fn inbound_key() -> InboundKey {
        InboundKey {
            receiver: [3u8; 32],
            src_chain: 1,
            sender: [1u8; 32],
        }
    }

    #[test]
    fn test_first_outbound_nonce_is_one() {
        let nonces = NonceManager::new();
        assert_eq!(nonces.outbound_nonce(&outbound_key()), 0);
        assert_eq!(nonces.next_outbound(outbound_key()).unwrap(), 1);
        assert_eq!(nonces.next_outbound(outbound_key()).unwrap(), 2);
        assert_eq!(nonces.outbound_nonce(&outbound_key()), 2);
    }

    #[test]
    fn test_outbound_counters_are_independent() {
        let nonces = NonceManager::new();
        let other = OutboundKey {
            dst_chain: 9,
            ..outbound_key()
        };
        nonces.next_outbound(outbound_key()).unwrap();
        nonces.next_outbound(outbound_key()).unwrap();
        assert_eq!(nonces.next_outbound(other).unwrap(), 1);
    }

    #[test]
    fn test_outbound_overflow() {
        let nonces = NonceManager::new();
        nonces.restore(vec![(outbound_key(), u64::MAX)], vec![]);
        assert_eq!(
            nonces.next_outbound(outbound_key()),
            Err(MessagingError::CounterOverflow)
        );
        // Counter is left where it was.
        assert_eq!(nonces.outbound_nonce(&outbound_key()), u64::MAX);
    }

    #[test]
    fn test_record_ready_rejects_executed() {
        let nonces = NonceManager::new();
        nonces.advance_checkpoint(inbound_key(), 1, |_| true).unwrap();
        assert!(matches!(
            nonces.record_inbound_ready(&inbound_key().at(1)),
            Err(MessagingError::AlreadyExecuted { nonce: 1, checkpoint: 1 })
        ));
        assert!(nonces.record_inbound_ready(&inbound_key().at(2)).is_ok());
        // Out-of-order readiness above the checkpoint is fine.
        assert!(nonces.record_inbound_ready(&inbound_key().at(9)).is_ok());
    }

    #[test]
    fn test_advance_sequential() {
        let nonces = NonceManager::new();
        assert_eq!(nonces.advance_checkpoint(inbound_key(), 1, |_| true), Ok(1));
        assert_eq!(nonces.advance_checkpoint(inbound_key(), 2, |_| true), Ok(2));
        assert_eq!(nonces.inbound_checkpoint(&inbound_key()), 2);
    }

    #[test]
    fn test_advance_gap_when_lower_missing() {
        let nonces = NonceManager::new();
        // Only nonce 2 is ready.
        let err = nonces
            .advance_checkpoint(inbound_key(), 2, |n| n == 2)
            .unwrap_err();
        assert_eq!(
            err,
            MessagingError::NonceGap {
                next_expected: 1,
                requested: 2
            }
        );
        assert_eq!(nonces.inbound_checkpoint(&inbound_key()), 0);
    }

    #[test]
    fn test_advance_gap_when_lower_pending() {
        // Nonce 1 is ready but not yet executed: executing 2 would strand it.
        let nonces = NonceManager::new();
        let err = nonces
            .advance_checkpoint(inbound_key(), 2, |_| true)
            .unwrap_err();
        assert!(matches!(err, MessagingError::NonceGap { .. }));
        assert_eq!(nonces.inbound_checkpoint(&inbound_key()), 0);
    }

    #[test]
    fn test_advance_stale() {
        let nonces = NonceManager::new();
        nonces.advance_checkpoint(inbound_key(), 1, |_| true).unwrap();
        assert!(matches!(
            nonces.advance_checkpoint(inbound_key(), 1, |_| true),
            Err(MessagingError::AlreadyExecuted { .. })
        ));
    }

    #[test]
    fn test_skip_moves_checkpoint_by_one() {
        let nonces = NonceManager::new();
        nonces.skip(inbound_key(), 1).unwrap();
        assert_eq!(nonces.inbound_checkpoint(&inbound_key()), 1);
        assert!(matches!(
            nonces.skip(inbound_key(), 3),
            Err(MessagingError::NonceGap { .. })
        ));
    }

    #[test]
    fn test_export_restore() {
        let nonces = NonceManager::new();
        nonces.next_outbound(outbound_key()).unwrap();
        nonces.advance_checkpoint(inbound_key(), 1, |_| true).unwrap();
        let (out, inb) = nonces.export();

        let restored = NonceManager::new();
        restored.restore(out, inb);
        assert_eq!(restored.outbound_nonce(&outbound_key()), 1);
        assert_eq!(restored.inbound_checkpoint(&inbound_key()), 1);
    }

    proptest! {
        #[test]
        fn prop_outbound_strictly_increasing(sends in 1usize..200) {
            let nonces = NonceManager::new();
            let mut last = 0u64;
            for _ in 0..sends {
                let n = nonces.next_outbound(outbound_key()).unwrap();
                prop_assert_eq!(n, last + 1);
                last = n;
            }
        }

        #[test]
        fn prop_checkpoint_never_skips(ready in proptest::collection::btree_set(1u64..20, 0..20)) {
            // Execute greedily in whatever order; the checkpoint must equal the
            // length of the contiguous ready prefix starting at 1.
            let nonces = NonceManager::new();
            for n in ready.iter().rev().chain(ready.iter()) {
                let _ = nonces.advance_checkpoint(inbound_key(), *n, |m| ready.contains(&m));
            }
            let mut expected = 0;
            while ready.contains(&(expected + 1)) {
                expected += 1;
            }
            prop_assert_eq!(nonces.inbound_checkpoint(&inbound_key()), expected);
        }
    }
}
