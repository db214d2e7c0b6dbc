//! # Domain Invariants
//!
//! Pure checks shared by the registries, channel and endpoint.

use super::errors::{Hash, MessagingError};

/// Invariant: a pathway demands at least one verification.
///
/// Required set non-empty OR optional threshold ≥ 1.
pub fn invariant_verification_requirement(required_count: usize, optional_threshold: u8) -> bool {
    required_count > 0 || optional_threshold >= 1
}

/// Invariant: supplied payload hashes to the committed hash.
pub fn invariant_payload_matches(stored: &Hash, supplied: &Hash) -> Result<(), MessagingError> {
    if stored != supplied {
        return Err(MessagingError::PayloadMismatch {
            expected: *stored,
            actual: *supplied,
        });
    }
    Ok(())
}

/// Invariant: execution is strictly sequential.
///
/// Only `checkpoint + 1` may be executed next.
pub fn invariant_sequential_nonce(checkpoint: u64, requested: u64) -> Result<(), MessagingError> {
    if requested <= checkpoint {
        return Err(MessagingError::AlreadyExecuted {
            nonce: requested,
            checkpoint,
        });
    }
    // requested > checkpoint, so checkpoint < u64::MAX
    let next_expected = checkpoint + 1;
    if requested != next_expected {
        return Err(MessagingError::NonceGap {
            next_expected,
            requested,
        });
    }
    Ok(())
}

/// Invariant: message fits the pathway limit.
pub fn invariant_message_size(size: usize, max: u32) -> Result<(), MessagingError> {
    if size > max as usize {
        return Err(MessagingError::MessageTooLarge { size, max });
    }
    Ok(())
}

/// Invariant: confirmations meet the pathway minimum.
pub fn invariant_sufficient_confirmations(best: u64, required: u64) -> bool {
    best >= required
}
