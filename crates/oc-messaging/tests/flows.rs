//! End-to-end message flows between two endpoints.

mod common;

use common::*;
use oc_messaging::{
    AdminApi, CommitOutcome, DelivererApi, EndpointEvent, EndpointSnapshot, ExecuteRequest,
    MessagingApi, MessagingError, PathKey, PathwayConfig, VerifierApi, VerifierId,
};
use rand::seq::SliceRandom;

#[test]
fn test_two_verifier_scenario_at_nonce_seven() {
    let net = setup(two_required());

    let packets: Vec<_> = (1..=8).map(|i| net.send(format!("msg-{}", i).as_bytes())).collect();
    for packet in &packets[..6] {
        net.deliver(packet);
    }
    assert_eq!(net.b.inbound_checkpoint(&net.inbound()), 6);

    let p7 = &packets[6];
    let p8 = &packets[7];
    assert_eq!(p7.header.nonce, 7);

    // A attests: pending.
    net.attest(p7, VERIFIER_A, 1);
    match net.commit(p7).unwrap() {
        CommitOutcome::Pending(shortfall) => {
            assert_eq!(shortfall.missing_required, vec![VERIFIER_B]);
        }
        other => panic!("expected pending, got {:?}", other),
    }

    // B attests: committed at nonce 7.
    net.attest(p7, VERIFIER_B, 1);
    match net.commit(p7).unwrap() {
        CommitOutcome::Committed { key, guid } => {
            assert_eq!(key.nonce, 7);
            assert_eq!(guid, p7.guid);
        }
        other => panic!("expected committed, got {:?}", other),
    }

    // Same pair again.
    assert!(matches!(
        net.commit(p7),
        Err(MessagingError::AlreadyCommitted { .. })
    ));

    // Nonce 8 committed but 7 not executed yet.
    net.attest_all(p8);
    assert!(net.commit(p8).unwrap().is_committed());
    // 7 is still pending, so executing 8 is a gap.
    assert_eq!(
        net.execute(p8),
        Err(MessagingError::NonceGap {
            next_expected: 7,
            requested: 8
        })
    );

    net.execute(p7).unwrap();
    assert_eq!(
        net.execute(p7),
        Err(MessagingError::NotFound { nonce: 7 })
    );

    net.execute(p8).unwrap();
    assert_eq!(net.inbox.nonces(), (1..=8).collect::<Vec<_>>());
    assert_eq!(net.inbox.deliveries()[6].message, b"msg-7".to_vec());
}

#[test]
fn test_gap_when_lower_nonce_never_committed() {
    let net = setup(two_required());
    let p1 = net.send(b"one");
    let p2 = net.send(b"two");

    net.attest_all(&p2);
    net.commit(&p2).unwrap();
    assert_eq!(
        net.execute(&p2),
        Err(MessagingError::NonceGap {
            next_expected: 1,
            requested: 2
        })
    );
    assert_eq!(net.b.pending_nonces(&net.inbound()), vec![2]);

    net.deliver(&p1);
    net.execute(&p2).unwrap();
    assert!(net.b.pending_nonces(&net.inbound()).is_empty());
}

#[test]
fn test_out_of_order_verification_in_order_execution() {
    let net = setup(two_required());
    let packets: Vec<_> = (0..5).map(|i| net.send(&[i])).collect();

    for packet in packets.iter().rev() {
        net.attest_all(packet);
        assert!(net.commit(packet).unwrap().is_committed());
    }
    assert_eq!(net.b.pending_nonces(&net.inbound()), vec![1, 2, 3, 4, 5]);

    for packet in &packets {
        net.execute(packet).unwrap();
    }
    assert_eq!(net.inbox.nonces(), vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_random_commit_order_executes_sequentially() {
    let net = setup(two_required());
    let packets: Vec<_> = (0..20u8).map(|i| net.send(&[i])).collect();

    let mut order: Vec<usize> = (0..packets.len()).collect();
    order.shuffle(&mut rand::thread_rng());
    for &i in &order {
        net.attest_all(&packets[i]);
        assert!(net.commit(&packets[i]).unwrap().is_committed());
    }

    // Executing in shuffled order: only the next nonce ever succeeds.
    let mut remaining = order;
    while !remaining.is_empty() {
        let before = remaining.len();
        remaining.retain(|&i| net.execute(&packets[i]).is_err());
        assert!(remaining.len() < before);
    }
    assert_eq!(net.inbox.nonces(), (1..=20).collect::<Vec<_>>());
}

#[test]
fn test_optional_threshold_and_confirmations() {
    let optional = [VerifierId([0x11; 32]), VerifierId([0x12; 32]), VerifierId([0x13; 32])];
    let config = PathwayConfig::with_required([VERIFIER_A])
        .optional(optional, 2)
        .min_confirmations(15);
    let net = setup(config);
    let packet = net.send(b"threshold");

    net.attest(&packet, VERIFIER_A, 10);
    net.attest(&packet, optional[0], 20);
    match net.commit(&packet).unwrap() {
        CommitOutcome::Pending(shortfall) => {
            assert_eq!(shortfall.optional_attested, 1);
            assert_eq!(shortfall.best_confirmations, 10);
        }
        other => panic!("expected pending, got {:?}", other),
    }

    net.attest(&packet, optional[2], 20);
    // Threshold met, but the required verifier saw only 10 confirmations.
    assert!(!net.commit(&packet).unwrap().is_committed());

    net.attest(&packet, VERIFIER_A, 15);
    assert!(net.commit(&packet).unwrap().is_committed());
    net.execute(&packet).unwrap();
}

#[test]
fn test_attestations_pruned_after_commit() {
    let net = setup(two_required());
    let packet = net.send(b"prune");
    net.attest_all(&packet);
    assert_eq!(
        net.b
            .attestations_for(packet.header_hash(), packet.payload_hash())
            .len(),
        2
    );
    assert_eq!(
        net.b
            .verifiable(&packet.header.encode(), packet.payload_hash())
            .unwrap(),
        None
    );

    net.commit(&packet).unwrap();
    assert!(net
        .b
        .attestations_for(packet.header_hash(), packet.payload_hash())
        .is_empty());
    assert!(matches!(
        net.b.verifiable(&packet.header.encode(), packet.payload_hash()),
        Err(MessagingError::AlreadyCommitted { .. })
    ));
}

#[test]
fn test_failed_callback_consumes_nonce_and_can_be_retried() {
    let net = setup(two_required());
    let p1 = net.send(b"first");
    let p2 = net.send(b"second");

    net.inbox.reject_next(1);
    net.attest_all(&p1);
    net.commit(&p1).unwrap();
    assert!(matches!(
        net.execute(&p1),
        Err(MessagingError::CallbackFailed { nonce: 1, .. })
    ));
    // Terminal: the nonce is consumed and later nonces proceed.
    assert_eq!(net.b.inbound_checkpoint(&net.inbound()), 1);
    assert_eq!(net.execute(&p1), Err(MessagingError::NotFound { nonce: 1 }));
    net.deliver(&p2);
    assert_eq!(net.inbox.nonces(), vec![2]);

    assert!(net.b.has_failed_delivery(&p1.header.channel_key()));
    net.b
        .retry_failed(&DELIVERER, ExecuteRequest::from_packet(&p1))
        .unwrap();
    assert_eq!(net.inbox.nonces(), vec![2, 1]);
    assert!(!net.b.has_failed_delivery(&p1.header.channel_key()));

    let failed = net.b_events.named("DeliveryFailed");
    assert_eq!(failed.len(), 1);
}

#[test]
fn test_skip_uncommitted_nonce() {
    let net = setup(two_required());
    let lost = net.send(b"lost");
    let next = net.send(b"next");

    net.b.skip(&ADMIN_B, net.inbound(), 1).unwrap();
    assert_eq!(net.b.inbound_checkpoint(&net.inbound()), 1);

    // A late quorum for the skipped nonce cannot commit.
    net.attest_all(&lost);
    assert!(matches!(
        net.commit(&lost),
        Err(MessagingError::AlreadyExecuted { nonce: 1, .. })
    ));

    net.deliver(&next);
    assert_eq!(net.inbox.nonces(), vec![2]);
    assert_eq!(net.b_events.named("NonceSkipped").len(), 1);
}

#[test]
fn test_stale_commit_after_delivery_is_not_pending() {
    let net = setup(two_required());
    let packet = net.send(b"once");
    net.deliver(&packet);

    // No fresh attestations: the consumed nonce is reported, not retried.
    assert_eq!(
        net.commit(&packet),
        Err(MessagingError::AlreadyExecuted {
            nonce: 1,
            checkpoint: 1
        })
    );
}

#[test]
fn test_skip_prunes_attestations_for_skipped_header() {
    let net = setup(two_required());
    let lost = net.send(b"lost");
    net.attest(&lost, VERIFIER_A, 1);
    net.b
        .submit_attestation(VERIFIER_B, lost.header_hash(), [0x42; 32], 1)
        .unwrap();

    net.b.skip(&ADMIN_B, net.inbound(), 1).unwrap();
    assert!(net
        .b
        .attestations_for(lost.header_hash(), lost.payload_hash())
        .is_empty());
    assert!(net
        .b
        .attestations_for(lost.header_hash(), [0x42; 32])
        .is_empty());
    assert!(matches!(
        net.commit(&lost),
        Err(MessagingError::AlreadyExecuted { nonce: 1, .. })
    ));
}

#[test]
fn test_skip_refuses_committed_nonce() {
    let net = setup(two_required());
    let packet = net.send(b"committed");
    net.attest_all(&packet);
    net.commit(&packet).unwrap();
    assert_eq!(
        net.b.skip(&ADMIN_B, net.inbound(), 1),
        Err(MessagingError::NonceCommitted { nonce: 1 })
    );
}

#[test]
fn test_pathway_update_takes_effect_for_new_commits() {
    let net = setup(PathwayConfig::with_required([VERIFIER_A]));
    let packet = net.send(b"update");
    net.attest(&packet, VERIFIER_A, 1);

    let updated = net
        .b
        .update_pathway(&ADMIN_B, PathKey::new(APP_B, CHAIN_A), two_required())
        .unwrap();
    assert_eq!(updated.revision, 2);
    assert!(updated.previous.is_some());

    assert!(!net.commit(&packet).unwrap().is_committed());
    net.attest(&packet, VERIFIER_B, 1);
    assert!(net.commit(&packet).unwrap().is_committed());
}

#[test]
fn test_library_migration_window() {
    let net = setup(two_required());
    let path = PathKey::new(APP_B, CHAIN_A);
    let now = 1_700_000_000;
    net.b_clock.set_time(now);

    net.b
        .schedule_migration(&ADMIN_B, path, LIB_V2, now + 100, now + 200)
        .unwrap();

    let p1 = net.send(b"before cutover");
    net.attest_all(&p1);
    assert!(matches!(
        net.b.try_commit(&DELIVERER, &p1.header.encode(), p1.payload_hash(), LIB_V2),
        Err(MessagingError::InvalidLibrary { .. })
    ));
    assert!(net.commit(&p1).unwrap().is_committed());

    // Grace period: both versions accepted.
    net.b_clock.set_time(now + 150);
    assert_eq!(net.b.active_library(&path).unwrap(), LIB_V2);
    let p2 = net.send(b"grace old");
    let p3 = net.send(b"grace new");
    net.attest_all(&p2);
    net.attest_all(&p3);
    assert!(net.commit(&p2).unwrap().is_committed());
    assert!(net
        .b
        .try_commit(&DELIVERER, &p3.header.encode(), p3.payload_hash(), LIB_V2)
        .unwrap()
        .is_committed());

    // Expired: old version refused, pathway finalized.
    net.b_clock.set_time(now + 200);
    let p4 = net.send(b"after expiry");
    net.attest_all(&p4);
    assert!(matches!(
        net.commit(&p4),
        Err(MessagingError::InvalidLibrary { .. })
    ));
    assert_eq!(net.b.pathway(&path).unwrap().library, LIB_V2);

    let scheduled = net.b_events.named("LibraryMigrationScheduled");
    assert_eq!(scheduled.len(), 1);
}

#[test]
fn test_snapshot_restore_resumes_delivery() {
    let net = setup(two_required());
    let p1 = net.send(b"one");
    let p2 = net.send(b"two");
    net.deliver(&p1);
    net.attest_all(&p2);
    net.commit(&p2).unwrap();

    let bytes = net.b.snapshot().to_bytes().unwrap();
    let restored_state = EndpointSnapshot::from_bytes(&bytes).unwrap();
    assert_eq!(restored_state, net.b.snapshot());

    // Fresh endpoint for chain B.
    let fresh = setup(two_required());
    fresh.b.restore(&OWNER, restored_state).unwrap();
    assert_eq!(fresh.b.inbound_checkpoint(&fresh.inbound()), 1);
    assert_eq!(fresh.b.pending_nonces(&fresh.inbound()), vec![2]);

    // Receivers are process-local: re-register before executing.
    fresh
        .b
        .register_application(&APP_B, APP_B, ADMIN_B, fresh.inbox.clone())
        .unwrap();
    fresh
        .b
        .execute(&DELIVERER, ExecuteRequest::from_packet(&p2))
        .unwrap();
    assert_eq!(fresh.inbox.nonces(), vec![2]);
    fresh.attest_all(&p2);
    assert!(matches!(
        fresh.commit(&p2),
        Err(MessagingError::AlreadyExecuted { .. })
    ));
}

#[test]
fn test_send_assigns_sequential_nonces_and_emits_events() {
    let net = setup(two_required());
    let packets: Vec<_> = (1..=3).map(|_| net.send(b"x")).collect();
    let nonces: Vec<u64> = packets.iter().map(|p| p.header.nonce).collect();
    assert_eq!(nonces, vec![1, 2, 3]);
    assert_eq!(net.a.outbound_nonce(APP_A, CHAIN_B, APP_B), 3);

    for packet in &packets {
        net.deliver(packet);
    }
    assert_eq!(net.b_events.named("PacketDelivered").len(), 3);
    let committed: Vec<_> = net
        .b_events
        .events()
        .into_iter()
        .filter(|e| matches!(e, EndpointEvent::PacketCommitted { .. }))
        .collect();
    assert_eq!(committed.len(), 3);
}
