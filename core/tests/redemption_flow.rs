//! End-to-end lifecycle tests over the in-memory store.
//!
//! These exercise the issuance and verification services together, including
//! the central correctness property: at-most-once acceptance under
//! concurrent redemption.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)] // Test code can use unwrap/expect

use chrono::Utc;
use std::sync::Arc;
use turnstile_core::{
    EventRef, InspectOutcome, IssuanceService, MemoryTicketStore, RedeemOutcome, SystemClock,
    TicketStore, Token, UuidMinter, VerificationService,
};

fn services(store: Arc<MemoryTicketStore>) -> (IssuanceService, VerificationService) {
    let store: Arc<dyn TicketStore> = store;
    let clock = Arc::new(SystemClock);
    let issuance = IssuanceService::new(
        store.clone(),
        Arc::new(UuidMinter),
        clock.clone(),
        Some("https://door.example.com".to_string()),
    );
    let verification = VerificationService::new(store, clock);
    (issuance, verification)
}

/// The walkthrough scenario: issue for event E1, preview, redeem from one
/// scanner, watch a second scanner bounce off, and probe a bogus token.
#[tokio::test]
async fn issue_inspect_redeem_scenario() {
    let store = Arc::new(MemoryTicketStore::new());
    let (issuance, verification) = services(store);

    let issued = issuance
        .issue(
            EventRef::new("E1"),
            "Ana".to_string(),
            "555-0100".to_string(),
        )
        .await
        .expect("issue succeeds");
    let token = issued.ticket.token.clone();

    // Preview before redeeming.
    assert!(matches!(
        verification.inspect(&token).await.expect("inspect"),
        InspectOutcome::Valid { .. }
    ));

    // First scanner wins.
    match verification
        .redeem(&token, "scanner-1")
        .await
        .expect("redeem")
    {
        RedeemOutcome::Accepted { ticket } => {
            assert_eq!(ticket.redeemed_by.as_deref(), Some("scanner-1"));
        }
        other => panic!("expected Accepted, got {other:?}"),
    }

    // Second scanner sees the first scanner's redemption, unmodified.
    match verification
        .redeem(&token, "scanner-2")
        .await
        .expect("redeem")
    {
        RedeemOutcome::AlreadyUsed { ticket } => {
            assert_eq!(ticket.redeemed_by.as_deref(), Some("scanner-1"));
        }
        other => panic!("expected AlreadyUsed, got {other:?}"),
    }

    // Unknown tokens stay unknown.
    assert_eq!(
        verification
            .inspect(&Token::new("bogus"))
            .await
            .expect("inspect"),
        InspectOutcome::Unknown
    );
}

/// At-most-once acceptance: 100 concurrent redemptions of one ticket yield
/// exactly one `Accepted` and 99 `AlreadyUsed`, under arbitrary
/// interleaving.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_redemption_accepts_exactly_once() {
    let store = Arc::new(MemoryTicketStore::new());
    let (issuance, _) = services(store.clone());

    let issued = issuance
        .issue(
            EventRef::new("E1"),
            "Ana".to_string(),
            "555-0100".to_string(),
        )
        .await
        .expect("issue succeeds");
    let token = issued.ticket.token.clone();

    let verification = Arc::new(VerificationService::new(
        store as Arc<dyn TicketStore>,
        Arc::new(SystemClock),
    ));

    let mut handles = Vec::new();
    for i in 0..100 {
        let verification = Arc::clone(&verification);
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            verification
                .redeem(&token, &format!("scanner-{i}"))
                .await
                .expect("redeem resolves")
        }));
    }

    let mut accepted = 0;
    let mut already_used = 0;
    let mut winner = None;
    for handle in handles {
        match handle.await.expect("task completes") {
            RedeemOutcome::Accepted { ticket } => {
                accepted += 1;
                winner = ticket.redeemed_by.clone();
            }
            RedeemOutcome::AlreadyUsed { .. } => already_used += 1,
            RedeemOutcome::Unknown => panic!("issued token reported unknown"),
        }
    }

    assert_eq!(accepted, 1, "exactly one concurrent redeem may win");
    assert_eq!(already_used, 99);

    // The stored record carries the winner's stamp.
    let stored = verification
        .inspect(&token)
        .await
        .expect("inspect succeeds");
    match stored {
        InspectOutcome::Redeemed { ticket } => {
            assert_eq!(ticket.redeemed_by, winner);
            assert!(ticket.redeemed_at.is_some());
        }
        other => panic!("expected Redeemed, got {other:?}"),
    }
}

/// Sequential re-scan keeps the first redemption's stamps bit for bit.
#[tokio::test]
async fn rescan_preserves_original_stamps() {
    let store = Arc::new(MemoryTicketStore::new());
    let (issuance, verification) = services(store);

    let issued = issuance
        .issue(
            EventRef::new("E1"),
            "Ana".to_string(),
            "555-0100".to_string(),
        )
        .await
        .expect("issue succeeds");
    let token = issued.ticket.token.clone();

    let before = Utc::now();
    let first = verification
        .redeem(&token, "scanner-1")
        .await
        .expect("redeem");
    let first_stamps = match first {
        RedeemOutcome::Accepted { ticket } => (ticket.redeemed_at, ticket.redeemed_by),
        other => panic!("expected Accepted, got {other:?}"),
    };
    assert!(first_stamps.0.expect("stamped") >= before);

    let second = verification
        .redeem(&token, "scanner-2")
        .await
        .expect("redeem");
    match second {
        RedeemOutcome::AlreadyUsed { ticket } => {
            assert_eq!((ticket.redeemed_at, ticket.redeemed_by), first_stamps);
        }
        other => panic!("expected AlreadyUsed, got {other:?}"),
    }
}
