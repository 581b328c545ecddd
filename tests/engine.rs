//! End-to-end engine flows against the in-memory ledger.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nano_engine::config::ReconcileConfig;
use nano_engine::crypto::keys::{deterministic_key, pub_key, RawKey};
use nano_engine::engine::{AutomateCallback, Engine, EngineResult, NotificationKind};
use nano_engine::events::{ConfirmationEvent, EventBlock, EventStream, Subtype};
use nano_engine::numbers::units::{nano_to_raw, raw_to_nano};
use nano_engine::numbers::{Amount, Uint256};
use nano_engine::rpc::{Emulator, LedgerClient};

mod common;

fn setup(poll_ms: u64) -> (Engine, Arc<Emulator>) {
    let ledger = Arc::new(Emulator::new(Uint256::from(0xEEu64)));
    let (events, _outbound) = EventStream::new();
    let config = ReconcileConfig {
        pocket_interval_ms: 60_000,
        confirmation_poll_ms: poll_ms,
        listener_poll_ms: poll_ms,
        ..ReconcileConfig::default()
    };
    (Engine::new(ledger.clone(), events, config), ledger)
}

fn seed_key(index: u32) -> RawKey {
    deterministic_key(&RawKey::from_hex(common::SEED).unwrap(), index)
}

fn confirmed_send(from: &Uint256, to: &Uint256, hash: Uint256, amount: Amount) -> ConfirmationEvent {
    ConfirmationEvent {
        account: from.to_account(),
        amount,
        hash,
        block: EventBlock {
            account: from.to_account(),
            balance: Amount::ZERO,
            link: *to,
            link_as_account: to.to_account(),
            previous: Uint256::ZERO,
            representative: from.to_account(),
            work: String::new(),
            subtype: Subtype::Send,
        },
    }
}

#[tokio::test]
async fn test_payment_round_trip_between_accounts() {
    let (engine, ledger) = setup(20);
    let alice = seed_key(0);
    let bob = seed_key(1);
    let (alice_key, bob_key) = (pub_key(&alice), pub_key(&bob));

    let one = nano_to_raw("1").unwrap();
    ledger.fund(&alice_key, nano_to_raw("3").unwrap());
    engine.receive_pending(&alice, Amount::ZERO).await.unwrap();

    let bob_updates = Arc::new(Mutex::new(Vec::new()));
    let sink = bob_updates.clone();
    let callback: AutomateCallback = Arc::new(move |result: EngineResult<_>| sink.lock().unwrap().push(result));
    engine.automatically_pocket_register(&bob, Amount::ZERO, callback).unwrap();

    let confirmed = Arc::new(AtomicUsize::new(0));
    let counter = confirmed.clone();
    let sent = engine
        .send_wait_confirmation(
            &alice,
            &bob_key.to_account(),
            one,
            Box::new(move |result| {
                assert!(result.is_ok());
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .await
        .unwrap();

    engine.handle_event(&confirmed_send(&alice_key, &bob_key, sent.hash, one));
    assert!(common::eventually(|| bob_updates.lock().unwrap().len() == 1).await);
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert_eq!(confirmed.load(Ordering::SeqCst), 1);
    let update = bob_updates.lock().unwrap()[0].clone().unwrap();
    assert_eq!(update.kind, NotificationKind::Receive);
    assert_eq!(raw_to_nano(update.balance), "1");

    let alice_balance = ledger.wallet_balance(&alice_key).await.unwrap();
    assert_eq!(raw_to_nano(alice_balance.balance), "2");
    assert_eq!(ledger.frontier_of(&bob_key).unwrap().balance, one);
}

#[tokio::test]
async fn test_racing_event_and_poll_deliver_once() {
    for _ in 0..20 {
        let (engine, ledger) = setup(1);
        let sender = seed_key(2);
        let sender_key = pub_key(&sender);
        ledger.fund(&sender_key, Amount::new(10));
        engine.receive_pending(&sender, Amount::ZERO).await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let destination = pub_key(&seed_key(3));
        let sent = engine
            .send_wait_confirmation(
                &sender,
                &destination.to_account(),
                Amount::new(1),
                Box::new(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await
            .unwrap();

        let event = confirmed_send(&sender_key, &destination, sent.hash, Amount::new(1));
        let racer = engine.clone();
        let racing = tokio::spawn(async move { racer.handle_event(&event) });
        tokio::time::sleep(Duration::from_millis(2)).await;
        racing.await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(engine.confirmations().is_empty());
    }
}

#[tokio::test]
async fn test_redundant_pocket_triggers_submit_once() {
    let (engine, ledger) = setup(20);
    let private = seed_key(4);
    let public = pub_key(&private);
    let send_hash = ledger.fund(&public, Amount::new(99));

    let callback: AutomateCallback = Arc::new(|_| {});
    engine.automatically_pocket_register(&private, Amount::ZERO, callback).unwrap();
    let event = confirmed_send(&Uint256::from(0xFEu64), &public, send_hash, Amount::new(99));
    engine.handle_event(&event);
    engine.handle_event(&event);
    engine.receive_pending(&private, Amount::ZERO).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(ledger.processed_count(), 1);
    assert_eq!(ledger.frontier_of(&public).unwrap().balance, Amount::new(99));
}

#[tokio::test]
async fn test_ledger_outage_reported_to_pocket_callback() {
    let (engine, ledger) = setup(20);
    let private = seed_key(5);
    let public = pub_key(&private);
    let send_hash = ledger.fund(&public, Amount::new(1));
    ledger.set_offline(true);

    let errors = Arc::new(AtomicUsize::new(0));
    let counter = errors.clone();
    let callback: AutomateCallback = Arc::new(move |result: EngineResult<_>| {
        if result.is_err() {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });
    engine.automatically_pocket_register(&private, Amount::ZERO, callback).unwrap();
    assert!(common::eventually(|| errors.load(Ordering::SeqCst) >= 1).await);

    // The next trigger after recovery picks the block up.
    ledger.set_offline(false);
    engine.handle_event(&confirmed_send(&Uint256::from(0xFEu64), &public, send_hash, Amount::new(1)));
    assert!(common::eventually(|| ledger.processed_count() == 1).await);
}
