//! Reconciliation engine.
//!
//! # Data Flow
//! ```text
//! caller
//!     → workflows.rs (send / receive pipelines under a per-account chain lock)
//!     → LedgerClient (frontier, pending, work, process)
//!
//! EventStream confirmation
//!     → Engine::handle_event
//!     → watchers.rs (observers refreshed, pocketing accounts received)
//!     → confirmations.rs (remove-and-fire)
//!
//! timers
//!     → auto-pocket safety net, confirmation poll, listeners.rs polls
//! ```

pub mod confirmations;
pub mod listeners;
pub mod types;
pub mod watchers;
pub mod workflows;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{self, MissedTickBehavior};

use crate::config::schema::ReconcileConfig;
use crate::crypto::keys::{account_from_private_key, RawKey};
use crate::events::types::{ConfirmationEvent, Subtype};
use crate::events::EventStream;
use crate::numbers::uint::{Amount, Uint256};
use crate::rpc::LedgerClient;

pub use confirmations::ConfirmationRegistry;
pub use types::{
    AutomateCallback, AutomateResponse, ConfirmationCallback, EngineError, EngineResult,
    NotificationKind, PaymentCallback, PayoutCallback, WatchId,
};
pub use watchers::WatchRegistry;

struct Inner {
    ledger: Arc<dyn LedgerClient>,
    events: Arc<EventStream>,
    config: ReconcileConfig,
    watchers: WatchRegistry,
    confirmations: ConfirmationRegistry,
    chain_locks: workflows::ChainLocks,
    payment: listeners::Slot,
    payout: listeners::Slot,
    listener_ids: AtomicU64,
}

/// Cheap-to-clone handle on the shared engine state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        events: Arc<EventStream>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                ledger,
                events,
                config,
                watchers: WatchRegistry::new(),
                confirmations: ConfirmationRegistry::new(),
                chain_locks: Arc::new(DashMap::new()),
                payment: Mutex::new(None),
                payout: Mutex::new(None),
                listener_ids: AtomicU64::new(0),
            }),
        }
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.inner.ledger
    }

    pub fn events(&self) -> &Arc<EventStream> {
        &self.inner.events
    }

    pub fn watchers(&self) -> &WatchRegistry {
        &self.inner.watchers
    }

    pub fn confirmations(&self) -> &ConfirmationRegistry {
        &self.inner.confirmations
    }

    fn next_listener_id(&self) -> u64 {
        self.inner.listener_ids.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Relay confirmed activity on `account` to `callback`.
    pub fn watch(&self, account: &str, callback: AutomateCallback) -> EngineResult<WatchId> {
        let account = Uint256::from_account(account)?.to_account();
        let id = self.inner.watchers.add_observer(&account, callback);
        self.inner.events.register_account(&account);
        tracing::info!(account = %account, "Watching account");
        Ok(WatchId { account, id })
    }

    pub fn unwatch(&self, watch: &WatchId) -> EngineResult<()> {
        if !self.inner.watchers.remove_observer(&watch.account, watch.id) {
            return Err(EngineError::NotWatched(watch.account.clone()));
        }
        self.inner.events.unregister_account(&watch.account);
        tracing::info!(account = %watch.account, "Stopped watching account");
        Ok(())
    }

    /// Receive everything sent to the account of `private_key` at or above
    /// `threshold`, on every matching send confirmation and on a timer.
    /// Returns the account.
    pub fn automatically_pocket_register(
        &self,
        private_key: &RawKey,
        threshold: Amount,
        callback: AutomateCallback,
    ) -> EngineResult<String> {
        let account = account_from_private_key(private_key);
        let id = self
            .inner
            .watchers
            .insert_pocket(&account, private_key.clone(), threshold, callback)?;
        self.inner.events.register_account(&account);

        let engine = self.clone();
        let timer_account = account.clone();
        let period = Duration::from_millis(self.inner.config.pocket_interval_ms);
        let timer = tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match engine.inner.watchers.pocket_ticket(&timer_account) {
                    Some(ticket) if ticket.id == id => {
                        engine.run_pocket(&timer_account, ticket).await
                    }
                    _ => break,
                }
            }
        });
        self.inner.watchers.set_pocket_timer(&account, id, timer);

        tracing::info!(account = %account, threshold = %threshold, "Auto-pocket registered");
        Ok(account)
    }

    pub fn automatically_pocket_unregister(&self, account: &str) -> EngineResult<()> {
        let account = Uint256::from_account(account)?.to_account();
        if !self.inner.watchers.remove_pocket(&account) {
            return Err(EngineError::NotWatched(account));
        }
        self.inner.events.unregister_account(&account);
        tracing::info!(account = %account, "Auto-pocket unregistered");
        Ok(())
    }

    /// React to one confirmation. Ledger work is spawned; this returns at once.
    pub fn handle_event(&self, event: &ConfirmationEvent) {
        let watchers = &self.inner.watchers;
        match event.block.subtype {
            Subtype::Send => {
                let destination = event.block.link_as_account.as_str();
                if watchers.observer_count(destination) > 0 {
                    self.spawn_refresh(destination, NotificationKind::SendTo, event, false);
                }
                if let Some(ticket) = watchers.pocket_ticket(destination) {
                    let engine = self.clone();
                    let destination = destination.to_string();
                    tokio::spawn(async move { engine.run_pocket(&destination, ticket).await });
                }
                if watchers.is_watched(&event.account) {
                    self.spawn_refresh(&event.account, NotificationKind::SendFrom, event, true);
                }
            }
            Subtype::Receive | Subtype::Open => {
                if watchers.is_watched(&event.account) {
                    self.spawn_refresh(&event.account, NotificationKind::Receive, event, true);
                }
            }
            Subtype::Change | Subtype::Epoch => {}
        }
        self.inner.confirmations.resolve(&event.hash, "event");
    }

    fn spawn_refresh(
        &self,
        account: &str,
        kind: NotificationKind,
        event: &ConfirmationEvent,
        include_pocket: bool,
    ) {
        let engine = self.clone();
        let account = account.to_string();
        let (amount, hash) = (event.amount, event.hash);
        tokio::spawn(async move {
            engine
                .refresh_and_notify(&account, kind, amount, hash, include_pocket)
                .await
        });
    }

    /// Feed confirmations from the event stream into [`Engine::handle_event`]
    /// until `shutdown` fires.
    pub async fn run_events(self, mut shutdown: broadcast::Receiver<()>) {
        let mut events = self.inner.events.subscribe();
        tracing::info!("Engine event pump starting");

        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => self.handle_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            skipped,
                            "Engine fell behind the event stream; relying on polls"
                        );
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown.recv() => break,
            }
        }

        tracing::info!("Engine event pump stopped");
    }

    /// Drop every registration, stop every timer and release every account
    /// from the event stream. Pending callbacks never fire.
    pub fn shutdown(&self) {
        for (account, interests) in self.inner.watchers.clear() {
            for _ in 0..interests {
                self.inner.events.unregister_account(&account);
            }
        }
        self.inner.confirmations.clear();
        self.cancel_listeners();
    }
}
