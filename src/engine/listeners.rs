//! Single-slot payment and payout listeners.
//!
//! At most one listener of each kind is live. Starting a new one tears the
//! old one down under the same lock, and a poll task only fires after
//! taking its own slot, so a cancelled listener can never fire.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::engine::types::{EngineResult, PaymentCallback, PayoutCallback};
use crate::engine::Engine;
use crate::events::EventStream;
use crate::numbers::uint::{Amount, PublicKey, Uint256};

pub(crate) struct ListenerSlot {
    id: u64,
    account: String,
    task: JoinHandle<()>,
}

pub(crate) type Slot = Mutex<Option<ListenerSlot>>;

fn lock(slot: &Slot) -> MutexGuard<'_, Option<ListenerSlot>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Abort the listener in `slot`, if any.
fn tear_down(slot: &mut Option<ListenerSlot>, events: &EventStream) -> bool {
    match slot.take() {
        Some(old) => {
            old.task.abort();
            events.unregister_account(&old.account);
            true
        }
        None => false,
    }
}

/// Take `slot` if it still belongs to listener `id`.
fn release(slot: &Slot, id: u64, events: &EventStream) -> bool {
    let mut guard = lock(slot);
    if guard.as_ref().map(|s| s.id) != Some(id) {
        return false;
    }
    if let Some(current) = guard.take() {
        drop(guard);
        events.unregister_account(&current.account);
    }
    true
}

impl Engine {
    fn install_listener<F>(&self, slot: &Slot, account: String, spawn: F)
    where
        F: FnOnce(u64) -> JoinHandle<()>,
    {
        let id = self.next_listener_id();
        let mut guard = lock(slot);
        if tear_down(&mut guard, &self.inner.events) {
            tracing::debug!("Replaced active listener");
        }
        self.inner.events.register_account(&account);
        let task = spawn(id);
        *guard = Some(ListenerSlot { id, account, task });
    }

    /// Fire `callback` with the first receivable block of at least `amount`
    /// sent to `account`. Replaces any active payment listener.
    pub fn listen_for_payment(
        &self,
        account: &str,
        amount: Amount,
        callback: PaymentCallback,
    ) -> EngineResult<()> {
        let public = Uint256::from_account(account)?;
        let account = public.to_account();
        let period = Duration::from_millis(self.inner.config.listener_poll_ms);

        tracing::info!(account = %account, amount = %amount, "Listening for payment");
        let engine = self.clone();
        self.install_listener(&self.inner.payment, account, move |id| {
            tokio::spawn(async move {
                engine.poll_payment(id, public, amount, callback, period).await
            })
        });
        Ok(())
    }

    /// Returns false when no payment listener was active.
    pub fn cancel_payment_listener(&self) -> bool {
        tear_down(&mut lock(&self.inner.payment), &self.inner.events)
    }

    pub fn is_listening_for_payment(&self) -> bool {
        lock(&self.inner.payment).is_some()
    }

    async fn poll_payment(
        &self,
        id: u64,
        public: PublicKey,
        target: Amount,
        callback: PaymentCallback,
        period: Duration,
    ) {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let pending = match self.inner.ledger.pending(&public, target).await {
                Ok(pending) => pending,
                Err(e) => {
                    tracing::warn!(error = %e, "Payment poll failed");
                    continue;
                }
            };
            if let Some(block) = pending.into_iter().find(|b| b.amount >= target) {
                if release(&self.inner.payment, id, &self.inner.events) {
                    tracing::info!(hash = %block.hash, amount = %block.amount, "Payment received");
                    callback(block);
                }
                return;
            }
        }
    }

    /// Fire `callback(true)` once `duration` has passed, or `callback(false)`
    /// as soon as `account`'s balance reaches zero. Replaces any active
    /// payout listener.
    pub fn listen_for_payout(
        &self,
        account: &str,
        duration: Duration,
        callback: PayoutCallback,
    ) -> EngineResult<()> {
        let public = Uint256::from_account(account)?;
        let account = public.to_account();
        let period = Duration::from_millis(self.inner.config.listener_poll_ms);
        let deadline = Instant::now() + duration;

        tracing::info!(
            account = %account,
            duration_ms = duration.as_millis() as u64,
            "Listening for payout"
        );
        let engine = self.clone();
        self.install_listener(&self.inner.payout, account, move |id| {
            tokio::spawn(async move {
                engine.poll_payout(id, public, deadline, callback, period).await
            })
        });
        Ok(())
    }

    /// Returns false when no payout listener was active.
    pub fn cancel_payout_listener(&self) -> bool {
        tear_down(&mut lock(&self.inner.payout), &self.inner.events)
    }

    pub fn is_listening_for_payout(&self) -> bool {
        lock(&self.inner.payout).is_some()
    }

    async fn poll_payout(
        &self,
        id: u64,
        public: PublicKey,
        deadline: Instant,
        callback: PayoutCallback,
        period: Duration,
    ) {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let expired = if Instant::now() >= deadline {
                true
            } else {
                match self.inner.ledger.account_frontier(&public).await {
                    Ok(head) if head.balance.is_zero() => false,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!(error = %e, "Payout poll failed");
                        continue;
                    }
                }
            };
            if release(&self.inner.payout, id, &self.inner.events) {
                tracing::info!(account = %public.to_account(), expired, "Payout listener finished");
                callback(expired);
            }
            return;
        }
    }

    pub(crate) fn cancel_listeners(&self) {
        self.cancel_payment_listener();
        self.cancel_payout_listener();
    }
}
