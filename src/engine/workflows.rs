//! Send and receive pipelines.
//!
//! Every block for one account is built and submitted under that account's
//! chain lock, so a send and a pocket run (or two pocket runs) never start
//! from the same frontier.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{self, MissedTickBehavior};

use crate::blocks::StateBlock;
use crate::crypto::keys::{pub_key, RawKey};
use crate::engine::types::{
    AutomateResponse, ConfirmationCallback, EngineError, EngineResult, NotificationKind,
};
use crate::engine::watchers::PocketTicket;
use crate::engine::Engine;
use crate::numbers::uint::{Amount, BlockHash, PublicKey, Uint256};
use crate::observability::metrics;
use crate::rpc::types::{AccountFrontier, ProcessResponse};

/// Per-account chain locks. Entries live only while someone holds or waits
/// on the lock.
pub(crate) type ChainLocks = Arc<DashMap<PublicKey, Arc<Mutex<()>>>>;

/// Held while building and submitting blocks for one account.
pub(crate) struct ChainGuard {
    guard: Option<OwnedMutexGuard<()>>,
    account: PublicKey,
    locks: ChainLocks,
}

impl Drop for ChainGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Only the map's own reference left: nobody holds or awaits it.
        self.locks
            .remove_if(&self.account, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl Engine {
    pub(crate) async fn chain_lock(&self, account: &PublicKey) -> ChainGuard {
        let locks = self.inner.chain_locks.clone();
        let lock: Arc<Mutex<()>> = locks.entry(*account).or_default().value().clone();
        ChainGuard {
            guard: Some(lock.lock_owned().await),
            account: *account,
            locks,
        }
    }

    /// Send `amount` raw from the account of `private_key` to `destination`.
    pub async fn send(
        &self,
        private_key: &RawKey,
        destination: &str,
        amount: Amount,
    ) -> EngineResult<ProcessResponse> {
        let link = Uint256::from_account(destination)?;
        let public = pub_key(private_key);
        let _chain = self.chain_lock(&public).await;

        let head = self.inner.ledger.account_frontier(&public).await?;
        let Some(balance) = head.balance.checked_sub(amount) else {
            return Err(EngineError::InsufficientBalance {
                balance: head.balance,
                amount,
            });
        };

        let work = self.inner.ledger.work_generate(&head.frontier).await?;
        let block = StateBlock::new(
            public,
            head.previous(),
            head.representative,
            balance,
            link,
            private_key,
            &public,
        )?;
        let response = self.inner.ledger.process(&block, &work).await?;

        metrics::record_block_processed("send");
        tracing::info!(
            account = %public.to_account(),
            destination = %destination,
            amount = %amount,
            hash = %response.hash,
            "Send processed"
        );
        Ok(response)
    }

    /// [`Engine::send`], then wait for the network to confirm the block.
    ///
    /// Returns once the block is submitted. `callback` fires exactly once:
    /// with the send error, or with the response when the confirmation
    /// arrives from the event stream or the poll, whichever is first.
    pub async fn send_wait_confirmation(
        &self,
        private_key: &RawKey,
        destination: &str,
        amount: Amount,
        callback: ConfirmationCallback,
    ) -> EngineResult<ProcessResponse> {
        let response = match self.send(private_key, destination, amount).await {
            Ok(response) => response,
            Err(e) => {
                callback(Err(e.clone()));
                return Err(e);
            }
        };
        self.wait_confirmation(response.clone(), callback)?;
        Ok(response)
    }

    /// Register an already submitted block for confirmation tracking.
    pub fn wait_confirmation(
        &self,
        response: ProcessResponse,
        callback: ConfirmationCallback,
    ) -> EngineResult<()> {
        let hash = response.hash;
        self.inner.confirmations.insert(response, callback)?;

        let engine = self.clone();
        let period = Duration::from_millis(self.inner.config.confirmation_poll_ms);
        let poll = tokio::spawn(async move { engine.poll_confirmation(hash, period).await });
        self.inner.confirmations.set_poll(&hash, poll);
        Ok(())
    }

    async fn poll_confirmation(&self, hash: BlockHash, period: Duration) {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // A block submitted a moment ago is not confirmed yet.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if !self.inner.confirmations.contains(&hash) {
                break;
            }
            match self.inner.ledger.block_confirmed(&hash).await {
                Ok(true) => {
                    self.inner.confirmations.resolve(&hash, "poll");
                    break;
                }
                Ok(false) => tracing::debug!(hash = %hash, "Block not confirmed yet"),
                Err(e) => tracing::warn!(hash = %hash, error = %e, "Confirmation poll failed"),
            }
        }
    }

    /// Receive every pending block above `threshold` for the account of
    /// `private_key`. Finding nothing pending is not an error.
    pub async fn receive_pending(
        &self,
        private_key: &RawKey,
        threshold: Amount,
    ) -> EngineResult<Vec<AutomateResponse>> {
        self.pocket(private_key, threshold, || true, |_| {}).await
    }

    /// One block at a time, each on top of the previous one. `active` is
    /// checked once the chain lock is held and before every submission; when
    /// it turns false the run stops with what it has received so far.
    async fn pocket<A, F>(
        &self,
        private_key: &RawKey,
        threshold: Amount,
        active: A,
        mut on_receive: F,
    ) -> EngineResult<Vec<AutomateResponse>>
    where
        A: Fn() -> bool + Send,
        F: FnMut(&AutomateResponse) + Send,
    {
        let public = pub_key(private_key);
        let account = public.to_account();
        let _chain = self.chain_lock(&public).await;
        if !active() {
            tracing::debug!(account = %account, "Pocket run cancelled before start");
            return Ok(Vec::new());
        }

        let pending = self.inner.ledger.pending(&public, threshold).await?;
        if pending.is_empty() {
            tracing::debug!(account = %account, "Nothing to receive");
            return Ok(Vec::new());
        }

        let mut head = self.inner.ledger.account_frontier(&public).await?;
        let mut received = Vec::with_capacity(pending.len());
        for block in pending {
            let balance = head
                .balance
                .checked_add(block.amount)
                .ok_or(EngineError::BalanceOverflow {
                    balance: head.balance,
                    amount: block.amount,
                })?;
            let work = self.inner.ledger.work_generate(&head.frontier).await?;
            let state = StateBlock::new(
                public,
                head.previous(),
                head.representative,
                balance,
                block.hash,
                private_key,
                &public,
            )?;
            if !active() {
                tracing::debug!(account = %account, "Pocket run cancelled");
                break;
            }
            let response = self.inner.ledger.process(&state, &work).await?;

            let kind = if head.is_unopened() { "open" } else { "receive" };
            metrics::record_block_processed(kind);
            tracing::info!(
                account = %account,
                source = %block.source,
                amount = %block.amount,
                hash = %response.hash,
                kind,
                "Pending block received"
            );

            let result = AutomateResponse {
                kind: NotificationKind::Receive,
                account: account.clone(),
                amount: block.amount,
                balance,
                hash: response.hash,
                frontier: response.hash,
                representative: head.representative.to_account(),
            };
            head = AccountFrontier {
                account: public,
                frontier: response.hash,
                balance,
                representative: head.representative,
            };
            on_receive(&result);
            received.push(result);
        }
        Ok(received)
    }

    /// Pocket on behalf of an auto-pocket entry, reporting to its callback
    /// for as long as the entry stays registered.
    pub(crate) async fn run_pocket(&self, account: &str, ticket: PocketTicket) {
        let notify = |result: EngineResult<AutomateResponse>| {
            if let Some(callback) = self.inner.watchers.pocket_callback(account, ticket.id) {
                callback(result);
            }
        };

        let active = || self.inner.watchers.holds_pocket(account, ticket.id);
        match self
            .pocket(&ticket.key, ticket.threshold, active, |result| {
                notify(Ok(result.clone()))
            })
            .await
        {
            Ok(received) if !received.is_empty() => {
                tracing::debug!(
                    account = %account,
                    count = received.len(),
                    "Auto-pocket run finished"
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(account = %account, error = %e, "Auto-pocket run failed");
                notify(Err(e));
            }
        }
    }

    /// Look up `account`'s head and relay it to the account's callbacks.
    pub(crate) async fn refresh_and_notify(
        &self,
        account: &str,
        kind: NotificationKind,
        amount: Amount,
        hash: BlockHash,
        include_pocket: bool,
    ) {
        let public = match Uint256::from_account(account) {
            Ok(public) => public,
            Err(e) => {
                tracing::warn!(account = %account, error = %e, "Cannot refresh malformed account");
                return;
            }
        };

        let result = self
            .inner
            .ledger
            .account_frontier(&public)
            .await
            .map(|head| AutomateResponse {
                kind,
                account: account.to_string(),
                amount,
                balance: head.balance,
                hash,
                frontier: head.frontier,
                representative: head.representative.to_account(),
            })
            .map_err(EngineError::from);
        if let Err(e) = &result {
            tracing::warn!(account = %account, error = %e, "Frontier refresh failed");
        }

        for callback in self.inner.watchers.callbacks(account, include_pocket) {
            callback(result.clone());
        }
    }
}
