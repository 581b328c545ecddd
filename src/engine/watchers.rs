//! Per-account interest records.
//!
//! An account can have any number of observers but at most one auto-pocket
//! entry. Callbacks are cloned out of the map before they run, so a
//! callback that calls back into the engine never deadlocks on a shard.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::crypto::keys::RawKey;
use crate::engine::types::{AutomateCallback, EngineError, EngineResult};
use crate::numbers::uint::Amount;

struct Observer {
    id: u64,
    callback: AutomateCallback,
}

struct Pocket {
    id: u64,
    key: RawKey,
    threshold: Amount,
    callback: AutomateCallback,
    timer: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct AccountEntry {
    observers: Vec<Observer>,
    pocket: Option<Pocket>,
}

impl AccountEntry {
    fn is_empty(&self) -> bool {
        self.observers.is_empty() && self.pocket.is_none()
    }
}

/// What the engine needs to pocket an account outside the registry lock.
pub(crate) struct PocketTicket {
    pub id: u64,
    pub key: RawKey,
    pub threshold: Amount,
}

/// Watched and auto-pocketed accounts.
#[derive(Clone, Default)]
pub struct WatchRegistry {
    entries: Arc<DashMap<String, AccountEntry>>,
    next_id: Arc<AtomicU64>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn add_observer(&self, account: &str, callback: AutomateCallback) -> u64 {
        let id = self.next_id();
        self.entries
            .entry(account.to_string())
            .or_default()
            .observers
            .push(Observer { id, callback });
        id
    }

    pub(crate) fn remove_observer(&self, account: &str, id: u64) -> bool {
        let removed = match self.entries.get_mut(account) {
            Some(mut entry) => {
                let before = entry.observers.len();
                entry.observers.retain(|o| o.id != id);
                entry.observers.len() != before
            }
            None => false,
        };
        self.entries.remove_if(account, |_, entry| entry.is_empty());
        removed
    }

    /// Insert the auto-pocket entry for `account`, rejecting a second one.
    pub(crate) fn insert_pocket(
        &self,
        account: &str,
        key: RawKey,
        threshold: Amount,
        callback: AutomateCallback,
    ) -> EngineResult<u64> {
        let id = self.next_id();
        let pocket = Pocket {
            id,
            key,
            threshold,
            callback,
            timer: None,
        };
        match self.entries.entry(account.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().pocket.is_some() {
                    return Err(EngineError::AlreadyWatched(account.to_string()));
                }
                occupied.get_mut().pocket = Some(pocket);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(AccountEntry {
                    observers: Vec::new(),
                    pocket: Some(pocket),
                });
            }
        }
        Ok(id)
    }

    /// Attach the safety-net timer. Aborts it if the entry already went away.
    pub(crate) fn set_pocket_timer(&self, account: &str, id: u64, timer: JoinHandle<()>) {
        if let Some(mut entry) = self.entries.get_mut(account) {
            if let Some(pocket) = entry.pocket.as_mut().filter(|p| p.id == id) {
                pocket.timer = Some(timer);
                return;
            }
        }
        timer.abort();
    }

    /// Remove the auto-pocket entry and stop its timer.
    pub(crate) fn remove_pocket(&self, account: &str) -> bool {
        let pocket = self.entries.get_mut(account).and_then(|mut entry| entry.pocket.take());
        self.entries.remove_if(account, |_, entry| entry.is_empty());
        match pocket {
            Some(pocket) => {
                if let Some(timer) = pocket.timer {
                    timer.abort();
                }
                true
            }
            None => false,
        }
    }

    pub(crate) fn pocket_ticket(&self, account: &str) -> Option<PocketTicket> {
        let entry = self.entries.get(account)?;
        let pocket = entry.pocket.as_ref()?;
        Some(PocketTicket {
            id: pocket.id,
            key: pocket.key.clone(),
            threshold: pocket.threshold,
        })
    }

    /// The callback of the auto-pocket entry `id`, if it is still registered.
    pub(crate) fn pocket_callback(&self, account: &str, id: u64) -> Option<AutomateCallback> {
        let entry = self.entries.get(account)?;
        entry
            .pocket
            .as_ref()
            .filter(|p| p.id == id)
            .map(|p| p.callback.clone())
    }

    /// Whether the pocket entry `id` is still registered for `account`.
    pub(crate) fn holds_pocket(&self, account: &str, id: u64) -> bool {
        self.entries
            .get(account)
            .is_some_and(|entry| entry.pocket.as_ref().is_some_and(|p| p.id == id))
    }

    /// Callbacks currently interested in `account`, observers first.
    pub(crate) fn callbacks(&self, account: &str, include_pocket: bool) -> Vec<AutomateCallback> {
        match self.entries.get(account) {
            Some(entry) => entry
                .observers
                .iter()
                .map(|o| o.callback.clone())
                .chain(
                    entry
                        .pocket
                        .as_ref()
                        .filter(|_| include_pocket)
                        .map(|p| p.callback.clone()),
                )
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn is_watched(&self, account: &str) -> bool {
        self.entries.contains_key(account)
    }

    pub fn is_pocketing(&self, account: &str) -> bool {
        self.entries
            .get(account)
            .map(|entry| entry.pocket.is_some())
            .unwrap_or(false)
    }

    pub fn observer_count(&self, account: &str) -> usize {
        self.entries.get(account).map(|entry| entry.observers.len()).unwrap_or(0)
    }

    /// Watched accounts, sorted.
    pub fn accounts(&self) -> Vec<String> {
        let mut accounts: Vec<_> = self.entries.iter().map(|e| e.key().clone()).collect();
        accounts.sort();
        accounts
    }

    /// Drop every registration and stop every timer.
    pub(crate) fn clear(&self) -> Vec<(String, usize)> {
        let accounts = self.accounts();
        let mut released = Vec::with_capacity(accounts.len());
        for account in accounts {
            if let Some((account, entry)) = self.entries.remove(&account) {
                let mut interests = entry.observers.len();
                if let Some(pocket) = entry.pocket {
                    interests += 1;
                    if let Some(timer) = pocket.timer {
                        timer.abort();
                    }
                }
                released.push((account, interests));
            }
        }
        released
    }
}
