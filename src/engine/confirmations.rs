//! Blocks awaiting network confirmation.
//!
//! Two triggers race to resolve an entry: the event stream and the poll
//! timer. Resolution removes the entry first, so whichever trigger wins the
//! removal fires the callback and the other finds nothing.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::engine::types::{ConfirmationCallback, EngineError, EngineResult};
use crate::numbers::uint::BlockHash;
use crate::observability::metrics;
use crate::rpc::types::ProcessResponse;

struct PendingConfirmation {
    response: ProcessResponse,
    callback: ConfirmationCallback,
    poll: Option<JoinHandle<()>>,
}

/// Sent blocks whose callers are waiting for confirmation.
#[derive(Clone, Default)]
pub struct ConfirmationRegistry {
    entries: Arc<DashMap<BlockHash, PendingConfirmation>>,
}

impl ConfirmationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start waiting on `response.hash`. A hash can only be waited on once.
    pub(crate) fn insert(
        &self,
        response: ProcessResponse,
        callback: ConfirmationCallback,
    ) -> EngineResult<()> {
        match self.entries.entry(response.hash) {
            Entry::Occupied(_) => Err(EngineError::AlreadyListening(response.hash.to_hex())),
            Entry::Vacant(vacant) => {
                vacant.insert(PendingConfirmation {
                    response,
                    callback,
                    poll: None,
                });
                Ok(())
            }
        }
    }

    /// Attach the poll task. Aborts it if the entry was already resolved.
    pub(crate) fn set_poll(&self, hash: &BlockHash, poll: JoinHandle<()>) {
        match self.entries.get_mut(hash) {
            Some(mut entry) => entry.poll = Some(poll),
            None => poll.abort(),
        }
    }

    /// Fire and forget the entry for `hash`. Returns false when there was
    /// nothing to resolve.
    pub fn resolve(&self, hash: &BlockHash, trigger: &'static str) -> bool {
        let Some((_, entry)) = self.entries.remove(hash) else {
            return false;
        };
        tracing::info!(hash = %hash, trigger, "Block confirmed");
        metrics::record_confirmation(trigger);
        (entry.callback)(Ok(entry.response));
        if let Some(poll) = entry.poll {
            poll.abort();
        }
        true
    }

    /// Stop waiting without firing.
    pub fn cancel(&self, hash: &BlockHash) -> bool {
        match self.entries.remove(hash) {
            Some((_, entry)) => {
                if let Some(poll) = entry.poll {
                    poll.abort();
                }
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.entries.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cancel everything still waiting.
    pub(crate) fn clear(&self) {
        let hashes: Vec<BlockHash> = self.entries.iter().map(|e| *e.key()).collect();
        for hash in hashes {
            self.cancel(&hash);
        }
    }
}
