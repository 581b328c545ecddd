//! Reference-counted account registration and event fan-out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};

use crate::events::types::{ConfirmationEvent, OutboundMessage};
use crate::observability::metrics;

/// Buffered confirmations per subscriber before the slowest one lags.
const EVENT_CAPACITY: usize = 1024;

/// Receiving half of the outbound frame queue, owned by the connection task.
pub type OutboundReceiver = mpsc::UnboundedReceiver<OutboundMessage>;

/// Shared handle to the node's push-event channel.
///
/// Several watchers may register the same account; the node hears one
/// `register_account` when the first arrives and one `unregister_account`
/// when the last leaves. Frames are only queued while connected; on every
/// (re)connect the connection task replays [`EventStream::registered_accounts`].
pub struct EventStream {
    registrations: DashMap<String, usize>,
    outbound: mpsc::UnboundedSender<OutboundMessage>,
    events: broadcast::Sender<ConfirmationEvent>,
    connected: AtomicBool,
    listen_all: AtomicBool,
}

impl EventStream {
    pub fn new() -> (Arc<Self>, OutboundReceiver) {
        let (outbound, receiver) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let stream = Self {
            registrations: DashMap::new(),
            outbound,
            events,
            connected: AtomicBool::new(false),
            listen_all: AtomicBool::new(false),
        };
        (Arc::new(stream), receiver)
    }

    fn send(&self, message: OutboundMessage) {
        if self.is_connected() {
            // The receiver only disappears at shutdown.
            let _ = self.outbound.send(message);
        }
    }

    /// Receive every confirmation published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ConfirmationEvent> {
        self.events.subscribe()
    }

    /// Fan a confirmation out to subscribers.
    pub fn publish(&self, event: ConfirmationEvent) {
        let _ = self.events.send(event);
    }

    /// Add one interest in `account`. Returns true when this was the first.
    pub fn register_account(&self, account: &str) -> bool {
        let first = {
            // The frame is queued while the entry is held so that frames for
            // one account leave in the order their counts changed.
            let mut count = self.registrations.entry(account.to_string()).or_insert(0);
            *count += 1;
            let first = *count == 1;
            if first {
                tracing::debug!(account = %account, "Registering account with event stream");
                self.send(OutboundMessage::Register(account.to_string()));
            }
            first
        };
        metrics::record_watched_accounts(self.registrations.len());
        first
    }

    /// Drop one interest in `account`. Returns true when it was the last.
    /// Unknown accounts are ignored.
    pub fn unregister_account(&self, account: &str) -> bool {
        let last = match self.registrations.entry(account.to_string()) {
            Entry::Occupied(mut entry) if *entry.get() > 1 => {
                *entry.get_mut() -= 1;
                false
            }
            Entry::Occupied(entry) => {
                entry.remove();
                tracing::debug!(account = %account, "Unregistering account from event stream");
                self.send(OutboundMessage::Unregister(account.to_string()));
                true
            }
            Entry::Vacant(_) => return false,
        };
        metrics::record_watched_accounts(self.registrations.len());
        last
    }

    /// Ask the node for every confirmation, not just registered accounts.
    pub fn listen_all(&self) {
        self.listen_all.store(true, Ordering::SeqCst);
        self.send(OutboundMessage::ListenAll);
    }

    pub fn listens_to_all(&self) -> bool {
        self.listen_all.load(Ordering::SeqCst)
    }

    /// Accounts with at least one interest.
    pub fn registered_accounts(&self) -> Vec<String> {
        let mut accounts: Vec<_> = self
            .registrations
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        accounts.sort();
        accounts
    }

    pub fn registration_count(&self, account: &str) -> usize {
        self.registrations.get(account).map(|count| *count).unwrap_or(0)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Called by the connection task.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Frames to send right after a (re)connect.
    pub fn replay_messages(&self) -> Vec<OutboundMessage> {
        let mut messages: Vec<_> = self
            .registered_accounts()
            .into_iter()
            .map(OutboundMessage::Register)
            .collect();
        if self.listens_to_all() {
            messages.push(OutboundMessage::ListenAll);
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::{EventBlock, Subtype};
    use crate::numbers::uint::{Amount, Uint256};

    #[test]
    fn test_register_is_reference_counted() {
        let (stream, mut outbound) = EventStream::new();
        stream.set_connected(true);

        assert!(stream.register_account("nano_a"));
        assert!(!stream.register_account("nano_a"));
        assert_eq!(stream.registration_count("nano_a"), 2);

        assert!(!stream.unregister_account("nano_a"));
        assert!(stream.unregister_account("nano_a"));
        assert!(!stream.unregister_account("nano_a"));

        assert_eq!(outbound.try_recv().unwrap(), OutboundMessage::Register("nano_a".to_string()));
        assert_eq!(outbound.try_recv().unwrap(), OutboundMessage::Unregister("nano_a".to_string()));
        assert!(outbound.try_recv().is_err());
    }

    #[test]
    fn test_concurrent_interest_keeps_frames_paired() {
        let (stream, mut outbound) = EventStream::new();
        stream.set_connected(true);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        stream.register_account("nano_a");
                        stream.unregister_account("nano_a");
                    }
                });
            }
        });

        assert_eq!(stream.registration_count("nano_a"), 0);
        let mut expect_register = true;
        while let Ok(message) = outbound.try_recv() {
            let expected = if expect_register {
                OutboundMessage::Register("nano_a".to_string())
            } else {
                OutboundMessage::Unregister("nano_a".to_string())
            };
            assert_eq!(message, expected);
            expect_register = !expect_register;
        }
        assert!(expect_register);
    }

    #[test]
    fn test_nothing_queued_while_disconnected() {
        let (stream, mut outbound) = EventStream::new();
        stream.register_account("nano_b");
        stream.register_account("nano_a");
        stream.listen_all();
        assert!(outbound.try_recv().is_err());

        assert_eq!(
            stream.replay_messages(),
            vec![
                OutboundMessage::Register("nano_a".to_string()),
                OutboundMessage::Register("nano_b".to_string()),
                OutboundMessage::ListenAll,
            ]
        );
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let (stream, _outbound) = EventStream::new();
        let mut first = stream.subscribe();
        let mut second = stream.subscribe();

        let event = ConfirmationEvent {
            account: "nano_a".to_string(),
            amount: Amount::new(1),
            hash: Uint256::from(1u64),
            block: EventBlock {
                account: "nano_a".to_string(),
                balance: Amount::ZERO,
                link: Uint256::ZERO,
                link_as_account: Uint256::ZERO.to_account(),
                previous: Uint256::ZERO,
                representative: "nano_a".to_string(),
                work: String::new(),
                subtype: Subtype::Send,
            },
        };
        stream.publish(event.clone());

        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
    }
}
