//! In-memory ledger implementing [`LedgerClient`].
//!
//! Keeps account chains, receivable sends and block confirmation flags so
//! the engine can run offline. `process` checks signatures and chain
//! continuity the way a node would reject forks and forged blocks.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::blocks::StateBlock;
use crate::numbers::uint::{Amount, BlockHash, PublicKey, Uint256};
use crate::rpc::client::LedgerClient;
use crate::rpc::types::{
    AccountFrontier, LedgerError, LedgerResult, PendingBlock, ProcessResponse, WalletBalance,
    ACCOUNT_NOT_FOUND,
};

/// Work value handed out for every request.
pub const EMULATED_WORK: &str = "0000000000000000";

/// Hashes of faucet sends start here.
const FAUCET_HASH_BASE: u64 = 0xFA0C_E700_0000_0000;

#[derive(Default)]
struct State {
    accounts: HashMap<PublicKey, AccountFrontier>,
    receivable: HashMap<PublicKey, Vec<PendingBlock>>,
    confirmed: HashMap<BlockHash, bool>,
    processed: Vec<StateBlock>,
    faucet_sends: u64,
    auto_confirm: bool,
    offline: bool,
}

/// In-memory [`LedgerClient`].
pub struct Emulator {
    state: Mutex<State>,
    default_representative: PublicKey,
    pending_count: usize,
}

impl Emulator {
    /// New empty ledger. Blocks are confirmed as soon as they are processed.
    pub fn new(default_representative: PublicKey) -> Self {
        Self {
            state: Mutex::new(State {
                auto_confirm: true,
                ..State::default()
            }),
            default_representative,
            pending_count: 10,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn online(&self) -> LedgerResult<std::sync::MutexGuard<'_, State>> {
        let state = self.lock();
        if state.offline {
            return Err(LedgerError::rpc("emulated outage"));
        }
        Ok(state)
    }

    /// Create a receivable send of `amount` to `destination` from outside
    /// the emulated ledger. Returns the send's hash.
    pub fn fund(&self, destination: &PublicKey, amount: Amount) -> BlockHash {
        let mut state = self.lock();
        state.faucet_sends += 1;
        let hash = Uint256::from(FAUCET_HASH_BASE + state.faucet_sends);
        state.receivable.entry(*destination).or_default().push(PendingBlock {
            hash,
            amount,
            source: Uint256::ZERO.to_account(),
        });
        state.confirmed.insert(hash, true);
        hash
    }

    /// Whether newly processed blocks start out confirmed.
    pub fn set_auto_confirm(&self, enabled: bool) {
        self.lock().auto_confirm = enabled;
    }

    /// Mark a processed block confirmed.
    pub fn confirm(&self, hash: &BlockHash) {
        self.lock().confirmed.insert(*hash, true);
    }

    /// Make every call fail until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Blocks accepted by `process`, oldest first.
    pub fn processed(&self) -> Vec<StateBlock> {
        self.lock().processed.clone()
    }

    pub fn processed_count(&self) -> usize {
        self.lock().processed.len()
    }

    /// Current head of `account`, if it has any blocks.
    pub fn frontier_of(&self, account: &PublicKey) -> Option<AccountFrontier> {
        self.lock().accounts.get(account).cloned()
    }

    /// Receivable total of `account`.
    pub fn receivable_of(&self, account: &PublicKey) -> Amount {
        self.lock()
            .receivable
            .get(account)
            .map(|blocks| blocks.iter().fold(Amount::ZERO, |sum, b| sum + b.amount))
            .unwrap_or(Amount::ZERO)
    }
}

#[async_trait]
impl LedgerClient for Emulator {
    async fn account_frontier(&self, account: &PublicKey) -> LedgerResult<AccountFrontier> {
        let state = self.online()?;
        Ok(state
            .accounts
            .get(account)
            .cloned()
            .unwrap_or_else(|| AccountFrontier::unopened(*account, self.default_representative)))
    }

    async fn pending(&self, account: &PublicKey, threshold: Amount) -> LedgerResult<Vec<PendingBlock>> {
        let state = self.online()?;
        Ok(state
            .receivable
            .get(account)
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b.amount >= threshold)
                    .take(self.pending_count)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn work_generate(&self, _hash: &BlockHash) -> LedgerResult<String> {
        self.online()?;
        Ok(EMULATED_WORK.to_string())
    }

    async fn process(&self, block: &StateBlock, _work: &str) -> LedgerResult<ProcessResponse> {
        let mut state = self.online()?;

        if !block.verify() {
            return Err(LedgerError::rpc("Bad signature"));
        }

        let fields = *block.hashables();
        let current = state.accounts.get(&fields.account).cloned();
        let (expected_previous, old_balance) = match &current {
            Some(head) => (head.frontier, head.balance),
            None => (Uint256::ZERO, Amount::ZERO),
        };
        if fields.previous != expected_previous {
            return Err(LedgerError::rpc("Fork"));
        }

        if fields.balance < old_balance {
            let amount = old_balance - fields.balance;
            state.receivable.entry(fields.link).or_default().push(PendingBlock {
                hash: block.hash(),
                amount,
                source: fields.account.to_account(),
            });
        } else if fields.balance > old_balance {
            let amount = fields.balance - old_balance;
            let receivable = state.receivable.entry(fields.account).or_default();
            let Some(position) = receivable.iter().position(|b| b.hash == fields.link) else {
                return Err(LedgerError::rpc("Unreceivable"));
            };
            if receivable[position].amount != amount {
                return Err(LedgerError::rpc("Balance mismatch"));
            }
            receivable.remove(position);
        } else if current.is_none() {
            return Err(LedgerError::rpc(ACCOUNT_NOT_FOUND));
        }

        state.accounts.insert(
            fields.account,
            AccountFrontier {
                account: fields.account,
                frontier: block.hash(),
                balance: fields.balance,
                representative: fields.representative,
            },
        );
        let auto_confirm = state.auto_confirm;
        state.confirmed.insert(block.hash(), auto_confirm);
        state.processed.push(block.clone());

        tracing::debug!(hash = %block.hash(), account = %fields.account.to_account(), "Emulator processed block");
        Ok(ProcessResponse { hash: block.hash() })
    }

    async fn block_confirmed(&self, hash: &BlockHash) -> LedgerResult<bool> {
        let state = self.online()?;
        state
            .confirmed
            .get(hash)
            .copied()
            .ok_or_else(|| LedgerError::rpc("Block not found"))
    }

    async fn wallet_balance(&self, account: &PublicKey) -> LedgerResult<WalletBalance> {
        let balance = self.online()?.accounts.get(account).map(|a| a.balance).unwrap_or(Amount::ZERO);
        Ok(WalletBalance {
            balance,
            pending: self.receivable_of(account),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::{deterministic_key, pub_key, RawKey};

    fn keys(index: u32) -> (RawKey, PublicKey) {
        let seed = RawKey::from_bytes([7u8; 32]);
        let private = deterministic_key(&seed, index);
        let public = pub_key(&private);
        (private, public)
    }

    fn sign(private: &RawKey, public: &PublicKey, previous: BlockHash, balance: u128, link: Uint256) -> StateBlock {
        StateBlock::new(*public, previous, *public, Amount::new(balance), link, private, public).unwrap()
    }

    #[tokio::test]
    async fn test_open_then_send() {
        let emulator = Emulator::new(Uint256::ZERO);
        let (alice_key, alice) = keys(0);
        let (_, bob) = keys(1);

        let source = emulator.fund(&alice, Amount::new(100));
        let frontier = emulator.account_frontier(&alice).await.unwrap();
        assert!(frontier.is_unopened());

        let open = sign(&alice_key, &alice, Uint256::ZERO, 100, source);
        emulator.process(&open, EMULATED_WORK).await.unwrap();
        assert_eq!(emulator.account_frontier(&alice).await.unwrap().balance, Amount::new(100));
        assert!(emulator.pending(&alice, Amount::ZERO).await.unwrap().is_empty());

        let send = sign(&alice_key, &alice, open.hash(), 60, bob);
        emulator.process(&send, EMULATED_WORK).await.unwrap();
        let pending = emulator.pending(&bob, Amount::ZERO).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].amount, Amount::new(40));
        assert_eq!(pending[0].hash, send.hash());
        assert!(emulator.block_confirmed(&send.hash()).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_forks_and_bad_receives() {
        let emulator = Emulator::new(Uint256::ZERO);
        let (key, account) = keys(0);
        let source = emulator.fund(&account, Amount::new(10));

        let wrong_previous = sign(&key, &account, Uint256::from(1u64), 10, source);
        assert_eq!(
            emulator.process(&wrong_previous, EMULATED_WORK).await.unwrap_err(),
            LedgerError::rpc("Fork")
        );

        let wrong_amount = sign(&key, &account, Uint256::ZERO, 11, source);
        assert!(emulator.process(&wrong_amount, EMULATED_WORK).await.is_err());

        let unknown_source = sign(&key, &account, Uint256::ZERO, 10, Uint256::from(99u64));
        assert_eq!(
            emulator.process(&unknown_source, EMULATED_WORK).await.unwrap_err(),
            LedgerError::rpc("Unreceivable")
        );
        assert_eq!(emulator.processed_count(), 0);
    }

    #[tokio::test]
    async fn test_threshold_and_confirmation_toggle() {
        let emulator = Emulator::new(Uint256::ZERO);
        let (key, account) = keys(0);
        emulator.fund(&account, Amount::new(5));
        let big = emulator.fund(&account, Amount::new(50));

        let pending = emulator.pending(&account, Amount::new(10)).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].hash, big);

        emulator.set_auto_confirm(false);
        let open = sign(&key, &account, Uint256::ZERO, 50, big);
        emulator.process(&open, EMULATED_WORK).await.unwrap();
        assert!(!emulator.block_confirmed(&open.hash()).await.unwrap());
        emulator.confirm(&open.hash());
        assert!(emulator.block_confirmed(&open.hash()).await.unwrap());

        let balance = emulator.wallet_balance(&account).await.unwrap();
        assert_eq!(balance.balance, Amount::new(50));
        assert_eq!(balance.pending, Amount::new(5));
    }

    #[tokio::test]
    async fn test_offline_fails_every_call() {
        let emulator = Emulator::new(Uint256::ZERO);
        emulator.set_offline(true);
        assert!(emulator.account_frontier(&Uint256::ZERO).await.is_err());
        assert!(emulator.work_generate(&Uint256::ZERO).await.is_err());
        emulator.set_offline(false);
        assert!(emulator.work_generate(&Uint256::ZERO).await.is_ok());
    }
}
