//! Engine-facing results, callbacks and errors.

use std::sync::Arc;

use thiserror::Error;

use crate::crypto::keys::KeyError;
use crate::numbers::account::AccountError;
use crate::numbers::uint::{Amount, BlockHash};
use crate::rpc::types::{LedgerError, PendingBlock, ProcessResponse};

/// Errors surfaced by engine workflows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("account {0} is already being pocketed")]
    AlreadyWatched(String),

    #[error("already waiting for confirmation of {0}")]
    AlreadyListening(String),

    #[error("account {0} is not registered")]
    NotWatched(String),

    #[error("balance {balance} is below requested amount {amount}")]
    InsufficientBalance { balance: Amount, amount: Amount },

    #[error("receiving {amount} would overflow balance {balance}")]
    BalanceOverflow { balance: Amount, amount: Amount },

    #[error("invalid account: {0}")]
    InvalidAccount(#[from] AccountError),

    #[error("key error: {0}")]
    Key(#[from] KeyError),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// How an observed account was involved in a confirmed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Someone sent to the account.
    SendTo,
    /// The account sent funds.
    SendFrom,
    /// The account received (or opened with) funds.
    Receive,
}

/// Delivered to watch and auto-pocket callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomateResponse {
    pub kind: NotificationKind,
    pub account: String,
    /// Amount moved by the block.
    pub amount: Amount,
    /// Account balance after the block.
    pub balance: Amount,
    /// The block that triggered this notification.
    pub hash: BlockHash,
    /// Account head at the time of the notification.
    pub frontier: BlockHash,
    pub representative: String,
}

/// Fired for every notification on a watched or pocketed account.
pub type AutomateCallback = Arc<dyn Fn(EngineResult<AutomateResponse>) + Send + Sync>;

/// Fired once a sent block is confirmed, or with the error that stopped it.
pub type ConfirmationCallback = Box<dyn FnOnce(EngineResult<ProcessResponse>) + Send + Sync>;

/// Fired with the first receivable block that meets the payment target.
pub type PaymentCallback = Box<dyn FnOnce(PendingBlock) + Send>;

/// Fired with `true` when the payout window expired, `false` when the
/// balance was drained first.
pub type PayoutCallback = Box<dyn FnOnce(bool) + Send>;

/// Handle for one [`crate::engine::Engine::watch`] registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchId {
    pub account: String,
    pub(crate) id: u64,
}
