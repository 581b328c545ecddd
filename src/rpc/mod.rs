//! Ledger node request/response subsystem.
//!
//! # Data Flow
//! ```text
//! engine workflow step
//!     → client.rs (LedgerClient trait; HTTP with timeout + failover)
//!     → types.rs (Request payloads, wire shapes → typed responses)
//!     ← LedgerResult<T>
//!
//! emulator.rs implements the same trait in memory.
//! ```
//!
//! # Design Decisions
//! - Callers see one error shape; transport and node errors are not
//!   distinguished
//! - An unopened account is a valid frontier, not an error
//! - Stateless per call; nothing is cached between requests

pub mod client;
pub mod emulator;
pub mod types;

pub use client::{HttpLedgerClient, LedgerClient};
pub use emulator::Emulator;
pub use types::{
    AccountFrontier, FaucetResponse, LedgerError, LedgerResult, PendingBlock, ProcessResponse,
    WalletBalance,
};
