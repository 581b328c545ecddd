//! Ledger blocks.
//!
//! Only state blocks are built; every send, receive, open and
//! representative change is a state block whose `link` field says which.

pub mod state_block;

pub use state_block::{JsonBlock, StateBlock, StateHashables};
