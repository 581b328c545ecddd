//! Resilience subsystem.
//!
//! Node calls are bounded by timeouts and failover inside the ledger client;
//! what lives here is the reconnect pacing for the long-lived event stream.

pub mod backoff;

pub use backoff::{reconnect_delay, Backoff};
