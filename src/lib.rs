//! Nano ledger client engine library

pub mod numbers;
pub mod crypto;
pub mod blocks;
pub mod rpc;
pub mod events;
pub mod engine;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::EngineConfig;
pub use engine::Engine;
pub use lifecycle::Shutdown;
pub use numbers::{Amount, Uint256};
