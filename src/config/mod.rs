//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EngineConfig (validated, immutable)
//!     → handed to the ledger client, event stream and engine at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Secrets (the wallet seed) come from the environment, never the file

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    EngineConfig, ObservabilityConfig, ReconcileConfig, RpcConfig, WalletConfig, WebsocketConfig,
    DEFAULT_REPRESENTATIVE, SEED_ENV_VAR,
};
pub use validation::{validate_config, ValidationError};
