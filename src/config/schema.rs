//! Configuration schema definitions.
//!
//! Every section derives Serde traits and falls back to its `Default`, so an
//! empty file is a valid configuration pointing at a local node.

use serde::{Deserialize, Serialize};

/// Representative assigned to accounts that have not opened yet.
pub const DEFAULT_REPRESENTATIVE: &str =
    "nano_1thingspmippfngcrtk1ofd3uwftffnu4qu9xkauo9zkiuep6iknzci3jxa6";

/// Environment variable holding the wallet seed (64 hex characters).
pub const SEED_ENV_VAR: &str = "NANO_ENGINE_SEED";

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Node JSON-RPC endpoint(s).
    pub rpc: RpcConfig,

    /// Node websocket endpoint for confirmation events.
    pub websocket: WebsocketConfig,

    /// Reconciliation timing and defaults.
    pub engine: ReconcileConfig,

    /// Accounts the daemon pockets or watches.
    pub wallet: WalletConfig,

    pub observability: ObservabilityConfig,
}

/// Node JSON-RPC settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Primary endpoint.
    pub url: String,

    /// Tried in order when the primary fails.
    pub failover_urls: Vec<String>,

    /// Upper bound on every call, per endpoint.
    pub timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:7076".to_string(),
            failover_urls: Vec::new(),
            timeout_secs: 10,
        }
    }
}

/// Node websocket settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebsocketConfig {
    pub enabled: bool,
    pub url: String,
    /// First reconnect delay.
    pub reconnect_base_ms: u64,
    /// Reconnect delay ceiling.
    pub reconnect_max_ms: u64,
}

impl Default for WebsocketConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "ws://127.0.0.1:7078".to_string(),
            reconnect_base_ms: 500,
            reconnect_max_ms: 30_000,
        }
    }
}

/// Reconciliation engine settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub default_representative: String,

    /// `count` sent with every `pending` request.
    pub pending_count: usize,

    /// Auto-pocket safety-net poll.
    pub pocket_interval_ms: u64,

    /// Poll for blocks awaiting confirmation.
    pub confirmation_poll_ms: u64,

    /// Poll for payment and payout listeners.
    pub listener_poll_ms: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            default_representative: DEFAULT_REPRESENTATIVE.to_string(),
            pending_count: 10,
            pocket_interval_ms: 5_000,
            confirmation_poll_ms: 5_000,
            listener_poll_ms: 5_000,
        }
    }
}

/// Accounts handled by the daemon. The seed itself is read from
/// [`SEED_ENV_VAR`], never from this file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Seed indices whose accounts are auto-pocketed.
    pub auto_pocket_indices: Vec<u32>,

    /// Smallest pending amount (raw) worth pocketing.
    pub minimum_receive: String,

    /// Accounts observed without a key.
    pub watch: Vec<String>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            auto_pocket_indices: Vec::new(),
            minimum_receive: "0".to_string(),
            watch: Vec::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub metrics_enabled: bool,

    /// Prometheus scrape address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9100".to_string(),
        }
    }
}
