//! Nano engine daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────┐
//!                  │                   NANO ENGINE                     │
//!                  │                                                   │
//!   node RPC  ◀────┼── rpc (HTTP client, failover) ◀──┐                │
//!                  │                                  │                │
//!                  │                           ┌──────┴──────┐         │
//!                  │                           │   engine    │         │
//!                  │                           │ watch/pocket│         │
//!                  │                           │ confirm/    │         │
//!                  │                           │ listeners   │         │
//!                  │                           └──────▲──────┘         │
//!                  │                                  │                │
//!   node WS   ─────┼──▶ events (socket task, ref-counted registrations)│
//!                  │                                                   │
//!                  │   numbers · crypto · blocks   (pure, no I/O)      │
//!                  │   config · observability · resilience · lifecycle │
//!                  └──────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `nano-engine [config.toml]` (defaults to `nano-engine.toml`; built-in
//! defaults apply when that file is absent). The wallet seed comes from the
//! `NANO_ENGINE_SEED` environment variable.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use nano_engine::config::{load_config, EngineConfig, SEED_ENV_VAR};
use nano_engine::crypto::keys::{deterministic_key, RawKey};
use nano_engine::engine::{AutomateCallback, AutomateResponse, Engine, EngineResult};
use nano_engine::events::{EventConnection, EventStream};
use nano_engine::numbers::{Amount, Uint256};
use nano_engine::observability::{logging, metrics};
use nano_engine::rpc::HttpLedgerClient;
use nano_engine::Shutdown;

const DEFAULT_CONFIG_PATH: &str = "nano-engine.toml";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

fn load(path: &PathBuf) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    if path.exists() {
        Ok(load_config(path)?)
    } else {
        Ok(EngineConfig::default())
    }
}

fn report(result: EngineResult<AutomateResponse>) {
    match result {
        Ok(update) => tracing::info!(
            account = %update.account,
            kind = ?update.kind,
            amount = %update.amount,
            balance = %update.balance,
            hash = %update.hash,
            "Account updated"
        ),
        Err(e) => tracing::warn!(error = %e, "Account update failed"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = load(&path)?;

    logging::init(&config.observability.log_level);
    tracing::info!(config = %path.display(), "nano-engine v0.1.0 starting");

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let representative = Uint256::from_account(&config.engine.default_representative)?;
    let ledger = HttpLedgerClient::new(&config.rpc, representative, config.engine.pending_count)?;
    tracing::info!(
        url = %config.rpc.url,
        failover = config.rpc.failover_urls.len(),
        timeout_secs = config.rpc.timeout_secs,
        "Ledger client ready"
    );

    let shutdown = Shutdown::new();
    let (events, outbound) = EventStream::new();
    let mut tasks = Vec::new();
    if config.websocket.enabled {
        let connection = EventConnection::new(&config.websocket, events.clone());
        tasks.push(tokio::spawn(connection.run(outbound, shutdown.subscribe())));
    } else {
        tracing::warn!("Event stream disabled; relying on polls");
    }

    let engine = Engine::new(Arc::new(ledger), events, config.engine.clone());
    tasks.push(tokio::spawn(engine.clone().run_events(shutdown.subscribe())));

    let callback: AutomateCallback = Arc::new(report);
    if !config.wallet.auto_pocket_indices.is_empty() {
        let seed = std::env::var(SEED_ENV_VAR)
            .map_err(|_| format!("{SEED_ENV_VAR} must be set to auto-pocket accounts"))?;
        let seed = RawKey::from_hex(seed.trim())?;
        let minimum = Amount::from_dec_str(&config.wallet.minimum_receive)?;
        for index in &config.wallet.auto_pocket_indices {
            let account = engine.automatically_pocket_register(
                &deterministic_key(&seed, *index),
                minimum,
                callback.clone(),
            )?;
            tracing::info!(index, account = %account, "Auto-pocketing account");
        }
    }
    for account in &config.wallet.watch {
        engine.watch(account, callback.clone())?;
    }

    shutdown.wait_for_signal().await?;
    engine.shutdown();
    Shutdown::drain(tasks, SHUTDOWN_GRACE).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
