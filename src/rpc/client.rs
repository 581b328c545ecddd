//! Ledger node client with timeout and failover.
//!
//! # Responsibilities
//! - Build the node's JSON requests and parse its replies into typed values
//! - Try the primary endpoint, then each failover, bounding every attempt
//! - Collapse transport, status, payload and node errors into [`LedgerError`]

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::timeout;

use crate::blocks::StateBlock;
use crate::config::schema::RpcConfig;
use crate::numbers::uint::{Amount, BlockHash, PublicKey};
use crate::observability::metrics;
use crate::rpc::types::{
    parse_amount, parse_hash, AccountFrontier, AccountInfoWire, BalanceWire, BlockInfoWire,
    FaucetResponse, FaucetWire, HashWire, LedgerError, LedgerResult, PendingBlock, PendingWire,
    ProcessResponse, Request, WalletBalance, WorkWire, ACCOUNT_NOT_FOUND,
};

/// Request/response operations against a ledger node.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Head block, balance and representative. Unopened accounts are not an
    /// error: see [`AccountFrontier::unopened`].
    async fn account_frontier(&self, account: &PublicKey) -> LedgerResult<AccountFrontier>;

    /// Receivable blocks of at least `threshold`, in the node's order.
    async fn pending(&self, account: &PublicKey, threshold: Amount) -> LedgerResult<Vec<PendingBlock>>;

    /// Proof of work for the block that will follow `hash`.
    async fn work_generate(&self, hash: &BlockHash) -> LedgerResult<String>;

    /// Publish a signed block.
    async fn process(&self, block: &StateBlock, work: &str) -> LedgerResult<ProcessResponse>;

    /// Whether the network has confirmed `hash`.
    async fn block_confirmed(&self, hash: &BlockHash) -> LedgerResult<bool>;

    async fn wallet_balance(&self, account: &PublicKey) -> LedgerResult<WalletBalance>;
}

/// What a node said, before typing.
enum Reply {
    Body(Value),
    NodeError(String),
}

/// [`LedgerClient`] over HTTP JSON-RPC.
#[derive(Clone)]
pub struct HttpLedgerClient {
    http: reqwest::Client,
    /// Primary first, then failovers.
    endpoints: Arc<Vec<url::Url>>,
    timeout_duration: Duration,
    pending_count: usize,
    default_representative: PublicKey,
}

impl HttpLedgerClient {
    /// Create a client. An unparsable primary URL is an error; unparsable
    /// failover URLs are skipped with a warning.
    pub fn new(config: &RpcConfig, default_representative: PublicKey, pending_count: usize) -> LedgerResult<Self> {
        let primary: url::Url = config
            .url
            .parse()
            .map_err(|e| LedgerError::rpc(format!("Invalid RPC URL '{}': {}", config.url, e)))?;

        let mut endpoints = vec![primary];
        for url_str in &config.failover_urls {
            match url_str.parse() {
                Ok(url) => endpoints.push(url),
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        tracing::info!(
            rpc_url = %config.url,
            failovers = endpoints.len() - 1,
            timeout_secs = config.timeout_secs,
            "Ledger client initialized"
        );

        Ok(Self {
            http: reqwest::Client::new(),
            endpoints: Arc::new(endpoints),
            timeout_duration: Duration::from_secs(config.timeout_secs),
            pending_count,
            default_representative,
        })
    }

    /// Send `request` to the first endpoint that answers with JSON.
    ///
    /// An explicit node `error` field is a definitive answer and does not
    /// fail over.
    async fn send(&self, request: &Request) -> LedgerResult<Reply> {
        let action = request.action();
        let start = Instant::now();

        for (i, endpoint) in self.endpoints.iter().enumerate() {
            let attempt = async {
                let response = self
                    .http
                    .post(endpoint.clone())
                    .json(request)
                    .send()
                    .await
                    .map_err(|e| format!("transport: {}", e))?;
                let status = response.status();
                if !status.is_success() {
                    return Err(format!("status {}", status));
                }
                response
                    .json::<Value>()
                    .await
                    .map_err(|e| format!("malformed body: {}", e))
            };

            match timeout(self.timeout_duration, attempt).await {
                Ok(Ok(body)) => {
                    if let Some(error) = body.get("error") {
                        let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
                        tracing::debug!(action, error = %message, "Node returned error");
                        metrics::record_rpc_request(action, "node_error", start);
                        return Ok(Reply::NodeError(message));
                    }
                    metrics::record_rpc_request(action, "ok", start);
                    return Ok(Reply::Body(body));
                }
                Ok(Err(e)) => tracing::warn!(endpoint_idx = i, action, error = %e, "RPC error, trying next endpoint"),
                Err(_) => tracing::warn!(endpoint_idx = i, action, "RPC timeout, trying next endpoint"),
            }
        }

        metrics::record_rpc_request(action, "failed", start);
        Err(LedgerError::rpc(format!("All RPC endpoints failed for {}", action)))
    }

    /// Send and deserialize, treating node errors as failures.
    async fn call<T: DeserializeOwned>(&self, request: &Request) -> LedgerResult<T> {
        match self.send(request).await? {
            Reply::Body(body) => serde_json::from_value(body)
                .map_err(|e| LedgerError::rpc(format!("Malformed {} response: {}", request.action(), e))),
            Reply::NodeError(message) => Err(LedgerError::Rpc(message)),
        }
    }

    /// Ask a development node's faucet to send funds to `account`.
    pub async fn request_nano(&self, account: &PublicKey) -> LedgerResult<FaucetResponse> {
        let wire: FaucetWire = self.call(&Request::request_nano(&account.to_account())).await?;
        Ok(FaucetResponse {
            amount: parse_amount("amount", &wire.amount)?,
            send_hash: parse_hash("send_hash", &wire.send_hash)?,
            frontier: parse_hash("frontier", &wire.frontier)?,
        })
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn account_frontier(&self, account: &PublicKey) -> LedgerResult<AccountFrontier> {
        match self.send(&Request::account_info(&account.to_account())).await? {
            Reply::Body(body) => {
                let wire: AccountInfoWire = serde_json::from_value(body)
                    .map_err(|e| LedgerError::rpc(format!("Malformed account_info response: {}", e)))?;
                wire.into_frontier(*account)
            }
            Reply::NodeError(message) if message == ACCOUNT_NOT_FOUND => {
                tracing::debug!(account = %account.to_account(), "Account not opened yet");
                Ok(AccountFrontier::unopened(*account, self.default_representative))
            }
            Reply::NodeError(message) => Err(LedgerError::Rpc(message)),
        }
    }

    async fn pending(&self, account: &PublicKey, threshold: Amount) -> LedgerResult<Vec<PendingBlock>> {
        let wire: PendingWire = self
            .call(&Request::pending(&account.to_account(), self.pending_count, threshold))
            .await?;
        wire.into_blocks()
    }

    async fn work_generate(&self, hash: &BlockHash) -> LedgerResult<String> {
        let wire: WorkWire = self.call(&Request::work_generate(hash)).await?;
        Ok(wire.work)
    }

    async fn process(&self, block: &StateBlock, work: &str) -> LedgerResult<ProcessResponse> {
        let wire: HashWire = self.call(&Request::process(block.to_json(work))).await?;
        Ok(ProcessResponse {
            hash: parse_hash("hash", &wire.hash)?,
        })
    }

    async fn block_confirmed(&self, hash: &BlockHash) -> LedgerResult<bool> {
        let wire: BlockInfoWire = self.call(&Request::block_info(hash)).await?;
        Ok(wire.confirmed)
    }

    async fn wallet_balance(&self, account: &PublicKey) -> LedgerResult<WalletBalance> {
        let wire: BalanceWire = self.call(&Request::account_balance(&account.to_account())).await?;
        Ok(WalletBalance {
            balance: parse_amount("balance", &wire.balance)?,
            pending: parse_amount("pending", &wire.pending)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_primary_url_rejected() {
        let config = RpcConfig {
            url: "not a url".to_string(),
            ..RpcConfig::default()
        };
        assert!(HttpLedgerClient::new(&config, PublicKey::ZERO, 10).is_err());
    }

    #[test]
    fn test_invalid_failover_skipped() {
        let config = RpcConfig {
            failover_urls: vec!["::bad::".to_string(), "http://backup:7076".to_string()],
            ..RpcConfig::default()
        };
        let client = HttpLedgerClient::new(&config, PublicKey::ZERO, 10).unwrap();
        assert_eq!(client.endpoints.len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_node_is_rpc_error() {
        let config = RpcConfig {
            url: "http://127.0.0.1:1".to_string(),
            failover_urls: Vec::new(),
            timeout_secs: 2,
        };
        let client = HttpLedgerClient::new(&config, PublicKey::ZERO, 10).unwrap();
        let err = client.block_confirmed(&BlockHash::ZERO).await.unwrap_err();
        assert!(err.to_string().contains("All RPC endpoints failed"));
    }
}
