//! Request payloads, typed responses and the ledger error type.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::blocks::JsonBlock;
use crate::numbers::uint::{Amount, BlockHash, PublicKey, Uint256};

/// Node error text for an account with no blocks yet.
pub const ACCOUNT_NOT_FOUND: &str = "Account not found";

/// Any failed ledger call.
///
/// Transport failures, timeouts, non-success statuses, malformed payloads and
/// explicit node errors all collapse into this one shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("RPC error: {0}")]
    Rpc(String),
}

impl LedgerError {
    pub fn rpc(message: impl Into<String>) -> Self {
        Self::Rpc(message.into())
    }
}

/// Result type for ledger calls.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Every JSON request the node understands, tagged by `action`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Request {
    AccountBalance {
        account: String,
        include_only_confirmed: bool,
    },
    AccountInfo {
        account: String,
        representative: String,
        pending: String,
        include_confirmed: bool,
    },
    Pending {
        account: String,
        count: String,
        threshold: String,
        source: String,
        sort: String,
        include_only_confirmed: String,
    },
    WorkGenerate {
        hash: String,
    },
    Process {
        json_block: String,
        block: JsonBlock,
    },
    BlockInfo {
        json_block: bool,
        hash: String,
    },
    RequestNano {
        account: String,
    },
}

impl Request {
    pub fn account_balance(account: &str) -> Self {
        Self::AccountBalance {
            account: account.to_string(),
            include_only_confirmed: true,
        }
    }

    pub fn account_info(account: &str) -> Self {
        Self::AccountInfo {
            account: account.to_string(),
            representative: "true".to_string(),
            pending: "true".to_string(),
            include_confirmed: true,
        }
    }

    pub fn pending(account: &str, count: usize, threshold: Amount) -> Self {
        Self::Pending {
            account: account.to_string(),
            count: count.to_string(),
            threshold: threshold.to_dec_string(),
            source: "true".to_string(),
            sort: "true".to_string(),
            include_only_confirmed: "true".to_string(),
        }
    }

    pub fn work_generate(hash: &BlockHash) -> Self {
        Self::WorkGenerate { hash: hash.to_hex() }
    }

    pub fn process(block: JsonBlock) -> Self {
        Self::Process {
            json_block: "true".to_string(),
            block,
        }
    }

    pub fn block_info(hash: &BlockHash) -> Self {
        Self::BlockInfo {
            json_block: true,
            hash: hash.to_hex(),
        }
    }

    pub fn request_nano(account: &str) -> Self {
        Self::RequestNano {
            account: account.to_string(),
        }
    }

    /// The `action` discriminant, used for logs and metrics labels.
    pub fn action(&self) -> &'static str {
        match self {
            Self::AccountBalance { .. } => "account_balance",
            Self::AccountInfo { .. } => "account_info",
            Self::Pending { .. } => "pending",
            Self::WorkGenerate { .. } => "work_generate",
            Self::Process { .. } => "process",
            Self::BlockInfo { .. } => "block_info",
            Self::RequestNano { .. } => "request_nano",
        }
    }
}

/// Head of an account chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountFrontier {
    pub account: PublicKey,
    /// Latest block hash, or the account's own key when it has no blocks.
    pub frontier: BlockHash,
    pub balance: Amount,
    pub representative: PublicKey,
}

impl AccountFrontier {
    /// What an unopened account looks like: zero balance, the fallback
    /// representative, and the account key standing in for the frontier.
    pub fn unopened(account: PublicKey, representative: PublicKey) -> Self {
        Self {
            account,
            frontier: account,
            balance: Amount::ZERO,
            representative,
        }
    }

    /// True when the account has no blocks yet.
    pub fn is_unopened(&self) -> bool {
        self.frontier == self.account
    }

    /// The `previous` field for the next block on this chain.
    pub fn previous(&self) -> BlockHash {
        if self.is_unopened() {
            Uint256::ZERO
        } else {
            self.frontier
        }
    }
}

/// A receivable send waiting for its destination to pocket it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBlock {
    pub hash: BlockHash,
    pub amount: Amount,
    pub source: String,
}

/// Confirmed and receivable totals of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletBalance {
    pub balance: Amount,
    pub pending: Amount,
}

/// Result of submitting a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResponse {
    pub hash: BlockHash,
}

/// Result of a development faucet request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaucetResponse {
    pub amount: Amount,
    pub send_hash: BlockHash,
    pub frontier: BlockHash,
}

// Wire shapes. Everything numeric arrives as a string.

#[derive(Debug, Deserialize)]
pub(crate) struct AccountInfoWire {
    pub frontier: String,
    pub balance: String,
    pub representative: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BalanceWire {
    pub balance: String,
    pub pending: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PendingEntryWire {
    pub amount: String,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PendingWire {
    /// An object keyed by hash; the node sends `""` when nothing is pending.
    #[serde(default)]
    pub blocks: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkWire {
    pub work: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HashWire {
    pub hash: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BlockInfoWire {
    #[serde(deserialize_with = "bool_or_string")]
    pub confirmed: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FaucetWire {
    pub amount: String,
    pub send_hash: String,
    pub frontier: String,
}

/// Nodes render booleans either as JSON booleans or as `"true"`/`"false"`.
fn bool_or_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(flag) => Ok(flag),
        Value::String(text) => Ok(text == "true"),
        other => Err(serde::de::Error::custom(format!("expected boolean, got {}", other))),
    }
}

pub(crate) fn parse_amount(field: &str, text: &str) -> LedgerResult<Amount> {
    Amount::from_dec_str(text).map_err(|e| LedgerError::rpc(format!("invalid {} '{}': {}", field, text, e)))
}

pub(crate) fn parse_hash(field: &str, text: &str) -> LedgerResult<BlockHash> {
    Uint256::from_hex(text).map_err(|e| LedgerError::rpc(format!("invalid {} '{}': {}", field, text, e)))
}

pub(crate) fn parse_account(field: &str, text: &str) -> LedgerResult<PublicKey> {
    Uint256::from_account(text).map_err(|e| LedgerError::rpc(format!("invalid {} '{}': {}", field, text, e)))
}

impl AccountInfoWire {
    pub(crate) fn into_frontier(self, account: PublicKey) -> LedgerResult<AccountFrontier> {
        Ok(AccountFrontier {
            account,
            frontier: parse_hash("frontier", &self.frontier)?,
            balance: parse_amount("balance", &self.balance)?,
            representative: parse_account("representative", &self.representative)?,
        })
    }
}

impl PendingWire {
    /// Entries in the order the node listed them.
    pub(crate) fn into_blocks(self) -> LedgerResult<Vec<PendingBlock>> {
        let entries = match self.blocks {
            Value::Object(entries) => entries,
            Value::Null => return Ok(Vec::new()),
            Value::String(text) if text.is_empty() => return Ok(Vec::new()),
            other => return Err(LedgerError::rpc(format!("unexpected pending blocks: {}", other))),
        };

        entries
            .into_iter()
            .map(|(hash, entry)| {
                let entry: PendingEntryWire = serde_json::from_value(entry)
                    .map_err(|e| LedgerError::rpc(format!("malformed pending entry {}: {}", hash, e)))?;
                Ok(PendingBlock {
                    hash: parse_hash("pending hash", &hash)?,
                    amount: parse_amount("pending amount", &entry.amount)?,
                    source: entry.source,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ACCOUNT: &str = "nano_18s4jwxeztcijasjm3unf34xnba6bo6f764amn1op8jsgb7aquz9ke8njujm";

    #[test]
    fn test_request_payloads() {
        let value = serde_json::to_value(Request::account_info(ACCOUNT)).unwrap();
        assert_eq!(
            value,
            json!({
                "action": "account_info",
                "account": ACCOUNT,
                "representative": "true",
                "pending": "true",
                "include_confirmed": true
            })
        );

        let value = serde_json::to_value(Request::pending(ACCOUNT, 10, Amount::ZERO)).unwrap();
        assert_eq!(value["action"], "pending");
        assert_eq!(value["count"], "10");
        assert_eq!(value["threshold"], "0");
        assert_eq!(value["include_only_confirmed"], "true");

        let value = serde_json::to_value(Request::block_info(&Uint256::from(1u64))).unwrap();
        assert_eq!(value["json_block"], true);
        assert_eq!(value["hash"].as_str().unwrap().len(), 64);

        assert_eq!(Request::request_nano(ACCOUNT).action(), "request_nano");
    }

    #[test]
    fn test_unopened_frontier() {
        let account = Uint256::from_account(ACCOUNT).unwrap();
        let frontier = AccountFrontier::unopened(account, Uint256::from(7u64));
        assert!(frontier.is_unopened());
        assert_eq!(frontier.previous(), Uint256::ZERO);
        assert_eq!(frontier.balance, Amount::ZERO);

        let opened = AccountFrontier {
            frontier: Uint256::from(9u64),
            ..frontier
        };
        assert_eq!(opened.previous(), Uint256::from(9u64));
    }

    #[test]
    fn test_pending_keeps_node_order() {
        let wire: PendingWire = serde_json::from_value(json!({
            "blocks": {
                "00000000000000000000000000000000000000000000000000000000000000B2": {"amount": "5", "source": ACCOUNT},
                "00000000000000000000000000000000000000000000000000000000000000A1": {"amount": "7", "source": ACCOUNT}
            }
        }))
        .unwrap();
        let blocks = wire.into_blocks().unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].amount, Amount::new(5));
        assert_eq!(blocks[1].hash, Uint256::from(0xA1u64));
    }

    #[test]
    fn test_empty_pending_forms() {
        for payload in [json!({"blocks": ""}), json!({"blocks": {}}), json!({})] {
            let wire: PendingWire = serde_json::from_value(payload).unwrap();
            assert!(wire.into_blocks().unwrap().is_empty());
        }
    }

    #[test]
    fn test_confirmed_accepts_both_encodings() {
        let wire: BlockInfoWire = serde_json::from_value(json!({"confirmed": "true"})).unwrap();
        assert!(wire.confirmed);
        let wire: BlockInfoWire = serde_json::from_value(json!({"confirmed": false})).unwrap();
        assert!(!wire.confirmed);
    }

    #[test]
    fn test_bad_amount_is_rpc_error() {
        let err = parse_amount("balance", "12x").unwrap_err();
        assert!(err.to_string().contains("invalid balance"));
    }
}
