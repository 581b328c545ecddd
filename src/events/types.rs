//! Push-event message shapes.

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::numbers::uint::{Amount, BlockHash, Uint256};

/// Errors from malformed event stream messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("malformed event: {0}")]
    Malformed(String),

    #[error("unknown block subtype '{0}'")]
    UnknownSubtype(String),
}

pub type EventResult<T> = Result<T, EventError>;

/// What a confirmed state block did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subtype {
    Send,
    Receive,
    Open,
    Change,
    Epoch,
}

impl Subtype {
    pub fn parse(text: &str) -> EventResult<Self> {
        match text {
            "send" => Ok(Self::Send),
            "receive" => Ok(Self::Receive),
            "open" => Ok(Self::Open),
            "change" => Ok(Self::Change),
            "epoch" => Ok(Self::Epoch),
            other => Err(EventError::UnknownSubtype(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Receive => "receive",
            Self::Open => "open",
            Self::Change => "change",
            Self::Epoch => "epoch",
        }
    }
}

/// The block carried by a confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBlock {
    pub account: String,
    pub balance: Amount,
    pub link: Uint256,
    /// For a send, the destination account.
    pub link_as_account: String,
    pub previous: BlockHash,
    pub representative: String,
    pub work: String,
    pub subtype: Subtype,
}

/// A network confirmation of one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationEvent {
    /// Owner of the confirmed block.
    pub account: String,
    pub amount: Amount,
    pub hash: BlockHash,
    pub block: EventBlock,
}

impl ConfirmationEvent {
    /// Parse one incoming text frame.
    ///
    /// Returns `Ok(None)` for other topics and for legacy confirmations that
    /// carry no subtype (a node that is still syncing sends those).
    pub fn parse(text: &str) -> EventResult<Option<Self>> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(|e| EventError::Malformed(e.to_string()))?;
        if envelope.topic.as_deref() != Some("confirmation") {
            return Ok(None);
        }
        let body = envelope
            .message
            .ok_or_else(|| EventError::Malformed("confirmation without message".to_string()))?;
        let message: MessageWire =
            serde_json::from_value(body).map_err(|e| EventError::Malformed(e.to_string()))?;

        let subtype = match message.block.subtype.as_deref() {
            None | Some("") => {
                tracing::warn!(
                    hash = %message.hash,
                    "Legacy confirmation without subtype ignored; node is likely not synced"
                );
                return Ok(None);
            }
            Some(text) => Subtype::parse(text)?,
        };

        let link = parse_hex(&message.block.link, "block.link")?;
        let link_as_account = message
            .block
            .link_as_account
            .unwrap_or_else(|| link.to_account());

        Ok(Some(Self {
            account: message.account,
            amount: Amount::from_dec_str(&message.amount)
                .map_err(|e| EventError::Malformed(format!("amount: {}", e)))?,
            hash: parse_hex(&message.hash, "hash")?,
            block: EventBlock {
                account: message.block.account,
                balance: Amount::from_dec_str(&message.block.balance)
                    .map_err(|e| EventError::Malformed(format!("block.balance: {}", e)))?,
                link,
                link_as_account,
                previous: parse_hex(&message.block.previous, "block.previous")?,
                representative: message.block.representative,
                work: message.block.work,
                subtype,
            },
        }))
    }

    /// Destination account of a send, `None` for other subtypes.
    pub fn send_destination(&self) -> Option<&str> {
        (self.block.subtype == Subtype::Send).then_some(self.block.link_as_account.as_str())
    }

    /// The node's JSON rendering, used by mock nodes in tests and tooling.
    pub fn to_json(&self) -> Value {
        json!({
            "topic": "confirmation",
            "message": {
                "account": self.account,
                "amount": self.amount.to_dec_string(),
                "hash": self.hash.to_hex(),
                "block": {
                    "type": "state",
                    "account": self.block.account,
                    "previous": self.block.previous.to_hex(),
                    "representative": self.block.representative,
                    "balance": self.block.balance.to_dec_string(),
                    "link": self.block.link.to_hex(),
                    "link_as_account": self.block.link_as_account,
                    "work": self.block.work,
                    "subtype": self.block.subtype.as_str(),
                }
            }
        })
    }
}

fn parse_hex(text: &str, field: &str) -> EventResult<Uint256> {
    Uint256::from_hex(text).map_err(|e| EventError::Malformed(format!("{}: {}", field, e)))
}

#[derive(Deserialize)]
struct Envelope {
    topic: Option<String>,
    // Decoded only for confirmations; other topics carry other shapes.
    message: Option<Value>,
}

#[derive(Deserialize)]
struct MessageWire {
    account: String,
    amount: String,
    hash: String,
    block: BlockWire,
}

#[derive(Deserialize)]
struct BlockWire {
    account: String,
    balance: String,
    link: String,
    link_as_account: Option<String>,
    previous: String,
    representative: String,
    #[serde(default)]
    work: String,
    subtype: Option<String>,
}

/// Frames sent to the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Register(String),
    Unregister(String),
    ListenAll,
}

impl OutboundMessage {
    pub fn to_text(&self) -> String {
        match self {
            Self::Register(account) => json!({"action": "register_account", "account": account}).to_string(),
            Self::Unregister(account) => json!({"action": "unregister_account", "account": account}).to_string(),
            Self::ListenAll => "listen_all".to_string(),
        }
    }
}
