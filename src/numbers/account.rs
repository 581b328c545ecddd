//! Checksummed base-32 account addresses.
//!
//! An address is the literal prefix `nano_` followed by 60 base-32 symbols
//! encoding the 256-bit public key shifted left by 40 bits and OR-ed with a
//! 5-byte Blake2b checksum of the key. The legacy `xrb_` prefix is accepted
//! on decode only.

use alloy::primitives::U512;
use blake2::digest::consts::U5;
use blake2::{Blake2b, Digest};
use thiserror::Error;

use crate::numbers::uint::{PublicKey, Uint256};

/// Prefix produced by [`encode_account`].
pub const ACCOUNT_PREFIX: &str = "nano_";
/// Legacy prefix, still accepted by [`decode_account`].
pub const LEGACY_ACCOUNT_PREFIX: &str = "xrb_";
/// Length of a `nano_` address.
pub const ACCOUNT_LENGTH: usize = 65;
/// Length of an `xrb_` address.
pub const LEGACY_ACCOUNT_LENGTH: usize = 64;

const ALPHABET: &[u8; 32] = b"13456789abcdefghijkmnopqrstuwxyz";
const SYMBOLS: usize = 60;
const CHECKSUM_BITS: usize = 40;
const CHECKSUM_MASK: u64 = 0xff_ffff_ffff;

/// Reasons an address fails to decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("address must start with '{ACCOUNT_PREFIX}' or '{LEGACY_ACCOUNT_PREFIX}'")]
    Prefix,

    #[error("address has length {actual}, expected {expected}")]
    Length { expected: usize, actual: usize },

    #[error("address body must start with '1' or '3'")]
    FirstCharacter,

    #[error("invalid address character '{0}'")]
    InvalidCharacter(char),

    #[error("address checksum mismatch")]
    Checksum,
}

/// Result type for address decoding.
pub type AccountResult<T> = Result<T, AccountError>;

type Blake2b40 = Blake2b<U5>;

/// The 5-byte Blake2b digest of the key, read as a little-endian integer.
fn checksum(key: &PublicKey) -> u64 {
    let digest = Blake2b40::digest(key.as_bytes());
    let mut widened = [0u8; 8];
    widened[..5].copy_from_slice(&digest);
    u64::from_le_bytes(widened)
}

fn symbol_value(symbol: u8) -> Option<u8> {
    ALPHABET.iter().position(|s| *s == symbol).map(|p| p as u8)
}

/// Render a public key as a `nano_` address.
pub fn encode_account(key: &PublicKey) -> String {
    let mut number = (U512::from(key.number()) << CHECKSUM_BITS) | U512::from(checksum(key));

    let mut symbols = Vec::with_capacity(SYMBOLS);
    for _ in 0..SYMBOLS {
        let index = (number.as_limbs()[0] & 0x1f) as usize;
        symbols.push(ALPHABET[index]);
        number >>= 5;
    }
    symbols.reverse();

    let mut account = String::with_capacity(ACCOUNT_LENGTH);
    account.push_str(ACCOUNT_PREFIX);
    account.extend(symbols.into_iter().map(char::from));
    account
}

/// Parse a `nano_` (or legacy `xrb_`) address back into its public key,
/// verifying the embedded checksum.
pub fn decode_account(account: &str) -> AccountResult<PublicKey> {
    let (prefix_len, expected) = if account.starts_with(ACCOUNT_PREFIX) {
        (ACCOUNT_PREFIX.len(), ACCOUNT_LENGTH)
    } else if account.starts_with(LEGACY_ACCOUNT_PREFIX) {
        (LEGACY_ACCOUNT_PREFIX.len(), LEGACY_ACCOUNT_LENGTH)
    } else {
        return Err(AccountError::Prefix);
    };

    if account.len() != expected {
        return Err(AccountError::Length {
            expected,
            actual: account.len(),
        });
    }

    let body = &account.as_bytes()[prefix_len..];
    if body[0] != b'1' && body[0] != b'3' {
        return Err(AccountError::FirstCharacter);
    }

    let mut number = U512::ZERO;
    for &symbol in body {
        let value = symbol_value(symbol).ok_or(AccountError::InvalidCharacter(char::from(symbol)))?;
        number = (number << 5) | U512::from(value);
    }

    let embedded = number.as_limbs()[0] & CHECKSUM_MASK;
    let key_bytes: [u8; 64] = (number >> CHECKSUM_BITS).to_be_bytes::<64>();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&key_bytes[32..]);
    let key = Uint256::from_bytes(bytes);

    if checksum(&key) != embedded {
        return Err(AccountError::Checksum);
    }
    Ok(key)
}

/// True when `account` decodes to a key with a valid checksum.
pub fn is_valid_account(account: &str) -> bool {
    decode_account(account).is_ok()
}

impl Uint256 {
    /// Render as a `nano_` address.
    pub fn to_account(&self) -> String {
        encode_account(self)
    }

    /// Decode a `nano_`/`xrb_` address.
    pub fn from_account(account: &str) -> AccountResult<Self> {
        decode_account(account)
    }
}
