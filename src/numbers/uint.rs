//! Fixed-width unsigned integers (128/256/512 bit) and their text codecs.
//!
//! # Responsibilities
//! - Hold amounts, keys, hashes and signatures as big-endian byte arrays
//! - Parse and render hexadecimal and decimal text
//! - Provide checked arithmetic and ordering for amounts
//!
//! # Design Decisions
//! - Amounts are native `u128`; the total supply ceiling is `u128::MAX`
//! - 256/512-bit values are byte arrays, widened through `alloy` integers
//!   only when numeric work (decimal text, account encoding) is needed
//! - Hex output is always full-width uppercase; hex input may be shorter
//!   and is left-padded with zeros

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use alloy::primitives::{U256, U512};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors produced while parsing fixed-width integer text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UintError {
    #[error("empty input")]
    Empty,

    #[error("input has {actual} characters, at most {max} allowed")]
    TooLong { max: usize, actual: usize },

    #[error("leading zeros are not allowed")]
    LeadingZero,

    #[error("negative values are not allowed")]
    Negative,

    #[error("invalid digit '{0}'")]
    InvalidDigit(char),

    #[error("value does not fit in {0} bits")]
    Overflow(u32),
}

/// Result type for integer parsing.
pub type UintResult<T> = Result<T, UintError>;

/// Maximum decimal digits of a 128-bit value.
const MAX_DEC_DIGITS_128: usize = 39;
/// Maximum decimal digits of a 256-bit value.
const MAX_DEC_DIGITS_256: usize = 78;

/// Shared decimal pre-checks: length, sign, leading zeros, digit alphabet.
fn check_decimal(text: &str, max_digits: usize) -> UintResult<()> {
    if text.is_empty() {
        return Err(UintError::Empty);
    }
    if text.len() > max_digits {
        return Err(UintError::TooLong {
            max: max_digits,
            actual: text.len(),
        });
    }
    if text.starts_with('-') {
        return Err(UintError::Negative);
    }
    if text.len() > 1 && text.starts_with('0') {
        return Err(UintError::LeadingZero);
    }
    if let Some(bad) = text.chars().find(|c| !c.is_ascii_digit()) {
        return Err(UintError::InvalidDigit(bad));
    }
    Ok(())
}

/// Decode hex text of at most `N * 2` digits into `N` big-endian bytes.
fn decode_hex_padded<const N: usize>(text: &str) -> UintResult<[u8; N]> {
    if text.is_empty() {
        return Err(UintError::Empty);
    }
    let width = N * 2;
    if text.len() > width {
        return Err(UintError::TooLong {
            max: width,
            actual: text.len(),
        });
    }
    if let Some(bad) = text.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(UintError::InvalidDigit(bad));
    }

    let mut padded = String::with_capacity(width);
    padded.extend(std::iter::repeat('0').take(width - text.len()));
    padded.push_str(text);

    let mut bytes = [0u8; N];
    hex::decode_to_slice(&padded, &mut bytes).map_err(|_| UintError::InvalidDigit('?'))?;
    Ok(bytes)
}

/// A quantity of raw, the smallest ledger unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u128);

impl Amount {
    /// Zero raw.
    pub const ZERO: Amount = Amount(0);

    /// The protocol's total supply, which is also the largest representable amount.
    pub const MAX_SUPPLY: Amount = Amount(u128::MAX);

    pub const fn new(raw: u128) -> Self {
        Self(raw)
    }

    /// The amount in raw.
    pub const fn raw(&self) -> u128 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Parse canonical decimal text: no sign, no leading zeros (except `"0"`),
    /// at most 39 digits and no larger than the supply ceiling.
    pub fn from_dec_str(text: &str) -> UintResult<Self> {
        check_decimal(text, MAX_DEC_DIGITS_128)?;
        text.parse::<u128>()
            .map(Self)
            .map_err(|_| UintError::Overflow(128))
    }

    /// Canonical decimal rendering.
    pub fn to_dec_string(&self) -> String {
        self.0.to_string()
    }

    /// Parse up to 32 hex digits.
    pub fn from_hex(text: &str) -> UintResult<Self> {
        decode_hex_padded::<16>(text).map(|bytes| Self(u128::from_be_bytes(bytes)))
    }

    /// Full-width (32 digit) uppercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.to_be_bytes())
    }

    /// Big-endian bytes, as hashed into blocks.
    pub fn to_be_bytes(&self) -> [u8; 16] {
        self.0.to_be_bytes()
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn checked_mul(self, other: Amount) -> Option<Amount> {
        self.0.checked_mul(other.0).map(Self)
    }
}

impl Add for Amount {
    type Output = Amount;

    /// Panics if the sum exceeds the supply ceiling.
    fn add(self, other: Amount) -> Amount {
        match self.checked_add(other) {
            Some(sum) => sum,
            None => panic!("amount overflow: {} + {}", self, other),
        }
    }
}

impl Sub for Amount {
    type Output = Amount;

    /// Panics when `other > self`; callers check balances first.
    fn sub(self, other: Amount) -> Amount {
        match self.checked_sub(other) {
            Some(difference) => difference,
            None => panic!("amount underflow: {} - {}", self, other),
        }
    }
}

impl From<u128> for Amount {
    fn from(raw: u128) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = UintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_dec_str(s)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_dec_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Amount::from_dec_str(&text).map_err(serde::de::Error::custom)
    }
}

/// A 256-bit value: public keys, block hashes and block links.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Uint256([u8; 32]);

/// Block hashes are 256-bit.
pub type BlockHash = Uint256;
/// Account public keys are 256-bit.
pub type PublicKey = Uint256;

impl Uint256 {
    pub const ZERO: Uint256 = Uint256([0u8; 32]);

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Parse up to 64 hex digits; shorter input is left-padded (so `"0"` is zero).
    pub fn from_hex(text: &str) -> UintResult<Self> {
        decode_hex_padded::<32>(text).map(Self)
    }

    /// Full-width (64 digit) uppercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    /// Parse canonical decimal text of at most 78 digits.
    pub fn from_dec_str(text: &str) -> UintResult<Self> {
        check_decimal(text, MAX_DEC_DIGITS_256)?;
        let number = U256::from_str_radix(text, 10).map_err(|_| UintError::Overflow(256))?;
        Ok(Self::from_number(number))
    }

    pub fn to_dec_string(&self) -> String {
        self.number().to_string()
    }

    /// Numeric view of the big-endian bytes.
    pub fn number(&self) -> U256 {
        U256::from_be_bytes(self.0)
    }

    pub fn from_number(number: U256) -> Self {
        Self(number.to_be_bytes::<32>())
    }
}

impl From<u64> for Uint256 {
    fn from(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }
}

impl PartialOrd for Uint256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Uint256 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Display for Uint256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Uint256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uint256({})", self.to_hex())
    }
}

/// A 512-bit value, used for signatures.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Uint512([u8; 64]);

/// Ed25519 signatures are 512-bit.
pub type Signature = Uint512;

impl Uint512 {
    pub const ZERO: Uint512 = Uint512([0u8; 64]);

    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Concatenate two 256-bit halves, `upper` first.
    pub fn from_halves(upper: &Uint256, lower: &Uint256) -> Self {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(upper.as_bytes());
        bytes[32..].copy_from_slice(lower.as_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Parse up to 128 hex digits.
    pub fn from_hex(text: &str) -> UintResult<Self> {
        decode_hex_padded::<64>(text).map(Self)
    }

    /// Full-width (128 digit) uppercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    pub fn number(&self) -> U512 {
        U512::from_be_bytes(self.0)
    }
}

impl Default for Uint512 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Uint512 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Uint512 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uint512({})", self.to_hex())
    }
}
