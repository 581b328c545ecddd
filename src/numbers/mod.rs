//! Numeric and account text codecs.
//!
//! # Data Flow
//! ```text
//! hex / decimal text
//!     → uint.rs (Amount, Uint256, Uint512)
//!     → account.rs (nano_ addresses over Uint256)
//!     → units.rs (raw <-> display unit)
//! ```
//!
//! Everything here is pure and allocation-light; no I/O, no logging.

pub mod account;
pub mod uint;
pub mod units;

pub use account::{decode_account, encode_account, is_valid_account, AccountError};
pub use uint::{Amount, BlockHash, PublicKey, Signature, Uint256, Uint512, UintError, UintResult};
pub use units::{nano_to_raw, raw_to_nano, validate_nano, validate_raw};
