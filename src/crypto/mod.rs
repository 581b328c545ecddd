//! Key derivation, signing and seed encryption.
//!
//! # Data Flow
//! ```text
//! Seed (env var / generate_seed)
//!     → keys.rs (seed + index → private key → public key, sign / verify)
//!     → cipher.rs (password-encrypted seed for storage)
//! ```
//!
//! # Security Constraints
//! - Seeds and private keys are zeroed when dropped
//! - Never log secret material

pub mod cipher;
pub mod keys;

pub use cipher::{decrypt, encrypt, CipherError};
pub use keys::{
    deterministic_key, generate_seed, pub_key, sha256_hex, sign_message, verify_message, KeyError,
    KeyResult, RawKey,
};
