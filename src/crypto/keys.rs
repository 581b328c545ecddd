//! Seeds, private keys and Ed25519-Blake2b signatures.
//!
//! # Security
//! - Seeds and private keys live in [`RawKey`], which zeroes its bytes on drop
//! - `Debug` on [`RawKey`] is redacted; keys are never logged
//! - Signing expands the private key with Blake2b-512 instead of SHA-512,
//!   as the ledger's signature scheme requires

use std::fmt;

use blake2::digest::consts::U32;
use blake2::{Blake2b, Blake2b512, Digest};
use ed25519_dalek::hazmat::{raw_sign, raw_verify, ExpandedSecretKey};
use ed25519_dalek::{Signature as DalekSignature, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::numbers::account::{decode_account, AccountResult};
use crate::numbers::uint::{PublicKey, Signature, Uint256};

type Blake2b256 = Blake2b<U32>;

/// Errors from key material handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("key must be 64 hex characters, got {0}")]
    Length(usize),

    #[error("key is not valid hex")]
    Hex,

    #[error("public key does not belong to the signing key")]
    KeyMismatch,
}

/// Result type for key operations.
pub type KeyResult<T> = Result<T, KeyError>;

/// 32 bytes of secret material: a seed or a private key.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct RawKey([u8; 32]);

impl RawKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse exactly 64 hex characters (either case).
    pub fn from_hex(text: &str) -> KeyResult<Self> {
        if text.len() != 64 {
            return Err(KeyError::Length(text.len()));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(text, &mut bytes).map_err(|_| KeyError::Hex)?;
        Ok(Self(bytes))
    }

    /// Uppercase hex, the ledger's canonical rendering.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for RawKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RawKey(<redacted>)")
    }
}

/// Fresh random seed from the operating system's CSPRNG.
pub fn generate_seed() -> RawKey {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    let seed = RawKey(bytes);
    bytes.zeroize();
    seed
}

/// Private key number `index` of `seed`.
///
/// Blake2b-256 over the seed bytes followed by the index as 4 big-endian
/// bytes. Only those 4 bytes are hashed.
pub fn deterministic_key(seed: &RawKey, index: u32) -> RawKey {
    let mut hasher = Blake2b256::new();
    hasher.update(seed.as_bytes());
    hasher.update(index.to_be_bytes());
    RawKey(hasher.finalize().into())
}

fn expand(private: &RawKey) -> ExpandedSecretKey {
    let mut hashed = [0u8; 64];
    hashed.copy_from_slice(&Blake2b512::digest(private.as_bytes()));
    let expanded = ExpandedSecretKey::from_bytes(&hashed);
    hashed.zeroize();
    expanded
}

/// Public key of a private key.
pub fn pub_key(private: &RawKey) -> PublicKey {
    let verifying = VerifyingKey::from(&expand(private));
    Uint256::from_bytes(verifying.to_bytes())
}

/// Sign a 256-bit message (in practice a block hash).
///
/// `public` must be the key derived from `private`.
pub fn sign_message(private: &RawKey, public: &PublicKey, message: &Uint256) -> KeyResult<Signature> {
    let expanded = expand(private);
    let verifying = VerifyingKey::from(&expanded);
    if verifying.as_bytes() != public.as_bytes() {
        return Err(KeyError::KeyMismatch);
    }
    let signature = raw_sign::<Blake2b512>(&expanded, message.as_bytes(), &verifying);
    Ok(Signature::from_bytes(signature.to_bytes()))
}

/// Check `signature` over `message` against `public`.
///
/// Malformed public keys simply fail verification.
pub fn verify_message(public: &PublicKey, message: &Uint256, signature: &Signature) -> bool {
    let Ok(verifying) = VerifyingKey::from_bytes(public.as_bytes()) else {
        return false;
    };
    let signature = DalekSignature::from_bytes(signature.as_bytes());
    raw_verify::<Blake2b512>(&verifying, message.as_bytes(), &signature).is_ok()
}

/// Lowercase hex SHA-256 of a UTF-8 string.
pub fn sha256_hex(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

pub fn public_key_from_seed(seed: &RawKey, index: u32) -> PublicKey {
    pub_key(&deterministic_key(seed, index))
}

pub fn account_from_seed(seed: &RawKey, index: u32) -> String {
    public_key_from_seed(seed, index).to_account()
}

pub fn account_from_private_key(private: &RawKey) -> String {
    pub_key(private).to_account()
}

pub fn account_from_public_key(public: &PublicKey) -> String {
    public.to_account()
}

pub fn public_key_from_account(account: &str) -> AccountResult<PublicKey> {
    decode_account(account)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = "1234567891234567891234567891234567891234567891234567891234567891";
    const PRIVATE: &str = "64E4A5F0098E9330224975EB51D227BDDAD1E999E9AA2910B4724D78024CACF4";
    const PUBLIC: &str = "1B228F3ACFE9508A331987746845DA25044D48D290489D015B1A39724A8BEFE7";
    const ACCOUNT: &str = "nano_18s4jwxeztcijasjm3unf34xnba6bo6f764amn1op8jsgb7aquz9ke8njujm";

    fn seed() -> RawKey {
        RawKey::from_hex(SEED).unwrap()
    }

    #[test]
    fn test_reference_vectors() {
        let private = deterministic_key(&seed(), 0);
        assert_eq!(private.to_hex(), PRIVATE);
        assert_eq!(pub_key(&private).to_hex(), PUBLIC);
        assert_eq!(account_from_seed(&seed(), 0), ACCOUNT);
        assert_eq!(account_from_private_key(&private), ACCOUNT);
        assert_eq!(public_key_from_seed(&seed(), 0).to_hex(), PUBLIC);
        assert_eq!(public_key_from_account(ACCOUNT).unwrap().to_hex(), PUBLIC);
        assert_eq!(account_from_public_key(&Uint256::from_hex(PUBLIC).unwrap()), ACCOUNT);
    }

    #[test]
    fn test_derivation_is_deterministic_per_index() {
        let first = deterministic_key(&seed(), 1);
        let again = deterministic_key(&seed(), 1);
        let other = deterministic_key(&seed(), 2);
        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_ne!(first, deterministic_key(&seed(), 0));
    }

    #[test]
    fn test_sign_and_verify() {
        let private = deterministic_key(&seed(), 0);
        let public = pub_key(&private);
        let message = Uint256::from(42u64);

        let signature = sign_message(&private, &public, &message).unwrap();
        assert_eq!(signature, sign_message(&private, &public, &message).unwrap());
        assert!(verify_message(&public, &message, &signature));

        assert!(!verify_message(&public, &Uint256::from(43u64), &signature));
        let other = public_key_from_seed(&seed(), 1);
        assert!(!verify_message(&other, &message, &signature));
    }

    #[test]
    fn test_sign_rejects_foreign_public_key() {
        let private = deterministic_key(&seed(), 0);
        let other = public_key_from_seed(&seed(), 1);
        assert_eq!(
            sign_message(&private, &other, &Uint256::ZERO),
            Err(KeyError::KeyMismatch)
        );
    }

    #[test]
    fn test_raw_key_hex() {
        assert_eq!(RawKey::from_hex(&SEED.to_lowercase()).unwrap().to_hex(), SEED);
        assert_eq!(RawKey::from_hex("abcd"), Err(KeyError::Length(4)));
        assert_eq!(RawKey::from_hex(&"Z".repeat(64)), Err(KeyError::Hex));
    }

    #[test]
    fn test_debug_is_redacted() {
        let rendered = format!("{:?}", seed());
        assert!(!rendered.contains("1234"));
    }

    #[test]
    fn test_generated_seeds_differ() {
        let first = generate_seed();
        let second = generate_seed();
        assert_ne!(first, second);
        assert_eq!(first.to_hex().len(), 64);
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(SEED),
            "4c79de09ef123e2834dbe06d420158e455ac658aeb181da3b3ca5aabaf02dea3"
        );
    }
}
