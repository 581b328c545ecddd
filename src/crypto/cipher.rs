//! Password encryption of seeds for storage at rest.
//!
//! AES-256 over the two 16-byte blocks of a 32-byte seed, keyed with
//! SHA-256 of the password. Ciphertext travels as 64 hex characters.
//! Nothing here touches the filesystem.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes256;
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroize;

use crate::crypto::keys::RawKey;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherError {
    #[error("ciphertext must be 64 hex characters, got {0}")]
    Length(usize),

    #[error("ciphertext is not valid hex")]
    Hex,
}

pub type CipherResult<T> = Result<T, CipherError>;

fn cipher_for(password: &str) -> Aes256 {
    let mut key = Sha256::digest(password.as_bytes());
    let cipher = Aes256::new(&key);
    key.as_mut_slice().zeroize();
    cipher
}

/// Encrypt a seed under `password`, returning uppercase hex.
pub fn encrypt(seed: &RawKey, password: &str) -> String {
    let cipher = cipher_for(password);
    let mut buffer = *seed.as_bytes();
    for block in buffer.chunks_exact_mut(16) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }
    let encoded = hex::encode_upper(buffer);
    buffer.zeroize();
    encoded
}

/// Decrypt hex produced by [`encrypt`].
///
/// A wrong password is not detectable here: it yields a different seed.
pub fn decrypt(ciphertext: &str, password: &str) -> CipherResult<RawKey> {
    if ciphertext.len() != 64 {
        return Err(CipherError::Length(ciphertext.len()));
    }
    let mut buffer = [0u8; 32];
    hex::decode_to_slice(ciphertext, &mut buffer).map_err(|_| CipherError::Hex)?;

    let cipher = cipher_for(password);
    for block in buffer.chunks_exact_mut(16) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }
    let seed = RawKey::from_bytes(buffer);
    buffer.zeroize();
    Ok(seed)
}
