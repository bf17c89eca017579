//! AES-256-GCM keyed with an explicit 16-byte IV.
//!
//! Ciphertext wire format:
//!   [ iv (16 bytes) | ciphertext + tag (16 bytes) ]
//!
//! The IV travels in front of the ciphertext so that a receiver can compare
//! it against the IV the envelope claims.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// IV size in bytes (one AES block)
pub const IV_SIZE: usize = 16;

/// Symmetric key size in bytes
pub const KEY_SIZE: usize = 32;

const TAG_SIZE: usize = 16;

type IvCipher = AesGcm<Aes256, U16>;

/// Initialisation vector shared by every ciphertext of one envelope
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Iv([u8; IV_SIZE]);

impl Iv {
    /// Draw a fresh IV from the OS random source
    pub fn random() -> Self {
        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);
        Self(iv)
    }

    /// Wrap raw bytes
    pub fn new(bytes: [u8; IV_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse exactly [`IV_SIZE`] bytes
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; IV_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Iv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Iv({})", hex::encode(self.0))
    }
}

/// 256-bit symmetric key, wiped on drop
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    /// Draw a fresh key from the OS random source
    pub fn random() -> Self {
        let mut key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    /// Wrap raw key bytes
    pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse exactly [`KEY_SIZE`] bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("symmetric key must be {KEY_SIZE} bytes, got {}", bytes.len()))
        })?;
        Ok(Self(key))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// Encrypt `plaintext` under `key` with `iv`, prepending the IV
pub fn encrypt_with_iv(key: &SymmetricKey, iv: &Iv, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = IvCipher::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::Encrypt)?;
    let ciphertext = cipher
        .encrypt(Nonce::<U16>::from_slice(iv.as_bytes()), plaintext)
        .map_err(|_| CryptoError::Encrypt)?;

    let mut out = Vec::with_capacity(IV_SIZE + ciphertext.len());
    out.extend_from_slice(iv.as_bytes());
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt wire-format bytes (iv || ciphertext+tag), returning the embedded IV
pub fn decrypt_with_iv(key: &SymmetricKey, data: &[u8]) -> Result<(Iv, Vec<u8>), CryptoError> {
    if data.len() < IV_SIZE + TAG_SIZE {
        return Err(CryptoError::Truncated(data.len()));
    }
    let (iv_bytes, ciphertext) = data.split_at(IV_SIZE);
    let iv = Iv::from_slice(iv_bytes).ok_or(CryptoError::Truncated(data.len()))?;

    let cipher = IvCipher::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::Decrypt)?;
    let plaintext = cipher
        .decrypt(Nonce::<U16>::from_slice(iv_bytes), ciphertext)
        .map_err(|_| CryptoError::Decrypt)?;

    Ok((iv, plaintext))
}
