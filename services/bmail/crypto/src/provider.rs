//! Pluggable crypto provider for the sealing engine.

use crate::cipher::{self, Iv, SymmetricKey};
use crate::error::CryptoError;
use crate::identity::{Address, Identity};
use crate::kdf;

/// Key agreement and IV cipher operations used to seal envelopes.
///
/// Sealers take a provider at construction time, so tests can substitute a
/// deterministic implementation.
pub trait CryptoProvider: Send + Sync {
    /// Shared key between `local` and the owner of `remote`
    fn derive_shared_key(&self, local: &Identity, remote: &Address) -> Result<SymmetricKey, CryptoError>;

    /// Encrypt under `key` with `iv`; the IV must be recoverable by `decrypt_with_iv`
    fn encrypt_with_iv(&self, key: &SymmetricKey, iv: &Iv, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Decrypt, returning the IV the ciphertext was produced with
    fn decrypt_with_iv(&self, key: &SymmetricKey, ciphertext: &[u8]) -> Result<(Iv, Vec<u8>), CryptoError>;
}

/// X25519 + HKDF-SHA256 key agreement with AES-256-GCM
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardProvider;

impl CryptoProvider for StandardProvider {
    fn derive_shared_key(&self, local: &Identity, remote: &Address) -> Result<SymmetricKey, CryptoError> {
        kdf::derive_shared_key(local, remote)
    }

    fn encrypt_with_iv(&self, key: &SymmetricKey, iv: &Iv, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        cipher::encrypt_with_iv(key, iv, plaintext)
    }

    fn decrypt_with_iv(&self, key: &SymmetricKey, ciphertext: &[u8]) -> Result<(Iv, Vec<u8>), CryptoError> {
        cipher::decrypt_with_iv(key, ciphertext)
    }
}
