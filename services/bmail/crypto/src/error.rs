//! Crypto error types.

use thiserror::Error;

/// Errors raised by key handling, signatures and ciphers
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Signature did not verify against the claimed address
    #[error("signature verification failed")]
    SignatureVerification,

    /// Signature bytes have the wrong shape
    #[error("malformed signature ({0} bytes)")]
    MalformedSignature(usize),

    /// Key bytes are not a valid key
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Address text or bytes could not be parsed
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Encryption failed
    #[error("encryption failed")]
    Encrypt,

    /// Decryption failed, the authentication tag did not match
    #[error("decryption failed (authentication tag mismatch)")]
    Decrypt,

    /// Ciphertext is shorter than the IV and tag it must carry
    #[error("ciphertext truncated ({0} bytes)")]
    Truncated(usize),

    /// HKDF expansion failed
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Hex decoding failed
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
