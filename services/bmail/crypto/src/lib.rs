//! Identities, signatures, key agreement and IV ciphers for bmail.
//!
//! Every bmail participant is identified by an Ed25519 key pair whose public
//! half doubles as its blockchain address. This crate provides:
//!
//! - **Identity / Address**: signing with the private key, verification
//!   against an address
//! - **Key agreement**: an X25519 shared key derived from one party's
//!   Ed25519 secret and the other party's address, expanded with HKDF-SHA256
//! - **IV cipher**: AES-256-GCM keyed with a 16-byte IV that travels in front
//!   of the ciphertext
//! - **CryptoProvider**: the trait the sealing engine is parameterised over,
//!   with [`StandardProvider`] as the production implementation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cipher;
pub mod error;
pub mod hash;
pub mod identity;
pub mod kdf;
pub mod provider;

// Re-export main types
pub use cipher::{decrypt_with_iv, encrypt_with_iv, Iv, SymmetricKey, IV_SIZE, KEY_SIZE};
pub use error::CryptoError;
pub use hash::{sha256, Hash, HASH_SIZE};
pub use identity::{Address, Identity, ADDRESS_PREFIX, PUBLIC_KEY_SIZE, SIGNATURE_SIZE};
pub use kdf::{derive_shared_key, derive_subkey, hkdf_expand};
pub use provider::{CryptoProvider, StandardProvider};
