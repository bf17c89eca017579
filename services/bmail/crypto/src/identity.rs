//! Ed25519 identities and blockchain addresses.
//!
//! An [`Address`] is the raw 32-byte Ed25519 verifying key. Its text form is
//! `BM` followed by the lowercase hex of the key, which is what users and
//! configuration files see. The [`Identity`] holds the signing half.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Prefix of the textual address form
pub const ADDRESS_PREFIX: &str = "BM";

/// Public key (address) size in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Ed25519 signature size in bytes
pub const SIGNATURE_SIZE: usize = 64;

/// Blockchain address of a bmail participant (Ed25519 public key)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; PUBLIC_KEY_SIZE]);

impl Address {
    /// Build an address from raw key bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; PUBLIC_KEY_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidAddress(format!(
                "expected {} bytes, got {}",
                PUBLIC_KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(key))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    /// Verify `signature` over `message` with this address's key
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        let key = VerifyingKey::from_bytes(&self.0)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let sig = Signature::from_slice(signature)
            .map_err(|_| CryptoError::MalformedSignature(signature.len()))?;
        key.verify(message, &sig)
            .map_err(|_| CryptoError::SignatureVerification)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", ADDRESS_PREFIX, hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix(ADDRESS_PREFIX)
            .ok_or_else(|| CryptoError::InvalidAddress(format!("missing {ADDRESS_PREFIX} prefix")))?;
        let bytes = hex::decode(body)?;
        Self::from_bytes(&bytes)
    }
}

/// Signing identity of a client or server
#[derive(Clone)]
pub struct Identity {
    signing: SigningKey,
    address: Address,
}

impl Identity {
    /// Generate a fresh identity from the OS random source
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Restore an identity from its 32-byte secret
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let secret: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey(format!("secret must be 32 bytes, got {}", bytes.len())))?;
        Ok(Self::from_signing_key(SigningKey::from_bytes(&secret)))
    }

    /// Restore an identity from a hex-encoded secret
    pub fn from_hex(secret_hex: &str) -> Result<Self, CryptoError> {
        let bytes = Zeroizing::new(hex::decode(secret_hex.trim())?);
        Self::from_secret_bytes(&bytes)
    }

    fn from_signing_key(signing: SigningKey) -> Self {
        let address = Address(signing.verifying_key().to_bytes());
        Self { signing, address }
    }

    /// Address derived from the public key
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign `message`, returning the 64-byte signature
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing.sign(message).to_bytes().to_vec()
    }

    /// Secret key bytes, wiped when dropped
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing.to_bytes())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
