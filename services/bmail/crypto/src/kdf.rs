//! Key derivation.
//!
//! `derive_shared_key` converts both Ed25519 keys to X25519, runs the
//! Diffie-Hellman exchange and expands the result with HKDF-SHA256.
//! `derive_subkey` splits one content key into independent per-field keys.

use hkdf::Hkdf;
use sha2::{Digest, Sha256, Sha512};
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::Zeroize;

use crate::cipher::{SymmetricKey, KEY_SIZE};
use crate::error::CryptoError;
use crate::identity::{Address, Identity};

const SHARED_KEY_SALT: &[u8] = b"bmail-shared-key-v1";
const SHARED_KEY_INFO: &[u8] = b"bmail envelope key wrap";
const SUBKEY_SALT: &[u8] = b"bmail-content-v1";

/// Expand `ikm` + `info` into `output.len()` bytes of key material.
pub fn hkdf_expand(
    ikm: &[u8],
    salt: Option<&[u8]>,
    info: &[u8],
    output: &mut [u8],
) -> Result<(), CryptoError> {
    let hk = Hkdf::<Sha256>::new(salt, ikm);
    hk.expand(info, output)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))
}

/// Convert an Ed25519 secret to an X25519 static secret (RFC 7748 clamping
/// of the SHA-512 expansion).
pub fn ed25519_secret_to_x25519(ed_secret: &[u8; 32]) -> StaticSecret {
    let mut h = Sha512::digest(ed_secret);
    h[0] &= 248;
    h[31] &= 127;
    h[31] |= 64;
    let mut key = [0u8; 32];
    key.copy_from_slice(&h[..32]);
    h.as_mut_slice().zeroize();
    StaticSecret::from(key)
}

/// Map an Ed25519 public key onto Curve25519.
pub fn ed25519_pub_to_x25519(ed_pub: &[u8; 32]) -> Result<X25519Public, CryptoError> {
    use curve25519_dalek::edwards::CompressedEdwardsY;
    let point = CompressedEdwardsY(*ed_pub)
        .decompress()
        .ok_or_else(|| CryptoError::InvalidKey("Ed25519 public key decompression failed".into()))?;
    Ok(X25519Public::from(point.to_montgomery().to_bytes()))
}

/// Shared symmetric key between `local` and the owner of `remote`.
///
/// Symmetric: `derive_shared_key(a, b.address())` equals
/// `derive_shared_key(b, a.address())`.
pub fn derive_shared_key(local: &Identity, remote: &Address) -> Result<SymmetricKey, CryptoError> {
    let secret = ed25519_secret_to_x25519(&local.secret_bytes());
    let public = ed25519_pub_to_x25519(remote.as_bytes())?;
    let shared = secret.diffie_hellman(&public);
    if !shared.was_contributory() {
        return Err(CryptoError::InvalidKey("low-order remote key".into()));
    }

    let mut key = [0u8; KEY_SIZE];
    hkdf_expand(shared.as_bytes(), Some(SHARED_KEY_SALT), SHARED_KEY_INFO, &mut key)?;
    let derived = SymmetricKey::new(key);
    key.zeroize();
    Ok(derived)
}

/// Derive an independent key for one use of `key`, identified by `label`.
pub fn derive_subkey(key: &SymmetricKey, label: &[u8]) -> Result<SymmetricKey, CryptoError> {
    let mut out = [0u8; KEY_SIZE];
    hkdf_expand(key.as_bytes(), Some(SUBKEY_SALT), label, &mut out)?;
    let derived = SymmetricKey::new(out);
    out.zeroize();
    Ok(derived)
}
