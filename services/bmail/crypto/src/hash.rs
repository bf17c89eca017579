//! SHA-256 digests used for envelope and command hashes.

use sha2::{Digest, Sha256};

/// Digest size in bytes
pub const HASH_SIZE: usize = 32;

/// A SHA-256 digest
pub type Hash = [u8; HASH_SIZE];

/// Hash the concatenation of `parts`
pub fn sha256(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}
