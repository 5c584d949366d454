//! # Hash Provider
//!
//! SHA-224 digests for message signing and hex fingerprints for cache keys.
//!
//! ```text
//! message ──► SHA-224 ──► 28-byte digest ──► Ed25519 sign (ephemeral key)
//!
//! key bytes ──► SHA-224 ──► hex ──► "3f1c…e9"           (signer fingerprint)
//!                                 └► "3f1c…e9:async"     (async signer)
//! ```
//!
//! Every fingerprinted part is prefixed with its big-endian `u64` length, so
//! moving bytes from one part into its neighbour changes the fingerprint.

use sha2::{Digest as _, Sha224};

/// Size of a message digest in bytes (224 bits)
pub const DIGEST_SIZE: usize = 28;

/// A SHA-224 message digest
pub type Digest = [u8; DIGEST_SIZE];

/// Hash a byte sequence
pub fn digest(data: &[u8]) -> Digest {
    let mut out = [0u8; DIGEST_SIZE];
    out.copy_from_slice(&Sha224::digest(data));
    out
}

/// Compute the hex fingerprint of a sequence of length-framed `parts`
pub fn fingerprint(parts: &[&[u8]]) -> String {
    let mut hasher = Sha224::new();
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}
