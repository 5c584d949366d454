//! # Ephemeral Keys
//!
//! The short-lived Ed25519 keypair owned by a delegate signer. It never
//! signs raw messages, only their SHA-224 digests.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       EPHEMERAL SIGNING                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Message ──► SHA-224 ──► Digest (28 bytes)                              │
//! │                              │                                          │
//! │                              ▼                                          │
//! │  Ephemeral secret ──► Ed25519 Sign ──► Signature (64 bytes)             │
//! │                                                                         │
//! │  The ephemeral public key travels inside every envelope, next to the   │
//! │  master's certification of it.                                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::ZeroizeOnDrop;

use crate::crypto::hash::Digest;
use crate::error::{Error, Result};

/// Size of an Ed25519 public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of an Ed25519 signature in bytes
pub const SIGNATURE_SIZE: usize = 64;

/// Ed25519 keypair generated per delegate signer
#[derive(ZeroizeOnDrop)]
pub struct EphemeralKeyPair {
    #[zeroize(skip)] // ed25519_dalek::SigningKey handles its own zeroization
    secret: SigningKey,
}

impl EphemeralKeyPair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        Self {
            secret: SigningKey::generate(&mut OsRng),
        }
    }

    /// Get the public key bytes
    pub fn public_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.secret.verifying_key().to_bytes()
    }

    /// Sign a message digest
    pub fn sign_digest(&self, digest: &Digest) -> [u8; SIGNATURE_SIZE] {
        self.secret.sign(digest).to_bytes()
    }
}

impl std::fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("public", &hex::encode(self.public_bytes()))
            .finish_non_exhaustive()
    }
}

/// Parse an ephemeral public key received in an envelope
pub fn parse_public_key(bytes: &[u8]) -> Result<VerifyingKey> {
    let bytes: &[u8; PUBLIC_KEY_SIZE] = bytes.try_into().map_err(|_| {
        Error::MalformedEnvelope(format!(
            "Subkey must be {} bytes, got {}",
            PUBLIC_KEY_SIZE,
            bytes.len()
        ))
    })?;
    VerifyingKey::from_bytes(bytes)
        .map_err(|e| Error::MalformedEnvelope(format!("Invalid subkey: {}", e)))
}

/// Verify an ephemeral signature over a digest
///
/// Uses strict verification, which rejects small-order keys and
/// non-canonical signatures.
pub fn verify_digest(key: &VerifyingKey, digest: &Digest, signature: &[u8]) -> Result<()> {
    let signature =
        Signature::from_slice(signature).map_err(|_| Error::InvalidMessageSignature)?;
    key.verify_strict(digest, &signature)
        .map_err(|_| Error::InvalidMessageSignature)
}

// ============================================================================
// TESTS
// ============================================================================
