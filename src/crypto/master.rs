//! # Master Keys
//!
//! The long-lived Ed25519 key that certifies ephemeral subkeys.
//!
//! ## Certification Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       CERTIFICATION FLOW                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  SIGNER                                                                │
//! │  ─────────────────────────────────────────────────────────────────      │
//! │                                                                         │
//! │  MasterKeySource ──► secret seed ──► Ed25519 Sign(subkey public)       │
//! │   Raw(bytes)              ▲                   │                         │
//! │   Passphrase{key, pass} ──┘ (unseal)          ▼                         │
//! │                                        certification (64 bytes)         │
//! │                                                                         │
//! │  VERIFIER                                                              │
//! │  ─────────────────────────────────────────────────────────────────      │
//! │                                                                         │
//! │  master public + certification + subkey public                         │
//! │        │                                                                │
//! │        ├── Standard: verify_strict (canonical signatures only)         │
//! │        └── Legacy:   RFC 8032 verify (accepts malleable encodings)     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Encodings
//!
//! | Input | Accepted forms |
//! |-------|----------------|
//! | Master secret (`Raw`) | 32 raw bytes, or 64 hex characters |
//! | Master secret (`Passphrase`) | sealed blob from [`seal_master_key`](super::seal_master_key) |
//! | Master public key | 32 raw bytes, or 64 hex characters |

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::Zeroizing;

use crate::crypto::seal::unseal_master_key;
use crate::error::{Error, Result};

/// Size of a master secret seed in bytes
pub const MASTER_SECRET_SIZE: usize = 32;

/// Size of a master public key in bytes
pub const MASTER_PUBLIC_KEY_SIZE: usize = 32;

/// Where the master secret comes from
///
/// Only the key payload identifies the master: the passphrase never takes
/// part in fingerprinting.
#[derive(Clone)]
pub enum MasterKeySource {
    /// Unprotected key material
    Raw(Vec<u8>),
    /// Sealed key material plus the passphrase that opens it
    Passphrase {
        /// Sealed key blob
        key: Vec<u8>,
        /// Passphrase for the sealed blob
        passphrase: String,
    },
}

impl MasterKeySource {
    /// Create a passphrase-protected source
    pub fn with_passphrase(key: impl Into<Vec<u8>>, passphrase: impl Into<String>) -> Self {
        Self::Passphrase {
            key: key.into(),
            passphrase: passphrase.into(),
        }
    }

    /// The key payload, without any passphrase
    pub fn payload(&self) -> &[u8] {
        match self {
            Self::Raw(key) => key,
            Self::Passphrase { key, .. } => key,
        }
    }

    /// Reject sources that can never yield a key
    ///
    /// This runs before any cache lookup so that usage errors surface at the
    /// call site rather than through a pending signature.
    pub fn validate(&self) -> Result<()> {
        if self.payload().is_empty() {
            return Err(Error::InvalidMasterKey("key payload is empty".into()));
        }
        Ok(())
    }

    /// Recover the Ed25519 signing key
    pub fn signing_key(&self) -> Result<SigningKey> {
        let seed = match self {
            Self::Raw(key) => parse_secret(key)?,
            Self::Passphrase { key, passphrase } => unseal_master_key(key, passphrase)?,
        };
        Ok(SigningKey::from_bytes(&seed))
    }

    /// Derive the master public key that verifiers need
    pub fn public_key(&self) -> Result<[u8; MASTER_PUBLIC_KEY_SIZE]> {
        Ok(self.signing_key()?.verifying_key().to_bytes())
    }
}

impl std::fmt::Debug for MasterKeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw(_) => f.write_str("MasterKeySource::Raw(secret)"),
            Self::Passphrase { .. } => f.write_str("MasterKeySource::Passphrase(secret)"),
        }
    }
}

impl From<Vec<u8>> for MasterKeySource {
    fn from(key: Vec<u8>) -> Self {
        Self::Raw(key)
    }
}

impl From<&[u8]> for MasterKeySource {
    fn from(key: &[u8]) -> Self {
        Self::Raw(key.to_vec())
    }
}

impl From<[u8; MASTER_SECRET_SIZE]> for MasterKeySource {
    fn from(key: [u8; MASTER_SECRET_SIZE]) -> Self {
        Self::Raw(key.to_vec())
    }
}

impl From<&str> for MasterKeySource {
    fn from(key: &str) -> Self {
        Self::Raw(key.as_bytes().to_vec())
    }
}

/// How strictly a master certification is checked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MasterVerifyMode {
    /// Strict verification: canonical signatures, no small-order keys
    #[default]
    Standard,
    /// Lenient RFC 8032 verification, for certifications produced by older
    /// signers. Only reachable through an explicit opt-in.
    Legacy,
}

/// Certify a subkey with the master secret
pub fn certify(master: &MasterKeySource, subkey: &[u8]) -> Result<Vec<u8>> {
    let signing_key = master.signing_key()?;
    let certification = signing_key
        .try_sign(subkey)
        .map_err(|e| Error::SigningFailed(e.to_string()))?;
    Ok(certification.to_bytes().to_vec())
}

/// Check a certification over `subkey` against the master public key
pub fn verify_certification(
    master_public: &[u8],
    certification: &[u8],
    subkey: &[u8],
    mode: MasterVerifyMode,
) -> Result<()> {
    let key = parse_public_key(master_public)?;
    let signature = Signature::from_slice(certification).map_err(|_| Error::UnverifiableSubkey)?;

    let verified = match mode {
        MasterVerifyMode::Standard => key.verify_strict(subkey, &signature),
        MasterVerifyMode::Legacy => key.verify(subkey, &signature),
    };
    verified.map_err(|_| Error::UnverifiableSubkey)
}

/// Parse a master public key from raw or hex form
pub fn parse_public_key(bytes: &[u8]) -> Result<VerifyingKey> {
    let raw = decode_key_material(bytes, MASTER_PUBLIC_KEY_SIZE)
        .map_err(Error::InvalidPublicKey)?;
    let mut key = [0u8; MASTER_PUBLIC_KEY_SIZE];
    key.copy_from_slice(&raw);
    VerifyingKey::from_bytes(&key).map_err(|e| Error::InvalidPublicKey(e.to_string()))
}

fn parse_secret(bytes: &[u8]) -> Result<Zeroizing<[u8; MASTER_SECRET_SIZE]>> {
    let raw = decode_key_material(bytes, MASTER_SECRET_SIZE).map_err(Error::InvalidMasterKey)?;
    let mut seed = Zeroizing::new([0u8; MASTER_SECRET_SIZE]);
    seed.copy_from_slice(&raw);
    Ok(seed)
}

/// Accept `size` raw bytes or `2 * size` hex characters
fn decode_key_material(
    bytes: &[u8],
    size: usize,
) -> std::result::Result<Zeroizing<Vec<u8>>, String> {
    if bytes.len() == size {
        return Ok(Zeroizing::new(bytes.to_vec()));
    }
    if bytes.len() == size * 2 {
        let text = std::str::from_utf8(bytes).map_err(|_| "key is not valid hex".to_string())?;
        let decoded = hex::decode(text).map_err(|e| format!("Invalid key hex: {}", e))?;
        return Ok(Zeroizing::new(decoded));
    }
    Err(format!(
        "expected {} bytes or {} hex characters, got {} bytes",
        size,
        size * 2,
        bytes.len()
    ))
}

// ============================================================================
// TESTS
// ============================================================================
