//! # Cryptography Module
//!
//! Primitives used by the delegate signer and verifier.
//!
//! ## Key Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CRYPTOGRAPHIC ARCHITECTURE                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  Master Key (Ed25519, long-lived)                               │   │
//! │  │  • raw seed, or sealed under a passphrase (AES-256-GCM)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ certifies (signs subkey public)        │
//! │                                ▼                                        │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  Ephemeral Subkey (Ed25519, one per delegate signer)            │   │
//! │  │  • signs SHA-224(message)                                      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Algorithm Choices
//!
//! | Algorithm | Purpose |
//! |-----------|---------|
//! | Ed25519 | Master certification, ephemeral message signatures |
//! | SHA-224 | Message digest, cache fingerprints |
//! | HKDF-SHA256 + AES-256-GCM | Sealing passphrase-protected master keys |

mod ephemeral;
mod hash;
mod master;
mod seal;

pub use ephemeral::{
    parse_public_key as parse_subkey, verify_digest, EphemeralKeyPair, PUBLIC_KEY_SIZE,
    SIGNATURE_SIZE,
};
pub use hash::{digest, fingerprint, Digest, DIGEST_SIZE};
pub use master::{
    certify, parse_public_key, verify_certification, MasterKeySource, MasterVerifyMode,
    MASTER_PUBLIC_KEY_SIZE, MASTER_SECRET_SIZE,
};
pub use seal::{seal_master_key, unseal_master_key, SEALED_KEY_SIZE};
