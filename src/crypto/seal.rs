//! # Sealed Master Keys
//!
//! Passphrase protection for master secrets held in memory.
//!
//! ## Sealed Format
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SEALED KEY FORMAT                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────┬──────────────┬──────────────┬──────────────────────────┐   │
//! │  │ version │     salt     │    nonce     │  ciphertext + tag        │   │
//! │  │ 1 byte  │   16 bytes   │   12 bytes   │  32 + 16 bytes           │   │
//! │  └─────────┴──────────────┴──────────────┴──────────────────────────┘   │
//! │                                                                         │
//! │  sealing key = HKDF-SHA256(salt, passphrase, "subkey-master-seal-v1")  │
//! │  ciphertext  = AES-256-GCM(sealing key, nonce, seed, aad = version)    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A wrong passphrase fails the GCM tag check and is reported as
//! [`Error::InvalidPassphrase`].

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce as AesNonce,
};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::crypto::master::MASTER_SECRET_SIZE;
use crate::error::{Error, Result};

/// Current sealed-key format version
pub const SEAL_VERSION: u8 = 1;

/// Size of the HKDF salt in bytes
pub const SALT_SIZE: usize = 16;

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Total size of a sealed master key
pub const SEALED_KEY_SIZE: usize = 1 + SALT_SIZE + NONCE_SIZE + MASTER_SECRET_SIZE + TAG_SIZE;

const SEAL_INFO: &[u8] = b"subkey-master-seal-v1";

/// Seal a master secret under a passphrase
pub fn seal_master_key(secret: &[u8; MASTER_SECRET_SIZE], passphrase: &str) -> Result<Vec<u8>> {
    let mut salt = [0u8; SALT_SIZE];
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let key = derive_sealing_key(&salt, passphrase)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| Error::Internal(format!("Invalid sealing key: {}", e)))?;

    let ciphertext = cipher
        .encrypt(
            AesNonce::from_slice(&nonce),
            Payload {
                msg: &secret[..],
                aad: &[SEAL_VERSION],
            },
        )
        .map_err(|e| Error::Internal(format!("Sealing failed: {}", e)))?;

    let mut sealed = Vec::with_capacity(SEALED_KEY_SIZE);
    sealed.push(SEAL_VERSION);
    sealed.extend_from_slice(&salt);
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open a sealed master key
pub fn unseal_master_key(
    sealed: &[u8],
    passphrase: &str,
) -> Result<Zeroizing<[u8; MASTER_SECRET_SIZE]>> {
    if sealed.len() != SEALED_KEY_SIZE {
        return Err(Error::InvalidMasterKey(format!(
            "Sealed key must be {} bytes, got {}",
            SEALED_KEY_SIZE,
            sealed.len()
        )));
    }
    if sealed[0] != SEAL_VERSION {
        return Err(Error::InvalidMasterKey(format!(
            "Unsupported sealed key version {}",
            sealed[0]
        )));
    }

    let (salt, rest) = sealed[1..].split_at(SALT_SIZE);
    let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);

    let key = derive_sealing_key(salt, passphrase)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| Error::Internal(format!("Invalid sealing key: {}", e)))?;

    let plaintext = Zeroizing::new(
        cipher
            .decrypt(
                AesNonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: &[SEAL_VERSION],
                },
            )
            .map_err(|_| Error::InvalidPassphrase)?,
    );

    let mut secret = Zeroizing::new([0u8; MASTER_SECRET_SIZE]);
    secret.copy_from_slice(&plaintext);
    Ok(secret)
}

fn derive_sealing_key(salt: &[u8], passphrase: &str) -> Result<Zeroizing<[u8; 32]>> {
    let hkdf = Hkdf::<Sha256>::new(Some(salt), passphrase.as_bytes());
    let mut key = Zeroizing::new([0u8; 32]);
    hkdf.expand(SEAL_INFO, &mut key[..])
        .map_err(|_| Error::Internal("Failed to derive sealing key".into()))?;
    Ok(key)
}

// ============================================================================
// TESTS
// ============================================================================
