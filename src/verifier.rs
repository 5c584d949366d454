//! # Delegate Verifier
//!
//! Holds a subkey whose certification has already been checked against the
//! master public key, and checks message signatures against it.
//!
//! ```text
//! new(master public, subkey, certification, mode)
//!     │
//!     ├── MasterVerify fails ──► Err(UnverifiableSubkey)   (never cached)
//!     │
//!     └── ok ──► DelegateVerifier { subkey }
//!                    │
//!                    └── verify(sig, msg): Ed25519Verify(subkey, SHA-224(msg), sig)
//!                           ├── ok   ──► Ok(true)
//!                           └── fail ──► Err(InvalidMessageSignature)
//! ```

use ed25519_dalek::VerifyingKey;

use crate::crypto::{self, MasterVerifyMode};
use crate::error::Result;

/// Verifier for one certified subkey
#[derive(Debug)]
pub struct DelegateVerifier {
    subkey: VerifyingKey,
    mode: MasterVerifyMode,
}

impl DelegateVerifier {
    /// Check the certification and accept the subkey
    pub fn new(
        master_public: &[u8],
        subkey: &[u8],
        certification: &[u8],
        mode: MasterVerifyMode,
    ) -> Result<Self> {
        crypto::verify_certification(master_public, certification, subkey, mode)?;
        if mode == MasterVerifyMode::Legacy {
            tracing::debug!("Subkey accepted under legacy master verification");
        }

        Ok(Self {
            subkey: crypto::parse_subkey(subkey)?,
            mode,
        })
    }

    /// The master verification mode this subkey was accepted under
    pub fn mode(&self) -> MasterVerifyMode {
        self.mode
    }

    /// Check a message signature
    ///
    /// Returns `Ok(true)` or [`Error::InvalidMessageSignature`](crate::Error::InvalidMessageSignature).
    pub fn verify(&self, signature: &[u8], message: &[u8]) -> Result<bool> {
        crypto::verify_digest(&self.subkey, &crypto::digest(message), signature)?;
        Ok(true)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{certify, EphemeralKeyPair, MasterKeySource};
    use crate::error::Error;

    struct Fixture {
        master_public: [u8; 32],
        subkey: EphemeralKeyPair,
        certification: Vec<u8>,
    }

    fn fixture() -> Fixture {
        let master = MasterKeySource::from([5u8; 32]);
        let subkey = EphemeralKeyPair::generate();
        let certification = certify(&master, &subkey.public_bytes()).unwrap();
        Fixture {
            master_public: master.public_key().unwrap(),
            subkey,
            certification,
        }
    }

    #[test]
    fn test_verify_message() {
        let f = fixture();
        let verifier = DelegateVerifier::new(
            &f.master_public,
            &f.subkey.public_bytes(),
            &f.certification,
            MasterVerifyMode::Standard,
        )
        .unwrap();

        let sig = f.subkey.sign_digest(&crypto::digest(b"basic"));
        assert_eq!(verifier.verify(&sig, b"basic"), Ok(true));
        assert_eq!(
            verifier.verify(&sig, b"basics"),
            Err(Error::InvalidMessageSignature)
        );
    }

    #[test]
    fn test_wrong_master_rejected() {
        let f = fixture();
        let other = MasterKeySource::from([6u8; 32]).public_key().unwrap();

        let result = DelegateVerifier::new(
            &other,
            &f.subkey.public_bytes(),
            &f.certification,
            MasterVerifyMode::Standard,
        );
        assert_eq!(result.unwrap_err(), Error::UnverifiableSubkey);
    }

    #[test]
    fn test_swapped_subkey_rejected() {
        let f = fixture();
        let impostor = EphemeralKeyPair::generate();

        let result = DelegateVerifier::new(
            &f.master_public,
            &impostor.public_bytes(),
            &f.certification,
            MasterVerifyMode::Standard,
        );
        assert_eq!(result.unwrap_err(), Error::UnverifiableSubkey);
    }

    #[test]
    fn test_legacy_mode_accepts_valid_certification() {
        let f = fixture();
        let verifier = DelegateVerifier::new(
            &f.master_public,
            &f.subkey.public_bytes(),
            &f.certification,
            MasterVerifyMode::Legacy,
        )
        .unwrap();
        assert_eq!(verifier.mode(), MasterVerifyMode::Legacy);
    }
}
