//! # Identity Cache
//!
//! Maps key identities to delegate signers and verifiers so that each master
//! key gets at most one subkey per mode.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         IDENTITY CACHE                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  signers                                                               │
//! │    SHA-224(master payload)            ──► DelegateSigner (sync)        │
//! │    SHA-224(master payload) ":async"   ──► DelegateSigner (async)       │
//! │                                                                         │
//! │  verifiers                                                             │
//! │    fingerprint(master pub, subkey, cert)          ──► DelegateVerifier │
//! │    fingerprint(master pub, subkey, cert) ":legacy" ──► DelegateVerifier│
//! │                                                                         │
//! │  Parts are length-framed before hashing: shifting bytes between the    │
//! │  public key, subkey and certification never reaches a cached verifier. │
//! │                                                                         │
//! │  Inserts happen under the write lock after a second lookup, so two     │
//! │  racing callers still construct only one instance.                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::crypto::{self, MasterKeySource, MasterVerifyMode};
use crate::envelope::Envelope;
use crate::error::Result;
use crate::signer::{Certifier, DelegateSigner};
use crate::verifier::DelegateVerifier;

const ASYNC_SUFFIX: &str = ":async";
const LEGACY_SUFFIX: &str = ":legacy";

/// Identity-keyed store of delegate signers and verifiers
#[derive(Default)]
pub struct IdentityCache {
    signers: RwLock<HashMap<String, Arc<DelegateSigner>>>,
    verifiers: RwLock<HashMap<String, Arc<DelegateVerifier>>>,
}

impl IdentityCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the synchronously certified signer for a master key
    ///
    /// The first call generates and certifies a subkey; a failure there is
    /// returned and nothing is cached.
    pub fn get_signer(&self, master: &MasterKeySource) -> Result<Arc<DelegateSigner>> {
        master.validate()?;
        let id = crypto::fingerprint(&[master.payload()]);

        if let Some(signer) = self.signers.read().get(&id) {
            return Ok(Arc::clone(signer));
        }

        let mut signers = self.signers.write();
        if let Some(signer) = signers.get(&id) {
            return Ok(Arc::clone(signer));
        }

        let signer = Arc::new(DelegateSigner::certified(master)?);
        tracing::debug!(
            "Created signer {} for master {}",
            hex::encode(signer.subkey_public()),
            id
        );
        signers.insert(id, Arc::clone(&signer));
        Ok(signer)
    }

    /// Get the externally certified signer for a master key
    ///
    /// The first call caches a pending signer and then hands its subkey to
    /// `certifier`. Later calls return that signer whatever its state,
    /// without contacting the certifier again.
    pub fn get_async_signer<C>(
        &self,
        master: &MasterKeySource,
        certifier: &C,
    ) -> Result<Arc<DelegateSigner>>
    where
        C: Certifier + ?Sized,
    {
        master.validate()?;
        let id = crypto::fingerprint(&[master.payload()]) + ASYNC_SUFFIX;

        if let Some(signer) = self.signers.read().get(&id) {
            return Ok(Arc::clone(signer));
        }

        let signer = {
            let mut signers = self.signers.write();
            if let Some(signer) = signers.get(&id) {
                return Ok(Arc::clone(signer));
            }
            let signer = Arc::new(DelegateSigner::uncertified());
            signers.insert(id.clone(), Arc::clone(&signer));
            signer
        };

        // Outside the lock: the certifier may answer inline.
        tracing::debug!(
            "Requesting certification of {} for master {}",
            hex::encode(signer.subkey_public()),
            id
        );
        signer.request_certification(master, certifier);
        Ok(signer)
    }

    /// Get the verifier for an envelope's certified subkey
    ///
    /// A certification that does not verify is returned as an error and not
    /// cached, so a retry checks it again.
    pub fn get_verifier(
        &self,
        master_public: &[u8],
        envelope: &Envelope,
        mode: MasterVerifyMode,
    ) -> Result<Arc<DelegateVerifier>> {
        let mut id = crypto::fingerprint(&[
            master_public,
            envelope.subkey.as_slice(),
            envelope.certification.as_slice(),
        ]);
        if mode == MasterVerifyMode::Legacy {
            id.push_str(LEGACY_SUFFIX);
        }

        if let Some(verifier) = self.verifiers.read().get(&id) {
            return Ok(Arc::clone(verifier));
        }

        let mut verifiers = self.verifiers.write();
        if let Some(verifier) = verifiers.get(&id) {
            return Ok(Arc::clone(verifier));
        }

        let verifier = Arc::new(DelegateVerifier::new(
            master_public,
            &envelope.subkey,
            &envelope.certification,
            mode,
        )?);
        verifiers.insert(id, Arc::clone(&verifier));
        Ok(verifier)
    }

    /// Drop every cached signer and verifier
    ///
    /// Signers created afterwards generate new subkeys.
    pub fn clear_all(&self) {
        // Both write locks are held together so no lookup sees one map
        // cleared and the other still populated. Lock order: signers, then
        // verifiers; no other path holds both.
        let mut signer_map = self.signers.write();
        let mut verifier_map = self.verifiers.write();
        let signers = std::mem::take(&mut *signer_map);
        let verifiers = std::mem::take(&mut *verifier_map);
        drop(verifier_map);
        drop(signer_map);
        tracing::info!(
            "Cleared {} signer(s) and {} verifier(s)",
            signers.len(),
            verifiers.len()
        );
    }

    /// Number of cached signers
    pub fn signer_count(&self) -> usize {
        self.signers.read().len()
    }

    /// Number of cached verifiers
    pub fn verifier_count(&self) -> usize {
        self.verifiers.read().len()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::signer::{CertificationReply, SignerMode, SignerState};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn master() -> MasterKeySource {
        MasterKeySource::from([11u8; 32])
    }

    fn inline_certifier(master: &MasterKeySource, subkey: &[u8], reply: CertificationReply) {
        reply.resolve(crypto::certify(master, subkey));
    }

    #[test]
    fn test_signer_reused() {
        let cache = IdentityCache::new();
        let a = cache.get_signer(&master()).unwrap();
        let b = cache.get_signer(&master()).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.signer_count(), 1);
    }

    #[test]
    fn test_passphrase_not_part_of_identity() {
        let cache = IdentityCache::new();
        let sealed = crypto::seal_master_key(&[11u8; 32], "password").unwrap();

        let a = cache
            .get_signer(&MasterKeySource::with_passphrase(sealed.clone(), "password"))
            .unwrap();
        // Same payload, wrong passphrase: identity matches, so the cached
        // signer is returned without unsealing again.
        let b = cache
            .get_signer(&MasterKeySource::with_passphrase(sealed, "wrong"))
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_sync_and_async_signers_are_distinct() {
        let cache = IdentityCache::new();
        let sync = cache.get_signer(&master()).unwrap();
        let async_signer = cache.get_async_signer(&master(), &inline_certifier).unwrap();

        assert!(!Arc::ptr_eq(&sync, &async_signer));
        assert_eq!(sync.mode(), SignerMode::Sync);
        assert_eq!(async_signer.mode(), SignerMode::Async);
        assert_eq!(cache.signer_count(), 2);
    }

    #[test]
    fn test_certifier_invoked_once() {
        let cache = IdentityCache::new();
        let calls = AtomicUsize::new(0);
        let certifier = |_: &MasterKeySource, _: &[u8], reply: CertificationReply| {
            calls.fetch_add(1, Ordering::SeqCst);
            reply.fail("unreachable");
        };

        let a = cache.get_async_signer(&master(), &certifier).unwrap();
        let b = cache.get_async_signer(&master(), &certifier).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(b.state(), SignerState::Failed(_)));
    }

    #[test]
    fn test_failed_sync_signer_not_cached() {
        let cache = IdentityCache::new();
        let bad = MasterKeySource::from(&b"not a key"[..]);

        assert!(cache.get_signer(&bad).is_err());
        assert_eq!(cache.signer_count(), 0);
    }

    #[test]
    fn test_empty_master_rejected_before_lookup() {
        let cache = IdentityCache::new();
        let empty = MasterKeySource::Raw(Vec::new());

        assert!(matches!(
            cache.get_async_signer(&empty, &inline_certifier),
            Err(Error::InvalidMasterKey(_))
        ));
        assert_eq!(cache.signer_count(), 0);
    }

    #[test]
    fn test_verifier_cached_per_mode() {
        let cache = IdentityCache::new();
        let master = master();
        let signer = cache.get_signer(&master).unwrap();
        let envelope = Envelope::from_bytes(&signer.sign(b"msg").unwrap()).unwrap();
        let public = master.public_key().unwrap();

        let a = cache
            .get_verifier(&public, &envelope, MasterVerifyMode::Standard)
            .unwrap();
        let b = cache
            .get_verifier(&public, &envelope, MasterVerifyMode::Standard)
            .unwrap();
        let legacy = cache
            .get_verifier(&public, &envelope, MasterVerifyMode::Legacy)
            .unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &legacy));
        assert_eq!(cache.verifier_count(), 2);
    }

    #[test]
    fn test_unverifiable_subkey_not_cached() {
        let cache = IdentityCache::new();
        let signer = cache.get_signer(&master()).unwrap();
        let envelope = Envelope::from_bytes(&signer.sign(b"msg").unwrap()).unwrap();
        let stranger = MasterKeySource::from([12u8; 32]).public_key().unwrap();

        for _ in 0..2 {
            assert_eq!(
                cache
                    .get_verifier(&stranger, &envelope, MasterVerifyMode::Standard)
                    .unwrap_err(),
                Error::UnverifiableSubkey
            );
        }
        assert_eq!(cache.verifier_count(), 0);
    }

    #[test]
    fn test_shifted_fields_miss_cached_verifier() {
        let cache = IdentityCache::new();
        let master = master();
        let public = master.public_key().unwrap();
        let signer = cache.get_signer(&master).unwrap();
        let envelope = Envelope::from_bytes(&signer.sign(b"msg").unwrap()).unwrap();
        cache
            .get_verifier(&public, &envelope, MasterVerifyMode::Standard)
            .unwrap();

        // One subkey byte moved onto the end of the public key.
        let mut long_public = public.to_vec();
        long_public.push(envelope.subkey[0]);
        let short_subkey = Envelope::new(
            envelope.subkey[1..].to_vec(),
            envelope.certification.clone(),
            envelope.signature.clone(),
        );
        assert!(cache
            .get_verifier(&long_public, &short_subkey, MasterVerifyMode::Standard)
            .is_err());

        // One certification byte moved onto the end of the subkey.
        let mut long_subkey = envelope.subkey.clone();
        long_subkey.push(envelope.certification[0]);
        let short_cert = Envelope::new(
            long_subkey,
            envelope.certification[1..].to_vec(),
            envelope.signature.clone(),
        );
        assert!(cache
            .get_verifier(&public, &short_cert, MasterVerifyMode::Standard)
            .is_err());

        assert_eq!(cache.verifier_count(), 1);
    }

    #[test]
    fn test_clear_all_empties_both_maps() {
        let cache = IdentityCache::new();
        let master = master();
        let signer = cache.get_signer(&master).unwrap();
        let envelope = Envelope::from_bytes(&signer.sign(b"msg").unwrap()).unwrap();
        cache
            .get_verifier(&master.public_key().unwrap(), &envelope, MasterVerifyMode::Standard)
            .unwrap();
        assert_eq!((cache.signer_count(), cache.verifier_count()), (1, 1));

        cache.clear_all();
        assert_eq!((cache.signer_count(), cache.verifier_count()), (0, 0));
    }

    #[test]
    fn test_clear_all_rotates_subkeys() {
        let cache = IdentityCache::new();
        let before = *cache.get_signer(&master()).unwrap().subkey_public();

        cache.clear_all();
        assert_eq!(cache.signer_count(), 0);

        let after = *cache.get_signer(&master()).unwrap().subkey_public();
        assert_ne!(before, after);
    }
}
