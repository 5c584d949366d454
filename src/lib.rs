//! # Subkey Core
//!
//! Delegated signing: a long-lived master key certifies a short-lived
//! ephemeral subkey, and the subkey signs application messages. A signature
//! is a single envelope carrying the subkey, its certification, and the
//! message signature.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SUBKEY CORE MODULES                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  caller ──► SubkeyContext                                              │
//! │              │                                                          │
//! │              ├── sign / sign_async                                     │
//! │              │     IdentityCache ──► DelegateSigner ──► Envelope bytes │
//! │              │                                                          │
//! │              └── verify / verify_async / verify_legacy                 │
//! │                    Envelope bytes ──► IdentityCache ──► DelegateVerifier│
//! │                                                        ──► bool         │
//! │                                                                         │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌──────────────┐   │
//! │  │   Crypto    │  │  Envelope   │  │   Signer    │  │   Verifier   │   │
//! │  │             │  │             │  │             │  │              │   │
//! │  │ - Ed25519   │  │ - protobuf  │  │ - subkey    │  │ - cert check │   │
//! │  │ - SHA-224   │  │ - key       │  │ - cert slot │  │ - msg check  │   │
//! │  │ - sealing   │  │ - keysig    │  │ - sync/async│  │              │   │
//! │  │             │  │ - sig       │  │             │  │              │   │
//! │  └─────────────┘  └─────────────┘  └─────────────┘  └──────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error type and classification
//! - [`config`] - Context configuration
//! - [`crypto`] - Hashing, master keys, ephemeral keys, key sealing
//! - [`envelope`] - Wire format of a signature
//! - [`signer`] - Delegate signer and the certification state machine
//! - [`verifier`] - Delegate verifier
//! - [`cache`] - Identity cache of signers and verifiers
//!
//! ## Example
//!
//! ```ignore
//! use subkey_core::{MasterKeySource, SubkeyContext};
//!
//! let ctx = SubkeyContext::default();
//! let master = MasterKeySource::from(seed);
//! let public = master.public_key()?;
//!
//! let signature = ctx.sign(&master, b"basic")?;
//! assert!(ctx.verify(&public, &signature, b"basic"));
//! assert!(!ctx.verify(&public, &signature, b"basics"));
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod cache;
pub mod config;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod signer;
pub mod verifier;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use cache::IdentityCache;
pub use config::SubkeyConfig;
pub use crypto::{seal_master_key, MasterKeySource, MasterVerifyMode};
pub use envelope::Envelope;
pub use error::{Error, ErrorKind, Result};
pub use signer::{CertificationReply, Certifier, DelegateSigner, SignerMode, SignerState};
pub use verifier::DelegateVerifier;

// ============================================================================
// CONTEXT
// ============================================================================

use std::future::Future;

/// Owner of the identity cache and entry point for signing and verifying
///
/// ## Lifecycle
///
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                        CONTEXT LIFECYCLE                                │
/// ├─────────────────────────────────────────────────────────────────────────┤
/// │                                                                         │
/// │  1. SubkeyContext::new(config)        empty cache                      │
/// │            │                                                           │
/// │            ▼                                                           │
/// │  2. sign(master, msg)                 first use per master generates   │
/// │     sign_async(master, msg, cert)     and certifies a subkey; later    │
/// │            │                          uses reuse it                    │
/// │            ▼                                                           │
/// │  3. verify(pub, sig, msg)             first use per certified subkey   │
/// │     verify_async(pub, sig, msg)       checks the certification; later  │
/// │            │                          uses reuse the verifier          │
/// │            ▼                                                           │
/// │  4. clear_keys()                      back to 1; new subkeys follow    │
/// │                                                                         │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Default)]
pub struct SubkeyContext {
    config: SubkeyConfig,
    cache: IdentityCache,
}

impl SubkeyContext {
    /// Create a context with the given configuration
    pub fn new(config: SubkeyConfig) -> Self {
        tracing::debug!(
            "Creating subkey context (legacy verification {})",
            if config.allow_legacy_verification {
                "enabled"
            } else {
                "disabled"
            }
        );
        Self {
            config,
            cache: IdentityCache::new(),
        }
    }

    /// The active configuration
    pub fn config(&self) -> &SubkeyConfig {
        &self.config
    }

    /// Sign a message with the master key's synchronously certified subkey
    pub fn sign(&self, master: &MasterKeySource, message: &[u8]) -> Result<Vec<u8>> {
        self.cache.get_signer(master)?.sign(message)
    }

    /// Sign a message with a subkey certified by an external certifier
    ///
    /// Usage errors are returned immediately. The future resolves once the
    /// certification settles, with the envelope or the certification error.
    /// `certifier` is only invoked the first time a master key is seen.
    ///
    /// ```ignore
    /// let signature = ctx.sign_async(&master, b"basic".to_vec(), &certifier)?.await?;
    /// ```
    pub fn sign_async<C>(
        &self,
        master: &MasterKeySource,
        message: impl Into<Vec<u8>>,
        certifier: &C,
    ) -> Result<impl Future<Output = Result<Vec<u8>>> + Send + 'static>
    where
        C: Certifier + ?Sized,
    {
        let signer = self.cache.get_async_signer(master, certifier)?;
        Ok(signer.sign_async(message.into()))
    }

    /// Check a signature envelope
    ///
    /// Every failure, whether malformed bytes, an uncertified subkey or a bad
    /// message signature, yields `false`.
    pub fn verify(&self, master_public: &[u8], signature: &[u8], message: &[u8]) -> bool {
        self.settle(self.check(
            master_public,
            signature,
            message,
            MasterVerifyMode::Standard,
        ))
    }

    /// Check a signature envelope, delivering the answer through a future
    ///
    /// Same rules as [`verify`](Self::verify); the check runs before this
    /// returns and the future only carries the answer.
    pub fn verify_async(
        &self,
        master_public: &[u8],
        signature: &[u8],
        message: &[u8],
    ) -> impl Future<Output = bool> + Send + 'static {
        futures::future::ready(self.verify(master_public, signature, message))
    }

    /// Check a signature envelope with lenient master verification
    ///
    /// Accepts certifications that only pass RFC 8032 verification, as
    /// produced by older signers. Requires
    /// [`SubkeyConfig::allow_legacy_verification`].
    pub fn verify_legacy(
        &self,
        master_public: &[u8],
        signature: &[u8],
        message: &[u8],
    ) -> Result<bool> {
        if !self.config.allow_legacy_verification {
            return Err(Error::LegacyVerificationDisabled);
        }
        Ok(self.settle(self.check(
            master_public,
            signature,
            message,
            MasterVerifyMode::Legacy,
        )))
    }

    /// Drop every cached signer and verifier
    pub fn clear_keys(&self) {
        self.cache.clear_all();
    }

    fn check(
        &self,
        master_public: &[u8],
        signature: &[u8],
        message: &[u8],
        mode: MasterVerifyMode,
    ) -> Result<bool> {
        let envelope = Envelope::from_bytes(signature)?;
        let verifier = self.cache.get_verifier(master_public, &envelope, mode)?;
        verifier.verify(&envelope.signature, message)
    }

    fn settle(&self, outcome: Result<bool>) -> bool {
        match outcome {
            Ok(valid) => valid,
            Err(e) => {
                if self.config.verbose_logging {
                    tracing::warn!("Rejected signature ({:?}): {}", e.kind(), e);
                } else {
                    tracing::debug!("Rejected signature ({:?}): {}", e.kind(), e);
                }
                false
            }
        }
    }
}

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of Subkey Core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ============================================================================
// TESTS
// ============================================================================
