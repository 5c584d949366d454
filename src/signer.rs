//! # Delegate Signer
//!
//! Owns one ephemeral keypair and the master's certification of it, and
//! turns messages into signature envelopes.
//!
//! ## Certification State Machine
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CERTIFICATION LIFECYCLE                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  SYNC MODE                                                             │
//! │  ─────────                                                              │
//! │  generate keypair ──► MasterSign(subkey) ──► Ready                     │
//! │                       (inside constructor)                              │
//! │                                                                         │
//! │  ASYNC MODE                                                            │
//! │  ──────────                                                             │
//! │  generate keypair ──► Pending ──── certifier replies ────┐             │
//! │                          │                                │             │
//! │                 sign_async() calls                 Ok(cert) / Err(e)    │
//! │                 queue a waiter                            │             │
//! │                          │                 ┌──────────────┴─────┐       │
//! │                          │                 ▼                    ▼       │
//! │                          │              Ready(cert)       Failed(e)     │
//! │                          │                 │                    │       │
//! │                          └──── waiters drained once, in order ──┘       │
//! │                                                                         │
//! │  The outcome is written once. Later sign calls read it directly and    │
//! │  never re-run certification.                                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Sign Paths
//!
//! | State | `sign` | `sign_async` |
//! |-------|--------|--------------|
//! | Ready | envelope | envelope |
//! | Failed | stored error | stored error |
//! | Pending | `CertificationPending` | waits for the outcome |

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::crypto::{self, EphemeralKeyPair, MasterKeySource, PUBLIC_KEY_SIZE};
use crate::envelope::Envelope;
use crate::error::{Error, Result};

// ============================================================================
// CERTIFIER
// ============================================================================

/// An external, possibly slow or remote, master signing function
///
/// `certify` is invoked at most once per signer, right after the signer is
/// cached. It must answer through `reply`, from any thread and at any later
/// time. The reply is consumed when answered, so a certifier cannot answer
/// twice; dropping it unanswered fails the certification.
///
/// ## Example
///
/// ```ignore
/// let certifier = |master: &MasterKeySource, subkey: &[u8], reply: CertificationReply| {
///     let master = master.clone();
///     let subkey = subkey.to_vec();
///     tokio::spawn(async move {
///         reply.resolve(remote_sign(&master, &subkey).await);
///     });
/// };
/// ```
pub trait Certifier: Send + Sync {
    /// Start certifying `subkey` with the master key
    fn certify(&self, master: &MasterKeySource, subkey: &[u8], reply: CertificationReply);
}

impl<F> Certifier for F
where
    F: Fn(&MasterKeySource, &[u8], CertificationReply) + Send + Sync,
{
    fn certify(&self, master: &MasterKeySource, subkey: &[u8], reply: CertificationReply) {
        self(master, subkey, reply)
    }
}

/// One-shot answer channel handed to a [`Certifier`]
pub struct CertificationReply {
    slot: Option<Arc<CertificationSlot>>,
}

impl CertificationReply {
    fn new(slot: Arc<CertificationSlot>) -> Self {
        Self { slot: Some(slot) }
    }

    /// Answer with a certification or a failure
    pub fn resolve<E: std::fmt::Display>(mut self, outcome: std::result::Result<Vec<u8>, E>) {
        if let Some(slot) = self.slot.take() {
            slot.resolve(outcome.map_err(|e| Error::CertificationFailed(e.to_string())));
        }
    }

    /// Answer with a certification
    pub fn succeed(self, certification: Vec<u8>) {
        self.resolve::<Error>(Ok(certification));
    }

    /// Answer with a failure
    pub fn fail(self, reason: impl std::fmt::Display) {
        self.resolve::<String>(Err(reason.to_string()));
    }
}

impl Drop for CertificationReply {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            tracing::warn!("Certifier dropped its reply without answering");
            slot.resolve(Err(Error::CertificationFailed(
                "certifier dropped the reply without answering".into(),
            )));
        }
    }
}

// ============================================================================
// CERTIFICATION SLOT
// ============================================================================

type Waiter = oneshot::Sender<Result<Vec<u8>>>;

enum SlotState {
    Pending(Vec<Waiter>),
    Ready(Vec<u8>),
    Failed(Error),
}

/// Single-assignment cell for the certification outcome
struct CertificationSlot {
    state: Mutex<SlotState>,
}

enum Registration {
    Done(Result<Vec<u8>>),
    Waiting(oneshot::Receiver<Result<Vec<u8>>>),
}

impl CertificationSlot {
    fn ready(certification: Vec<u8>) -> Self {
        Self {
            state: Mutex::new(SlotState::Ready(certification)),
        }
    }

    fn pending() -> Self {
        Self {
            state: Mutex::new(SlotState::Pending(Vec::new())),
        }
    }

    /// Current outcome, if any
    fn peek(&self) -> Option<Result<Vec<u8>>> {
        match &*self.state.lock() {
            SlotState::Pending(_) => None,
            SlotState::Ready(certification) => Some(Ok(certification.clone())),
            SlotState::Failed(err) => Some(Err(err.clone())),
        }
    }

    /// Read the outcome now, or queue a waiter behind the pending ones
    fn register(&self) -> Registration {
        match &mut *self.state.lock() {
            SlotState::Pending(waiters) => {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                Registration::Waiting(rx)
            }
            SlotState::Ready(certification) => Registration::Done(Ok(certification.clone())),
            SlotState::Failed(err) => Registration::Done(Err(err.clone())),
        }
    }

    fn resolve(&self, outcome: Result<Vec<u8>>) {
        let outcome = match outcome {
            Ok(certification) if certification.is_empty() => Err(Error::CertificationFailed(
                "certifier returned an empty certification".into(),
            )),
            other => other,
        };

        let waiters = {
            let mut state = self.state.lock();
            let waiters = match &mut *state {
                SlotState::Pending(waiters) => std::mem::take(waiters),
                _ => {
                    tracing::warn!("Ignoring certification outcome for an already settled signer");
                    return;
                }
            };
            *state = match &outcome {
                Ok(certification) => SlotState::Ready(certification.clone()),
                Err(err) => SlotState::Failed(err.clone()),
            };
            waiters
        };

        match &outcome {
            Ok(_) => tracing::debug!("Certification ready, waking {} waiter(s)", waiters.len()),
            Err(e) => tracing::warn!("Certification failed, waking {} waiter(s): {}", waiters.len(), e),
        }

        for waiter in waiters {
            // The receiving future may have been dropped; nothing to notify then.
            let _ = waiter.send(outcome.clone());
        }
    }
}

// ============================================================================
// DELEGATE SIGNER
// ============================================================================

/// How a signer obtains its certification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerMode {
    /// Certified in the constructor with the in-memory master key
    Sync,
    /// Certified by an external [`Certifier`]
    Async,
}

/// Observable certification state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerState {
    /// Waiting for the certifier
    Pending,
    /// Certified, ready to sign
    Ready,
    /// Certification failed with the stored error
    Failed(Error),
}

/// Ephemeral signer certified by a master key
pub struct DelegateSigner {
    keypair: EphemeralKeyPair,
    subkey: [u8; PUBLIC_KEY_SIZE],
    slot: Arc<CertificationSlot>,
    mode: SignerMode,
}

impl DelegateSigner {
    /// Generate a subkey and certify it immediately with the master key
    pub(crate) fn certified(master: &MasterKeySource) -> Result<Self> {
        let keypair = EphemeralKeyPair::generate();
        let subkey = keypair.public_bytes();
        let certification = crypto::certify(master, &subkey)?;

        Ok(Self {
            keypair,
            subkey,
            slot: Arc::new(CertificationSlot::ready(certification)),
            mode: SignerMode::Sync,
        })
    }

    /// Generate a subkey whose certification is still to be requested
    pub(crate) fn uncertified() -> Self {
        let keypair = EphemeralKeyPair::generate();
        let subkey = keypair.public_bytes();

        Self {
            keypair,
            subkey,
            slot: Arc::new(CertificationSlot::pending()),
            mode: SignerMode::Async,
        }
    }

    /// Hand the subkey to the certifier
    ///
    /// The certifier may answer before this returns; waiters registered
    /// afterwards then see the settled outcome.
    pub(crate) fn request_certification<C>(&self, master: &MasterKeySource, certifier: &C)
    where
        C: Certifier + ?Sized,
    {
        let reply = CertificationReply::new(Arc::clone(&self.slot));
        certifier.certify(master, &self.subkey, reply);
    }

    /// The ephemeral public key embedded in every envelope
    pub fn subkey_public(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.subkey
    }

    /// How this signer is certified
    pub fn mode(&self) -> SignerMode {
        self.mode
    }

    /// Current certification state
    pub fn state(&self) -> SignerState {
        match self.slot.peek() {
            None => SignerState::Pending,
            Some(Ok(_)) => SignerState::Ready,
            Some(Err(err)) => SignerState::Failed(err),
        }
    }

    /// Sign a message synchronously
    ///
    /// Fails with [`Error::CertificationPending`] while an asynchronous
    /// certification is outstanding.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        match self.slot.peek() {
            Some(Ok(certification)) => Ok(self.seal(certification, message)),
            Some(Err(err)) => Err(err),
            None => Err(Error::CertificationPending),
        }
    }

    /// Sign a message once certification settles
    ///
    /// Interest is registered when this is called, not when the future is
    /// first polled, so pending requests settle in call order.
    pub fn sign_async(
        self: &Arc<Self>,
        message: Vec<u8>,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send + 'static {
        let registration = self.slot.register();
        let signer = Arc::clone(self);

        async move {
            let certification = match registration {
                Registration::Done(outcome) => outcome?,
                Registration::Waiting(rx) => rx.await.map_err(|_| {
                    Error::Internal("certification slot closed without an outcome".into())
                })??,
            };
            Ok(signer.seal(certification, &message))
        }
    }

    fn seal(&self, certification: Vec<u8>, message: &[u8]) -> Vec<u8> {
        let signature = self.keypair.sign_digest(&crypto::digest(message));
        Envelope::new(self.subkey.to_vec(), certification, signature.to_vec()).to_bytes()
    }
}

impl std::fmt::Debug for DelegateSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegateSigner")
            .field("subkey", &hex::encode(self.subkey))
            .field("mode", &self.mode)
            .field("state", &self.state())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{verify_certification, MasterVerifyMode};

    const SEED: [u8; 32] = [3u8; 32];

    fn master() -> MasterKeySource {
        MasterKeySource::from(SEED)
    }

    #[test]
    fn test_sync_signer_is_ready() {
        let signer = DelegateSigner::certified(&master()).unwrap();
        assert_eq!(signer.mode(), SignerMode::Sync);
        assert_eq!(signer.state(), SignerState::Ready);
    }

    #[test]
    fn test_envelope_contents() {
        let master = master();
        let signer = DelegateSigner::certified(&master).unwrap();
        let envelope = Envelope::from_bytes(&signer.sign(b"hello").unwrap()).unwrap();

        assert_eq!(envelope.subkey, signer.subkey_public().to_vec());
        assert!(verify_certification(
            &master.public_key().unwrap(),
            &envelope.certification,
            &envelope.subkey,
            MasterVerifyMode::Standard,
        )
        .is_ok());
    }

    #[test]
    fn test_fresh_subkey_per_signer() {
        let a = DelegateSigner::certified(&master()).unwrap();
        let b = DelegateSigner::certified(&master()).unwrap();
        assert_ne!(a.subkey_public(), b.subkey_public());
    }

    #[test]
    fn test_bad_master_fails_construction() {
        let bad = MasterKeySource::from(&b"short"[..]);
        assert!(matches!(
            DelegateSigner::certified(&bad),
            Err(Error::InvalidMasterKey(_))
        ));
    }

    #[test]
    fn test_sync_sign_while_pending_is_rejected() {
        let signer = DelegateSigner::uncertified();
        assert_eq!(signer.state(), SignerState::Pending);
        assert_eq!(signer.sign(b"early"), Err(Error::CertificationPending));
    }

    #[tokio::test]
    async fn test_waiters_receive_certification() {
        let master = master();
        let signer = Arc::new(DelegateSigner::uncertified());

        let held: Arc<Mutex<Option<CertificationReply>>> = Arc::new(Mutex::new(None));
        let stash = Arc::clone(&held);
        signer.request_certification(
            &master,
            &move |_: &MasterKeySource, _: &[u8], reply: CertificationReply| {
                *stash.lock() = Some(reply);
            },
        );

        let first = signer.sign_async(b"one".to_vec());
        let second = signer.sign_async(b"two".to_vec());
        assert_eq!(signer.state(), SignerState::Pending);

        let certification = crypto::certify(&master, signer.subkey_public()).unwrap();
        held.lock().take().unwrap().succeed(certification.clone());

        for envelope in [first.await.unwrap(), second.await.unwrap()] {
            let envelope = Envelope::from_bytes(&envelope).unwrap();
            assert_eq!(envelope.certification, certification);
        }
        assert_eq!(signer.state(), SignerState::Ready);
        assert!(signer.sign(b"three").is_ok());
    }

    #[tokio::test]
    async fn test_failure_reaches_every_waiter() {
        let signer = Arc::new(DelegateSigner::uncertified());

        let held: Arc<Mutex<Option<CertificationReply>>> = Arc::new(Mutex::new(None));
        let stash = Arc::clone(&held);
        signer.request_certification(
            &master(),
            &move |_: &MasterKeySource, _: &[u8], reply: CertificationReply| {
                *stash.lock() = Some(reply);
            },
        );

        let before = signer.sign_async(b"before".to_vec());
        held.lock().take().unwrap().fail("hsm offline");
        let after = signer.sign_async(b"after".to_vec());

        let expected = Error::CertificationFailed("hsm offline".into());
        assert_eq!(before.await, Err(expected.clone()));
        assert_eq!(after.await, Err(expected.clone()));
        assert_eq!(signer.sign(b"sync"), Err(expected.clone()));
        assert_eq!(signer.state(), SignerState::Failed(expected));
    }

    #[tokio::test]
    async fn test_dropped_reply_fails_certification() {
        let signer = Arc::new(DelegateSigner::uncertified());
        signer.request_certification(
            &master(),
            &|_: &MasterKeySource, _: &[u8], _reply: CertificationReply| {},
        );

        assert!(matches!(
            signer.sign_async(b"msg".to_vec()).await,
            Err(Error::CertificationFailed(_))
        ));
    }

    #[test]
    fn test_empty_certification_is_failure() {
        let signer = Arc::new(DelegateSigner::uncertified());
        signer.request_certification(
            &master(),
            &|_: &MasterKeySource, _: &[u8], reply: CertificationReply| reply.succeed(Vec::new()),
        );

        assert!(matches!(
            signer.state(),
            SignerState::Failed(Error::CertificationFailed(_))
        ));
    }

    /// Waker that logs its id when woken
    struct WakeLog {
        id: usize,
        log: Arc<Mutex<Vec<usize>>>,
    }

    impl futures::task::ArcWake for WakeLog {
        fn wake_by_ref(arc_self: &Arc<Self>) {
            arc_self.log.lock().push(arc_self.id);
        }
    }

    #[test]
    fn test_waiters_woken_in_registration_order() {
        use futures::FutureExt;
        use std::task::{Context, Poll};

        let slot = CertificationSlot::pending();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut receivers = Vec::new();
        for id in 0..5 {
            let mut rx = match slot.register() {
                Registration::Waiting(rx) => rx,
                Registration::Done(_) => panic!("slot settled early"),
            };
            let waker = futures::task::waker(Arc::new(WakeLog {
                id,
                log: Arc::clone(&log),
            }));
            assert!(rx.poll_unpin(&mut Context::from_waker(&waker)).is_pending());
            receivers.push(rx);
        }
        assert!(log.lock().is_empty());

        slot.resolve(Ok(vec![7; 64]));
        assert_eq!(*log.lock(), vec![0, 1, 2, 3, 4]);

        let waker = futures::task::noop_waker();
        for mut rx in receivers {
            match rx.poll_unpin(&mut Context::from_waker(&waker)) {
                Poll::Ready(Ok(Ok(cert))) => assert_eq!(cert, vec![7; 64]),
                _ => panic!("waiter did not receive the certification"),
            }
        }
    }

    #[test]
    fn test_pending_signs_registered_at_call_time() {
        let signer = Arc::new(DelegateSigner::uncertified());
        let first = signer.sign_async(b"one".to_vec());
        let second = signer.sign_async(b"two".to_vec());

        match &*signer.slot.state.lock() {
            SlotState::Pending(waiters) => assert_eq!(waiters.len(), 2),
            _ => panic!("slot settled early"),
        }
        drop((first, second));
    }

    #[test]
    fn test_second_outcome_ignored() {
        let slot = Arc::new(CertificationSlot::pending());
        slot.resolve(Ok(vec![1, 2, 3]));
        slot.resolve(Err(Error::CertificationFailed("late".into())));
        assert_eq!(slot.peek(), Some(Ok(vec![1, 2, 3])));
    }
}
