//! # Error Handling
//!
//! This module provides the error type shared by every layer of the crate.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Usage Errors                                                      │
//! │  │   ├── InvalidMasterKey      - Master key payload unusable           │
//! │  │   ├── InvalidPublicKey      - Master public key unusable            │
//! │  │   ├── LegacyVerificationDisabled - Legacy mode not opted into      │
//! │  │   └── InvalidConfig         - Configuration could not be parsed     │
//! │  │                                                                      │
//! │  ├── Decode Errors                                                     │
//! │  │   ├── MalformedEnvelope     - Envelope bytes are not a record       │
//! │  │   └── MissingEnvelopeField  - Required field absent or empty        │
//! │  │                                                                      │
//! │  ├── Certification Errors                                              │
//! │  │   ├── SigningFailed         - Master signing failed                 │
//! │  │   ├── CertificationFailed   - External certifier reported failure   │
//! │  │   ├── CertificationPending  - Sync sign on a pending async signer   │
//! │  │   ├── UnverifiableSubkey    - Certification does not verify         │
//! │  │   └── InvalidPassphrase     - Sealed master key did not open        │
//! │  │                                                                      │
//! │  ├── Message Errors                                                    │
//! │  │   └── InvalidMessageSignature - Subkey signature does not verify    │
//! │  │                                                                      │
//! │  └── Internal Errors                                                   │
//! │      └── Internal              - Invariant broken                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Propagation
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      ERROR HANDLING FLOW                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Signer / Verifier         Entry point                 Caller          │
//! │  ──────────────────────────────────────────────────────────────────     │
//! │                                                                         │
//! │  sign paths:   Result<T, Error>  ─────────────────►  Err(Error)        │
//! │  verify paths: Result<T, Error>  ──► collapse ────►  false             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for subkey operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
///
/// Errors are `Clone` because a failed asynchronous certification is stored
/// once and handed to every signing request made against that signer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ========================================================================
    // Usage Errors (100-199)
    // ========================================================================

    /// The master key payload is empty or not a usable secret key
    #[error("Invalid master key: {0}")]
    InvalidMasterKey(String),

    /// The master public key is not a usable verification key
    #[error("Invalid master public key: {0}")]
    InvalidPublicKey(String),

    /// Legacy verification was requested without opting into it
    #[error("Legacy verification is disabled. Enable it with SubkeyConfig::with_legacy_verification().")]
    LegacyVerificationDisabled,

    /// Configuration could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ========================================================================
    // Decode Errors (200-299)
    // ========================================================================

    /// Envelope bytes are not a well-formed record
    #[error("Malformed signature envelope: {0}")]
    MalformedEnvelope(String),

    /// A required envelope field is absent or empty
    #[error("Signature envelope is missing required field `{0}`")]
    MissingEnvelopeField(&'static str),

    // ========================================================================
    // Certification Errors (300-399)
    // ========================================================================

    /// Producing the master certification failed
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// The external certifier reported an error
    #[error("Certification failed: {0}")]
    CertificationFailed(String),

    /// A synchronous sign was issued while asynchronous certification is pending
    #[error("Certification is still pending. Use sign_async() for asynchronously certified keys.")]
    CertificationPending,

    /// The certification does not verify against the master public key
    #[error("Unable to verify derived key")]
    UnverifiableSubkey,

    /// The passphrase does not open the sealed master key
    #[error("Invalid passphrase for sealed master key")]
    InvalidPassphrase,

    // ========================================================================
    // Message Errors (400-499)
    // ========================================================================

    /// The subkey signature does not verify against the message
    #[error("Unable to verify message")]
    InvalidMessageSignature,

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller passed something unusable
    Usage,
    /// Envelope bytes could not be decoded
    Decode,
    /// The master certification could not be produced or checked
    Certification,
    /// The message signature did not verify
    MessageSignature,
    /// Broken invariant
    Internal,
}

impl Error {
    /// Get the numeric error code
    ///
    /// Error codes are organized by category:
    /// - 100-199: Usage
    /// - 200-299: Envelope decoding
    /// - 300-399: Certification
    /// - 400-499: Message signatures
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            // Usage (100-199)
            Error::InvalidMasterKey(_) => 100,
            Error::InvalidPublicKey(_) => 101,
            Error::LegacyVerificationDisabled => 102,
            Error::InvalidConfig(_) => 103,

            // Decode (200-299)
            Error::MalformedEnvelope(_) => 200,
            Error::MissingEnvelopeField(_) => 201,

            // Certification (300-399)
            Error::SigningFailed(_) => 300,
            Error::CertificationFailed(_) => 301,
            Error::CertificationPending => 302,
            Error::UnverifiableSubkey => 303,
            Error::InvalidPassphrase => 304,

            // Message (400-499)
            Error::InvalidMessageSignature => 400,

            // Internal (900-999)
            Error::Internal(_) => 900,
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self.code() {
            100..=199 => ErrorKind::Usage,
            200..=299 => ErrorKind::Decode,
            300..=399 => ErrorKind::Certification,
            400..=499 => ErrorKind::MessageSignature,
            _ => ErrorKind::Internal,
        }
    }

    /// Check if retrying the same call later can succeed
    ///
    /// Only a pending certification qualifies: every other outcome is durable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::CertificationPending)
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<prost::DecodeError> for Error {
    fn from(err: prost::DecodeError) -> Self {
        Error::MalformedEnvelope(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::InvalidMasterKey("test".into()).code(), 100);
        assert_eq!(Error::MalformedEnvelope("test".into()).code(), 200);
        assert_eq!(Error::CertificationFailed("test".into()).code(), 301);
        assert_eq!(Error::InvalidMessageSignature.code(), 400);
        assert_eq!(Error::Internal("test".into()).code(), 900);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::LegacyVerificationDisabled.kind(), ErrorKind::Usage);
        assert_eq!(Error::MissingEnvelopeField("key").kind(), ErrorKind::Decode);
        assert_eq!(Error::UnverifiableSubkey.kind(), ErrorKind::Certification);
        assert_eq!(
            Error::InvalidMessageSignature.kind(),
            ErrorKind::MessageSignature
        );
        assert_eq!(
            Error::Internal("x".into()).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(Error::CertificationPending.is_recoverable());
        assert!(!Error::CertificationFailed("offline".into()).is_recoverable());
        assert!(!Error::InvalidMessageSignature.is_recoverable());
    }

    #[test]
    fn test_decode_error_conversion() {
        let err: Error = prost::DecodeError::new("truncated").into();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(err.to_string().contains("truncated"));
    }
}
