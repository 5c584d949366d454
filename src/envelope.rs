//! # Signature Envelope
//!
//! The opaque blob handed to callers as "the signature".
//!
//! ## Wire Format
//!
//! A protobuf record, field order fixed:
//!
//! ```text
//! message sig {
//!   required bytes key = 1;     // ephemeral (subkey) public key
//!   required bytes keysig = 2;  // master certification of `key`
//!   required bytes sig = 3;     // subkey signature over SHA-224(message)
//! }
//! ```
//!
//! Decoding fails with a structured error when the bytes are corrupt or a
//! field is absent. An empty field counts as absent.

use prost::Message;

use crate::error::{Error, Result};

/// Decoded signature envelope
#[derive(Clone, PartialEq, Message)]
pub struct Envelope {
    /// Ephemeral public key
    #[prost(bytes = "vec", required, tag = "1")]
    pub subkey: Vec<u8>,
    /// Master certification of `subkey`
    #[prost(bytes = "vec", required, tag = "2")]
    pub certification: Vec<u8>,
    /// Ephemeral signature over the message digest
    #[prost(bytes = "vec", required, tag = "3")]
    pub signature: Vec<u8>,
}

impl Envelope {
    /// Assemble an envelope
    pub fn new(subkey: Vec<u8>, certification: Vec<u8>, signature: Vec<u8>) -> Self {
        Self {
            subkey,
            certification,
            signature,
        }
    }

    /// Encode to wire bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    /// Decode from wire bytes, enforcing that every field is present
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let envelope = Self::decode(bytes)?;
        envelope.check_fields()?;
        Ok(envelope)
    }

    fn check_fields(&self) -> Result<()> {
        if self.subkey.is_empty() {
            return Err(Error::MissingEnvelopeField("key"));
        }
        if self.certification.is_empty() {
            return Err(Error::MissingEnvelopeField("keysig"));
        }
        if self.signature.is_empty() {
            return Err(Error::MissingEnvelopeField("sig"));
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Envelope {
        Envelope::new(vec![1; 32], vec![2; 64], vec![3; 64])
    }

    #[test]
    fn test_decode_encoded() {
        let envelope = sample();
        let decoded = Envelope::from_bytes(&envelope.to_bytes()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_field_tags_on_the_wire() {
        let bytes = Envelope::new(vec![0xaa], vec![0xbb], vec![0xcc]).to_bytes();
        // (tag << 3) | wire type 2, length 1, payload
        assert_eq!(bytes, vec![0x0a, 1, 0xaa, 0x12, 1, 0xbb, 0x1a, 1, 0xcc]);
    }

    #[test]
    fn test_missing_field_rejected() {
        let mut envelope = sample();
        envelope.certification.clear();
        assert_eq!(
            Envelope::from_bytes(&envelope.to_bytes()),
            Err(Error::MissingEnvelopeField("keysig"))
        );
    }

    #[test]
    fn test_empty_input_rejected() {
        assert_eq!(
            Envelope::from_bytes(&[]),
            Err(Error::MissingEnvelopeField("key"))
        );
    }

    #[test]
    fn test_corrupt_input_rejected() {
        let mut bytes = sample().to_bytes();
        bytes.truncate(bytes.len() - 10);
        assert!(matches!(
            Envelope::from_bytes(&bytes),
            Err(Error::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(Envelope::from_bytes(b"not an envelope at all").is_err());
    }
}
