//! Envelope submission (SEND_CRYPT_ENVELOPE / RESP_CRYPT_ENVELOPE).

use bmail_crypto::Hash;
use bytes::{Buf, BytesMut};

use crate::codec::{get_hash, get_signature, put_hash, put_signature, Pack, Unpack};
use crate::envelope::CryptEnvelope;
use crate::error::{FieldContext, WireError};
use crate::header::MsgType;
use crate::message::WireMessage;
use crate::types::{ErrorCode, SerialNumber};

/// Sealed envelope submission, signed over the current serial number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeSyn {
    /// Serial number being consumed
    pub sn: SerialNumber,
    /// Sender's signature over `sn`
    pub sig: Vec<u8>,
    /// SHA-256 of the packed envelope
    pub hash: Hash,
    /// The sealed envelope
    pub envelope: CryptEnvelope,
}

impl EnvelopeSyn {
    /// Build a submission, computing the envelope hash
    pub fn new(sn: SerialNumber, sig: Vec<u8>, envelope: CryptEnvelope) -> Result<Self, WireError> {
        let hash = envelope.hash()?;
        Ok(Self {
            sn,
            sig,
            hash,
            envelope,
        })
    }
}

impl WireMessage for EnvelopeSyn {
    fn msg_type(&self) -> MsgType {
        MsgType::SendCryptEnvelope
    }

    fn accepts(msg_type: MsgType) -> bool {
        msg_type == MsgType::SendCryptEnvelope
    }

    fn pack_payload(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        self.sn.pack(buf)?;
        put_signature(buf, &self.sig)?;
        put_hash(buf, &self.hash)?;
        self.envelope.pack(buf)
    }

    fn unpack_payload<B: Buf>(_msg_type: MsgType, buf: &mut B) -> Result<Self, WireError> {
        Ok(Self {
            sn: SerialNumber::unpack(buf).field("sn")?,
            sig: get_signature(buf).field("sig")?,
            hash: get_hash(buf).field("hash")?,
            envelope: CryptEnvelope::unpack(buf).field("envelope")?,
        })
    }
}

/// Server reply to an envelope submission.
///
/// `sn` echoes the serial number just consumed; `next_sn` is the only one
/// the server will accept next. `sig` is the server's signature over `hash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeAck {
    /// Serial number consumed by the request
    pub sn: SerialNumber,
    /// Serial number for the next request
    pub next_sn: SerialNumber,
    /// Hash of the submitted envelope
    pub hash: Hash,
    /// Server signature over `hash`
    pub sig: Vec<u8>,
    /// Outcome of the submission
    pub error_code: ErrorCode,
}

impl WireMessage for EnvelopeAck {
    fn msg_type(&self) -> MsgType {
        MsgType::RespCryptEnvelope
    }

    fn accepts(msg_type: MsgType) -> bool {
        msg_type == MsgType::RespCryptEnvelope
    }

    fn pack_payload(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        self.sn.pack(buf)?;
        self.next_sn.pack(buf)?;
        put_hash(buf, &self.hash)?;
        put_signature(buf, &self.sig)?;
        self.error_code.pack(buf)
    }

    fn unpack_payload<B: Buf>(_msg_type: MsgType, buf: &mut B) -> Result<Self, WireError> {
        Ok(Self {
            sn: SerialNumber::unpack(buf).field("sn")?,
            next_sn: SerialNumber::unpack(buf).field("next_sn")?,
            hash: get_hash(buf).field("hash")?,
            sig: get_signature(buf).field("sig")?,
            error_code: ErrorCode::unpack(buf).field("error_code")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::tests::sample_envelope;

    #[test]
    fn test_envelope_syn_roundtrip() {
        let syn = EnvelopeSyn::new(SerialNumber::random(), vec![9u8; 64], sample_envelope(2)).unwrap();
        assert_eq!(syn.hash, syn.envelope.hash().unwrap());

        let bytes = syn.pack().unwrap();
        let (decoded, consumed) = EnvelopeSyn::unpack(&bytes).unwrap();
        assert_eq!(decoded, syn);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_envelope_syn_requires_signature() {
        let syn = EnvelopeSyn::new(SerialNumber::random(), Vec::new(), sample_envelope(1)).unwrap();
        assert!(matches!(syn.pack(), Err(WireError::MissingField("sig"))));
    }

    #[test]
    fn test_envelope_syn_truncation() {
        let syn = EnvelopeSyn::new(SerialNumber::random(), vec![1u8; 64], sample_envelope(1)).unwrap();
        let bytes = syn.pack().unwrap();
        for cut in 0..bytes.len() {
            assert!(EnvelopeSyn::unpack(&bytes[..cut]).is_err(), "cut at {cut}");
        }
    }

    #[test]
    fn test_envelope_ack_roundtrip() {
        let ack = EnvelopeAck {
            sn: SerialNumber::random(),
            next_sn: SerialNumber::random(),
            hash: [3u8; 32],
            sig: vec![4u8; 64],
            error_code: ErrorCode::ContentTooLarge,
        };
        let bytes = ack.pack().unwrap();
        let (decoded, _) = EnvelopeAck::unpack(&bytes).unwrap();
        assert_eq!(decoded, ack);

        for cut in 0..bytes.len() {
            assert!(EnvelopeAck::unpack(&bytes[..cut]).is_err(), "cut at {cut}");
        }
    }
}
