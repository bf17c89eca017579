//! Envelopes in plaintext and sealed form.
//!
//! The sealed [`CryptEnvelope`] is what travels on the wire and what servers
//! store. Its canonical encoding is:
//!
//! ```text
//! eid | from_name | from_addr | recipients | date | session_id | iv
//!     | cipher_subject | cipher_body | cipher_attachments
//! ```
//!
//! and its hash is SHA-256 over exactly those bytes.

use bmail_crypto::{sha256, Address, Hash, Iv};
use bytes::{Buf, BufMut, BytesMut};
use uuid::Uuid;

use crate::codec::{
    get_i64, get_list, get_long_bytes, get_short_bytes, get_short_string, get_u8, put_list,
    put_long_bytes, put_short_bytes, put_short_string, Pack, Unpack,
};
use crate::attachment::Attachment;
use crate::error::{FieldContext, WireError};

/// How a recipient is addressed
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipientRole {
    /// Primary recipient
    To = 0,
    /// Carbon copy
    Cc = 1,
    /// Blind carbon copy
    Bcc = 2,
    /// Monitoring copy
    Monitor = 3,
}

impl TryFrom<u8> for RecipientRole {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RecipientRole::To),
            1 => Ok(RecipientRole::Cc),
            2 => Ok(RecipientRole::Bcc),
            3 => Ok(RecipientRole::Monitor),
            _ => Err(WireError::Invalid(format!("recipient role {value}"))),
        }
    }
}

/// One addressee of an envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    /// Mail name shown to users, e.g. `bob@example.bm`
    pub display_name: String,
    /// Blockchain address the content key is sealed to
    pub address: Address,
    /// Addressing role
    pub role: RecipientRole,
    /// Content key sealed under the sender/recipient shared key; empty until sealed
    pub sealed_key: Vec<u8>,
}

impl Recipient {
    /// Unsealed recipient entry
    pub fn new(display_name: impl Into<String>, address: Address, role: RecipientRole) -> Self {
        Self {
            display_name: display_name.into(),
            address,
            role,
            sealed_key: Vec::new(),
        }
    }
}

impl Pack for Recipient {
    fn pack(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        put_short_string(buf, &self.display_name)?;
        self.address.pack(buf)?;
        buf.put_u8(self.role as u8);
        put_short_bytes(buf, &self.sealed_key)
    }
}

impl Unpack for Recipient {
    fn unpack<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Ok(Self {
            display_name: get_short_string(buf).field("recipient.display_name")?,
            address: Address::unpack(buf).field("recipient.address")?,
            role: get_u8(buf)
                .and_then(RecipientRole::try_from)
                .field("recipient.role")?,
            sealed_key: get_short_bytes(buf).field("recipient.sealed_key")?,
        })
    }
}

/// Plaintext envelope as composed by the sender or recovered by a recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Envelope id
    pub eid: Uuid,
    /// Sender mail name
    pub from_name: String,
    /// Sender blockchain address
    pub from_addr: Address,
    /// Addressees
    pub recipients: Vec<Recipient>,
    /// Milliseconds since the Unix epoch
    pub date: i64,
    /// Conversation id, empty when the envelope starts a new thread
    pub session_id: String,
    /// Subject line
    pub subject: String,
    /// Message body
    pub body: String,
    /// Attached file descriptors
    pub attachments: Vec<Attachment>,
}

impl Envelope {
    /// New envelope stamped with a random id and the current time
    pub fn new(
        from_name: impl Into<String>,
        from_addr: Address,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            eid: Uuid::new_v4(),
            from_name: from_name.into(),
            from_addr,
            recipients: Vec::new(),
            date: chrono::Utc::now().timestamp_millis(),
            session_id: String::new(),
            subject: subject.into(),
            body: body.into(),
            attachments: Vec::new(),
        }
    }

    /// Add an addressee
    pub fn with_recipient(
        mut self,
        display_name: impl Into<String>,
        address: Address,
        role: RecipientRole,
    ) -> Self {
        self.recipients.push(Recipient::new(display_name, address, role));
        self
    }

    /// Set the conversation id
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Attach a file descriptor
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Set the timestamp (milliseconds since the Unix epoch)
    pub fn with_date(mut self, date: i64) -> Self {
        self.date = date;
        self
    }
}

/// Sealed envelope: subject, body and attachment list are ciphertexts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptEnvelope {
    /// Envelope id
    pub eid: Uuid,
    /// Sender mail name
    pub from_name: String,
    /// Sender blockchain address
    pub from_addr: Address,
    /// Addressees with their sealed content keys
    pub recipients: Vec<Recipient>,
    /// Milliseconds since the Unix epoch
    pub date: i64,
    /// Conversation id
    pub session_id: String,
    /// IV every ciphertext of this envelope was produced with
    pub iv: Iv,
    /// Encrypted subject
    pub cipher_subject: Vec<u8>,
    /// Encrypted body
    pub cipher_body: Vec<u8>,
    /// Encrypted attachment descriptor list
    pub cipher_attachments: Vec<u8>,
}

impl CryptEnvelope {
    /// SHA-256 over the canonical encoding
    pub fn hash(&self) -> Result<Hash, WireError> {
        let bytes = self.packed()?;
        Ok(sha256(&[&bytes[..]]))
    }

    /// Entry for `address`, if it is an addressee
    pub fn recipient(&self, address: &Address) -> Option<&Recipient> {
        self.recipients.iter().find(|r| &r.address == address)
    }

    /// Bytes of encrypted content
    pub fn content_size(&self) -> usize {
        self.cipher_subject.len() + self.cipher_body.len() + self.cipher_attachments.len()
    }
}

impl Pack for CryptEnvelope {
    fn pack(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        self.eid.pack(buf)?;
        put_short_string(buf, &self.from_name)?;
        self.from_addr.pack(buf)?;
        put_list(buf, &self.recipients)?;
        buf.put_i64(self.date);
        put_short_string(buf, &self.session_id)?;
        self.iv.pack(buf)?;
        put_long_bytes(buf, &self.cipher_subject)?;
        put_long_bytes(buf, &self.cipher_body)?;
        put_long_bytes(buf, &self.cipher_attachments)
    }
}

impl Unpack for CryptEnvelope {
    fn unpack<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Ok(Self {
            eid: Uuid::unpack(buf).field("eid")?,
            from_name: get_short_string(buf).field("from_name")?,
            from_addr: Address::unpack(buf).field("from_addr")?,
            recipients: get_list(buf).field("recipients")?,
            date: get_i64(buf).field("date")?,
            session_id: get_short_string(buf).field("session_id")?,
            iv: Iv::unpack(buf).field("iv")?,
            cipher_subject: get_long_bytes(buf).field("cipher_subject")?,
            cipher_body: get_long_bytes(buf).field("cipher_body")?,
            cipher_attachments: get_long_bytes(buf).field("cipher_attachments")?,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use bmail_crypto::Identity;

    pub(crate) fn sample_envelope(recipients: usize) -> CryptEnvelope {
        let sender = Identity::generate();
        CryptEnvelope {
            eid: Uuid::new_v4(),
            from_name: "alice@example.bm".into(),
            from_addr: sender.address(),
            recipients: (0..recipients)
                .map(|i| Recipient {
                    display_name: format!("user{i}@example.bm"),
                    address: Identity::generate().address(),
                    role: if i == 0 { RecipientRole::To } else { RecipientRole::Cc },
                    sealed_key: vec![i as u8; 64],
                })
                .collect(),
            date: 1_700_000_000_000,
            session_id: "thread-1".into(),
            iv: Iv::random(),
            cipher_subject: vec![0x5A; 48],
            cipher_body: vec![0xA5; 300],
            cipher_attachments: vec![0x3C; 80],
        }
    }

    #[test]
    fn test_crypt_envelope_roundtrip() {
        let env = sample_envelope(3);
        let bytes = env.packed().unwrap();
        let (decoded, consumed) = CryptEnvelope::unpack_from(&bytes).unwrap();
        assert_eq!(decoded, env);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_empty_fields_roundtrip() {
        let mut env = sample_envelope(0);
        env.from_name.clear();
        env.session_id.clear();
        env.cipher_subject.clear();
        env.cipher_body.clear();
        env.cipher_attachments.clear();
        let bytes = env.packed().unwrap();
        let (decoded, _) = CryptEnvelope::unpack_from(&bytes).unwrap();
        assert_eq!(decoded, env);
    }

    #[test]
    fn test_large_body_roundtrip() {
        let mut env = sample_envelope(1);
        env.cipher_body = vec![0x42; 200_000];
        let bytes = env.packed().unwrap();
        let (decoded, _) = CryptEnvelope::unpack_from(&bytes).unwrap();
        assert_eq!(decoded.cipher_body.len(), 200_000);
    }

    #[test]
    fn test_hash_is_stable_across_roundtrip() {
        let env = sample_envelope(2);
        let bytes = env.packed().unwrap();
        let (decoded, _) = CryptEnvelope::unpack_from(&bytes).unwrap();
        assert_eq!(env.hash().unwrap(), decoded.hash().unwrap());

        let mut changed = decoded.clone();
        changed.cipher_body[0] ^= 1;
        assert_ne!(env.hash().unwrap(), changed.hash().unwrap());
    }

    #[test]
    fn test_every_prefix_is_rejected() {
        let env = sample_envelope(2);
        let bytes = env.packed().unwrap();
        for cut in 0..bytes.len() {
            let err = CryptEnvelope::unpack_from(&bytes[..cut]).unwrap_err();
            assert!(err.is_truncated(), "cut at {cut}: {err}");
            assert!(err.field().is_some());
        }
    }

    #[test]
    fn test_failing_field_is_named() {
        let env = sample_envelope(1);
        let bytes = env.packed().unwrap();
        // Cut inside the attachment ciphertext, then inside the body
        let err = CryptEnvelope::unpack_from(&bytes[..bytes.len() - 1]).unwrap_err();
        assert_eq!(err.field(), Some("cipher_attachments"));

        let body_end = bytes.len() - 4 - env.cipher_attachments.len();
        let err = CryptEnvelope::unpack_from(&bytes[..body_end - 1]).unwrap_err();
        assert_eq!(err.field(), Some("cipher_body"));
    }

    #[test]
    fn test_content_size_counts_attachments() {
        let env = sample_envelope(1);
        assert_eq!(env.content_size(), 48 + 300 + 80);
    }

    #[test]
    fn test_bad_recipient_role() {
        let mut env = sample_envelope(1);
        env.recipients[0].display_name.clear();
        let mut bytes = env.packed().unwrap();
        // eid | from_name | from_addr | count | display_name | address
        let role_offset = 18 + 2 + env.from_name.len() + 34 + 4 + 2 + 34;
        assert_eq!(bytes[role_offset], RecipientRole::To as u8);
        bytes[role_offset] = 9;
        let err = CryptEnvelope::unpack_from(&bytes).unwrap_err();
        assert_eq!(err.field(), Some("recipients"));
        assert!(matches!(err.root(), WireError::Invalid(_)));
    }

    #[test]
    fn test_recipient_lookup() {
        let env = sample_envelope(2);
        let second = env.recipients[1].address;
        assert_eq!(env.recipient(&second).unwrap().display_name, "user1@example.bm");
        assert!(env.recipient(&env.from_addr).is_none());
    }
}
