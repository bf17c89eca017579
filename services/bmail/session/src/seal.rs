//! Envelope sealing engine.
//!
//! Sealing draws one IV and one disposable content key per envelope. The
//! content key is wrapped for each recipient under the sender/recipient
//! shared key; subject, body and the packed attachment list are encrypted
//! under per-field subkeys of the content key. Every ciphertext carries the envelope IV, and unsealing
//! rejects any that decrypts to a different one.

use bmail_crypto::{
    derive_subkey, CryptoProvider, Identity, Iv, StandardProvider, SymmetricKey,
};
use bmail_wire::{pack_attachments, unpack_attachments, CryptEnvelope, Envelope, Recipient, WireError};
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::SessionError;

const SUBJECT_LABEL: &[u8] = b"subject";
const BODY_LABEL: &[u8] = b"body";
const ATTACHMENTS_LABEL: &[u8] = b"attachments";

/// Seals and unseals envelopes with an injected crypto provider
#[derive(Debug, Clone, Default)]
pub struct Sealer<P: CryptoProvider = StandardProvider> {
    provider: P,
}

impl Sealer<StandardProvider> {
    /// Sealer backed by the standard provider
    pub fn standard() -> Self {
        Self::new(StandardProvider)
    }
}

impl<P: CryptoProvider> Sealer<P> {
    /// Sealer backed by `provider`
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Encrypt `envelope` from `sender` to each of its recipients
    pub fn seal(&self, sender: &Identity, envelope: &Envelope) -> Result<CryptEnvelope, SessionError> {
        if envelope.from_addr != sender.address() {
            return Err(SessionError::SenderMismatch(envelope.from_addr));
        }

        let iv = Iv::random();
        let content_key = SymmetricKey::random();

        let recipients = envelope
            .recipients
            .iter()
            .map(|r| -> Result<Recipient, SessionError> {
                let shared = self.provider.derive_shared_key(sender, &r.address)?;
                let sealed_key = self
                    .provider
                    .encrypt_with_iv(&shared, &iv, content_key.as_bytes())?;
                Ok(Recipient {
                    sealed_key,
                    ..r.clone()
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let subject_key = derive_subkey(&content_key, SUBJECT_LABEL)?;
        let body_key = derive_subkey(&content_key, BODY_LABEL)?;
        let attachments_key = derive_subkey(&content_key, ATTACHMENTS_LABEL)?;
        let attachments = pack_attachments(&envelope.attachments)?;

        let sealed = CryptEnvelope {
            eid: envelope.eid,
            from_name: envelope.from_name.clone(),
            from_addr: envelope.from_addr,
            recipients,
            date: envelope.date,
            session_id: envelope.session_id.clone(),
            iv,
            cipher_subject: self
                .provider
                .encrypt_with_iv(&subject_key, &iv, envelope.subject.as_bytes())?,
            cipher_body: self
                .provider
                .encrypt_with_iv(&body_key, &iv, envelope.body.as_bytes())?,
            cipher_attachments: self
                .provider
                .encrypt_with_iv(&attachments_key, &iv, &attachments)?,
        };
        debug!(
            "Sealed {} for {} recipients ({} bytes)",
            sealed.eid,
            sealed.recipients.len(),
            sealed.content_size()
        );
        Ok(sealed)
    }

    /// Recover the plaintext of `envelope` as `recipient`
    pub fn unseal(&self, recipient: &Identity, envelope: &CryptEnvelope) -> Result<Envelope, SessionError> {
        let entry = envelope
            .recipient(&recipient.address())
            .ok_or(SessionError::NotARecipient)?;

        let shared = self.provider.derive_shared_key(recipient, &envelope.from_addr)?;
        let raw_key = Zeroizing::new(self.open(&shared, &envelope.iv, &entry.sealed_key)?);
        let content_key = SymmetricKey::from_slice(&raw_key)?;

        let subject = self.open(
            &derive_subkey(&content_key, SUBJECT_LABEL)?,
            &envelope.iv,
            &envelope.cipher_subject,
        )?;
        let body = self.open(
            &derive_subkey(&content_key, BODY_LABEL)?,
            &envelope.iv,
            &envelope.cipher_body,
        )?;
        let attachments = self.open(
            &derive_subkey(&content_key, ATTACHMENTS_LABEL)?,
            &envelope.iv,
            &envelope.cipher_attachments,
        )?;

        Ok(Envelope {
            eid: envelope.eid,
            from_name: envelope.from_name.clone(),
            from_addr: envelope.from_addr,
            recipients: envelope
                .recipients
                .iter()
                .map(|r| Recipient {
                    sealed_key: Vec::new(),
                    ..r.clone()
                })
                .collect(),
            date: envelope.date,
            session_id: envelope.session_id.clone(),
            subject: String::from_utf8(subject).map_err(|_| WireError::Utf8)?,
            body: String::from_utf8(body).map_err(|_| WireError::Utf8)?,
            attachments: unpack_attachments(&attachments)?,
        })
    }

    fn open(&self, key: &SymmetricKey, iv: &Iv, data: &[u8]) -> Result<Vec<u8>, SessionError> {
        let (embedded, plaintext) = self.provider.decrypt_with_iv(key, data)?;
        if &embedded != iv {
            return Err(SessionError::IvMismatch);
        }
        Ok(plaintext)
    }
}
