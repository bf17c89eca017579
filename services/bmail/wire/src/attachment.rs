//! Attachment descriptors.
//!
//! An envelope carries a list of descriptors, sealed under their own subkey
//! next to the subject and body. File contents travel out of band; the
//! descriptor names them and pins their digest.
//!
//! ```text
//! name | file_type u32 | size u32 | hash | encrypted u8 | location
//! ```

use bmail_crypto::{sha256, Hash};
use bytes::{Buf, BufMut, BytesMut};

use crate::codec::{
    get_hash, get_list, get_short_string, get_u32, get_u8, put_hash, put_list, put_short_string,
    Pack, Unpack,
};
use crate::error::{FieldContext, WireError};

/// One attached file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name shown to the reader
    pub name: String,
    /// Application-defined file type tag
    pub file_type: u32,
    /// Content length in bytes
    pub size: u32,
    /// SHA-256 of the content
    pub hash: Hash,
    /// Whether the content is stored encrypted
    pub encrypted: bool,
    /// Where the content can be fetched; empty when not published yet
    pub location: String,
}

impl Attachment {
    /// Describe `content` under `name`
    pub fn describe(name: impl Into<String>, file_type: u32, content: &[u8]) -> Result<Self, WireError> {
        let size = u32::try_from(content.len()).map_err(|_| WireError::Size(content.len()))?;
        Ok(Self {
            name: name.into(),
            file_type,
            size,
            hash: sha256(&[content]),
            encrypted: false,
            location: String::new(),
        })
    }

    /// Set where the content is published
    pub fn with_location(mut self, location: impl Into<String>, encrypted: bool) -> Self {
        self.location = location.into();
        self.encrypted = encrypted;
        self
    }

    /// Whether `content` is what this descriptor names
    pub fn matches(&self, content: &[u8]) -> bool {
        u32::try_from(content.len()).ok() == Some(self.size) && sha256(&[content]) == self.hash
    }
}

impl Pack for Attachment {
    fn pack(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        put_short_string(buf, &self.name)?;
        buf.put_u32(self.file_type);
        buf.put_u32(self.size);
        put_hash(buf, &self.hash)?;
        buf.put_u8(u8::from(self.encrypted));
        put_short_string(buf, &self.location)
    }
}

impl Unpack for Attachment {
    fn unpack<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Ok(Self {
            name: get_short_string(buf).field("attachment.name")?,
            file_type: get_u32(buf).field("attachment.file_type")?,
            size: get_u32(buf).field("attachment.size")?,
            hash: get_hash(buf).field("attachment.hash")?,
            encrypted: get_u8(buf)
                .and_then(|flag| match flag {
                    0 => Ok(false),
                    1 => Ok(true),
                    other => Err(WireError::Invalid(format!("encrypted flag {other}"))),
                })
                .field("attachment.encrypted")?,
            location: get_short_string(buf).field("attachment.location")?,
        })
    }
}

/// Encode a descriptor list as `u32 count | descriptors`
pub fn pack_attachments(attachments: &[Attachment]) -> Result<BytesMut, WireError> {
    let mut buf = BytesMut::new();
    put_list(&mut buf, attachments)?;
    Ok(buf)
}

/// Decode a descriptor list that must fill `data` exactly
pub fn unpack_attachments(data: &[u8]) -> Result<Vec<Attachment>, WireError> {
    let mut cursor = data;
    let attachments = get_list(&mut cursor).field("attachments")?;
    if !cursor.is_empty() {
        return Err(WireError::TrailingBytes(cursor.len()));
    }
    Ok(attachments)
}
