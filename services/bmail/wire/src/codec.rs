//! Primitive binary codec.
//!
//! All integers are big-endian. Variable-length values carry a length
//! prefix sized by their class:
//!
//! ```text
//! short bytes / string   u16 length | bytes
//! long bytes / string    u32 length | bytes
//! short string array     u32 count  | count x short string
//! long string array      u16 count  | count x long string
//! list of T              u32 count  | count x T
//! ```
//!
//! Zero-length values are valid and distinct from a missing field. Every
//! reader checks the remaining input before consuming it, so truncated input
//! yields [`WireError::Truncated`] instead of a panic.

use bmail_crypto::{Address, Hash, Iv, HASH_SIZE, IV_SIZE, PUBLIC_KEY_SIZE};
use bytes::{Buf, BufMut, BytesMut};
use uuid::Uuid;

use crate::error::WireError;

/// Types with a canonical binary encoding
pub trait Pack {
    /// Append the encoding to `buf`
    fn pack(&self, buf: &mut BytesMut) -> Result<(), WireError>;

    /// Encode into a fresh buffer
    fn packed(&self) -> Result<BytesMut, WireError> {
        let mut buf = BytesMut::new();
        self.pack(&mut buf)?;
        Ok(buf)
    }
}

/// Types decodable from their canonical binary encoding
pub trait Unpack: Sized {
    /// Decode one value, advancing `buf` past it
    fn unpack<B: Buf>(buf: &mut B) -> Result<Self, WireError>;

    /// Decode one value from the front of `data`, returning it with the
    /// number of bytes consumed
    fn unpack_from(data: &[u8]) -> Result<(Self, usize), WireError> {
        let mut cursor = data;
        let value = Self::unpack(&mut cursor)?;
        Ok((value, data.len() - cursor.len()))
    }
}

fn ensure<B: Buf>(buf: &B, needed: usize) -> Result<(), WireError> {
    if buf.remaining() < needed {
        return Err(WireError::Truncated {
            needed,
            available: buf.remaining(),
        });
    }
    Ok(())
}

/// Read a u8
pub fn get_u8<B: Buf>(buf: &mut B) -> Result<u8, WireError> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

/// Read a big-endian u16
pub fn get_u16<B: Buf>(buf: &mut B) -> Result<u16, WireError> {
    ensure(buf, 2)?;
    Ok(buf.get_u16())
}

/// Read a big-endian u32
pub fn get_u32<B: Buf>(buf: &mut B) -> Result<u32, WireError> {
    ensure(buf, 4)?;
    Ok(buf.get_u32())
}

/// Read a big-endian i64
pub fn get_i64<B: Buf>(buf: &mut B) -> Result<i64, WireError> {
    ensure(buf, 8)?;
    Ok(buf.get_i64())
}

fn get_raw<B: Buf>(buf: &mut B, len: usize) -> Result<Vec<u8>, WireError> {
    ensure(buf, len)?;
    let mut out = vec![0u8; len];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

/// Write u16-length-prefixed bytes
pub fn put_short_bytes(buf: &mut BytesMut, data: &[u8]) -> Result<(), WireError> {
    let len = u16::try_from(data.len()).map_err(|_| WireError::Size(data.len()))?;
    buf.reserve(2 + data.len());
    buf.put_u16(len);
    buf.put_slice(data);
    Ok(())
}

/// Write u32-length-prefixed bytes
pub fn put_long_bytes(buf: &mut BytesMut, data: &[u8]) -> Result<(), WireError> {
    let len = u32::try_from(data.len()).map_err(|_| WireError::Size(data.len()))?;
    buf.reserve(4 + data.len());
    buf.put_u32(len);
    buf.put_slice(data);
    Ok(())
}

/// Write a u16-length-prefixed UTF-8 string
pub fn put_short_string(buf: &mut BytesMut, s: &str) -> Result<(), WireError> {
    put_short_bytes(buf, s.as_bytes())
}

/// Write a u32-length-prefixed UTF-8 string
pub fn put_long_string(buf: &mut BytesMut, s: &str) -> Result<(), WireError> {
    put_long_bytes(buf, s.as_bytes())
}

/// Write a u32 count followed by short strings
pub fn put_short_string_array<S: AsRef<str>>(buf: &mut BytesMut, items: &[S]) -> Result<(), WireError> {
    let count = u32::try_from(items.len()).map_err(|_| WireError::Size(items.len()))?;
    buf.put_u32(count);
    for item in items {
        put_short_string(buf, item.as_ref())?;
    }
    Ok(())
}

/// Write a u16 count followed by long strings
pub fn put_long_string_array<S: AsRef<str>>(buf: &mut BytesMut, items: &[S]) -> Result<(), WireError> {
    let count = u16::try_from(items.len()).map_err(|_| WireError::Size(items.len()))?;
    buf.put_u16(count);
    for item in items {
        put_long_string(buf, item.as_ref())?;
    }
    Ok(())
}

/// Read u16-length-prefixed bytes
pub fn get_short_bytes<B: Buf>(buf: &mut B) -> Result<Vec<u8>, WireError> {
    let len = get_u16(buf)? as usize;
    get_raw(buf, len)
}

/// Read u32-length-prefixed bytes
pub fn get_long_bytes<B: Buf>(buf: &mut B) -> Result<Vec<u8>, WireError> {
    let len = get_u32(buf)? as usize;
    get_raw(buf, len)
}

/// Read a u16-length-prefixed UTF-8 string
pub fn get_short_string<B: Buf>(buf: &mut B) -> Result<String, WireError> {
    String::from_utf8(get_short_bytes(buf)?).map_err(|_| WireError::Utf8)
}

/// Read a u32-length-prefixed UTF-8 string
pub fn get_long_string<B: Buf>(buf: &mut B) -> Result<String, WireError> {
    String::from_utf8(get_long_bytes(buf)?).map_err(|_| WireError::Utf8)
}

/// Read a u32 count followed by short strings
pub fn get_short_string_array<B: Buf>(buf: &mut B) -> Result<Vec<String>, WireError> {
    let count = get_u32(buf)?;
    (0..count).map(|_| get_short_string(buf)).collect()
}

/// Read a u16 count followed by long strings
pub fn get_long_string_array<B: Buf>(buf: &mut B) -> Result<Vec<String>, WireError> {
    let count = get_u16(buf)?;
    (0..count).map(|_| get_long_string(buf)).collect()
}

/// Write a u32 count followed by each item's encoding
pub fn put_list<T: Pack>(buf: &mut BytesMut, items: &[T]) -> Result<(), WireError> {
    let count = u32::try_from(items.len()).map_err(|_| WireError::Size(items.len()))?;
    buf.put_u32(count);
    for item in items {
        item.pack(buf)?;
    }
    Ok(())
}

/// Read a u32 count followed by that many items
pub fn get_list<T: Unpack, B: Buf>(buf: &mut B) -> Result<Vec<T>, WireError> {
    let count = get_u32(buf)?;
    // Every element needs at least one byte, so a count larger than the
    // input is truncated before any allocation happens.
    ensure(buf, count as usize)?;
    (0..count).map(|_| T::unpack(buf)).collect()
}

/// Read short bytes that must be exactly `N` long
pub fn get_fixed<const N: usize, B: Buf>(buf: &mut B) -> Result<[u8; N], WireError> {
    let bytes = get_short_bytes(buf)?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| WireError::Invalid(format!("expected {N} bytes, got {len}")))
}

/// Write a signature, refusing an empty one
pub fn put_signature(buf: &mut BytesMut, sig: &[u8]) -> Result<(), WireError> {
    if sig.is_empty() {
        return Err(WireError::MissingField("sig"));
    }
    put_short_bytes(buf, sig)
}

/// Read a non-empty signature
pub fn get_signature<B: Buf>(buf: &mut B) -> Result<Vec<u8>, WireError> {
    let sig = get_short_bytes(buf)?;
    if sig.is_empty() {
        return Err(WireError::MissingField("sig"));
    }
    Ok(sig)
}

/// Write a digest as short bytes
pub fn put_hash(buf: &mut BytesMut, hash: &Hash) -> Result<(), WireError> {
    put_short_bytes(buf, hash)
}

/// Read a digest
pub fn get_hash<B: Buf>(buf: &mut B) -> Result<Hash, WireError> {
    get_fixed::<HASH_SIZE, B>(buf)
}

/// Write an optional id as short bytes, empty for `None`
pub fn put_optional_uuid(buf: &mut BytesMut, id: Option<&Uuid>) -> Result<(), WireError> {
    match id {
        Some(id) => id.pack(buf),
        None => put_short_bytes(buf, &[]),
    }
}

/// Read an optional id; only empty or 16-byte values are valid
pub fn get_optional_uuid<B: Buf>(buf: &mut B) -> Result<Option<Uuid>, WireError> {
    let bytes = get_short_bytes(buf)?;
    match bytes.len() {
        0 => Ok(None),
        16 => {
            let mut raw = [0u8; 16];
            raw.copy_from_slice(&bytes);
            Ok(Some(Uuid::from_bytes(raw)))
        }
        len => Err(WireError::Invalid(format!("expected 0 or 16 id bytes, got {len}"))),
    }
}

impl Pack for Address {
    fn pack(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        put_short_bytes(buf, self.as_bytes())
    }
}

impl Unpack for Address {
    fn unpack<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        let bytes = get_fixed::<PUBLIC_KEY_SIZE, B>(buf)?;
        Address::from_bytes(&bytes).map_err(|e| WireError::Invalid(e.to_string()))
    }
}

impl Pack for Iv {
    fn pack(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        put_short_bytes(buf, self.as_bytes())
    }
}

impl Unpack for Iv {
    fn unpack<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Ok(Iv::new(get_fixed::<IV_SIZE, B>(buf)?))
    }
}

impl Pack for Uuid {
    fn pack(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        put_short_bytes(buf, self.as_bytes())
    }
}

impl Unpack for Uuid {
    fn unpack<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Ok(Uuid::from_bytes(get_fixed::<16, B>(buf)?))
    }
}
