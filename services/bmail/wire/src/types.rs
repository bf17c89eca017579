//! Shared protocol value types.

use bytes::{Buf, BufMut, BytesMut};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;

use crate::codec::{get_fixed, get_u32, put_short_bytes, Pack, Unpack};
use crate::error::WireError;

/// Serial number size in bytes
pub const SN_SIZE: usize = 16;

/// Single-use serial number chaining one request to the next
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SerialNumber([u8; SN_SIZE]);

impl SerialNumber {
    /// Draw a fresh serial number from the OS random source
    pub fn random() -> Self {
        let mut sn = [0u8; SN_SIZE];
        OsRng.fill_bytes(&mut sn);
        Self(sn)
    }

    /// Wrap raw bytes
    pub fn new(bytes: [u8; SN_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; SN_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sn(")?;
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "..)")
    }
}

impl Pack for SerialNumber {
    fn pack(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        put_short_bytes(buf, &self.0)
    }
}

impl Unpack for SerialNumber {
    fn unpack<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Ok(Self(get_fixed::<SN_SIZE, B>(buf)?))
    }
}

/// Application-level result carried inside acks.
///
/// A non-success code does not end the session; the serial-number chain
/// continues with the ack's next serial number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Request accepted
    Success,
    /// The receiving server could not reach the recipient's server
    PeerUnreachable,
    /// Recipient address unknown or not accepted by this server
    AddressUnavailable,
    /// Envelope content exceeds the server limit
    ContentTooLarge,
    /// No mail in the requested retrieval window
    NoMailAvailable,
    /// Requester is not allowed to perform the operation
    Forbidden,
    /// Code not known to this implementation
    Other(u32),
}

impl ErrorCode {
    /// True for [`ErrorCode::Success`]
    pub fn is_success(self) -> bool {
        self == ErrorCode::Success
    }
}

impl From<u32> for ErrorCode {
    fn from(value: u32) -> Self {
        match value {
            0 => ErrorCode::Success,
            1 => ErrorCode::PeerUnreachable,
            2 => ErrorCode::AddressUnavailable,
            3 => ErrorCode::ContentTooLarge,
            4 => ErrorCode::NoMailAvailable,
            5 => ErrorCode::Forbidden,
            other => ErrorCode::Other(other),
        }
    }
}

impl From<ErrorCode> for u32 {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::Success => 0,
            ErrorCode::PeerUnreachable => 1,
            ErrorCode::AddressUnavailable => 2,
            ErrorCode::ContentTooLarge => 3,
            ErrorCode::NoMailAvailable => 4,
            ErrorCode::Forbidden => 5,
            ErrorCode::Other(other) => other,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Success => f.write_str("success"),
            ErrorCode::PeerUnreachable => f.write_str("peer unreachable"),
            ErrorCode::AddressUnavailable => f.write_str("address unavailable"),
            ErrorCode::ContentTooLarge => f.write_str("content too large"),
            ErrorCode::NoMailAvailable => f.write_str("no mail available"),
            ErrorCode::Forbidden => f.write_str("forbidden"),
            ErrorCode::Other(code) => write!(f, "error code {code}"),
        }
    }
}

impl Pack for ErrorCode {
    fn pack(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        buf.put_u32((*self).into());
        Ok(())
    }
}

impl Unpack for ErrorCode {
    fn unpack<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Ok(get_u32(buf)?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_numbers_are_fresh() {
        let a = SerialNumber::random();
        let b = SerialNumber::random();
        assert_ne!(a, b);
    }

    #[test]
    fn test_serial_number_encoding() {
        let sn = SerialNumber::new([7u8; SN_SIZE]);
        let bytes = sn.packed().unwrap();
        assert_eq!(bytes.len(), 2 + SN_SIZE);
        assert_eq!(&bytes[..2], &[0, 16]);
        let (decoded, consumed) = SerialNumber::unpack_from(&bytes).unwrap();
        assert_eq!(decoded, sn);
        assert_eq!(consumed, bytes.len());

        // Wrong length
        let mut buf = BytesMut::new();
        put_short_bytes(&mut buf, &[1u8; 8]).unwrap();
        assert!(SerialNumber::unpack_from(&buf).is_err());
    }

    #[test]
    fn test_error_code_values() {
        for raw in 0..6u32 {
            assert_eq!(u32::from(ErrorCode::from(raw)), raw);
        }
        assert_eq!(ErrorCode::from(42), ErrorCode::Other(42));
        assert_eq!(u32::from(ErrorCode::Other(42)), 42);
        assert!(ErrorCode::Success.is_success());
        assert!(!ErrorCode::NoMailAvailable.is_success());
    }
}
