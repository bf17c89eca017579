//! Transport header for the wire protocol.
//!
//! Every frame starts with a fixed header announcing the protocol version,
//! the crypto suite, the message type and the length of the payload that
//! follows:
//!
//! ```text
//! +-------------+------------------+--------------+-----------------+
//! | version u16 | crypto_suite u16 | msg_type u16 | payload_len u32 |
//! +-------------+------------------+--------------+-----------------+
//! ```

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::mem::size_of;

use crate::codec::{get_u16, get_u32};
use crate::error::WireError;

/// Protocol version
pub const BMAIL_VERSION: u16 = 1;

/// Ed25519 signatures, X25519 + AES-256-GCM envelopes
pub const CRYPTO_SUITE_ED25519: u16 = 1;

/// Header size in bytes, derived from the field widths
pub const HEADER_SIZE: usize =
    size_of::<u16>() + size_of::<u16>() + size_of::<u16>() + size_of::<u32>();

/// Exclusive lower bound of valid message types
pub const MIN_TYPE: u16 = 0;

/// Exclusive upper bound of valid message types
pub const MAX_TYPE: u16 = 20;

/// Default port of the envelope transfer service
pub const BMTP_PORT: u16 = 1025;

/// Default port of the retrieval service
pub const BPOP_PORT: u16 = 1110;

/// Message types, numbered contiguously from `MIN_TYPE + 1`
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MsgType {
    /// Session opening request (empty payload)
    Hello = 1,
    /// Session opening reply carrying the first serial number
    HelloAck = 2,
    /// Plaintext envelope (reserved)
    SendEnvelope = 3,
    /// Reply to a plaintext envelope (reserved)
    RespEnvelope = 4,
    /// Sealed envelope submission
    SendCryptEnvelope = 5,
    /// Reply to a sealed envelope submission
    RespCryptEnvelope = 6,
    /// Mailbox state query
    Stat = 7,
    /// Mailbox state reply
    StatResp = 8,
    /// Mailbox listing
    List = 9,
    /// Mailbox listing reply
    ListResp = 10,
    /// Envelope download
    Retr = 11,
    /// Envelope download reply
    RetrResp = 12,
    /// Envelope deletion
    Delete = 13,
    /// Envelope deletion reply
    DeleteResp = 14,
    /// Contact exchange opening (reserved)
    ContactHello = 15,
    /// Contact exchange reply (reserved)
    ContactHelloResp = 16,
    /// Add a contact (reserved)
    ContactAdd = 17,
    /// Remove a contact (reserved)
    ContactDel = 18,
    /// Fetch the contact list (reserved)
    ContactPull = 19,
}

impl TryFrom<u16> for MsgType {
    type Error = WireError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MsgType::Hello),
            2 => Ok(MsgType::HelloAck),
            3 => Ok(MsgType::SendEnvelope),
            4 => Ok(MsgType::RespEnvelope),
            5 => Ok(MsgType::SendCryptEnvelope),
            6 => Ok(MsgType::RespCryptEnvelope),
            7 => Ok(MsgType::Stat),
            8 => Ok(MsgType::StatResp),
            9 => Ok(MsgType::List),
            10 => Ok(MsgType::ListResp),
            11 => Ok(MsgType::Retr),
            12 => Ok(MsgType::RetrResp),
            13 => Ok(MsgType::Delete),
            14 => Ok(MsgType::DeleteResp),
            15 => Ok(MsgType::ContactHello),
            16 => Ok(MsgType::ContactHelloResp),
            17 => Ok(MsgType::ContactAdd),
            18 => Ok(MsgType::ContactDel),
            19 => Ok(MsgType::ContactPull),
            _ => Err(WireError::Type(value)),
        }
    }
}

/// Fixed header preceding every payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportHeader {
    /// Protocol version (must be 1)
    pub version: u16,
    /// Crypto suite (must be Ed25519)
    pub crypto_suite: u16,
    /// Payload message type
    pub msg_type: MsgType,
    /// Number of payload bytes following the header
    pub payload_len: u32,
}

impl TransportHeader {
    /// Create a header for a payload of `payload_len` bytes
    pub fn new(msg_type: MsgType, payload_len: u32) -> Self {
        Self {
            version: BMAIL_VERSION,
            crypto_suite: CRYPTO_SUITE_ED25519,
            msg_type,
            payload_len,
        }
    }

    /// Encode the header (big-endian)
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(HEADER_SIZE);
        buf.put_u16(self.version);
        buf.put_u16(self.crypto_suite);
        buf.put_u16(self.msg_type as u16);
        buf.put_u32(self.payload_len);
    }

    /// Encode into a fixed-size array
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        self.encode(&mut buf);
        let mut out = [0u8; HEADER_SIZE];
        out.copy_from_slice(&buf);
        out
    }

    /// Decode the header (big-endian)
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        if buf.remaining() < HEADER_SIZE {
            return Err(WireError::Incomplete);
        }

        let version = get_u16(buf)?;
        if version != BMAIL_VERSION {
            return Err(WireError::Version(version));
        }

        let crypto_suite = get_u16(buf)?;
        if crypto_suite != CRYPTO_SUITE_ED25519 {
            return Err(WireError::CryptoSuite(crypto_suite));
        }

        let msg_type = MsgType::try_from(get_u16(buf)?)?;
        let payload_len = get_u32(buf)?;

        Ok(Self {
            version,
            crypto_suite,
            msg_type,
            payload_len,
        })
    }
}
