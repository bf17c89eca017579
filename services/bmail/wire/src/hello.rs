//! HELLO / HELLO_ACK: session opening.
//!
//! The client opens every connection with an empty HELLO. The server answers
//! with the first serial number of the session and its own address, which
//! the client later verifies ack signatures against.

use bmail_crypto::Address;
use bytes::{Buf, BytesMut};

use crate::codec::{Pack, Unpack};
use crate::error::{FieldContext, WireError};
use crate::header::{MsgType, TransportHeader};
use crate::message::WireMessage;
use crate::types::{ErrorCode, SerialNumber};

/// Session opening request (empty payload)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Hello;

impl WireMessage for Hello {
    fn msg_type(&self) -> MsgType {
        MsgType::Hello
    }

    fn accepts(msg_type: MsgType) -> bool {
        msg_type == MsgType::Hello
    }

    fn verify_header(header: &TransportHeader) -> bool {
        header.msg_type == MsgType::Hello && header.payload_len == 0
    }

    fn pack_payload(&self, _buf: &mut BytesMut) -> Result<(), WireError> {
        Ok(())
    }

    fn unpack_payload<B: Buf>(_msg_type: MsgType, _buf: &mut B) -> Result<Self, WireError> {
        Ok(Hello)
    }
}

/// Session opening reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloAck {
    /// First serial number of the session
    pub sn: SerialNumber,
    /// Address the server signs acks with
    pub server_addr: Address,
    /// Whether the server accepts the session
    pub error_code: ErrorCode,
}

impl HelloAck {
    /// Successful reply opening the chain at `sn`
    pub fn new(sn: SerialNumber, server_addr: Address) -> Self {
        Self {
            sn,
            server_addr,
            error_code: ErrorCode::Success,
        }
    }
}

impl WireMessage for HelloAck {
    fn msg_type(&self) -> MsgType {
        MsgType::HelloAck
    }

    fn accepts(msg_type: MsgType) -> bool {
        msg_type == MsgType::HelloAck
    }

    fn pack_payload(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        self.sn.pack(buf)?;
        self.server_addr.pack(buf)?;
        self.error_code.pack(buf)
    }

    fn unpack_payload<B: Buf>(_msg_type: MsgType, buf: &mut B) -> Result<Self, WireError> {
        Ok(Self {
            sn: SerialNumber::unpack(buf).field("sn")?,
            server_addr: Address::unpack(buf).field("server_addr")?,
            error_code: ErrorCode::unpack(buf).field("error_code")?,
        })
    }
}
