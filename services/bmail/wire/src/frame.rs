//! Message framing for the wire protocol.
//!
//! A frame is a [`TransportHeader`] followed by exactly `payload_len`
//! payload bytes. There is no trailer and no padding.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::header::{MsgType, TransportHeader, HEADER_SIZE};
use crate::error::WireError;

/// Maximum payload size (16 MiB default, 64 MiB hard limit)
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;
/// Hard maximum payload size limit (64 MiB)
pub const HARD_MAX_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

/// Complete wire frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Transport header
    pub header: TransportHeader,
    /// Message payload
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame, filling in the payload length
    pub fn new(msg_type: MsgType, payload: Bytes) -> Result<Self, WireError> {
        let payload_len = u32::try_from(payload.len()).map_err(|_| WireError::Size(payload.len()))?;
        Ok(Self {
            header: TransportHeader::new(msg_type, payload_len),
            payload,
        })
    }

    /// Message type announced by the header
    pub fn msg_type(&self) -> MsgType {
        self.header.msg_type
    }

    /// Get the total frame size when encoded
    pub fn encoded_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Encode frame to a contiguous buffer
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_size());
        self.header.encode(&mut buf);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Decode one complete frame from the front of `buf`.
    ///
    /// Returns [`WireError::Incomplete`] if the header or payload is cut
    /// short, leaving `buf` untouched in that case.
    pub fn decode(buf: &mut Bytes, max_payload_size: usize) -> Result<Self, WireError> {
        let header = TransportHeader::decode(&mut &buf[..])?;
        let payload_len = header.payload_len as usize;
        if payload_len > max_payload_size {
            return Err(WireError::Size(payload_len));
        }
        if buf.len() < HEADER_SIZE + payload_len {
            return Err(WireError::Incomplete);
        }

        buf.advance(HEADER_SIZE);
        let payload = buf.split_to(payload_len);
        Ok(Self { header, payload })
    }
}
