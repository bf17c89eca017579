//! Message catalog: framing each payload type behind a common trait and
//! dispatching incoming frames on their header type.

use bytes::{Buf, Bytes, BytesMut};
use tracing::trace;

use crate::bmtp::{EnvelopeAck, EnvelopeSyn};
use crate::bpop::{CommandAck, CommandSyn};
use crate::error::WireError;
use crate::frame::{Frame, DEFAULT_MAX_PAYLOAD_SIZE};
use crate::header::{MsgType, TransportHeader, HEADER_SIZE};
use crate::hello::{Hello, HelloAck};

/// A payload type with its own slice of the message-type space
pub trait WireMessage: Sized {
    /// Type tag this value is framed with
    fn msg_type(&self) -> MsgType;

    /// Whether frames of `msg_type` carry this message
    fn accepts(msg_type: MsgType) -> bool;

    /// Append the payload encoding to `buf`
    fn pack_payload(&self, buf: &mut BytesMut) -> Result<(), WireError>;

    /// Decode the payload of a frame tagged `msg_type`
    fn unpack_payload<B: Buf>(msg_type: MsgType, buf: &mut B) -> Result<Self, WireError>;

    /// Check the header announces this message
    fn verify_header(header: &TransportHeader) -> bool {
        Self::accepts(header.msg_type)
    }

    /// Build the frame for this message
    fn to_frame(&self) -> Result<Frame, WireError> {
        let mut payload = BytesMut::new();
        self.pack_payload(&mut payload)?;
        Frame::new(self.msg_type(), payload.freeze())
    }

    /// Header and payload as one buffer
    fn pack(&self) -> Result<Bytes, WireError> {
        Ok(self.to_frame()?.encode())
    }

    /// Decode from a received frame; the payload must be consumed exactly
    fn from_frame(frame: &Frame) -> Result<Self, WireError> {
        if !Self::verify_header(&frame.header) {
            return Err(WireError::UnexpectedType(frame.header.msg_type));
        }
        let mut payload = frame.payload.clone();
        let message = Self::unpack_payload(frame.header.msg_type, &mut payload)?;
        if payload.has_remaining() {
            return Err(WireError::TrailingBytes(payload.remaining()));
        }
        trace!("decoded {:?} ({} bytes)", frame.header.msg_type, frame.payload.len());
        Ok(message)
    }

    /// Decode header and payload from the front of `data`, returning the
    /// message with the number of bytes consumed
    fn unpack(data: &[u8]) -> Result<(Self, usize), WireError> {
        let mut bytes = Bytes::copy_from_slice(data);
        let frame = Frame::decode(&mut bytes, DEFAULT_MAX_PAYLOAD_SIZE)?;
        let message = Self::from_frame(&frame)?;
        Ok((message, HEADER_SIZE + frame.payload.len()))
    }
}

/// Any message with a payload codec
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Session opening request
    Hello(Hello),
    /// Session opening reply
    HelloAck(HelloAck),
    /// Sealed envelope submission
    EnvelopeSyn(EnvelopeSyn),
    /// Envelope submission reply
    EnvelopeAck(EnvelopeAck),
    /// Retrieval command
    CommandSyn(CommandSyn),
    /// Retrieval command reply
    CommandAck(CommandAck),
}

impl Message {
    /// Type tag of the wrapped message
    pub fn msg_type(&self) -> MsgType {
        match self {
            Message::Hello(m) => m.msg_type(),
            Message::HelloAck(m) => m.msg_type(),
            Message::EnvelopeSyn(m) => m.msg_type(),
            Message::EnvelopeAck(m) => m.msg_type(),
            Message::CommandSyn(m) => m.msg_type(),
            Message::CommandAck(m) => m.msg_type(),
        }
    }

    /// Decode a frame by its header type.
    ///
    /// Reserved types pass header validation but have no payload codec and
    /// yield [`WireError::Unsupported`].
    pub fn from_frame(frame: &Frame) -> Result<Self, WireError> {
        let msg_type = frame.msg_type();
        if Hello::accepts(msg_type) {
            Hello::from_frame(frame).map(Message::Hello)
        } else if HelloAck::accepts(msg_type) {
            HelloAck::from_frame(frame).map(Message::HelloAck)
        } else if EnvelopeSyn::accepts(msg_type) {
            EnvelopeSyn::from_frame(frame).map(Message::EnvelopeSyn)
        } else if EnvelopeAck::accepts(msg_type) {
            EnvelopeAck::from_frame(frame).map(Message::EnvelopeAck)
        } else if CommandSyn::accepts(msg_type) {
            CommandSyn::from_frame(frame).map(Message::CommandSyn)
        } else if CommandAck::accepts(msg_type) {
            CommandAck::from_frame(frame).map(Message::CommandAck)
        } else {
            Err(WireError::Unsupported(msg_type))
        }
    }

    /// Build the frame for the wrapped message
    pub fn to_frame(&self) -> Result<Frame, WireError> {
        match self {
            Message::Hello(m) => m.to_frame(),
            Message::HelloAck(m) => m.to_frame(),
            Message::EnvelopeSyn(m) => m.to_frame(),
            Message::EnvelopeAck(m) => m.to_frame(),
            Message::CommandSyn(m) => m.to_frame(),
            Message::CommandAck(m) => m.to_frame(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_types_are_unsupported() {
        for typ in [
            MsgType::SendEnvelope,
            MsgType::RespEnvelope,
            MsgType::ContactHello,
            MsgType::ContactHelloResp,
            MsgType::ContactAdd,
            MsgType::ContactDel,
            MsgType::ContactPull,
        ] {
            let frame = Frame::new(typ, Bytes::new()).unwrap();
            assert!(matches!(
                Message::from_frame(&frame),
                Err(WireError::Unsupported(t)) if t == typ
            ));
        }
    }

    #[test]
    fn test_listing_types_dispatch_to_commands() {
        assert!(CommandSyn::accepts(MsgType::List));
        assert!(CommandAck::accepts(MsgType::ListResp));

        let frame = Frame::new(MsgType::List, Bytes::new()).unwrap();
        assert!(Message::from_frame(&frame).unwrap_err().is_truncated());
    }

    #[test]
    fn test_dispatch_hello() {
        let frame = Hello.to_frame().unwrap();
        assert_eq!(Message::from_frame(&frame).unwrap(), Message::Hello(Hello));
    }

    #[test]
    fn test_typed_decode_rejects_other_type() {
        let frame = Hello.to_frame().unwrap();
        assert!(matches!(
            HelloAck::from_frame(&frame),
            Err(WireError::UnexpectedType(MsgType::Hello))
        ));
    }
}
