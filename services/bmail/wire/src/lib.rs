//! Wire protocol codec, framing and message catalog for bmail.
//!
//! Every message on a bmail connection is a fixed transport header followed
//! by a type-specific payload built from a small set of length-prefixed
//! primitives.
//!
//! ## Wire Format
//!
//! ```text
//! +----------------------+----------------------------+
//! | u16 version          | always 1                   |
//! +----------------------+----------------------------+
//! | u16 crypto_suite     | 1 = Ed25519                |
//! +----------------------+----------------------------+
//! | u16 msg_type         | see [`MsgType`]            |
//! +----------------------+----------------------------+
//! | u32 payload_len      | bytes that follow          |
//! +----------------------+----------------------------+
//! | payload              | variable (0..N)            |
//! +----------------------+----------------------------+
//! ```
//!
//! ## Messages
//!
//! - [`Hello`] / [`HelloAck`]: open a session and hand out the first serial number
//! - [`EnvelopeSyn`] / [`EnvelopeAck`]: submit a sealed envelope (transfer port)
//! - [`CommandSyn`] / [`CommandAck`]: download, list, delete, mailbox state (retrieval port)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attachment;
pub mod bmtp;
pub mod bpop;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod header;
pub mod hello;
pub mod message;
pub mod types;

// Re-export main types
pub use attachment::{pack_attachments, unpack_attachments, Attachment};
pub use bmtp::{EnvelopeAck, EnvelopeSyn};
pub use bpop::{
    AckContent, CmdDelete, CmdDownload, CmdList, CmdState, Command, CommandAck, CommandSyn,
    DeleteOutcome, DeleteResult, Direction, ListEntry, MailboxStats, StateAck,
    DEFAULT_MAIL_COUNT,
};
pub use codec::{Pack, Unpack};
pub use envelope::{CryptEnvelope, Envelope, Recipient, RecipientRole};
pub use error::WireError;
pub use frame::{Frame, DEFAULT_MAX_PAYLOAD_SIZE, HARD_MAX_PAYLOAD_SIZE};
pub use header::{
    MsgType, TransportHeader, BMAIL_VERSION, BMTP_PORT, BPOP_PORT, CRYPTO_SUITE_ED25519,
    HEADER_SIZE, MAX_TYPE, MIN_TYPE,
};
pub use hello::{Hello, HelloAck};
pub use message::{Message, WireMessage};
pub use types::{ErrorCode, SerialNumber, SN_SIZE};
