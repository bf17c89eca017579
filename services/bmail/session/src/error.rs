//! Session and client error types.

use bmail_crypto::{Address, CryptoError};
use bmail_storage::StorageError;
use bmail_wire::{ErrorCode, MsgType, WireError};
use thiserror::Error;

/// Broad class of a [`SessionError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or oversized frame
    Framing,
    /// Message out of order, wrong serial number or refused session
    Sequence,
    /// Authenticity failure: bad signature, hash or ciphertext
    Crypto,
    /// Socket failure or peer gone
    Io,
    /// Deadline passed
    Timeout,
    /// Well-formed ack carrying a non-success code
    Application,
}

/// Session errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// Socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer closed the connection
    #[error("connection closed by peer")]
    Closed,

    /// Connection deadline passed
    #[error("deadline exceeded")]
    Timeout,

    /// Frame or payload could not be decoded
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Peer sent a message the current state does not allow
    #[error("unexpected {got:?} while {state}")]
    UnexpectedMessage {
        /// What the session was doing
        state: &'static str,
        /// Type that arrived
        got: MsgType,
    },

    /// Operation not valid in the current state
    #[error("session is {0}")]
    InvalidState(&'static str),

    /// Request did not carry the serial number last issued
    #[error("serial number mismatch")]
    SnMismatch,

    /// Ack did not rotate the serial number
    #[error("serial number not rotated")]
    SnNotRotated,

    /// Server refused the session in its HELLO_ACK
    #[error("session refused: {0}")]
    Refused(ErrorCode),

    /// Server address is not in the trust set
    #[error("untrusted server {0}")]
    UntrustedServer(Address),

    /// Signature did not verify
    #[error("invalid signature on {0}")]
    InvalidSignature(&'static str),

    /// Hash does not match the content it claims to cover
    #[error("hash mismatch on {0}")]
    HashMismatch(&'static str),

    /// Sealed content key decrypted under a different IV
    #[error("IV mismatch")]
    IvMismatch,

    /// Identity is not among the envelope's recipients
    #[error("not a recipient of this envelope")]
    NotARecipient,

    /// Envelope sender does not match the sealing identity
    #[error("envelope sender {0} is not the sealing identity")]
    SenderMismatch(Address),

    /// Local cryptographic operation failed
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Mail store failure
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Mail domain could not be resolved
    #[error("cannot resolve {0}")]
    Resolve(String),

    /// Server answered with a non-success code
    #[error("rejected by server: {0}")]
    Rejected(ErrorCode),
}

impl SessionError {
    /// Error class
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Io(_) | SessionError::Closed | SessionError::Resolve(_) => ErrorKind::Io,
            SessionError::Timeout => ErrorKind::Timeout,
            SessionError::Wire(_) => ErrorKind::Framing,
            SessionError::UnexpectedMessage { .. }
            | SessionError::InvalidState(_)
            | SessionError::SnMismatch
            | SessionError::SnNotRotated
            | SessionError::Refused(_) => ErrorKind::Sequence,
            SessionError::UntrustedServer(_)
            | SessionError::InvalidSignature(_)
            | SessionError::HashMismatch(_)
            | SessionError::IvMismatch
            | SessionError::NotARecipient
            | SessionError::SenderMismatch(_)
            | SessionError::Crypto(_) => ErrorKind::Crypto,
            SessionError::Storage(_) => ErrorKind::Io,
            SessionError::Rejected(_) => ErrorKind::Application,
        }
    }

    /// Whether the connection must be dropped.
    ///
    /// Local failures that never touched the socket (sealing, unsealing,
    /// resolution, storage) and application rejections leave it usable.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SessionError::IvMismatch
                | SessionError::NotARecipient
                | SessionError::SenderMismatch(_)
                | SessionError::Crypto(_)
                | SessionError::Storage(_)
                | SessionError::Resolve(_)
                | SessionError::Rejected(_)
                | SessionError::InvalidState(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(SessionError::Closed.kind(), ErrorKind::Io);
        assert_eq!(SessionError::Timeout.kind(), ErrorKind::Timeout);
        assert_eq!(SessionError::Wire(WireError::Type(99)).kind(), ErrorKind::Framing);
        assert_eq!(SessionError::SnMismatch.kind(), ErrorKind::Sequence);
        assert_eq!(SessionError::IvMismatch.kind(), ErrorKind::Crypto);
        assert_eq!(
            SessionError::Rejected(ErrorCode::Forbidden).kind(),
            ErrorKind::Application
        );
    }

    #[test]
    fn test_fatality() {
        assert!(SessionError::SnMismatch.is_fatal());
        assert!(SessionError::InvalidSignature("ack").is_fatal());
        assert!(SessionError::Wire(WireError::Incomplete).is_fatal());
        assert!(!SessionError::Rejected(ErrorCode::NoMailAvailable).is_fatal());
        assert!(!SessionError::NotARecipient.is_fatal());
    }
}
