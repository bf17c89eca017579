//! Wire protocol error types.

use thiserror::Error;

use crate::header::MsgType;

/// Wire protocol errors
#[derive(Error, Debug)]
pub enum WireError {
    /// Incomplete frame (need more data)
    #[error("incomplete frame")]
    Incomplete,

    /// A field runs past the end of the input
    #[error("truncated: need {needed} bytes, {available} available")]
    Truncated {
        /// Bytes the field requires
        needed: usize,
        /// Bytes left in the input
        available: usize,
    },

    /// Unsupported protocol version
    #[error("version unsupported: {0}")]
    Version(u16),

    /// Unsupported crypto suite
    #[error("crypto suite unsupported: {0}")]
    CryptoSuite(u16),

    /// Size limit exceeded
    #[error("size limit exceeded: {0}")]
    Size(usize),

    /// Message type outside the open range (MIN_TYPE, MAX_TYPE)
    #[error("message type out of range: {0}")]
    Type(u16),

    /// Message type is reserved and has no payload codec
    #[error("message type {0:?} is not supported")]
    Unsupported(MsgType),

    /// Header carries a type the decoder was not asked for
    #[error("unexpected message type {0:?}")]
    UnexpectedType(MsgType),

    /// Payload bytes left over after decoding the message
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),

    /// Required field is empty
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Field decoded but holds an invalid value
    #[error("invalid value: {0}")]
    Invalid(String),

    /// String field is not valid UTF-8
    #[error("invalid utf-8")]
    Utf8,

    /// Error decoding a named field
    #[error("{field}: {source}")]
    Field {
        /// Name of the failing field
        field: &'static str,
        /// Underlying error
        #[source]
        source: Box<WireError>,
    },
}

impl WireError {
    /// Innermost error, skipping field annotations
    pub fn root(&self) -> &WireError {
        match self {
            WireError::Field { source, .. } => source.root(),
            other => other,
        }
    }

    /// Name of the outermost field the error was raised in, if any
    pub fn field(&self) -> Option<&'static str> {
        match self {
            WireError::Field { field, .. } => Some(field),
            _ => None,
        }
    }

    /// True when the input ended before the value did
    pub fn is_truncated(&self) -> bool {
        matches!(self.root(), WireError::Truncated { .. } | WireError::Incomplete)
    }
}

/// Attach a field name to a decoding error
pub(crate) trait FieldContext<T> {
    fn field(self, name: &'static str) -> Result<T, WireError>;
}

impl<T> FieldContext<T> for Result<T, WireError> {
    fn field(self, name: &'static str) -> Result<T, WireError> {
        self.map_err(|source| WireError::Field {
            field: name,
            source: Box::new(source),
        })
    }
}
