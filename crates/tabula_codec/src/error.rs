//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Unexpected end of input.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Input continues after the top-level item.
    #[error("{remaining} trailing bytes after top-level value")]
    TrailingBytes {
        /// Number of unread bytes.
        remaining: usize,
    },

    /// Invalid UTF-8 string.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// Invalid wire structure.
    #[error("invalid wire structure: {message}")]
    InvalidStructure {
        /// Description of the structural error.
        message: String,
    },

    /// A length prefix claims more than the decoder is willing to allocate.
    #[error("size limit exceeded: claimed {claimed}, max allowed {max_allowed}")]
    SizeLimitExceeded {
        /// Length claimed by the input.
        claimed: u64,
        /// Configured ceiling.
        max_allowed: u64,
    },

    /// A back-reference points at an id that was never assigned.
    #[error("back-reference to unknown id {id}")]
    DecodeReferenceMissing {
        /// The unresolved reference id.
        id: u32,
    },

    /// The input contains a kind this codec does not produce.
    #[error("unknown wire kind: {kind}")]
    DecodeUnknownKind {
        /// Description of the offending item.
        kind: String,
    },

    /// An arbitrary-precision integer was not a canonical decimal string.
    #[error("invalid bigint literal: {literal:?}")]
    InvalidBigInt {
        /// The rejected literal.
        literal: String,
    },
}

impl CodecError {
    /// Create an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Create an unknown kind error.
    pub fn unknown_kind(kind: impl Into<String>) -> Self {
        Self::DecodeUnknownKind { kind: kind.into() }
    }
}
