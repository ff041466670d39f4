//! Error types shared across the crate.
//!
//! Library modules return these typed errors; the binary wraps them in `anyhow`.

use thiserror::Error;

/// Structural reasons a byte run does not form a reader frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// No header sentinel anywhere in the buffer.
    #[error("no frame header in {0} bytes")]
    NoHeader(usize),

    /// Header found at `offset`, but the declared frame is not fully buffered yet.
    #[error("incomplete frame at offset {offset}: need {needed} bytes, have {available}")]
    Incomplete {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Declared payload length exceeds the protocol bound.
    #[error("declared payload length {declared} exceeds maximum {max}")]
    LengthOverflow { offset: usize, declared: usize, max: usize },

    /// Trailing checksum does not match the frame contents.
    #[error("crc mismatch at offset {offset}: expected {expected:#06x}, got {actual:#06x}")]
    CrcMismatch {
        offset: usize,
        expected: u16,
        actual: u16,
    },
}

impl DecodeError {
    /// Offset of the header the failure refers to, if one was found.
    pub fn header_offset(&self) -> Option<usize> {
        match *self {
            DecodeError::NoHeader(_) => None,
            DecodeError::Incomplete { offset, .. }
            | DecodeError::LengthOverflow { offset, .. }
            | DecodeError::CrcMismatch { offset, .. } => Some(offset),
        }
    }
}

/// Failure to put bytes on the reader link.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("link is not open")]
    NotOpen,

    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to hand a message to the broker.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("broker not connected")]
    NotConnected,

    #[error("publish rejected: {0}")]
    Rejected(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the key-value collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around IO errors (directory creation, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored value could not be interpreted.
    #[error("corrupt value under key {0}")]
    Corrupt(String),
}

/// Reasons an inbound command is answered with an error response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Invalid JSON payload")]
    InvalidPayload,

    #[error("Missing action field")]
    MissingAction,

    #[error("Unknown {family} action: {action}")]
    UnknownAction { family: String, action: String },

    #[error("Missing or invalid field: {0}")]
    InvalidField(&'static str),

    #[error("Power level {value} for {field} out of range ({min}..={max} dBm)")]
    PowerOutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Reader link error: {0}")]
    Link(String),
}

impl From<LinkError> for CommandError {
    fn from(e: LinkError) -> Self {
        CommandError::Link(e.to_string())
    }
}
